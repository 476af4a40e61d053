use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::queue_repository::{JobCounts, QueueRepository};
use crate::db::workflow_repository::WorkflowRepository;
use crate::integrations::{ActionKind, TriggerKind};
use crate::models::queue_job::{JobState, QueueJob};
use crate::models::workflow::Workflow;
use crate::models::workflow_run::{RunStatus, WorkflowRun};

/// In-memory stand-in for the Postgres workflow repository. Mirrors the SQL
/// semantics closely enough for engine, worker and route tests.
#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    workflows: Mutex<Vec<Workflow>>,
    runs: Mutex<Vec<WorkflowRun>>,
    /// When set, `complete_workflow_run` fails, exercising the worker's
    /// infrastructure-error path.
    pub fail_complete_run: AtomicBool,
    pub last_run_touches: AtomicUsize,
}

impl InMemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_snapshot(&self) -> Vec<WorkflowRun> {
        self.runs.lock().expect("runs mutex poisoned").clone()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn create_workflow(
        &self,
        user_id: Uuid,
        name: &str,
        trigger: TriggerKind,
        action: ActionKind,
        cron: Option<&str>,
    ) -> Result<Workflow, sqlx::Error> {
        let workflow = Workflow {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            trigger,
            action,
            cron: cron.map(|c| c.to_string()),
            is_active: true,
            last_run_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.workflows
            .lock()
            .expect("workflows mutex poisoned")
            .push(workflow.clone());
        Ok(workflow)
    }

    async fn list_workflows_by_user(&self, user_id: Uuid) -> Result<Vec<Workflow>, sqlx::Error> {
        let mut results: Vec<Workflow> = self
            .workflows
            .lock()
            .expect("workflows mutex poisoned")
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(results)
    }

    async fn find_workflow_by_id(
        &self,
        user_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        Ok(self
            .workflows
            .lock()
            .expect("workflows mutex poisoned")
            .iter()
            .find(|w| w.user_id == user_id && w.id == workflow_id)
            .cloned())
    }

    async fn find_workflow_by_id_unscoped(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        Ok(self
            .workflows
            .lock()
            .expect("workflows mutex poisoned")
            .iter()
            .find(|w| w.id == workflow_id)
            .cloned())
    }

    async fn update_workflow(
        &self,
        user_id: Uuid,
        workflow_id: Uuid,
        name: &str,
        trigger: TriggerKind,
        action: ActionKind,
        cron: Option<&str>,
        is_active: bool,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let mut workflows = self.workflows.lock().expect("workflows mutex poisoned");
        let Some(workflow) = workflows
            .iter_mut()
            .find(|w| w.user_id == user_id && w.id == workflow_id)
        else {
            return Ok(None);
        };
        workflow.name = name.to_string();
        workflow.trigger = trigger;
        workflow.action = action;
        workflow.cron = cron.map(|c| c.to_string());
        workflow.is_active = is_active;
        Ok(Some(workflow.clone()))
    }

    async fn delete_workflow(&self, user_id: Uuid, workflow_id: Uuid) -> Result<bool, sqlx::Error> {
        let mut workflows = self.workflows.lock().expect("workflows mutex poisoned");
        let before = workflows.len();
        workflows.retain(|w| !(w.user_id == user_id && w.id == workflow_id));
        Ok(workflows.len() < before)
    }

    async fn set_workflow_active(
        &self,
        user_id: Uuid,
        workflow_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let mut workflows = self.workflows.lock().expect("workflows mutex poisoned");
        let Some(workflow) = workflows
            .iter_mut()
            .find(|w| w.user_id == user_id && w.id == workflow_id)
        else {
            return Ok(None);
        };
        workflow.is_active = is_active;
        Ok(Some(workflow.clone()))
    }

    async fn touch_last_run(&self, workflow_id: Uuid) -> Result<(), sqlx::Error> {
        let mut workflows = self.workflows.lock().expect("workflows mutex poisoned");
        if let Some(workflow) = workflows.iter_mut().find(|w| w.id == workflow_id) {
            workflow.last_run_at = Some(OffsetDateTime::now_utc());
            self.last_run_touches.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn create_workflow_run(
        &self,
        workflow_id: Uuid,
        status: RunStatus,
        logs: &str,
    ) -> Result<WorkflowRun, sqlx::Error> {
        let run = WorkflowRun {
            id: Uuid::new_v4(),
            workflow_id,
            status,
            logs: logs.to_string(),
            created_at: OffsetDateTime::now_utc(),
            ended_at: None,
        };
        self.runs
            .lock()
            .expect("runs mutex poisoned")
            .push(run.clone());
        Ok(run)
    }

    async fn complete_workflow_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        logs: &str,
    ) -> Result<(), sqlx::Error> {
        if self.fail_complete_run.load(Ordering::SeqCst) {
            return Err(sqlx::Error::Protocol("mock run-store failure".into()));
        }
        let mut runs = self.runs.lock().expect("runs mutex poisoned");
        if let Some(run) = runs.iter_mut().find(|r| r.id == run_id) {
            run.status = status;
            run.logs = logs.to_string();
            run.ended_at = Some(OffsetDateTime::now_utc());
        }
        Ok(())
    }

    async fn list_runs_for_workflow(
        &self,
        workflow_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WorkflowRun>, sqlx::Error> {
        let mut results: Vec<WorkflowRun> = self
            .runs
            .lock()
            .expect("runs mutex poisoned")
            .iter()
            .filter(|r| r.workflow_id == workflow_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        results.truncate(limit.max(0) as usize);
        Ok(results)
    }
}

/// In-memory queue table with the same claim/requeue semantics as the
/// Postgres repository.
#[derive(Default)]
pub struct InMemoryQueueRepository {
    jobs: Mutex<Vec<QueueJob>>,
}

impl InMemoryQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_snapshot(&self) -> Vec<QueueJob> {
        self.jobs.lock().expect("jobs mutex poisoned").clone()
    }
}

#[async_trait]
impl QueueRepository for InMemoryQueueRepository {
    async fn enqueue_job(
        &self,
        job_id: &str,
        name: &str,
        workflow_id: Uuid,
        max_attempts: i32,
    ) -> Result<QueueJob, sqlx::Error> {
        let now = OffsetDateTime::now_utc();
        let job = QueueJob {
            id: job_id.to_string(),
            name: name.to_string(),
            workflow_id,
            state: JobState::Waiting,
            attempts: 0,
            max_attempts,
            last_error: None,
            run_at: now,
            created_at: now,
            updated_at: now,
        };
        self.jobs
            .lock()
            .expect("jobs mutex poisoned")
            .push(job.clone());
        Ok(job)
    }

    async fn claim_next_due_job(&self) -> Result<Option<QueueJob>, sqlx::Error> {
        let now = OffsetDateTime::now_utc();
        let mut jobs = self.jobs.lock().expect("jobs mutex poisoned");
        // Earliest created_at wins; insertion order breaks ties.
        let mut claimed: Option<usize> = None;
        for (index, job) in jobs.iter().enumerate() {
            if job.state != JobState::Waiting || job.run_at > now {
                continue;
            }
            let earlier = match claimed {
                None => true,
                Some(best) => job.created_at < jobs[best].created_at,
            };
            if earlier {
                claimed = Some(index);
            }
        }
        let Some(index) = claimed else {
            return Ok(None);
        };
        let job = &mut jobs[index];
        job.state = JobState::Active;
        job.attempts += 1;
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn complete_job(&self, job_id: &str) -> Result<(), sqlx::Error> {
        self.jobs
            .lock()
            .expect("jobs mutex poisoned")
            .retain(|j| j.id != job_id);
        Ok(())
    }

    async fn fail_job(
        &self,
        job_id: &str,
        error: &str,
        retry_at: Option<OffsetDateTime>,
    ) -> Result<(), sqlx::Error> {
        let mut jobs = self.jobs.lock().expect("jobs mutex poisoned");
        if let Some(job) = jobs.iter_mut().find(|j| j.id == job_id) {
            job.last_error = Some(error.to_string());
            job.updated_at = OffsetDateTime::now_utc();
            match retry_at {
                Some(retry_at) => {
                    job.state = JobState::Waiting;
                    job.run_at = retry_at;
                }
                None => {
                    job.state = JobState::Failed;
                }
            }
        }
        Ok(())
    }

    async fn count_jobs(&self) -> Result<JobCounts, sqlx::Error> {
        let jobs = self.jobs.lock().expect("jobs mutex poisoned");
        let mut counts = JobCounts::default();
        for job in jobs.iter() {
            match job.state {
                JobState::Waiting => counts.waiting += 1,
                JobState::Active => counts.active += 1,
                JobState::Completed => counts.completed += 1,
                JobState::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }
}

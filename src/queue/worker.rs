use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info};

use crate::engine::{process_workflow, ExecutionOutcome};
use crate::models::queue_job::QueueJob;
use crate::models::workflow_run::RunStatus;
use crate::state::AppState;

const CLAIM_ERROR_BACKOFF: Duration = Duration::from_millis(1000);

/// A bounded set of claim-loop tasks consuming the job queue. Constructed
/// explicitly and shut down explicitly; there is no global instance.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    pub fn start(state: AppState) -> Self {
        let (shutdown, _) = watch::channel(false);
        let concurrency = state.queue.config().concurrency.max(1);
        let handles = (0..concurrency)
            .map(|worker_index| {
                let state = state.clone();
                let shutdown_rx = shutdown.subscribe();
                tokio::spawn(worker_loop(state, worker_index, shutdown_rx))
            })
            .collect();
        info!(concurrency, "worker pool started");
        Self { handles, shutdown }
    }

    /// Stops claiming new jobs, lets in-flight jobs drain, then joins every
    /// worker task.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(?err, "worker task failed during shutdown");
            }
        }
        info!("worker pool stopped");
    }
}

async fn worker_loop(state: AppState, worker_index: usize, mut shutdown: watch::Receiver<bool>) {
    let poll_interval = state.queue.config().poll_interval;
    loop {
        if *shutdown.borrow() {
            break;
        }
        match state.queue.claim().await {
            Ok(Some(job)) => process_job(&state, job).await,
            Ok(None) => {
                if wait_or_shutdown(&mut shutdown, poll_interval).await {
                    break;
                }
            }
            Err(err) => {
                error!(worker_index, ?err, "failed to claim next job");
                if wait_or_shutdown(&mut shutdown, CLAIM_ERROR_BACKOFF).await {
                    break;
                }
            }
        }
    }
}

/// Sleeps for `delay` unless shutdown is signalled first. Returns whether the
/// loop should stop.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = sleep(delay) => *shutdown.borrow(),
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}

async fn process_job(state: &AppState, job: QueueJob) {
    match run_job(state, &job).await {
        Ok(outcome) => {
            // A failed outcome is still a delivered job; only errors below
            // reach the retry machinery.
            if let Err(err) = state.queue.complete(&job).await {
                error!(job_id = %job.id, ?err, "failed to complete job");
                return;
            }
            info!(job_id = %job.id, success = outcome.success, "job completed");
        }
        Err(err) => {
            let message = err.to_string();
            error!(job_id = %job.id, %message, "error processing workflow job");

            // Never lose the failure: record it as its own run even though a
            // pending run for this attempt may already exist.
            if let Err(record_err) = state
                .workflow_repo
                .create_workflow_run(job.workflow_id, RunStatus::Failed, &message)
                .await
            {
                error!(job_id = %job.id, ?record_err, "failed to record failed run");
            }

            if let Err(fail_err) = state.queue.report_failure(&job, &message).await {
                error!(job_id = %job.id, ?fail_err, "failed to report job failure");
            }
        }
    }
}

/// One delivery attempt: pending run, execution, terminal run update. Any
/// repository error escapes to the caller so the queue can retry.
async fn run_job(state: &AppState, job: &QueueJob) -> Result<ExecutionOutcome, sqlx::Error> {
    let run = state
        .workflow_repo
        .create_workflow_run(
            job.workflow_id,
            RunStatus::Pending,
            "Starting workflow execution...",
        )
        .await?;

    let outcome = process_workflow(state, job.workflow_id).await;

    let status = if outcome.success {
        RunStatus::Success
    } else {
        RunStatus::Failed
    };
    state
        .workflow_repo
        .complete_workflow_run(run.id, status, &outcome.logs)
        .await?;

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::Semaphore;
    use uuid::Uuid;

    use super::*;
    use crate::config::Config;
    use crate::db::mock_db::{InMemoryQueueRepository, InMemoryWorkflowRepository};
    use crate::db::workflow_repository::WorkflowRepository;
    use crate::integrations::{
        gmail, telegram, ActionKind, IntegrationError, IntegrationRegistry, TriggerHandler,
        TriggerKind,
    };
    use crate::models::queue_job::JobState;
    use crate::queue::{JobQueue, QueueConfig};
    use crate::routes::auth::session::StaticTokenVerifier;

    fn test_queue_config(concurrency: usize) -> QueueConfig {
        QueueConfig {
            max_attempts: 3,
            backoff_base: Duration::from_millis(5),
            concurrency,
            poll_interval: Duration::from_millis(10),
        }
    }

    fn test_state(
        workflow_repo: Arc<InMemoryWorkflowRepository>,
        queue_repo: Arc<InMemoryQueueRepository>,
        registry: IntegrationRegistry,
        concurrency: usize,
    ) -> AppState {
        AppState {
            workflow_repo,
            queue: Arc::new(JobQueue::new(queue_repo, test_queue_config(concurrency))),
            registry: Arc::new(registry),
            verifier: Arc::new(StaticTokenVerifier::new(Uuid::new_v4())),
            config: Arc::new(Config::for_tests()),
        }
    }

    fn deterministic_registry() -> IntegrationRegistry {
        let mut registry = IntegrationRegistry::empty();
        registry.register_trigger(
            TriggerKind::GmailNewEmail,
            Box::new(gmail::NewEmailTrigger::with_chance(1.0)),
        );
        registry.register_action(
            ActionKind::TelegramSendMessage,
            Box::new(telegram::SendMessageAction::new()),
        );
        registry
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..200 {
            if condition() {
                return true;
            }
            sleep(Duration::from_millis(10)).await;
        }
        condition()
    }

    /// Trigger that parks until a permit is released, for observing jobs
    /// mid-flight.
    struct GatedTrigger {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl TriggerHandler for GatedTrigger {
        async fn poll(&self) -> Result<Option<Value>, IntegrationError> {
            let permit = self.gate.acquire().await.expect("gate closed");
            permit.forget();
            Ok(Some(json!({ "body": "gated" })))
        }
    }

    #[tokio::test]
    async fn successful_job_produces_one_run_from_pending_to_success() {
        let workflow_repo = Arc::new(InMemoryWorkflowRepository::new());
        let queue_repo = Arc::new(InMemoryQueueRepository::new());
        let workflow = workflow_repo
            .create_workflow(
                Uuid::new_v4(),
                "email to telegram",
                TriggerKind::GmailNewEmail,
                ActionKind::TelegramSendMessage,
                None,
            )
            .await
            .unwrap();
        let state = test_state(
            workflow_repo.clone(),
            queue_repo.clone(),
            deterministic_registry(),
            2,
        );

        state.queue.enqueue(workflow.id).await.unwrap();
        let pool = WorkerPool::start(state.clone());

        assert!(
            wait_until(|| {
                let runs = workflow_repo.run_snapshot();
                runs.len() == 1 && runs[0].status == RunStatus::Success
            })
            .await
        );
        pool.shutdown().await;

        let runs = workflow_repo.run_snapshot();
        assert_eq!(runs.len(), 1);
        assert_eq!(
            runs[0].logs,
            "Successfully processed workflow: gmail:new_email -> telegram:send_message"
        );
        assert!(runs[0].ended_at.is_some());
        // Delivered and discarded.
        assert!(queue_repo.job_snapshot().is_empty());
    }

    #[tokio::test]
    async fn failed_outcome_completes_the_job_without_retry() {
        let workflow_repo = Arc::new(InMemoryWorkflowRepository::new());
        let queue_repo = Arc::new(InMemoryQueueRepository::new());
        let user_id = Uuid::new_v4();
        let workflow = workflow_repo
            .create_workflow(
                user_id,
                "inactive",
                TriggerKind::GithubNewIssue,
                ActionKind::GmailSendEmail,
                None,
            )
            .await
            .unwrap();
        workflow_repo
            .set_workflow_active(user_id, workflow.id, false)
            .await
            .unwrap();
        let state = test_state(
            workflow_repo.clone(),
            queue_repo.clone(),
            deterministic_registry(),
            2,
        );

        state.queue.enqueue(workflow.id).await.unwrap();
        let pool = WorkerPool::start(state.clone());

        assert!(
            wait_until(|| {
                let runs = workflow_repo.run_snapshot();
                runs.len() == 1 && runs[0].status == RunStatus::Failed
            })
            .await
        );
        pool.shutdown().await;

        let runs = workflow_repo.run_snapshot();
        assert_eq!(runs[0].logs, "Workflow is inactive");
        assert_eq!(workflow_repo.last_run_touches.load(Ordering::SeqCst), 0);
        // The outcome was failed but delivery succeeded, so no retry.
        assert!(queue_repo.job_snapshot().is_empty());
    }

    #[tokio::test]
    async fn repository_error_leaves_orphaned_pending_run_and_records_failure() {
        let workflow_repo = Arc::new(InMemoryWorkflowRepository::new());
        let queue_repo = Arc::new(InMemoryQueueRepository::new());
        let workflow = workflow_repo
            .create_workflow(
                Uuid::new_v4(),
                "broken store",
                TriggerKind::GmailNewEmail,
                ActionKind::TelegramSendMessage,
                None,
            )
            .await
            .unwrap();
        workflow_repo.fail_complete_run.store(true, Ordering::SeqCst);
        let state = test_state(
            workflow_repo.clone(),
            queue_repo.clone(),
            deterministic_registry(),
            1,
        );

        state.queue.enqueue(workflow.id).await.unwrap();
        let pool = WorkerPool::start(state.clone());

        // Three delivery attempts, then the job is terminally failed.
        assert!(
            wait_until(|| {
                queue_repo
                    .job_snapshot()
                    .first()
                    .is_some_and(|job| job.state == JobState::Failed)
            })
            .await
        );
        pool.shutdown().await;

        let job = &queue_repo.job_snapshot()[0];
        assert_eq!(job.attempts, 3);
        assert!(job.last_error.is_some());

        // Each attempt leaves the orphaned pending run plus a fresh failed
        // record, by design.
        let runs = workflow_repo.run_snapshot();
        let pending = runs
            .iter()
            .filter(|r| r.status == RunStatus::Pending)
            .count();
        let failed = runs
            .iter()
            .filter(|r| r.status == RunStatus::Failed)
            .count();
        assert_eq!(pending, 3);
        assert_eq!(failed, 3);
    }

    #[tokio::test]
    async fn concurrency_limit_bounds_simultaneous_jobs() {
        let workflow_repo = Arc::new(InMemoryWorkflowRepository::new());
        let queue_repo = Arc::new(InMemoryQueueRepository::new());
        let workflow = workflow_repo
            .create_workflow(
                Uuid::new_v4(),
                "gated",
                TriggerKind::GmailNewEmail,
                ActionKind::TelegramSendMessage,
                None,
            )
            .await
            .unwrap();

        let gate = Arc::new(Semaphore::new(0));
        let mut registry = IntegrationRegistry::empty();
        registry.register_trigger(
            TriggerKind::GmailNewEmail,
            Box::new(GatedTrigger { gate: gate.clone() }),
        );
        registry.register_action(
            ActionKind::TelegramSendMessage,
            Box::new(telegram::SendMessageAction::new()),
        );
        let state = test_state(workflow_repo.clone(), queue_repo.clone(), registry, 2);

        for _ in 0..4 {
            state.queue.enqueue(workflow.id).await.unwrap();
        }
        let pool = WorkerPool::start(state.clone());

        assert!(
            wait_until(|| {
                let counts = queue_repo
                    .job_snapshot()
                    .iter()
                    .filter(|j| j.state == JobState::Active)
                    .count();
                counts == 2
            })
            .await
        );
        // Two workers are parked on the gate; nothing else may go active.
        sleep(Duration::from_millis(50)).await;
        let active = queue_repo
            .job_snapshot()
            .iter()
            .filter(|j| j.state == JobState::Active)
            .count();
        assert_eq!(active, 2);

        gate.add_permits(4);
        assert!(wait_until(|| queue_repo.job_snapshot().is_empty()).await);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_the_in_flight_job() {
        let workflow_repo = Arc::new(InMemoryWorkflowRepository::new());
        let queue_repo = Arc::new(InMemoryQueueRepository::new());
        let workflow = workflow_repo
            .create_workflow(
                Uuid::new_v4(),
                "draining",
                TriggerKind::GmailNewEmail,
                ActionKind::TelegramSendMessage,
                None,
            )
            .await
            .unwrap();

        let gate = Arc::new(Semaphore::new(0));
        let mut registry = IntegrationRegistry::empty();
        registry.register_trigger(
            TriggerKind::GmailNewEmail,
            Box::new(GatedTrigger { gate: gate.clone() }),
        );
        registry.register_action(
            ActionKind::TelegramSendMessage,
            Box::new(telegram::SendMessageAction::new()),
        );
        let state = test_state(workflow_repo.clone(), queue_repo.clone(), registry, 1);

        state.queue.enqueue(workflow.id).await.unwrap();
        let pool = WorkerPool::start(state.clone());
        assert!(
            wait_until(|| {
                queue_repo
                    .job_snapshot()
                    .first()
                    .is_some_and(|j| j.state == JobState::Active)
            })
            .await
        );

        gate.add_permits(1);
        pool.shutdown().await;

        // The in-flight job finished before the pool stopped.
        assert!(queue_repo.job_snapshot().is_empty());
        let runs = workflow_repo.run_snapshot();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Success);
    }
}

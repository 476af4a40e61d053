pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::db::queue_repository::{JobCounts, QueueRepository};
use crate::models::queue_job::QueueJob;

/// The single job type this queue carries.
pub const PROCESS_WORKFLOW_JOB: &str = "processWorkflow";

pub fn unix_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Delivery attempts per job before it is terminally failed.
    pub max_attempts: i32,
    /// First retry delay; doubles on every further attempt.
    pub backoff_base: Duration,
    /// Jobs executing simultaneously across the worker pool.
    pub concurrency: usize,
    /// Idle sleep between claim attempts.
    pub poll_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(1000),
            concurrency: 5,
            poll_interval: Duration::from_millis(750),
        }
    }
}

/// Durable at-least-once work queue over the `queue_jobs` table. Completed
/// jobs are discarded; failed jobs are retained for inspection. The
/// `workflow_runs` table remains the audit trail of record.
pub struct JobQueue {
    repo: Arc<dyn QueueRepository>,
    config: QueueConfig,
}

impl JobQueue {
    pub fn new(repo: Arc<dyn QueueRepository>, config: QueueConfig) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Persists a job for the workflow and returns it without waiting for
    /// delivery.
    pub async fn enqueue(&self, workflow_id: Uuid) -> Result<QueueJob, sqlx::Error> {
        let job_id = format!("workflow-{}-{}", workflow_id, unix_millis());
        let job = self
            .repo
            .enqueue_job(
                &job_id,
                PROCESS_WORKFLOW_JOB,
                workflow_id,
                self.config.max_attempts,
            )
            .await?;
        info!(job_id = %job.id, workflow_id = %workflow_id, "enqueued workflow job");
        Ok(job)
    }

    pub async fn status(&self) -> Result<JobCounts, sqlx::Error> {
        self.repo.count_jobs().await
    }

    pub(crate) async fn claim(&self) -> Result<Option<QueueJob>, sqlx::Error> {
        self.repo.claim_next_due_job().await
    }

    pub(crate) async fn complete(&self, job: &QueueJob) -> Result<(), sqlx::Error> {
        self.repo.complete_job(&job.id).await
    }

    /// Applies the retry policy to a failed delivery: requeue with backoff
    /// while attempts remain, terminal failure once they are exhausted.
    pub(crate) async fn report_failure(
        &self,
        job: &QueueJob,
        error: &str,
    ) -> Result<(), sqlx::Error> {
        if job.attempts < job.max_attempts {
            let delay = self.backoff_delay(job.attempts);
            let retry_at = OffsetDateTime::now_utc() + delay;
            self.repo.fail_job(&job.id, error, Some(retry_at)).await
        } else {
            self.repo.fail_job(&job.id, error, None).await
        }
    }

    /// Exponential backoff: `base * 2^(attempts - 1)` for the attempt that
    /// just failed, so 1000ms, 2000ms, 4000ms with the defaults.
    fn backoff_delay(&self, attempts: i32) -> Duration {
        let exponent = attempts.saturating_sub(1).clamp(0, 30) as u32;
        self.config.backoff_base * 2u32.pow(exponent)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::db::mock_db::InMemoryQueueRepository;
    use crate::models::queue_job::JobState;

    fn test_queue(repo: Arc<InMemoryQueueRepository>) -> JobQueue {
        JobQueue::new(
            repo,
            QueueConfig {
                max_attempts: 3,
                backoff_base: Duration::from_millis(10),
                concurrency: 2,
                poll_interval: Duration::from_millis(5),
            },
        )
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let queue = JobQueue::new(
            Arc::new(InMemoryQueueRepository::new()),
            QueueConfig::default(),
        );
        assert_eq!(queue.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(queue.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(queue.backoff_delay(3), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn enqueue_persists_a_waiting_job_with_derived_id() {
        let repo = Arc::new(InMemoryQueueRepository::new());
        let queue = test_queue(repo.clone());
        let workflow_id = uuid::Uuid::new_v4();

        let job = queue.enqueue(workflow_id).await.unwrap();

        assert!(job.id.starts_with(&format!("workflow-{workflow_id}-")));
        assert_eq!(job.name, PROCESS_WORKFLOW_JOB);
        assert_eq!(job.state, JobState::Waiting);
        assert_eq!(job.attempts, 0);
        assert_eq!(queue.status().await.unwrap().waiting, 1);
    }

    #[tokio::test]
    async fn claim_activates_the_oldest_due_job_and_counts_the_attempt() {
        let repo = Arc::new(InMemoryQueueRepository::new());
        let queue = test_queue(repo.clone());
        let first = queue.enqueue(uuid::Uuid::new_v4()).await.unwrap();
        let _second = queue.enqueue(uuid::Uuid::new_v4()).await.unwrap();

        let claimed = queue.claim().await.unwrap().expect("a due job");
        assert_eq!(claimed.id, first.id);
        assert_eq!(claimed.state, JobState::Active);
        assert_eq!(claimed.attempts, 1);

        let counts = queue.status().await.unwrap();
        assert_eq!(counts.active, 1);
        assert_eq!(counts.waiting, 1);
    }

    #[tokio::test]
    async fn failed_delivery_requeues_with_backoff_until_attempts_run_out() {
        let repo = Arc::new(InMemoryQueueRepository::new());
        let queue = test_queue(repo.clone());
        queue.enqueue(uuid::Uuid::new_v4()).await.unwrap();

        for attempt in 1..=2 {
            let job = queue.claim().await.unwrap().expect("job due for delivery");
            assert_eq!(job.attempts, attempt);
            queue.report_failure(&job, "boom").await.unwrap();

            // Not due again until the backoff delay has elapsed.
            assert!(queue.claim().await.unwrap().is_none());
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let job = queue.claim().await.unwrap().expect("final attempt");
        assert_eq!(job.attempts, 3);
        queue.report_failure(&job, "boom").await.unwrap();

        // Terminal: retained as failed, never redelivered.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(queue.claim().await.unwrap().is_none());
        let counts = queue.status().await.unwrap();
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.waiting, 0);

        let retained = &repo.job_snapshot()[0];
        assert_eq!(retained.state, JobState::Failed);
        assert_eq!(retained.last_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn completed_jobs_are_discarded() {
        let repo = Arc::new(InMemoryQueueRepository::new());
        let queue = test_queue(repo.clone());
        queue.enqueue(uuid::Uuid::new_v4()).await.unwrap();

        let job = queue.claim().await.unwrap().expect("a due job");
        queue.complete(&job).await.unwrap();

        assert!(repo.job_snapshot().is_empty());
        assert_eq!(queue.status().await.unwrap(), JobCounts::default());
    }
}

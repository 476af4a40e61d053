use async_trait::async_trait;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::queue_job::QueueJob;

/// Point-in-time snapshot of the queue, best effort only. Completed jobs are
/// discarded on success, so that count stays near zero by design.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub waiting: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
}

#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Persists a job in `waiting` state, eligible for delivery immediately.
    async fn enqueue_job(
        &self,
        job_id: &str,
        name: &str,
        workflow_id: Uuid,
        max_attempts: i32,
    ) -> Result<QueueJob, sqlx::Error>;

    /// Claims the oldest due `waiting` job, moving it to `active` and
    /// counting the delivery attempt. Concurrent claimers never receive the
    /// same job.
    async fn claim_next_due_job(&self) -> Result<Option<QueueJob>, sqlx::Error>;

    /// Discards a finished job.
    async fn complete_job(&self, job_id: &str) -> Result<(), sqlx::Error>;

    /// Records a delivery failure. With `retry_at` the job is requeued as
    /// `waiting` and becomes due at that instant; without it the job is
    /// terminally failed and retained.
    async fn fail_job(
        &self,
        job_id: &str,
        error: &str,
        retry_at: Option<OffsetDateTime>,
    ) -> Result<(), sqlx::Error>;

    async fn count_jobs(&self) -> Result<JobCounts, sqlx::Error>;
}

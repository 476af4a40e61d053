use async_trait::async_trait;
use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::queue_repository::{JobCounts, QueueRepository};
use crate::models::queue_job::QueueJob;

pub struct PostgresQueueRepository {
    pub pool: PgPool,
}

#[async_trait]
impl QueueRepository for PostgresQueueRepository {
    async fn enqueue_job(
        &self,
        job_id: &str,
        name: &str,
        workflow_id: Uuid,
        max_attempts: i32,
    ) -> Result<QueueJob, sqlx::Error> {
        let result = sqlx::query_as::<_, QueueJob>(
            r#"
            INSERT INTO queue_jobs
                (id, name, workflow_id, state, attempts, max_attempts, run_at, created_at, updated_at)
            VALUES ($1, $2, $3, 'waiting', 0, $4, now(), now(), now())
            RETURNING id, name, workflow_id, state, attempts, max_attempts, last_error,
                      run_at, created_at, updated_at
            "#,
        )
        .bind(job_id)
        .bind(name)
        .bind(workflow_id)
        .bind(max_attempts)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn claim_next_due_job(&self) -> Result<Option<QueueJob>, sqlx::Error> {
        // SKIP LOCKED keeps concurrent workers from double-claiming; ordering
        // by enqueue time preserves FIFO delivery.
        let result = sqlx::query_as::<_, QueueJob>(
            r#"
            UPDATE queue_jobs
            SET state = 'active', attempts = attempts + 1, updated_at = now()
            WHERE id = (
                SELECT id FROM queue_jobs
                WHERE state = 'waiting' AND run_at <= now()
                ORDER BY created_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, name, workflow_id, state, attempts, max_attempts, last_error,
                      run_at, created_at, updated_at
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn complete_job(&self, job_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM queue_jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn fail_job(
        &self,
        job_id: &str,
        error: &str,
        retry_at: Option<OffsetDateTime>,
    ) -> Result<(), sqlx::Error> {
        match retry_at {
            Some(retry_at) => {
                sqlx::query(
                    r#"
                    UPDATE queue_jobs
                    SET state = 'waiting', last_error = $2, run_at = $3, updated_at = now()
                    WHERE id = $1
                    "#,
                )
                .bind(job_id)
                .bind(error)
                .bind(retry_at)
                .execute(&self.pool)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    UPDATE queue_jobs
                    SET state = 'failed', last_error = $2, updated_at = now()
                    WHERE id = $1
                    "#,
                )
                .bind(job_id)
                .bind(error)
                .execute(&self.pool)
                .await?;
            }
        }

        Ok(())
    }

    async fn count_jobs(&self) -> Result<JobCounts, sqlx::Error> {
        let rows = sqlx::query("SELECT state, COUNT(*) AS total FROM queue_jobs GROUP BY state")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = JobCounts::default();
        for row in rows {
            let state: String = row.try_get("state")?;
            let total: i64 = row.try_get("total")?;
            match state.as_str() {
                "waiting" => counts.waiting = total,
                "active" => counts.active = total,
                "completed" => counts.completed = total,
                "failed" => counts.failed = total,
                _ => {}
            }
        }

        Ok(counts)
    }
}

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::workflow_repository::WorkflowRepository;
use crate::integrations::{ActionKind, TriggerKind};
use crate::models::workflow::Workflow;
use crate::models::workflow_run::{RunStatus, WorkflowRun};

pub struct PostgresWorkflowRepository {
    pub pool: PgPool,
}

#[async_trait]
impl WorkflowRepository for PostgresWorkflowRepository {
    async fn create_workflow(
        &self,
        user_id: Uuid,
        name: &str,
        trigger: TriggerKind,
        action: ActionKind,
        cron: Option<&str>,
    ) -> Result<Workflow, sqlx::Error> {
        let result = sqlx::query_as::<_, Workflow>(
            r#"
            INSERT INTO workflows (id, user_id, name, trigger, action, cron, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, now())
            RETURNING id, user_id, name, trigger, action, cron, is_active, last_run_at, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .bind(trigger)
        .bind(action)
        .bind(cron)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn list_workflows_by_user(&self, user_id: Uuid) -> Result<Vec<Workflow>, sqlx::Error> {
        let results = sqlx::query_as::<_, Workflow>(
            r#"
            SELECT id, user_id, name, trigger, action, cron, is_active, last_run_at, created_at
            FROM workflows
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn find_workflow_by_id(
        &self,
        user_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let result = sqlx::query_as::<_, Workflow>(
            r#"
            SELECT id, user_id, name, trigger, action, cron, is_active, last_run_at, created_at
            FROM workflows
            WHERE user_id = $1 AND id = $2
            "#,
        )
        .bind(user_id)
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn find_workflow_by_id_unscoped(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let result = sqlx::query_as::<_, Workflow>(
            r#"
            SELECT id, user_id, name, trigger, action, cron, is_active, last_run_at, created_at
            FROM workflows
            WHERE id = $1
            "#,
        )
        .bind(workflow_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
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
        let result = sqlx::query_as::<_, Workflow>(
            r#"
            UPDATE workflows
            SET name = $3, trigger = $4, action = $5, cron = $6, is_active = $7
            WHERE user_id = $1 AND id = $2
            RETURNING id, user_id, name, trigger, action, cron, is_active, last_run_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(workflow_id)
        .bind(name)
        .bind(trigger)
        .bind(action)
        .bind(cron)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn delete_workflow(&self, user_id: Uuid, workflow_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workflows WHERE user_id = $1 AND id = $2")
            .bind(user_id)
            .bind(workflow_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_workflow_active(
        &self,
        user_id: Uuid,
        workflow_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let result = sqlx::query_as::<_, Workflow>(
            r#"
            UPDATE workflows
            SET is_active = $3
            WHERE user_id = $1 AND id = $2
            RETURNING id, user_id, name, trigger, action, cron, is_active, last_run_at, created_at
            "#,
        )
        .bind(user_id)
        .bind(workflow_id)
        .bind(is_active)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn touch_last_run(&self, workflow_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE workflows SET last_run_at = now() WHERE id = $1")
            .bind(workflow_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create_workflow_run(
        &self,
        workflow_id: Uuid,
        status: RunStatus,
        logs: &str,
    ) -> Result<WorkflowRun, sqlx::Error> {
        let result = sqlx::query_as::<_, WorkflowRun>(
            r#"
            INSERT INTO workflow_runs (id, workflow_id, status, logs, created_at)
            VALUES ($1, $2, $3, $4, now())
            RETURNING id, workflow_id, status, logs, created_at, ended_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(workflow_id)
        .bind(status)
        .bind(logs)
        .fetch_one(&self.pool)
        .await?;

        Ok(result)
    }

    async fn complete_workflow_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        logs: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE workflow_runs
            SET status = $2, logs = $3, ended_at = now()
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .bind(status)
        .bind(logs)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_runs_for_workflow(
        &self,
        workflow_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WorkflowRun>, sqlx::Error> {
        let results = sqlx::query_as::<_, WorkflowRun>(
            r#"
            SELECT id, workflow_id, status, logs, created_at, ended_at
            FROM workflow_runs
            WHERE workflow_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(workflow_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }
}

use async_trait::async_trait;
use uuid::Uuid;

use crate::integrations::{ActionKind, TriggerKind};
use crate::models::workflow::Workflow;
use crate::models::workflow_run::{RunStatus, WorkflowRun};

#[async_trait]
#[allow(clippy::too_many_arguments)]
pub trait WorkflowRepository: Send + Sync {
    async fn create_workflow(
        &self,
        user_id: Uuid,
        name: &str,
        trigger: TriggerKind,
        action: ActionKind,
        cron: Option<&str>,
    ) -> Result<Workflow, sqlx::Error>;

    async fn list_workflows_by_user(&self, user_id: Uuid) -> Result<Vec<Workflow>, sqlx::Error>;

    async fn find_workflow_by_id(
        &self,
        user_id: Uuid,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error>;

    /// Worker-side lookup. Jobs carry no owner, so this is not scoped by
    /// user; ownership was checked when the job was enqueued.
    async fn find_workflow_by_id_unscoped(
        &self,
        workflow_id: Uuid,
    ) -> Result<Option<Workflow>, sqlx::Error>;

    async fn update_workflow(
        &self,
        user_id: Uuid,
        workflow_id: Uuid,
        name: &str,
        trigger: TriggerKind,
        action: ActionKind,
        cron: Option<&str>,
        is_active: bool,
    ) -> Result<Option<Workflow>, sqlx::Error>;

    async fn delete_workflow(&self, user_id: Uuid, workflow_id: Uuid) -> Result<bool, sqlx::Error>;

    async fn set_workflow_active(
        &self,
        user_id: Uuid,
        workflow_id: Uuid,
        is_active: bool,
    ) -> Result<Option<Workflow>, sqlx::Error>;

    /// Records that an execution was attempted, independent of its outcome.
    async fn touch_last_run(&self, workflow_id: Uuid) -> Result<(), sqlx::Error>;

    // Runs API
    async fn create_workflow_run(
        &self,
        workflow_id: Uuid,
        status: RunStatus,
        logs: &str,
    ) -> Result<WorkflowRun, sqlx::Error>;

    async fn complete_workflow_run(
        &self,
        run_id: Uuid,
        status: RunStatus,
        logs: &str,
    ) -> Result<(), sqlx::Error>;

    async fn list_runs_for_workflow(
        &self,
        workflow_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WorkflowRun>, sqlx::Error>;
}

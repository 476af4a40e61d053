use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::state::AppState;

const UNKNOWN_ERROR_LOGS: &str = "Unknown error occurred";

/// Result of one workflow execution. The processor never raises; missing
/// workflows, unsupported identifiers and handler faults all land here so the
/// worker can always write a terminal run record.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    pub logs: String,
    pub data: Option<Value>,
}

impl ExecutionOutcome {
    fn failure(logs: impl Into<String>) -> Self {
        let mut logs = logs.into();
        if logs.is_empty() {
            logs = UNKNOWN_ERROR_LOGS.to_string();
        }
        Self {
            success: false,
            logs,
            data: None,
        }
    }
}

/// Polls the workflow's trigger and, when it produced event data, performs
/// the configured action with it. An empty poll is a successful no-op.
pub async fn process_workflow(state: &AppState, workflow_id: Uuid) -> ExecutionOutcome {
    let workflow = match state.workflow_repo.find_workflow_by_id_unscoped(workflow_id).await {
        Ok(Some(workflow)) => workflow,
        Ok(None) => {
            error!(%workflow_id, "workflow not found");
            return ExecutionOutcome::failure("Workflow not found");
        }
        Err(err) => {
            error!(%workflow_id, ?err, "failed to load workflow");
            return ExecutionOutcome::failure(err.to_string());
        }
    };

    if !workflow.is_active {
        error!(%workflow_id, "workflow is inactive");
        return ExecutionOutcome::failure("Workflow is inactive");
    }

    // Record the attempt before touching any handler, whatever happens next.
    if let Err(err) = state.workflow_repo.touch_last_run(workflow.id).await {
        error!(%workflow_id, ?err, "failed to update last run timestamp");
        return ExecutionOutcome::failure(err.to_string());
    }

    let trigger = workflow.trigger;
    let action = workflow.action;

    let trigger_handler = match state.registry.trigger_handler(trigger) {
        Ok(handler) => handler,
        Err(err) => {
            error!(%workflow_id, %trigger, "no handler for trigger");
            return ExecutionOutcome::failure(err.to_string());
        }
    };

    let event = match trigger_handler.poll().await {
        Ok(event) => event,
        Err(err) => {
            error!(%workflow_id, %trigger, %err, "trigger handler failed");
            return ExecutionOutcome::failure(err.to_string());
        }
    };

    let Some(event) = event else {
        return ExecutionOutcome {
            success: true,
            logs: "No trigger data found, skipping action".to_string(),
            data: None,
        };
    };

    let action_handler = match state.registry.action_handler(action) {
        Ok(handler) => handler,
        Err(err) => {
            error!(%workflow_id, %action, "no handler for action");
            return ExecutionOutcome::failure(err.to_string());
        }
    };

    let result = match action_handler.perform(&event).await {
        Ok(result) => result,
        Err(err) => {
            error!(%workflow_id, %action, %err, "action handler failed");
            return ExecutionOutcome::failure(err.to_string());
        }
    };

    info!(%workflow_id, %trigger, %action, "workflow processed");
    ExecutionOutcome {
        success: true,
        logs: format!("Successfully processed workflow: {trigger} -> {action}"),
        data: Some(result),
    }
}

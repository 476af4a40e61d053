use super::prelude::*;

/// Recent runs embedded in workflow listings.
const RECENT_RUNS_LIMIT: i64 = 5;
/// Full history returned when fetching a single workflow.
const RUN_HISTORY_LIMIT: i64 = 100;

#[derive(Serialize)]
struct WorkflowWithRuns {
    #[serde(flatten)]
    workflow: Workflow,
    runs: Vec<WorkflowRun>,
}

pub async fn create_workflow(
    State(app_state): State<AppState>,
    AuthSession(identity): AuthSession,
    Json(payload): Json<CreateWorkflow>,
) -> Response {
    let result = app_state
        .workflow_repo
        .create_workflow(
            identity.user_id,
            &payload.name,
            payload.trigger,
            payload.action,
            payload.cron.as_deref(),
        )
        .await;

    match result {
        Ok(workflow) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "workflow": workflow
            })),
        )
            .into_response(),
        Err(err) => {
            eprintln!("DB error creating workflow: {:?}", err);
            JsonResponse::server_error("Failed to create workflow").into_response()
        }
    }
}

pub async fn list_workflows(
    State(app_state): State<AppState>,
    AuthSession(identity): AuthSession,
) -> Response {
    let workflows = match app_state
        .workflow_repo
        .list_workflows_by_user(identity.user_id)
        .await
    {
        Ok(workflows) => workflows,
        Err(err) => {
            eprintln!("DB error listing workflows: {:?}", err);
            return JsonResponse::server_error("Failed to list workflows").into_response();
        }
    };

    let mut enriched = Vec::with_capacity(workflows.len());
    for workflow in workflows {
        let runs = match app_state
            .workflow_repo
            .list_runs_for_workflow(workflow.id, RECENT_RUNS_LIMIT)
            .await
        {
            Ok(runs) => runs,
            Err(err) => {
                eprintln!("DB error listing runs for {}: {:?}", workflow.id, err);
                return JsonResponse::server_error("Failed to list workflows").into_response();
            }
        };
        enriched.push(WorkflowWithRuns { workflow, runs });
    }

    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "workflows": enriched
        })),
    )
        .into_response()
}

pub async fn get_workflow(
    State(app_state): State<AppState>,
    AuthSession(identity): AuthSession,
    Path(workflow_id): Path<Uuid>,
) -> Response {
    let workflow = match app_state
        .workflow_repo
        .find_workflow_by_id(identity.user_id, workflow_id)
        .await
    {
        Ok(Some(workflow)) => workflow,
        Ok(None) => return JsonResponse::not_found("Workflow not found").into_response(),
        Err(err) => {
            eprintln!("DB error fetching workflow {workflow_id}: {:?}", err);
            return JsonResponse::server_error("Failed to fetch workflow").into_response();
        }
    };

    match app_state
        .workflow_repo
        .list_runs_for_workflow(workflow.id, RUN_HISTORY_LIMIT)
        .await
    {
        Ok(runs) => {
            let detail = WorkflowWithRuns { workflow, runs };
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "workflow": detail
                })),
            )
                .into_response()
        }
        Err(err) => {
            eprintln!("DB error fetching runs for {workflow_id}: {:?}", err);
            JsonResponse::server_error("Failed to fetch workflow").into_response()
        }
    }
}

pub async fn update_workflow(
    State(app_state): State<AppState>,
    AuthSession(identity): AuthSession,
    Path(workflow_id): Path<Uuid>,
    Json(payload): Json<UpdateWorkflow>,
) -> Response {
    let result = app_state
        .workflow_repo
        .update_workflow(
            identity.user_id,
            workflow_id,
            &payload.name,
            payload.trigger,
            payload.action,
            payload.cron.as_deref(),
            payload.is_active,
        )
        .await;

    match result {
        Ok(Some(workflow)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "workflow": workflow
            })),
        )
            .into_response(),
        Ok(None) => JsonResponse::not_found("Workflow not found").into_response(),
        Err(err) => {
            eprintln!("DB error updating workflow {workflow_id}: {:?}", err);
            JsonResponse::server_error("Failed to update workflow").into_response()
        }
    }
}

pub async fn delete_workflow(
    State(app_state): State<AppState>,
    AuthSession(identity): AuthSession,
    Path(workflow_id): Path<Uuid>,
) -> Response {
    match app_state
        .workflow_repo
        .delete_workflow(identity.user_id, workflow_id)
        .await
    {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => JsonResponse::not_found("Workflow not found").into_response(),
        Err(err) => {
            eprintln!("DB error deleting workflow {workflow_id}: {:?}", err);
            JsonResponse::server_error("Failed to delete workflow").into_response()
        }
    }
}

pub async fn toggle_workflow(
    State(app_state): State<AppState>,
    AuthSession(identity): AuthSession,
    Path(workflow_id): Path<Uuid>,
) -> Response {
    let workflow = match app_state
        .workflow_repo
        .find_workflow_by_id(identity.user_id, workflow_id)
        .await
    {
        Ok(Some(workflow)) => workflow,
        Ok(None) => return JsonResponse::not_found("Workflow not found").into_response(),
        Err(err) => {
            eprintln!("DB error fetching workflow {workflow_id}: {:?}", err);
            return JsonResponse::server_error("Failed to toggle workflow").into_response();
        }
    };

    match app_state
        .workflow_repo
        .set_workflow_active(identity.user_id, workflow_id, !workflow.is_active)
        .await
    {
        Ok(Some(workflow)) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "workflow": workflow
            })),
        )
            .into_response(),
        Ok(None) => JsonResponse::not_found("Workflow not found").into_response(),
        Err(err) => {
            eprintln!("DB error toggling workflow {workflow_id}: {:?}", err);
            JsonResponse::server_error("Failed to toggle workflow").into_response()
        }
    }
}

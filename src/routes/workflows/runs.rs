use super::prelude::*;

const RUN_LISTING_LIMIT: i64 = 100;

async fn fetch_owned_workflow(
    app_state: &AppState,
    user_id: Uuid,
    workflow_id: Uuid,
    server_error_message: &'static str,
) -> Result<Workflow, Response> {
    match app_state
        .workflow_repo
        .find_workflow_by_id(user_id, workflow_id)
        .await
    {
        Ok(Some(workflow)) => Ok(workflow),
        Ok(None) => Err(JsonResponse::not_found("Workflow not found").into_response()),
        Err(err) => {
            eprintln!(
                "DB error fetching workflow {workflow_id} for user {user_id}: {:?}",
                err
            );
            Err(JsonResponse::server_error(server_error_message).into_response())
        }
    }
}

pub async fn list_runs_for_workflow(
    State(app_state): State<AppState>,
    AuthSession(identity): AuthSession,
    Path(workflow_id): Path<Uuid>,
) -> Response {
    let workflow = match fetch_owned_workflow(
        &app_state,
        identity.user_id,
        workflow_id,
        "Failed to list runs",
    )
    .await
    {
        Ok(workflow) => workflow,
        Err(response) => return response,
    };

    match app_state
        .workflow_repo
        .list_runs_for_workflow(workflow.id, RUN_LISTING_LIMIT)
        .await
    {
        Ok(runs) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "runs": runs
            })),
        )
            .into_response(),
        Err(err) => {
            eprintln!("DB error listing runs for {workflow_id}: {:?}", err);
            JsonResponse::server_error("Failed to list runs").into_response()
        }
    }
}

/// Queues one execution of the workflow. Activity is not checked here; the
/// processor re-checks it and records the outcome as a run.
pub async fn execute_workflow(
    State(app_state): State<AppState>,
    AuthSession(identity): AuthSession,
    Path(workflow_id): Path<Uuid>,
) -> Response {
    let workflow = match fetch_owned_workflow(
        &app_state,
        identity.user_id,
        workflow_id,
        "Failed to queue execution",
    )
    .await
    {
        Ok(workflow) => workflow,
        Err(response) => return response,
    };

    match app_state.queue.enqueue(workflow.id).await {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "success": true,
                "job_id": job.id
            })),
        )
            .into_response(),
        Err(err) => {
            eprintln!("Queue error enqueuing workflow {workflow_id}: {:?}", err);
            JsonResponse::server_error("Failed to queue execution").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::db::workflow_repository::WorkflowRepository;
    use crate::models::queue_job::JobState;
    use crate::models::workflow_run::RunStatus;
    use crate::routes::test_support::{authed, read_json, test_app};

    #[tokio::test]
    async fn execute_accepts_and_persists_a_waiting_job() {
        let app = test_app();
        let workflow = app.seed_workflow().await;

        let request = authed(
            Request::builder()
                .method("POST")
                .uri(format!("/api/workflows/{}/execute", workflow.id)),
        )
        .body(Body::empty())
        .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let body = read_json(response).await;
        let job_id = body["job_id"].as_str().unwrap();
        assert!(job_id.starts_with(&format!("workflow-{}-", workflow.id)));

        let jobs = app.queue_repo.job_snapshot();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].state, JobState::Waiting);
        assert_eq!(jobs[0].workflow_id, workflow.id);
    }

    #[tokio::test]
    async fn execute_does_not_reject_inactive_workflows() {
        // The processor re-checks activity and records the failed run; the
        // API only checks ownership.
        let app = test_app();
        let workflow = app.seed_workflow().await;
        app.workflow_repo
            .set_workflow_active(workflow.user_id, workflow.id, false)
            .await
            .unwrap();

        let request = authed(
            Request::builder()
                .method("POST")
                .uri(format!("/api/workflows/{}/execute", workflow.id)),
        )
        .body(Body::empty())
        .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn execute_unknown_workflow_is_404() {
        let app = test_app();

        let request = authed(
            Request::builder()
                .method("POST")
                .uri(format!("/api/workflows/{}/execute", uuid::Uuid::new_v4())),
        )
        .body(Body::empty())
        .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(app.queue_repo.job_snapshot().is_empty());
    }

    #[tokio::test]
    async fn runs_are_listed_most_recent_first() {
        let app = test_app();
        let workflow = app.seed_workflow().await;
        app.workflow_repo
            .create_workflow_run(workflow.id, RunStatus::Failed, "first")
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        app.workflow_repo
            .create_workflow_run(workflow.id, RunStatus::Success, "second")
            .await
            .unwrap();

        let request = authed(
            Request::builder()
                .method("GET")
                .uri(format!("/api/workflows/{}/runs", workflow.id)),
        )
        .body(Body::empty())
        .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = read_json(response).await;
        let runs = body["runs"].as_array().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0]["logs"], "second");
        assert_eq!(runs[1]["logs"], "first");
    }
}

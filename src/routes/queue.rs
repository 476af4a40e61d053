use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::responses::JsonResponse;
use crate::routes::auth::session::AuthSession;
use crate::state::AppState;

/// Best-effort queue snapshot. Completed jobs are discarded on success, so
/// that count staying at zero is expected.
pub async fn queue_status(
    State(app_state): State<AppState>,
    AuthSession(_identity): AuthSession,
) -> Response {
    match app_state.queue.status().await {
        Ok(counts) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "counts": counts
            })),
        )
            .into_response(),
        Err(err) => {
            eprintln!("Queue error reading status: {:?}", err);
            JsonResponse::server_error("Failed to read queue status").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::routes::test_support::{authed, read_json, test_app};

    #[tokio::test]
    async fn status_reports_per_state_counts() {
        let app = test_app();
        let workflow = app.seed_workflow().await;
        app.state.queue.enqueue(workflow.id).await.unwrap();

        let request = authed(Request::builder().method("GET").uri("/api/queue/status"))
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = read_json(response).await;
        assert_eq!(body["counts"]["waiting"], 1);
        assert_eq!(body["counts"]["active"], 0);
        assert_eq!(body["counts"]["completed"], 0);
        assert_eq!(body["counts"]["failed"], 0);
    }
}

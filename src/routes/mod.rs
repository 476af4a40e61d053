pub mod auth;
pub mod integrations;
pub mod queue;
pub mod workflows;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::state::AppState;

/// Everything under `/api`. Layers that depend on deployment concerns (rate
/// limiting, CORS, tracing) are applied in `main`, not here.
pub fn api_router() -> Router<AppState> {
    let workflow_routes = Router::new()
        .route(
            "/",
            post(workflows::create_workflow).get(workflows::list_workflows),
        )
        .route(
            "/{workflow_id}",
            get(workflows::get_workflow)
                .put(workflows::update_workflow)
                .delete(workflows::delete_workflow),
        )
        .route("/{workflow_id}/toggle", patch(workflows::toggle_workflow))
        .route("/{workflow_id}/execute", post(workflows::execute_workflow))
        .route("/{workflow_id}/runs", get(workflows::list_runs_for_workflow));

    Router::new()
        .nest("/api/workflows", workflow_routes)
        .route("/api/queue/status", get(queue::queue_status))
        .route("/api/integrations", get(integrations::list_integrations))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::request::Builder;
    use axum::response::Response;
    use axum::Router;
    use serde_json::Value;
    use uuid::Uuid;

    use crate::config::Config;
    use crate::db::mock_db::{InMemoryQueueRepository, InMemoryWorkflowRepository};
    use crate::db::workflow_repository::WorkflowRepository;
    use crate::integrations::{ActionKind, IntegrationRegistry, TriggerKind};
    use crate::models::workflow::Workflow;
    use crate::queue::{JobQueue, QueueConfig};
    use crate::routes::auth::session::StaticTokenVerifier;
    use crate::state::AppState;

    pub(crate) const TEST_USER_ID: Uuid = Uuid::from_u128(1);

    pub(crate) struct TestApp {
        pub router: Router,
        pub workflow_repo: Arc<InMemoryWorkflowRepository>,
        pub queue_repo: Arc<InMemoryQueueRepository>,
        pub state: AppState,
    }

    impl TestApp {
        pub(crate) async fn seed_workflow(&self) -> Workflow {
            self.workflow_repo
                .create_workflow(
                    TEST_USER_ID,
                    "email to telegram",
                    TriggerKind::GmailNewEmail,
                    ActionKind::TelegramSendMessage,
                    None,
                )
                .await
                .unwrap()
        }
    }

    pub(crate) fn test_app() -> TestApp {
        let workflow_repo = Arc::new(InMemoryWorkflowRepository::new());
        let queue_repo = Arc::new(InMemoryQueueRepository::new());
        let state = AppState {
            workflow_repo: workflow_repo.clone(),
            queue: Arc::new(JobQueue::new(queue_repo.clone(), QueueConfig::default())),
            registry: Arc::new(IntegrationRegistry::simulated()),
            verifier: Arc::new(StaticTokenVerifier::new(TEST_USER_ID)),
            config: Arc::new(Config::for_tests()),
        };
        let router = super::api_router().with_state(state.clone());
        TestApp {
            router,
            workflow_repo,
            queue_repo,
            state,
        }
    }

    pub(crate) fn authed(builder: Builder) -> Builder {
        builder.header("authorization", "Bearer test-token")
    }

    pub(crate) async fn read_json(response: Response<Body>) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("response body");
        serde_json::from_slice(&bytes).expect("json body")
    }
}

use std::sync::Arc;

use crate::config::Config;
use crate::db::workflow_repository::WorkflowRepository;
use crate::integrations::IntegrationRegistry;
use crate::queue::JobQueue;
use crate::routes::auth::session::TokenVerifier;

#[derive(Clone)]
pub struct AppState {
    pub workflow_repo: Arc<dyn WorkflowRepository>,
    pub queue: Arc<JobQueue>,
    pub registry: Arc<IntegrationRegistry>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub config: Arc<Config>,
}

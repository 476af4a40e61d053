pub(crate) use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
pub(crate) use serde::Serialize;
pub(crate) use serde_json::json;
pub(crate) use uuid::Uuid;

pub(crate) use crate::{
    models::workflow::{CreateWorkflow, UpdateWorkflow, Workflow},
    models::workflow_run::WorkflowRun,
    responses::JsonResponse,
    routes::auth::session::AuthSession,
    state::AppState,
};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::integrations::CATALOG;
use crate::routes::auth::session::AuthSession;

/// Lists which triggers and actions each integration supports.
pub async fn list_integrations(AuthSession(_identity): AuthSession) -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "integrations": &*CATALOG
        })),
    )
        .into_response()
}

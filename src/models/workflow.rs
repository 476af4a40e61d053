use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::integrations::{ActionKind, TriggerKind};

#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct Workflow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub trigger: TriggerKind,
    pub action: ActionKind,
    // Schedule expression stored for the external scheduler; never
    // interpreted here.
    pub cron: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_run_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateWorkflow {
    pub name: String,
    pub trigger: TriggerKind,
    pub action: ActionKind,
    pub cron: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateWorkflow {
    pub name: String,
    pub trigger: TriggerKind,
    pub action: ActionKind,
    pub cron: Option<String>,
    pub is_active: bool,
}

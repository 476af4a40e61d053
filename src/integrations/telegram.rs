use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{ActionHandler, IntegrationError};
use crate::queue::unix_millis;

/// Simulated Telegram delivery. The message text falls back from the
/// event's `body` to its `title`, matching what the bot API client sends.
pub struct SendMessageAction;

impl SendMessageAction {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SendMessageAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for SendMessageAction {
    async fn perform(&self, event: &Value) -> Result<Value, IntegrationError> {
        let text = event
            .get("body")
            .and_then(|v| v.as_str())
            .or_else(|| event.get("title").and_then(|v| v.as_str()))
            .unwrap_or("");
        debug!(text, "sending Telegram message");
        Ok(json!({ "messageId": format!("mock-telegram-id-{}", unix_millis()) }))
    }
}

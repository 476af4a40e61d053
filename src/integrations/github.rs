use async_trait::async_trait;
use rand::Rng;
use serde_json::{json, Value};
use tracing::debug;

use super::{ActionHandler, IntegrationError, TriggerHandler};
use crate::queue::unix_millis;

const DEFAULT_NEW_ISSUE_CHANCE: f64 = 0.2;
const DEFAULT_NEW_PR_CHANCE: f64 = 0.15;

/// Simulated issue poll standing in for the GitHub issues API.
pub struct NewIssueTrigger {
    chance: f64,
}

impl NewIssueTrigger {
    pub fn new() -> Self {
        Self {
            chance: DEFAULT_NEW_ISSUE_CHANCE,
        }
    }

    pub fn with_chance(chance: f64) -> Self {
        Self { chance }
    }
}

impl Default for NewIssueTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TriggerHandler for NewIssueTrigger {
    async fn poll(&self) -> Result<Option<Value>, IntegrationError> {
        debug!("checking for new GitHub issues");
        if rand::rng().random_bool(self.chance) {
            return Ok(Some(json!({
                "title": "Test Issue",
                "body": "This is a test issue",
                "repo": "test/repo",
            })));
        }
        Ok(None)
    }
}

/// Simulated pull request poll.
pub struct NewPullRequestTrigger {
    chance: f64,
}

impl NewPullRequestTrigger {
    pub fn new() -> Self {
        Self {
            chance: DEFAULT_NEW_PR_CHANCE,
        }
    }

    pub fn with_chance(chance: f64) -> Self {
        Self { chance }
    }
}

impl Default for NewPullRequestTrigger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TriggerHandler for NewPullRequestTrigger {
    async fn poll(&self) -> Result<Option<Value>, IntegrationError> {
        debug!("checking for new GitHub pull requests");
        if rand::rng().random_bool(self.chance) {
            return Ok(Some(json!({
                "title": "Test PR",
                "body": "This is a test pull request",
                "repo": "test/repo",
            })));
        }
        Ok(None)
    }
}

/// Simulated issue creation.
pub struct CreateIssueAction;

impl CreateIssueAction {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CreateIssueAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for CreateIssueAction {
    async fn perform(&self, event: &Value) -> Result<Value, IntegrationError> {
        let repo = event.get("repo").and_then(|v| v.as_str()).unwrap_or("");
        let title = event.get("title").and_then(|v| v.as_str()).unwrap_or("");
        debug!(repo, title, "creating GitHub issue");
        Ok(json!({ "issueId": format!("mock-issue-id-{}", unix_millis()) }))
    }
}

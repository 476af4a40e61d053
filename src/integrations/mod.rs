pub mod github;
pub mod gmail;
pub mod telegram;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A trigger identifier, namespaced as `<integration>:<event>`.
///
/// The set is closed: anything outside it is rejected when a workflow is
/// created and when a stored value is decoded, so the engine never dispatches
/// on a raw string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerKind {
    #[serde(rename = "gmail:new_email")]
    GmailNewEmail,
    #[serde(rename = "github:new_issue")]
    GithubNewIssue,
    #[serde(rename = "github:new_pr")]
    GithubNewPr,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::GmailNewEmail => "gmail:new_email",
            TriggerKind::GithubNewIssue => "github:new_issue",
            TriggerKind::GithubNewPr => "github:new_pr",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = RegistryError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "gmail:new_email" => Ok(TriggerKind::GmailNewEmail),
            "github:new_issue" => Ok(TriggerKind::GithubNewIssue),
            "github:new_pr" => Ok(TriggerKind::GithubNewPr),
            other => Err(RegistryError::UnsupportedTrigger(other.to_string())),
        }
    }
}

/// An action identifier, namespaced as `<integration>:<effect>`.
///
/// `github:comment_on_issue` is part of the catalog but has no handler wired
/// yet; resolving it is a configuration error, not a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "gmail:send_email")]
    GmailSendEmail,
    #[serde(rename = "github:create_issue")]
    GithubCreateIssue,
    #[serde(rename = "github:comment_on_issue")]
    GithubCommentOnIssue,
    #[serde(rename = "telegram:send_message")]
    TelegramSendMessage,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::GmailSendEmail => "gmail:send_email",
            ActionKind::GithubCreateIssue => "github:create_issue",
            ActionKind::GithubCommentOnIssue => "github:comment_on_issue",
            ActionKind::TelegramSendMessage => "telegram:send_message",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = RegistryError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "gmail:send_email" => Ok(ActionKind::GmailSendEmail),
            "github:create_issue" => Ok(ActionKind::GithubCreateIssue),
            "github:comment_on_issue" => Ok(ActionKind::GithubCommentOnIssue),
            "telegram:send_message" => Ok(ActionKind::TelegramSendMessage),
            other => Err(RegistryError::UnsupportedAction(other.to_string())),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for TriggerKind {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for TriggerKind {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TriggerKind {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        raw.parse().map_err(Into::into)
    }
}

impl sqlx::Type<sqlx::Postgres> for ActionKind {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <&str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for ActionKind {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<'q, sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ActionKind {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <&str as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        raw.parse().map_err(Into::into)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unsupported trigger: {0}")]
    UnsupportedTrigger(String),
    #[error("Unsupported action: {0}")]
    UnsupportedAction(String),
}

/// A fault raised by a trigger or action handler. Converted by the engine
/// into a failed outcome, never propagated past it.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct IntegrationError {
    pub message: String,
}

impl IntegrationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Polls an event source for new data. Returns `None` when the trigger
/// condition was not met this cycle.
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn poll(&self) -> Result<Option<Value>, IntegrationError>;
}

/// Performs a side effect with the event data a trigger produced.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn perform(&self, event: &Value) -> Result<Value, IntegrationError>;
}

/// Lookup tables from trigger/action kind to capability handler. Built once
/// at process start and immutable behind `Arc` thereafter.
pub struct IntegrationRegistry {
    triggers: HashMap<TriggerKind, Box<dyn TriggerHandler>>,
    actions: HashMap<ActionKind, Box<dyn ActionHandler>>,
}

impl IntegrationRegistry {
    pub fn empty() -> Self {
        Self {
            triggers: HashMap::new(),
            actions: HashMap::new(),
        }
    }

    /// The stock registry: simulated handlers standing in for the real
    /// Gmail, GitHub and Telegram clients.
    pub fn simulated() -> Self {
        let mut registry = Self::empty();
        registry.register_trigger(
            TriggerKind::GmailNewEmail,
            Box::new(gmail::NewEmailTrigger::new()),
        );
        registry.register_trigger(
            TriggerKind::GithubNewIssue,
            Box::new(github::NewIssueTrigger::new()),
        );
        registry.register_trigger(
            TriggerKind::GithubNewPr,
            Box::new(github::NewPullRequestTrigger::new()),
        );
        registry.register_action(
            ActionKind::GmailSendEmail,
            Box::new(gmail::SendEmailAction::new()),
        );
        registry.register_action(
            ActionKind::GithubCreateIssue,
            Box::new(github::CreateIssueAction::new()),
        );
        registry.register_action(
            ActionKind::TelegramSendMessage,
            Box::new(telegram::SendMessageAction::new()),
        );
        registry
    }

    pub fn register_trigger(&mut self, kind: TriggerKind, handler: Box<dyn TriggerHandler>) {
        self.triggers.insert(kind, handler);
    }

    pub fn register_action(&mut self, kind: ActionKind, handler: Box<dyn ActionHandler>) {
        self.actions.insert(kind, handler);
    }

    pub fn trigger_handler(&self, kind: TriggerKind) -> Result<&dyn TriggerHandler, RegistryError> {
        self.triggers
            .get(&kind)
            .map(|handler| handler.as_ref())
            .ok_or_else(|| RegistryError::UnsupportedTrigger(kind.to_string()))
    }

    pub fn action_handler(&self, kind: ActionKind) -> Result<&dyn ActionHandler, RegistryError> {
        self.actions
            .get(&kind)
            .map(|handler| handler.as_ref())
            .ok_or_else(|| RegistryError::UnsupportedAction(kind.to_string()))
    }
}

impl Default for IntegrationRegistry {
    fn default() -> Self {
        Self::simulated()
    }
}

#[derive(Debug, Serialize)]
pub struct IntegrationDescriptor {
    pub name: &'static str,
    pub triggers: Vec<&'static str>,
    pub actions: Vec<&'static str>,
}

/// Static catalog of what each integration supports, for the API listing.
pub static CATALOG: Lazy<Vec<IntegrationDescriptor>> = Lazy::new(|| {
    vec![
        IntegrationDescriptor {
            name: "Gmail",
            triggers: vec![TriggerKind::GmailNewEmail.as_str()],
            actions: vec![ActionKind::GmailSendEmail.as_str()],
        },
        IntegrationDescriptor {
            name: "GitHub",
            triggers: vec![
                TriggerKind::GithubNewIssue.as_str(),
                TriggerKind::GithubNewPr.as_str(),
            ],
            actions: vec![
                ActionKind::GithubCreateIssue.as_str(),
                ActionKind::GithubCommentOnIssue.as_str(),
            ],
        },
        IntegrationDescriptor {
            name: "Telegram",
            triggers: vec![],
            actions: vec![ActionKind::TelegramSendMessage.as_str()],
        },
    ]
});

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use thiserror::Error;
use uuid::Uuid;

use crate::state::AppState;

/// The caller identity after verification. Everything downstream treats the
/// user id as an opaque partition key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: Uuid,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid or expired token")]
    InvalidToken,
}

/// Boundary for token verification. The processor and repositories never see
/// how a token was checked, only the identity that came out of it.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError>;
}

/// Stand-in verifier: accepts any non-empty bearer token and maps it to one
/// fixed user id. Replaced wholesale when a real identity provider lands.
pub struct StaticTokenVerifier {
    user_id: Uuid,
}

impl StaticTokenVerifier {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }
        Ok(VerifiedIdentity {
            user_id: self.user_id,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AuthSession(pub VerifiedIdentity);

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let identity = state
            .verifier
            .verify(token)
            .await
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        Ok(AuthSession(identity))
    }
}

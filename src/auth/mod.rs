/*!
 * Authentication
 * Identity provider seam, session transport and request extractors
 */
pub mod extract;
pub mod gotrue;
pub mod local;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use extract::{Actor, MaybeActor, MaybeSession, RequestMeta};
pub use gotrue::GoTrueAuth;
pub use local::LocalAuth;

/// Cookie carrying the access token between form posts.
pub const SESSION_COOKIE: &str = "sb-access-token";

/// Session lifetime, in seconds, for both the token and its cookie.
pub const SESSION_TTL_SECS: i64 = 60 * 60;

// ============================================================================
// Types
// ============================================================================

/// An authenticated identity as the provider knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: Identity,
}

/// Attributes an admin may change on another identity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Invalid or expired session")]
    InvalidToken,

    #[error("User not found")]
    UserNotFound,

    /// The provider refused the request (duplicate email, weak password, ...).
    #[error("{0}")]
    Rejected(String),

    #[error("auth provider unreachable: {0}")]
    Transport(String),

    #[error("auth provider error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Failures that are not a verdict on the request itself.
    pub fn is_unexpected(&self) -> bool {
        matches!(self, AuthError::Transport(_) | AuthError::Internal(_))
    }
}

// ============================================================================
// Provider seam
// ============================================================================

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<Session, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    /// Resolve an access token to the identity it belongs to.
    async fn get_user(&self, access_token: &str) -> Result<Identity, AuthError>;

    /// Send a password-reset link that lands on `redirect_to`.
    async fn reset_password_for_email(&self, email: &str, redirect_to: &str)
        -> Result<(), AuthError>;

    /// Exchange the token from a reset link for a session.
    async fn verify_recovery(&self, token_hash: &str) -> Result<Session, AuthError>;

    async fn update_password(&self, access_token: &str, password: &str)
        -> Result<Identity, AuthError>;

    // Admin operations

    async fn create_user(&self, email: &str, password: &str) -> Result<Identity, AuthError>;

    async fn update_user_by_id(
        &self,
        id: Uuid,
        attributes: UserAttributes,
    ) -> Result<Identity, AuthError>;

    async fn delete_user(&self, id: Uuid) -> Result<(), AuthError>;

    fn provider_name(&self) -> &'static str;
}

// ============================================================================
// Session transport
// ============================================================================

/// Extract bearer token from Authorization header
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            pair.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
                .map(|s| s.to_string())
        })
        .filter(|s| !s.is_empty())
}

/// Access token from the Authorization header, else the session cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

pub fn session_cookie(token: &str, secure: bool) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE,
        token,
        SESSION_TTL_SECS,
        if secure { "; Secure" } else { "" }
    )
}

pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("sb-access-token=xyz"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn test_cookie_token_found_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sb-access-token=xyz; other=1"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_similar_cookie_names_are_not_confused() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("sb-access-token-old=nope"),
        );
        assert!(token_from_headers(&headers).is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let cookie = session_cookie("tok", true);
        assert!(cookie.starts_with("sb-access-token=tok; Path=/; HttpOnly"));
        assert!(cookie.ends_with("; Secure"));
        assert!(clear_session_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn test_unexpected_classification() {
        assert!(AuthError::Transport("timeout".into()).is_unexpected());
        assert!(!AuthError::InvalidCredentials.is_unexpected());
        assert!(!AuthError::Rejected("weak password".into()).is_unexpected());
    }
}

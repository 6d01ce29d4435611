use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::auth::AuthError;
use crate::db::store::StoreError;
use crate::routes::ErrorResponse;

/// Handler error for the JSON API.
///
/// Internal details are logged here and never returned to the client.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authorization required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub type AppResult<T> = Result<T, AppError>;

fn internal(message: &str) -> (StatusCode, String, Option<String>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
        Some(message.to_string()),
    )
}

/// Constraint violations are the caller's fault; everything else is ours.
fn classify_store_error(err: &StoreError) -> (StatusCode, String, Option<String>) {
    match err {
        StoreError::NotFound { table, .. } => (
            StatusCode::NOT_FOUND,
            "Not found".to_string(),
            Some(format!("No such {} row", table)),
        ),
        StoreError::InvalidRow { reason, .. } => (
            StatusCode::BAD_REQUEST,
            "Invalid request".to_string(),
            Some(reason.clone()),
        ),
        StoreError::Database(sqlx::Error::Database(db_err)) => {
            match db_err.code().as_deref() {
                // not_null_violation, check_violation, invalid_text_representation
                Some("23502") | Some("23514") | Some("22P02") => (
                    StatusCode::BAD_REQUEST,
                    "Invalid request".to_string(),
                    Some(db_err.message().to_string()),
                ),
                // unique_violation
                Some("23505") => (
                    StatusCode::CONFLICT,
                    "Conflict".to_string(),
                    Some(db_err.message().to_string()),
                ),
                _ => {
                    tracing::error!(error = %db_err, "Database error");
                    internal("A database error occurred")
                }
            }
        }
        e if e.is_transient() => {
            tracing::error!(error = %e, "Store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Database not available".to_string(),
                None,
            )
        }
        e => {
            tracing::error!(error = %e, "Store error");
            internal("A database error occurred")
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Authorization required".to_string(),
                None,
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "Forbidden".to_string(), Some(msg.clone())),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found".to_string(), Some(msg.clone())),
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                "Invalid request".to_string(),
                Some(msg.clone()),
            ),
            AppError::Store(err) => classify_store_error(err),
            AppError::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::InvalidToken => (
                    StatusCode::UNAUTHORIZED,
                    "Invalid or expired token".to_string(),
                    None,
                ),
                AuthError::UserNotFound => (StatusCode::NOT_FOUND, "Not found".to_string(), Some(err.to_string())),
                AuthError::Rejected(msg) => (
                    StatusCode::BAD_REQUEST,
                    "Invalid request".to_string(),
                    Some(msg.clone()),
                ),
                AuthError::Transport(_) | AuthError::Internal(_) => {
                    tracing::error!(error = %err, "Auth provider error");
                    (
                        StatusCode::BAD_GATEWAY,
                        "Auth provider error".to_string(),
                        None,
                    )
                }
            },
        };

        (status, Json(ErrorResponse { error, message })).into_response()
    }
}

/**
 * Routes Module
 * API route handlers
 */
use serde::Serialize;

pub mod admin_log;
pub mod dashboard;
pub mod health;
pub mod public;
pub mod stream;

/// Error body shared by every JSON endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

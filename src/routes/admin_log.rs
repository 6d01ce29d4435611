/**
 * Admin Log Relay
 * Lets dashboard client code record an admin action against the current session
 */
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::{AuditAction, AuditEntry};
use crate::auth::{Actor, RequestMeta};
use crate::error::AppError;
use crate::routes::ErrorResponse;
use crate::state::AppState;

/// Request body for POST /api/admin-log
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminLogRequest {
    pub action: String,
    pub description: Option<String>,
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    pub old_data: Option<Value>,
    pub new_data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct AdminLogResponse {
    pub success: bool,
}

/// POST /api/admin-log
pub async fn relay(
    State(state): State<AppState>,
    actor: Actor,
    meta: RequestMeta,
    Json(body): Json<AdminLogRequest>,
) -> Result<Json<AdminLogResponse>, Response> {
    let action: AuditAction = body
        .action
        .parse()
        .map_err(|e: crate::audit::UnknownAction| AppError::Validation(e.to_string()).into_response())?;

    let mut entry = AuditEntry::new(action);
    if let Some(description) = body.description {
        entry = entry.description(description);
    }
    if let Some(table_name) = body.table_name {
        entry = entry.table(table_name);
    }
    if let Some(record_id) = body.record_id {
        entry = entry.record(record_id);
    }
    if let Some(old_data) = &body.old_data {
        entry = entry.old_data(old_data);
    }
    if let Some(new_data) = &body.new_data {
        entry = entry.new_data(new_data);
    }

    match state.audit.record(Some(actor.id), &meta, entry).await {
        Ok(_) => Ok(Json(AdminLogResponse { success: true })),
        Err(e) => {
            tracing::error!("Error logging admin action: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Failed to log action".to_string(),
                    message: None,
                }),
            )
                .into_response())
        }
    }
}

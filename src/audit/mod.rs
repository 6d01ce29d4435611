/*!
 * Audit Log
 * Append-only record of admin actions, written to `admin_logs`
 */
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::{fmt, str::FromStr, sync::Arc};
use uuid::Uuid;

use crate::auth::RequestMeta;
use crate::db::models::AdminLog;
use crate::db::store::{self, Store, StoreError};

// ============================================================================
// Actions
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Login,
    LoginFailed,
    LoginDenied,
    Logout,
    Create,
    CreateFailed,
    CreateError,
    Update,
    UpdateFailed,
    UpdateError,
    Delete,
    DeleteFailed,
    DeletePartial,
    DeleteError,
    MessageReceived,
    View,
}

impl AuditAction {
    pub const ALL: [AuditAction; 16] = [
        AuditAction::Login,
        AuditAction::LoginFailed,
        AuditAction::LoginDenied,
        AuditAction::Logout,
        AuditAction::Create,
        AuditAction::CreateFailed,
        AuditAction::CreateError,
        AuditAction::Update,
        AuditAction::UpdateFailed,
        AuditAction::UpdateError,
        AuditAction::Delete,
        AuditAction::DeleteFailed,
        AuditAction::DeletePartial,
        AuditAction::DeleteError,
        AuditAction::MessageReceived,
        AuditAction::View,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::LoginFailed => "LOGIN_FAILED",
            AuditAction::LoginDenied => "LOGIN_DENIED",
            AuditAction::Logout => "LOGOUT",
            AuditAction::Create => "CREATE",
            AuditAction::CreateFailed => "CREATE_FAILED",
            AuditAction::CreateError => "CREATE_ERROR",
            AuditAction::Update => "UPDATE",
            AuditAction::UpdateFailed => "UPDATE_FAILED",
            AuditAction::UpdateError => "UPDATE_ERROR",
            AuditAction::Delete => "DELETE",
            AuditAction::DeleteFailed => "DELETE_FAILED",
            AuditAction::DeletePartial => "DELETE_PARTIAL",
            AuditAction::DeleteError => "DELETE_ERROR",
            AuditAction::MessageReceived => "MESSAGE_RECEIVED",
            AuditAction::View => "VIEW",
        }
    }

    /// Outcomes the log viewer highlights as failures.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            AuditAction::LoginFailed
                | AuditAction::LoginDenied
                | AuditAction::CreateFailed
                | AuditAction::CreateError
                | AuditAction::UpdateFailed
                | AuditAction::UpdateError
                | AuditAction::DeleteFailed
                | AuditAction::DeletePartial
                | AuditAction::DeleteError
        )
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown audit action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for AuditAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

// ============================================================================
// Entries
// ============================================================================

/// Serialize a snapshot; `null` and unserializable values are stored as no snapshot.
fn snapshot<T: Serialize + ?Sized>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(Value::Null) => None,
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("Audit snapshot could not be serialized: {}", e);
            None
        }
    }
}

/// One admin action, built up before it is recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub description: Option<String>,
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    pub old_data: Option<Value>,
    pub new_data: Option<Value>,
}

impl AuditEntry {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            description: None,
            table_name: None,
            record_id: None,
            old_data: None,
            new_data: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn record(mut self, record_id: impl ToString) -> Self {
        self.record_id = Some(record_id.to_string());
        self
    }

    pub fn old_data<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.old_data = snapshot(value);
        self
    }

    pub fn new_data<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.new_data = snapshot(value);
        self
    }
}

// ============================================================================
// Logger
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("no authenticated user for admin action logging")]
    NoActor,

    #[error("failed to write audit row: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn Store>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Write one audit row attributed to `actor`.
    pub async fn record(
        &self,
        actor: Option<Uuid>,
        meta: &RequestMeta,
        entry: AuditEntry,
    ) -> Result<AdminLog, AuditError> {
        let actor = actor.ok_or(AuditError::NoActor)?;
        let failed = entry.action.is_failure();

        let row = json!({
            "user_id": actor,
            "action": entry.action.as_str(),
            "description": entry.description,
            "table_name": entry.table_name,
            "record_id": entry.record_id,
            "old_data": entry.old_data,
            "new_data": entry.new_data,
            "ip_address": meta.ip,
            "user_agent": meta.user_agent,
        });

        let log = store::insert::<AdminLog>(self.store.as_ref(), row).await?;
        if failed {
            tracing::warn!(
                action = %log.action,
                table = ?log.table_name,
                record_id = ?log.record_id,
                "failed admin action recorded"
            );
        } else {
            tracing::debug!(
                action = %log.action,
                table = ?log.table_name,
                record_id = ?log.record_id,
                "admin action recorded"
            );
        }
        Ok(log)
    }

    /// [`record`](Self::record), with failures traced instead of returned.
    ///
    /// The mutation being audited has already happened; it is never undone.
    pub async fn record_best_effort(
        &self,
        actor: Option<Uuid>,
        meta: &RequestMeta,
        entry: AuditEntry,
    ) -> Option<AdminLog> {
        let action = entry.action;
        match self.record(actor, meta, entry).await {
            Ok(log) => Some(log),
            Err(AuditError::NoActor) => {
                tracing::debug!(action = %action, "No authenticated user for admin action logging");
                None
            }
            Err(e) => {
                tracing::error!(action = %action, "Error logging admin action: {}", e);
                None
            }
        }
    }
}

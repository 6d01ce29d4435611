//! Row store seam.
//!
//! Handlers talk to the database only through [`Store`]: select, find,
//! insert, update, delete, count and subscribe. Rows travel as JSON
//! objects; [`Record`] and the typed helpers below convert them to models.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::table::Table;
use crate::realtime::ChangeEvent;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{table} row {id} not found")]
    NotFound { table: Table, id: String },

    #[error("invalid row for {table}: {reason}")]
    InvalidRow { table: Table, reason: String },

    #[error("failed to decode {table} row: {source}")]
    Decode {
        table: Table,
        #[source]
        source: serde_json::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Connection-level failures, as opposed to a rejected row.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Unavailable(_) => true,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
            _ => false,
        }
    }
}

/// Filters and limits for a list read. Ordering always follows
/// [`Table::ordering`].
#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub eq: Vec<(&'static str, Value)>,
    pub search: Option<String>,
    pub limit: Option<i64>,
}

impl SelectQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.eq.push((column, value.into()));
        self
    }

    /// Case-insensitive substring match over the table's search columns.
    pub fn search(mut self, term: impl Into<String>) -> Self {
        let term = term.into();
        if !term.trim().is_empty() {
            self.search = Some(term);
        }
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn select(&self, table: Table, query: SelectQuery) -> Result<Vec<Value>, StoreError>;

    async fn find(&self, table: Table, id: &str) -> Result<Option<Value>, StoreError>;

    /// Insert a row and return it as stored, defaults filled in.
    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError>;

    /// Apply `patch` to the row with `id` and return the updated row.
    async fn update(&self, table: Table, id: &str, patch: Value) -> Result<Value, StoreError>;

    /// Delete by id. Returns whether a row was removed.
    async fn delete(&self, table: Table, id: &str) -> Result<bool, StoreError>;

    async fn count(&self, table: Table) -> Result<i64, StoreError>;

    /// Round-trip to the backend, for health checks.
    async fn ping(&self) -> Result<std::time::Duration, StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;

    fn backend_name(&self) -> &'static str;
}

/// Keep only the writable columns of `table`; reject non-objects.
pub(crate) fn writable_fields(
    table: Table,
    row: Value,
) -> Result<serde_json::Map<String, Value>, StoreError> {
    let Value::Object(map) = row else {
        return Err(StoreError::InvalidRow {
            table,
            reason: "row must be a JSON object".to_string(),
        });
    };

    let allowed = table.writable_columns();
    let fields: serde_json::Map<String, Value> = map
        .into_iter()
        .filter(|(k, _)| allowed.contains(&k.as_str()))
        .collect();

    if fields.is_empty() {
        return Err(StoreError::InvalidRow {
            table,
            reason: "no writable columns".to_string(),
        });
    }
    Ok(fields)
}

// ============================================================================
// Typed access
// ============================================================================

/// A model backed by one table.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TABLE: Table;

    fn id(&self) -> Uuid;
}

fn decode<R: Record>(row: Value) -> Result<R, StoreError> {
    serde_json::from_value(row).map_err(|source| StoreError::Decode {
        table: R::TABLE,
        source,
    })
}

pub async fn list<R: Record>(store: &dyn Store, query: SelectQuery) -> Result<Vec<R>, StoreError> {
    store
        .select(R::TABLE, query)
        .await?
        .into_iter()
        .map(decode)
        .collect()
}

pub async fn find<R: Record>(store: &dyn Store, id: Uuid) -> Result<Option<R>, StoreError> {
    store
        .find(R::TABLE, &id.to_string())
        .await?
        .map(decode)
        .transpose()
}

pub async fn insert<R: Record>(store: &dyn Store, row: Value) -> Result<R, StoreError> {
    decode(store.insert(R::TABLE, row).await?)
}

pub async fn update<R: Record>(store: &dyn Store, id: Uuid, patch: Value) -> Result<R, StoreError> {
    decode(store.update(R::TABLE, &id.to_string(), patch).await?)
}

pub async fn delete<R: Record>(store: &dyn Store, id: Uuid) -> Result<bool, StoreError> {
    store.delete(R::TABLE, &id.to_string()).await
}

//! Postgres row store.
//!
//! Rows are read with `to_jsonb(t)` and written through
//! `jsonb_populate_record`, so one code path serves every table in the
//! catalogue. Column names only ever come from [`Table`], never from input.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgListener, PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::store::{writable_fields, SelectQuery, Store, StoreError};
use super::table::{Direction, Table};
use crate::realtime::{ChangeEvent, ChangeFeed, NotifyPayload};

/// Channel the `notify_table_change` trigger publishes on.
pub const CHANGE_CHANNEL: &str = "table_changes";

pub struct PgStore {
    pool: Arc<PgPool>,
    feed: ChangeFeed,
}

impl PgStore {
    pub fn new(pool: Arc<PgPool>, feed: ChangeFeed) -> Self {
        Self { pool, feed }
    }

    /// Forward row-trigger notifications into the change feed.
    ///
    /// Changes made by other processes against the same database reach
    /// subscribers through this listener too.
    pub async fn spawn_change_listener(&self) -> Result<(), StoreError> {
        let mut listener = PgListener::connect_with(self.pool.as_ref()).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        let feed = self.feed.clone();

        tokio::spawn(async move {
            loop {
                match listener.recv().await {
                    Ok(notification) => {
                        match serde_json::from_str::<NotifyPayload>(notification.payload()) {
                            Ok(payload) => {
                                if let Some(event) = payload.into_event() {
                                    feed.publish(event);
                                }
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "malformed table change notification")
                            }
                        }
                    }
                    Err(e) => {
                        // PgListener reconnects on the next recv
                        tracing::error!(error = %e, "change listener error");
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    }
                }
            }
        });

        tracing::info!(channel = CHANGE_CHANNEL, "listening for table changes");
        Ok(())
    }
}

fn push_order_by(builder: &mut QueryBuilder<'_, Postgres>, table: Table) {
    builder.push(" ORDER BY ");
    for (i, (column, direction)) in table.ordering().iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push("t.").push(*column);
        builder.push(match direction {
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        });
    }
}

#[async_trait]
impl Store for PgStore {
    async fn select(&self, table: Table, query: SelectQuery) -> Result<Vec<Value>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT to_jsonb(t) FROM ");
        builder.push(table.name()).push(" t WHERE true");

        for (column, value) in query.eq {
            if !table.is_column(column) {
                return Err(StoreError::InvalidRow {
                    table,
                    reason: format!("unknown column {column}"),
                });
            }
            builder
                .push(" AND to_jsonb(t.")
                .push(column)
                .push(") = ")
                .push_bind(value)
                .push("::jsonb");
        }

        if let Some(term) = query.search {
            let pattern = format!("%{}%", term);
            builder.push(" AND (");
            for (i, column) in table.search_columns().iter().enumerate() {
                if i > 0 {
                    builder.push(" OR ");
                }
                builder
                    .push("t.")
                    .push(*column)
                    .push("::text ILIKE ")
                    .push_bind(pattern.clone());
            }
            builder.push(")");
        }

        push_order_by(&mut builder, table);

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit.max(0));
        }

        let rows = builder
            .build_query_scalar::<Value>()
            .fetch_all(self.pool.as_ref())
            .await?;
        Ok(rows)
    }

    async fn find(&self, table: Table, id: &str) -> Result<Option<Value>, StoreError> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} t WHERE t.id::text = $1",
            table.name()
        );
        let row = sqlx::query_scalar::<_, Value>(&sql)
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(row)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
        let fields = writable_fields(table, row)?;
        let columns: Vec<&str> = fields.keys().map(String::as_str).collect();
        let column_list = columns.join(", ");

        let sql = format!(
            "INSERT INTO {table} AS t ({columns}) \
             SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
             RETURNING to_jsonb(t.*)",
            table = table.name(),
            columns = column_list,
        );

        let inserted = sqlx::query_scalar::<_, Value>(&sql)
            .bind(Value::Object(fields))
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(inserted)
    }

    async fn update(&self, table: Table, id: &str, patch: Value) -> Result<Value, StoreError> {
        let mut fields = writable_fields(table, patch)?;
        fields.remove("id");
        if fields.is_empty() {
            return Err(StoreError::InvalidRow {
                table,
                reason: "no writable columns".to_string(),
            });
        }

        let mut assignments: Vec<String> = fields
            .keys()
            .map(|column| format!("{column} = r.{column}"))
            .collect();
        if table.has_updated_at() {
            assignments.push("updated_at = now()".to_string());
        }

        let sql = format!(
            "UPDATE {table} AS t SET {assignments} \
             FROM jsonb_populate_record(NULL::{table}, $1) AS r \
             WHERE t.id::text = $2 \
             RETURNING to_jsonb(t.*)",
            table = table.name(),
            assignments = assignments.join(", "),
        );

        sqlx::query_scalar::<_, Value>(&sql)
            .bind(Value::Object(fields))
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| StoreError::NotFound {
                table,
                id: id.to_string(),
            })
    }

    async fn delete(&self, table: Table, id: &str) -> Result<bool, StoreError> {
        let sql = format!("DELETE FROM {} WHERE id::text = $1", table.name());
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self, table: Table) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        let (count,): (i64,) = sqlx::query_as(&sql).fetch_one(self.pool.as_ref()).await?;
        Ok(count)
    }

    async fn ping(&self) -> Result<std::time::Duration, StoreError> {
        let start = std::time::Instant::now();
        sqlx::query("SELECT 1").fetch_one(self.pool.as_ref()).await?;
        Ok(start.elapsed())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_by_uses_table_ordering() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT 1 FROM projects t");
        push_order_by(&mut builder, Table::Projects);
        assert_eq!(
            builder.sql(),
            "SELECT 1 FROM projects t ORDER BY t.featured DESC, t.created_at DESC"
        );
    }

    #[test]
    fn test_order_by_mixed_directions() {
        let mut builder = QueryBuilder::<Postgres>::new("");
        push_order_by(&mut builder, Table::Skills);
        assert_eq!(builder.sql(), " ORDER BY t.category ASC, t.level DESC");
    }
}

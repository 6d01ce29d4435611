//! In-process row store.
//!
//! Used when no `DATABASE_URL` is configured and throughout the tests.
//! Mirrors the column defaults, NOT NULL and CHECK constraints of the
//! Postgres schema closely enough that handlers behave the same on both.

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::{cmp::Ordering, collections::HashMap};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::store::{writable_fields, SelectQuery, Store, StoreError};
use super::table::{Direction, Table};
use crate::realtime::{ChangeEvent, ChangeFeed, ChangeKind};

pub struct MemoryStore {
    tables: RwLock<HashMap<Table, Vec<Value>>>,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new(feed: ChangeFeed) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            feed,
        }
    }
}

fn now_timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn column_defaults(table: Table) -> Vec<(&'static str, Value)> {
    match table {
        Table::Projects => vec![
            ("image", Value::Null),
            ("technologies", json!([])),
            ("live_url", Value::Null),
            ("github_url", Value::Null),
            ("featured", json!(false)),
            ("date", Value::Null),
            ("status", json!("Completed")),
        ],
        Table::AboutContent | Table::HomeContent => vec![
            ("title", Value::Null),
            ("content", json!("")),
            ("data", Value::Null),
        ],
        Table::ContactInfo => vec![("link", Value::Null), ("icon", Value::Null)],
        Table::Messages => vec![("subject", Value::Null), ("status", json!("unread"))],
        Table::Users => vec![("full_name", Value::Null), ("name", Value::Null)],
        Table::AdminLogs => vec![
            ("user_id", Value::Null),
            ("description", Value::Null),
            ("table_name", Value::Null),
            ("record_id", Value::Null),
            ("old_data", Value::Null),
            ("new_data", Value::Null),
            ("ip_address", Value::Null),
            ("user_agent", Value::Null),
        ],
        Table::Skills | Table::AuthCredentials => vec![],
    }
}

fn required_columns(table: Table) -> &'static [&'static str] {
    match table {
        Table::Projects => &["title", "description", "category"],
        Table::Skills => &["name", "level", "category"],
        Table::AboutContent | Table::HomeContent => &["section"],
        Table::ContactInfo => &["type", "title", "value"],
        Table::Messages => &["name", "email", "message"],
        Table::Users => &["id", "email"],
        Table::AdminLogs => &["action"],
        Table::AuthCredentials => &["id", "email", "password_hash"],
    }
}

fn check_constraints(table: Table, row: &Map<String, Value>) -> Result<(), StoreError> {
    for column in required_columns(table) {
        if row.get(*column).is_none_or(Value::is_null) {
            return Err(StoreError::InvalidRow {
                table,
                reason: format!("null value in column \"{column}\""),
            });
        }
    }

    let invalid = |reason: &str| StoreError::InvalidRow {
        table,
        reason: reason.to_string(),
    };

    match table {
        Table::Skills => {
            let level = row.get("level").and_then(Value::as_i64);
            if !matches!(level, Some(0..=100)) {
                return Err(invalid("level must be between 0 and 100"));
            }
        }
        Table::Messages => {
            let status = row.get("status").and_then(Value::as_str);
            if !matches!(status, Some("unread") | Some("read")) {
                return Err(invalid("status must be 'unread' or 'read'"));
            }
        }
        Table::Users | Table::AuthCredentials => {
            if row.get("id").and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok()).is_none() {
                return Err(invalid("id must be a uuid"));
            }
        }
        _ => {}
    }
    Ok(())
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

/// Postgres default ordering: NULL sorts above every other value.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn sort_rows(table: Table, rows: &mut [Value]) {
    rows.sort_by(|a, b| {
        for (column, direction) in table.ordering() {
            let ord = compare_values(
                a.get(*column).unwrap_or(&Value::Null),
                b.get(*column).unwrap_or(&Value::Null),
            );
            let ord = match direction {
                Direction::Asc => ord,
                Direction::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn matches_search(table: Table, row: &Value, needle: &str) -> bool {
    table.search_columns().iter().any(|column| match row.get(*column) {
        Some(Value::String(s)) => s.to_lowercase().contains(needle),
        Some(Value::Null) | None => false,
        Some(other) => other.to_string().to_lowercase().contains(needle),
    })
}

#[async_trait]
impl Store for MemoryStore {
    async fn select(&self, table: Table, query: SelectQuery) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.read().await;
        let needle = query.search.as_ref().map(|s| s.to_lowercase());

        let mut rows: Vec<Value> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        query
                            .eq
                            .iter()
                            .all(|(column, value)| row.get(*column).unwrap_or(&Value::Null) == value)
                    })
                    .filter(|row| needle.as_deref().is_none_or(|n| matches_search(table, row, n)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        sort_rows(table, &mut rows);
        if let Some(limit) = query.limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(rows)
    }

    async fn find(&self, table: Table, id: &str) -> Result<Option<Value>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(&table)
            .and_then(|rows| rows.iter().find(|row| row_id(row) == Some(id)))
            .cloned())
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value, StoreError> {
        let mut fields = writable_fields(table, row)?;

        for (column, default) in column_defaults(table) {
            fields.entry(column).or_insert(default);
        }
        if !fields.get("id").is_some_and(Value::is_string) {
            fields.insert("id".to_string(), json!(Uuid::new_v4().to_string()));
        }
        fields.insert("created_at".to_string(), now_timestamp());
        if table.has_updated_at() {
            fields.insert("updated_at".to_string(), now_timestamp());
        }
        check_constraints(table, &fields)?;

        let row = Value::Object(fields);
        let id = row_id(&row).unwrap_or_default().to_string();

        {
            let mut tables = self.tables.write().await;
            let rows = tables.entry(table).or_default();
            if rows.iter().any(|r| row_id(r) == Some(id.as_str())) {
                return Err(StoreError::InvalidRow {
                    table,
                    reason: format!("duplicate key value (id)=({id})"),
                });
            }
            if table == Table::Users {
                let email = row.get("email");
                if rows.iter().any(|r| r.get("email") == email) {
                    return Err(StoreError::InvalidRow {
                        table,
                        reason: "duplicate key value violates unique constraint on email"
                            .to_string(),
                    });
                }
            }
            rows.push(row.clone());
        }

        self.feed
            .publish(ChangeEvent::new(table, ChangeKind::Insert, id));
        Ok(row)
    }

    async fn update(&self, table: Table, id: &str, patch: Value) -> Result<Value, StoreError> {
        let mut fields = writable_fields(table, patch)?;
        fields.remove("id");

        let updated = {
            let mut tables = self.tables.write().await;
            let row = tables
                .get_mut(&table)
                .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == Some(id)))
                .ok_or_else(|| StoreError::NotFound {
                    table,
                    id: id.to_string(),
                })?;

            let Value::Object(current) = &mut *row else {
                return Err(StoreError::InvalidRow {
                    table,
                    reason: "stored row is not an object".to_string(),
                });
            };
            let mut next = current.clone();
            next.extend(fields);
            if table.has_updated_at() {
                next.insert("updated_at".to_string(), now_timestamp());
            }
            check_constraints(table, &next)?;
            *current = next;
            row.clone()
        };

        self.feed
            .publish(ChangeEvent::new(table, ChangeKind::Update, id));
        Ok(updated)
    }

    async fn delete(&self, table: Table, id: &str) -> Result<bool, StoreError> {
        let removed = {
            let mut tables = self.tables.write().await;
            match tables.get_mut(&table) {
                Some(rows) => {
                    let before = rows.len();
                    rows.retain(|row| row_id(row) != Some(id));
                    rows.len() != before
                }
                None => false,
            }
        };

        if removed {
            self.feed
                .publish(ChangeEvent::new(table, ChangeKind::Delete, id));
        }
        Ok(removed)
    }

    async fn count(&self, table: Table) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.get(&table).map_or(0, |rows| rows.len() as i64))
    }

    async fn ping(&self) -> Result<std::time::Duration, StoreError> {
        Ok(std::time::Duration::ZERO)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new(ChangeFeed::new())
    }

    #[tokio::test]
    async fn test_insert_fills_defaults_and_timestamps() {
        let store = store();
        let row = store
            .insert(
                Table::Messages,
                json!({ "name": "Ada", "email": "ada@example.com", "message": "hi" }),
            )
            .await
            .unwrap();
        assert_eq!(row["status"], "unread");
        assert!(row["id"].is_string());
        assert!(row["created_at"].is_string());
        assert!(row["updated_at"].is_string());
    }

    #[tokio::test]
    async fn test_insert_enforces_not_null_and_checks() {
        let store = store();
        let missing = store
            .insert(Table::Skills, json!({ "name": "Rust", "category": "Language" }))
            .await;
        assert!(matches!(missing, Err(StoreError::InvalidRow { .. })));

        let out_of_range = store
            .insert(
                Table::Skills,
                json!({ "name": "Rust", "level": 101, "category": "Language" }),
            )
            .await;
        assert!(matches!(out_of_range, Err(StoreError::InvalidRow { .. })));
        assert_eq!(store.count(Table::Skills).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_select_follows_table_ordering() {
        let store = store();
        for (name, level, category) in [
            ("Go", 70, "Backend"),
            ("React", 95, "Frontend"),
            ("Rust", 85, "Backend"),
        ] {
            store
                .insert(
                    Table::Skills,
                    json!({ "name": name, "level": level, "category": category }),
                )
                .await
                .unwrap();
        }
        let rows = store.select(Table::Skills, SelectQuery::all()).await.unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["Rust", "Go", "React"]);
    }

    #[tokio::test]
    async fn test_select_filters_searches_and_limits() {
        let store = store();
        for (action, description) in [
            ("CREATE", "Created new skill: Rust"),
            ("DELETE", "Deleted project: Blog"),
            ("CREATE", "Created new project: Shop"),
        ] {
            store
                .insert(
                    Table::AdminLogs,
                    json!({ "action": action, "description": description }),
                )
                .await
                .unwrap();
        }

        let creates = store
            .select(Table::AdminLogs, SelectQuery::all().eq("action", "CREATE"))
            .await
            .unwrap();
        assert_eq!(creates.len(), 2);

        let projects = store
            .select(Table::AdminLogs, SelectQuery::all().search("PROJECT"))
            .await
            .unwrap();
        assert_eq!(projects.len(), 2);

        let limited = store
            .select(Table::AdminLogs, SelectQuery::all().limit(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_update_merges_patch_and_keeps_id() {
        let store = store();
        let row = store
            .insert(
                Table::ContactInfo,
                json!({ "type": "email", "title": "Email", "value": "a@b.c" }),
            )
            .await
            .unwrap();
        let id = row["id"].as_str().unwrap().to_string();

        let updated = store
            .update(
                Table::ContactInfo,
                &id,
                json!({ "value": "x@y.z", "id": "hijack" }),
            )
            .await
            .unwrap();
        assert_eq!(updated["id"], id.as_str());
        assert_eq!(updated["value"], "x@y.z");
        assert_eq!(updated["title"], "Email");
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = store();
        let result = store
            .update(Table::Skills, "nope", json!({ "name": "x" }))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_users_reject_duplicate_email() {
        let store = store();
        let first = json!({ "id": Uuid::new_v4().to_string(), "email": "a@b.c" });
        let second = json!({ "id": Uuid::new_v4().to_string(), "email": "a@b.c" });
        store.insert(Table::Users, first).await.unwrap();
        assert!(store.insert(Table::Users, second).await.is_err());
    }

    #[tokio::test]
    async fn test_mutations_publish_change_events() {
        let store = store();
        let mut rx = store.subscribe();

        let row = store
            .insert(
                Table::Skills,
                json!({ "name": "Rust", "level": 80, "category": "Language" }),
            )
            .await
            .unwrap();
        let id = row["id"].as_str().unwrap();
        store
            .update(Table::Skills, id, json!({ "level": 90 }))
            .await
            .unwrap();
        assert!(store.delete(Table::Skills, id).await.unwrap());
        assert!(!store.delete(Table::Skills, id).await.unwrap());

        let kinds: Vec<ChangeKind> = vec![
            rx.recv().await.unwrap().kind,
            rx.recv().await.unwrap().kind,
            rx.recv().await.unwrap().kind,
        ];
        assert_eq!(
            kinds,
            vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete]
        );
        assert!(rx.try_recv().is_err());
    }
}

//! Table change feed.
//!
//! [`ChangeFeed`] is an in-process publish/subscribe hub over a
//! `tokio::sync::broadcast` channel. Stores publish one [`ChangeEvent`] per
//! inserted, updated or deleted row; dashboard and public streams
//! subscribe and tell their clients to re-fetch.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::db::table::Table;

/// Capacity of the broadcast buffer; slower subscribers see `Lagged`.
const FEED_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record_id: String,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, record_id: impl Into<String>) -> Self {
        Self {
            table,
            kind,
            record_id: record_id.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    /// Publish a change. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        if !event.table.is_streamable() {
            return;
        }
        tracing::trace!(
            table = %event.table,
            kind = ?event.kind,
            record_id = %event.record_id,
            "table change"
        );
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// Postgres NOTIFY payload written by the `notify_table_change` trigger.
#[derive(Debug, Deserialize)]
pub(crate) struct NotifyPayload {
    pub table: String,
    pub op: String,
    pub record_id: String,
}

impl NotifyPayload {
    pub(crate) fn into_event(self) -> Option<ChangeEvent> {
        let table = self.table.parse::<Table>().ok()?;
        let kind = match self.op.as_str() {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            _ => return None,
        };
        Some(ChangeEvent::new(table, kind, self.record_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_published_event() {
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();
        feed.publish(ChangeEvent::new(Table::Skills, ChangeKind::Insert, "abc"));
        let event = rx.recv().await.unwrap();
        assert_eq!(event.table, Table::Skills);
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.record_id, "abc");
    }

    #[test]
    fn test_credential_changes_are_not_broadcast() {
        let feed = ChangeFeed::new();
        let mut rx = feed.subscribe();
        feed.publish(ChangeEvent::new(Table::AuthCredentials, ChangeKind::Insert, "abc"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let feed = ChangeFeed::new();
        assert_eq!(feed.subscriber_count(), 0);
        feed.publish(ChangeEvent::new(Table::Projects, ChangeKind::Delete, "x"));
    }

    #[test]
    fn test_notify_payload_maps_trigger_ops() {
        let payload: NotifyPayload = serde_json::from_str(
            r#"{"table":"home_content","op":"UPDATE","record_id":"42"}"#,
        )
        .unwrap();
        let event = payload.into_event().unwrap();
        assert_eq!(event.table, Table::HomeContent);
        assert_eq!(event.kind, ChangeKind::Update);

        let unknown: NotifyPayload =
            serde_json::from_str(r#"{"table":"blog_posts","op":"INSERT","record_id":"1"}"#)
                .unwrap();
        assert!(unknown.into_event().is_none());
    }

    #[test]
    fn test_change_event_serializes_camel_case() {
        let event = ChangeEvent::new(Table::AdminLogs, ChangeKind::Insert, "7");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["table"], "admin_logs");
        assert_eq!(json["kind"], "INSERT");
        assert_eq!(json["recordId"], "7");
    }
}

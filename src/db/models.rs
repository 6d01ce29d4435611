//! Database Models - rows of the portfolio and dashboard tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::store::Record;
use super::table::Table;

/// Portfolio project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    pub category: String,
    pub live_url: Option<String>,
    pub github_url: Option<String>,
    #[serde(default)]
    pub featured: bool,
    pub date: Option<String>,
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Project {
    const TABLE: Table = Table::Projects;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Skill with a 0-100 proficiency level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub level: i32,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Skill {
    const TABLE: Table = Table::Skills;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// About page section. `data` is free-form and section dependent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AboutContent {
    pub id: Uuid,
    pub section: String,
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    pub data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for AboutContent {
    const TABLE: Table = Table::AboutContent;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Home (hero) section, e.g. `hero_title` or `hero_social_github`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeContent {
    pub id: Uuid,
    pub section: String,
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    pub data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for HomeContent {
    const TABLE: Table = Table::HomeContent;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub value: String,
    pub link: Option<String>,
    pub icon: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for ContactInfo {
    const TABLE: Table = Table::ContactInfo;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Unread,
    Read,
}

/// Contact form submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub subject: Option<String>,
    pub message: String,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Message {
    const TABLE: Table = Table::Messages;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Admin profile mirrored from the auth provider; `id` is the identity id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdminUser {
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("Unknown")
    }
}

impl Record for AdminUser {
    const TABLE: Table = Table::Users;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Local sign-in credential; `id` is the identity id shared with `users`.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

impl Record for Credential {
    const TABLE: Table = Table::AuthCredentials;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Append-only audit row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminLog {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub description: Option<String>,
    pub table_name: Option<String>,
    pub record_id: Option<String>,
    pub old_data: Option<Value>,
    pub new_data: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Record for AdminLog {
    const TABLE: Table = Table::AdminLogs;

    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contact_info_type_column_maps_to_kind() {
        let info: ContactInfo = serde_json::from_value(json!({
            "id": Uuid::nil(),
            "type": "email",
            "title": "Email",
            "value": "hello@example.com",
            "link": null,
            "icon": "Mail",
            "created_at": "2024-01-01T00:00:00+00:00",
            "updated_at": "2024-01-01T00:00:00+00:00"
        }))
        .unwrap();
        assert_eq!(info.kind, "email");
        assert_eq!(serde_json::to_value(&info).unwrap()["type"], "email");
    }

    #[test]
    fn test_admin_log_accepts_postgres_timestamp_format() {
        let log: AdminLog = serde_json::from_value(json!({
            "id": Uuid::nil(),
            "user_id": null,
            "action": "LOGIN",
            "description": null,
            "table_name": "auth",
            "record_id": null,
            "old_data": null,
            "new_data": { "email": "a@b.c" },
            "ip_address": null,
            "user_agent": null,
            "created_at": "2026-10-17T18:10:00.123456+00:00"
        }))
        .unwrap();
        assert_eq!(log.action, "LOGIN");
        assert!(log.old_data.is_none());
        assert!(log.new_data.is_some());
    }

    #[test]
    fn test_admin_user_display_name_prefers_full_name() {
        let mut user = AdminUser {
            id: Uuid::nil(),
            email: "a@b.c".to_string(),
            full_name: Some("Ada Lovelace".to_string()),
            name: Some("Ada".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(user.display_name(), "Ada Lovelace");
        user.full_name = None;
        assert_eq!(user.display_name(), "Ada");
        user.name = None;
        assert_eq!(user.display_name(), "Unknown");
    }
}

//! Table catalogue - the closed set of tables the service reads and writes.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Sort direction for a table's default ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Every table known to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Projects,
    Skills,
    AboutContent,
    HomeContent,
    ContactInfo,
    Messages,
    Users,
    AdminLogs,
    /// Password hashes for the in-process auth provider
    AuthCredentials,
}

impl Table {
    pub const ALL: [Table; 9] = [
        Table::Projects,
        Table::Skills,
        Table::AboutContent,
        Table::HomeContent,
        Table::ContactInfo,
        Table::Messages,
        Table::Users,
        Table::AdminLogs,
        Table::AuthCredentials,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Projects => "projects",
            Table::Skills => "skills",
            Table::AboutContent => "about_content",
            Table::HomeContent => "home_content",
            Table::ContactInfo => "contact_info",
            Table::Messages => "messages",
            Table::Users => "users",
            Table::AdminLogs => "admin_logs",
            Table::AuthCredentials => "auth_credentials",
        }
    }

    /// Columns a caller may set on insert or update.
    ///
    /// `id` is writable only where the row mirrors an external identity.
    pub fn writable_columns(self) -> &'static [&'static str] {
        match self {
            Table::Projects => &[
                "title",
                "description",
                "image",
                "technologies",
                "category",
                "live_url",
                "github_url",
                "featured",
                "date",
                "status",
            ],
            Table::Skills => &["name", "level", "category"],
            Table::AboutContent | Table::HomeContent => &["section", "title", "content", "data"],
            Table::ContactInfo => &["type", "title", "value", "link", "icon"],
            Table::Messages => &["name", "email", "subject", "message", "status"],
            Table::Users => &["id", "email", "full_name", "name"],
            Table::AuthCredentials => &["id", "email", "password_hash"],
            Table::AdminLogs => &[
                "user_id",
                "action",
                "description",
                "table_name",
                "record_id",
                "old_data",
                "new_data",
                "ip_address",
                "user_agent",
            ],
        }
    }

    /// Default ordering used by every list read.
    pub fn ordering(self) -> &'static [(&'static str, Direction)] {
        match self {
            Table::Projects => &[("featured", Direction::Desc), ("created_at", Direction::Desc)],
            Table::Skills => &[("category", Direction::Asc), ("level", Direction::Desc)],
            Table::AboutContent | Table::HomeContent => &[("section", Direction::Asc)],
            Table::ContactInfo => &[("type", Direction::Asc)],
            Table::Messages | Table::Users | Table::AdminLogs | Table::AuthCredentials => {
                &[("created_at", Direction::Desc)]
            }
        }
    }

    /// Audit rows are append-only and carry no `updated_at`.
    pub fn has_updated_at(self) -> bool {
        !matches!(self, Table::AdminLogs)
    }

    /// Tables whose change feed anonymous visitors may follow.
    pub fn is_public(self) -> bool {
        matches!(
            self,
            Table::Projects
                | Table::Skills
                | Table::AboutContent
                | Table::HomeContent
                | Table::ContactInfo
        )
    }

    /// Tables that may be followed over `/api/realtime/{table}`.
    pub fn is_streamable(self) -> bool {
        !matches!(self, Table::AuthCredentials)
    }

    /// Columns the audit viewer searches.
    pub fn search_columns(self) -> &'static [&'static str] {
        match self {
            Table::AdminLogs => &["action", "description", "table_name"],
            Table::Messages => &["name", "email", "subject", "message"],
            Table::Projects => &["title", "description", "category"],
            Table::Skills => &["name", "category"],
            Table::AboutContent | Table::HomeContent => &["section", "title", "content"],
            Table::ContactInfo => &["type", "title", "value"],
            Table::Users => &["email", "full_name", "name"],
            Table::AuthCredentials => &["email"],
        }
    }

    pub fn is_column(self, column: &str) -> bool {
        matches!(column, "id" | "created_at")
            || (column == "updated_at" && self.has_updated_at())
            || self.writable_columns().contains(&column)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown table: {0}")]
pub struct UnknownTable(pub String);

impl FromStr for Table {
    type Err = UnknownTable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| UnknownTable(s.to_string()))
    }
}

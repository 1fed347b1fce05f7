//! Database row types for all tables.
//! These correspond 1:1 to the SQLite schema defined in migrations.rs.

use chrono::{DateTime, Utc};

/// User record in the users table. The relay only touches the presence
/// columns; account management lives outside this service.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub username: String,
    pub online: bool,
    /// Epoch milliseconds of the last presence change
    pub last_seen: i64,
    pub created_at: String,
}

/// Chat message row. `delivered` records whether the recipient had a live
/// session at the instant the row was persisted; rows with delivered = false
/// form the replay backlog and every row is hard-deleted on acknowledgement.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: i64,
    pub sender: String,
    pub recipient: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub delivered: bool,
}

/// Task row. The relay reads tasks for pending-task queries and deadline
/// notifications; it never mutates them.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: String,
    pub task_title: String,
    pub deadline: DateTime<Utc>,
    pub assignee: Option<String>,
    pub assigned_by: Option<String>,
    pub status: TaskStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Done,
}

impl TaskStatus {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "DONE" => Some(Self::Done),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Done => "DONE",
        }
    }
}

/// Parse an RFC 3339 timestamp column, mapping parse failures onto the
/// rusqlite error type so row mappers can use `?`.
pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

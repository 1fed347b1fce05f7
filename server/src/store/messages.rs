use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::db::models::{parse_timestamp, ChatMessage};
use crate::db::DbPool;
use crate::error::StoreError;

/// A message as produced by the delivery engine, before the store assigns
/// its id.
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub sender: String,
    pub recipient: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub delivered: bool,
}

/// Durable record of chat messages with a delivered/undelivered flag.
#[derive(Clone)]
pub struct MessageStore {
    db: DbPool,
}

impl MessageStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Persist a message and return it with the store-assigned id.
    pub async fn save(&self, msg: NewChatMessage) -> Result<ChatMessage, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            conn.execute(
                "INSERT INTO messages (sender, recipient, content, timestamp, delivered)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    msg.sender,
                    msg.recipient,
                    msg.content,
                    msg.timestamp.to_rfc3339(),
                    msg.delivered
                ],
            )?;
            let id = conn.last_insert_rowid();

            Ok::<_, StoreError>(ChatMessage {
                id,
                sender: msg.sender,
                recipient: msg.recipient,
                content: msg.content,
                timestamp: msg.timestamp,
                delivered: msg.delivered,
            })
        })
        .await?
    }

    /// Undelivered backlog for a recipient, oldest first. This is the set
    /// replayed on every registration until acknowledged.
    pub async fn find_undelivered_for_recipient(
        &self,
        recipient: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.query_for_recipient(
            recipient,
            "SELECT id, sender, recipient, content, timestamp, delivered
             FROM messages
             WHERE recipient = ?1 AND delivered = 0
             ORDER BY timestamp ASC, id ASC",
        )
        .await
    }

    /// Full history snapshot for a recipient, oldest first. Read-only: the
    /// delivered flags are not touched.
    pub async fn find_all_for_recipient(
        &self,
        recipient: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.query_for_recipient(
            recipient,
            "SELECT id, sender, recipient, content, timestamp, delivered
             FROM messages
             WHERE recipient = ?1
             ORDER BY timestamp ASC, id ASC",
        )
        .await
    }

    /// Hard-delete a message after acknowledgement. Returns false when the
    /// id was already gone; deleting a missing id is a no-op, not an error.
    pub async fn delete_by_id(&self, id: i64) -> Result<bool, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            let deleted = conn.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
            Ok::<_, StoreError>(deleted > 0)
        })
        .await?
    }

    async fn query_for_recipient(
        &self,
        recipient: &str,
        sql: &'static str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        let db = self.db.clone();
        let recipient = recipient.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            let mut stmt = conn.prepare(sql)?;
            let messages = stmt
                .query_map(params![recipient], |row| {
                    let raw_ts: String = row.get(4)?;
                    Ok(ChatMessage {
                        id: row.get(0)?,
                        sender: row.get(1)?,
                        recipient: row.get(2)?,
                        content: row.get(3)?,
                        timestamp: parse_timestamp(4, &raw_ts)?,
                        delivered: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, StoreError>(messages)
        })
        .await?
    }
}

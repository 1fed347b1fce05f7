use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::db::models::UserRecord;
use crate::db::DbPool;
use crate::error::StoreError;

/// Backing user store. The relay only reads user rows and flips their
/// presence columns; everything else about accounts is out of scope.
#[derive(Clone)]
pub struct UserStore {
    db: DbPool,
}

impl UserStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let db = self.db.clone();
        let username = username.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            let record = conn
                .query_row(
                    "SELECT username, online, last_seen, created_at FROM users WHERE username = ?1",
                    params![username],
                    |row| {
                        Ok(UserRecord {
                            username: row.get(0)?,
                            online: row.get(1)?,
                            last_seen: row.get(2)?,
                            created_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok::<_, StoreError>(record)
        })
        .await?
    }

    /// Persist a user's online flag and last-seen timestamp. Upserts: the
    /// relay may see a username before any out-of-band account flow has
    /// created it, and presence must still stick.
    pub async fn set_online_presence(
        &self,
        username: &str,
        online: bool,
        last_seen: i64,
    ) -> Result<(), StoreError> {
        let db = self.db.clone();
        let username = username.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            conn.execute(
                "INSERT INTO users (username, online, last_seen, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(username) DO UPDATE SET
                     online = excluded.online,
                     last_seen = excluded.last_seen",
                params![username, online, last_seen, Utc::now().to_rfc3339()],
            )?;
            Ok::<_, StoreError>(())
        })
        .await?
    }
}

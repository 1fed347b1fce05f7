//! Store-layer error type.
//!
//! The store methods run their SQLite work on `spawn_blocking` tasks and
//! return `Result<_, StoreError>`. The variants here cover exactly the
//! failure sources those methods surface: a poisoned connection mutex, an
//! underlying `rusqlite` failure, and a join failure from the blocking task.

use thiserror::Error;

/// Errors produced by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The shared connection mutex was poisoned by a panic in another task.
    #[error("database connection mutex was poisoned")]
    LockPoisoned,

    /// An error from the underlying SQLite layer.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The blocking database task failed to join.
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

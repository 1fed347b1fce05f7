use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "-- Migration 1: users, messages, tasks

CREATE TABLE users (
    username TEXT PRIMARY KEY,
    online INTEGER NOT NULL DEFAULT 0,
    last_seen INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE messages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sender TEXT NOT NULL,
    recipient TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    delivered INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_messages_recipient ON messages(recipient);
CREATE INDEX idx_messages_recipient_undelivered ON messages(recipient, delivered);

CREATE TABLE tasks (
    id TEXT PRIMARY KEY,
    task_title TEXT NOT NULL,
    deadline TEXT NOT NULL,
    assignee TEXT,
    assigned_by TEXT,
    status TEXT NOT NULL DEFAULT 'PENDING',
    created_at TEXT NOT NULL
);

CREATE INDEX idx_tasks_assignee_status ON tasks(assignee, status);
",
        ),
    ])
}

use rusqlite::{params, OptionalExtension, Row};

use crate::db::models::{parse_timestamp, Task, TaskStatus};
use crate::db::DbPool;
use crate::error::StoreError;

/// Read-only view of the task store. Task CRUD happens elsewhere; the
/// relay needs pending-task queries and by-id lookups at deadline time.
#[derive(Clone)]
pub struct TaskStore {
    db: DbPool,
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let raw_deadline: String = row.get(2)?;
    let raw_status: String = row.get(5)?;
    Ok(Task {
        id: row.get(0)?,
        task_title: row.get(1)?,
        deadline: parse_timestamp(2, &raw_deadline)?,
        assignee: row.get(3)?,
        assigned_by: row.get(4)?,
        status: TaskStatus::from_str(&raw_status).unwrap_or(TaskStatus::Pending),
        created_at: row.get(6)?,
    })
}

const TASK_COLUMNS: &str = "id, task_title, deadline, assignee, assigned_by, status, created_at";

impl TaskStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let db = self.db.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            let task = conn
                .query_row(
                    &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                    params![id],
                    task_from_row,
                )
                .optional()?;
            Ok::<_, StoreError>(task)
        })
        .await?
    }

    /// Tasks with status PENDING assigned to the given user.
    pub async fn find_pending_by_assignee(&self, assignee: &str) -> Result<Vec<Task>, StoreError> {
        let db = self.db.clone();
        let assignee = assignee.to_string();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE assignee = ?1 AND status = 'PENDING'
                 ORDER BY deadline ASC"
            ))?;
            let tasks = stmt
                .query_map(params![assignee], task_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, StoreError>(tasks)
        })
        .await?
    }

    /// All PENDING tasks. Used at startup to re-arm deadline timers.
    pub async fn find_pending(&self) -> Result<Vec<Task>, StoreError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.lock().map_err(|_| StoreError::LockPoisoned)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE status = 'PENDING' ORDER BY deadline ASC"
            ))?;
            let tasks = stmt
                .query_map([], task_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, StoreError>(tasks)
        })
        .await?
    }
}

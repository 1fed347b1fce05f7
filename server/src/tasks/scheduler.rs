//! One-shot deadline timers, cancelable by task id.
//!
//! Each schedule spawns a task that sleeps until the absolute deadline,
//! re-reads the task from the store, and hands it to the notification
//! bridge. The timer fires at most once; there is no retry.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::db::DbPool;
use crate::store::TaskStore;
use crate::tasks::notify;
use crate::ws::registry::SessionRegistry;

#[derive(Clone, Default)]
pub struct DeadlineScheduler {
    jobs: Arc<DashMap<String, JoinHandle<()>>>,
}

impl DeadlineScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a deadline notification for `task_id` at `deadline`.
    /// Re-scheduling the same id replaces the earlier timer. A deadline
    /// already in the past fires immediately.
    pub fn schedule_fire_at(
        &self,
        task_id: String,
        deadline: DateTime<Utc>,
        db: DbPool,
        sessions: SessionRegistry,
    ) {
        if let Some((_, old)) = self.jobs.remove(&task_id) {
            old.abort();
        }

        let jobs = Arc::clone(&self.jobs);
        let id = task_id.clone();
        let handle = tokio::spawn(async move {
            let wait = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
            jobs.remove(&id);

            // Re-read at fire time: the task may have been completed or
            // removed since it was scheduled.
            let tasks = TaskStore::new(db);
            match tasks.find_by_id(&id).await {
                Ok(Some(task)) => {
                    tracing::info!(task_id = %id, "Triggering deadline notification");
                    notify::send_deadline_notification(&sessions, &task);
                }
                Ok(None) => {
                    tracing::warn!(task_id = %id, "Task not found when deadline fired");
                }
                Err(e) => {
                    tracing::error!(task_id = %id, error = %e, "Failed to load task for deadline");
                }
            }
        });

        self.jobs.insert(task_id.clone(), handle);
        tracing::info!(task_id = %task_id, deadline = %deadline, "Scheduled deadline notification");
    }

    /// Cancel a pending timer. Unknown or already-fired ids are a no-op.
    pub fn cancel(&self, task_id: &str) {
        if let Some((_, handle)) = self.jobs.remove(task_id) {
            handle.abort();
            tracing::info!(task_id = %task_id, "Cancelled scheduled notification");
        }
    }

    /// Number of timers currently pending.
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }
}

//! Deadline notification bridge.
//!
//! Fire-and-forget: notifications go only to currently-registered users.
//! There is no backlog store for notifications; an offline recipient
//! simply never receives it.

use chrono::Utc;

use crate::db::models::Task;
use crate::ws::protocol::ServerFrame;
use crate::ws::registry::SessionRegistry;
use crate::ws::send_frame;

/// Route a fired deadline to the task's assignee and, if different, its
/// assigner, each with their own wording.
pub fn send_deadline_notification(sessions: &SessionRegistry, task: &Task) {
    let assignee = task.assignee.as_deref().filter(|a| !a.is_empty());
    let assigned_by = task.assigned_by.as_deref().filter(|a| !a.is_empty());

    if let Some(assignee_name) = assignee {
        let frame = notification_frame(
            task,
            format!("Task '{}' has reached its deadline!", task.task_title),
        );
        deliver(sessions, assignee_name, frame);
    }

    if let Some(assigner) = assigned_by {
        if assignee != Some(assigner) {
            let frame = notification_frame(
                task,
                format!(
                    "Task '{}' assigned to {} has reached its deadline!",
                    task.task_title,
                    assignee.unwrap_or("someone")
                ),
            );
            deliver(sessions, assigner, frame);
        }
    }
}

fn notification_frame(task: &Task, message: String) -> ServerFrame {
    ServerFrame::DeadlineNotification {
        task_id: task.id.clone(),
        task_title: task.task_title.clone(),
        assignee: task.assignee.clone(),
        assigned_by: task.assigned_by.clone(),
        deadline: task.deadline.to_rfc3339(),
        message,
        timestamp: Utc::now().to_rfc3339(),
    }
}

fn deliver(sessions: &SessionRegistry, username: &str, frame: ServerFrame) {
    match sessions.lookup(username) {
        Some(tx) => {
            if send_frame(&tx, &frame) {
                tracing::info!(username = %username, "Sent deadline notification");
            }
        }
        None => {
            tracing::warn!(username = %username, "User not connected, dropping deadline notification");
        }
    }
}

//! Wire protocol: JSON text frames tagged by `type`, decoded once into an
//! enum and matched exhaustively. Malformed or unknown frames produce an
//! `error` frame back to the sender only; the connection always survives.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::chat::{delivery, presence};
use crate::db::models::{ChatMessage, Task};
use crate::state::AppState;
use crate::store::{TaskStore, UserStore};
use crate::ws::{send_frame, SessionSender};

/// Inbound frames. Every frame except `register` requires a bound username.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Register {
        username: String,
    },
    #[serde(rename_all = "camelCase")]
    SendMessage {
        recipient: String,
        content: String,
        #[serde(default)]
        temp_id: Option<String>,
    },
    GetMessages,
    Presence {
        online: bool,
    },
    #[serde(rename_all = "camelCase")]
    MessageAck {
        message_id: i64,
    },
    GetPendingTasks,
    /// Catch-all for unrecognized `type` tags.
    #[serde(other)]
    Unknown,
}

/// Outbound frames.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    RegistrationSuccess {
        username: String,
    },
    NewMessage(MessagePayload),
    #[serde(rename_all = "camelCase")]
    MessageSent {
        temp_id: Option<String>,
        message_id: i64,
        delivered: bool,
    },
    MessagesHistory {
        messages: Vec<MessagePayload>,
    },
    #[serde(rename_all = "camelCase")]
    UserPresence {
        username: String,
        online: bool,
        last_seen: i64,
    },
    PendingTasks {
        tasks: Vec<TaskPayload>,
    },
    #[serde(rename_all = "camelCase")]
    DeadlineNotification {
        task_id: String,
        task_title: String,
        assignee: Option<String>,
        assigned_by: Option<String>,
        deadline: String,
        message: String,
        timestamp: String,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagePayload {
    pub id: i64,
    pub sender: String,
    pub recipient: String,
    pub content: String,
    pub timestamp: String,
}

impl MessagePayload {
    pub fn from_message(msg: &ChatMessage) -> Self {
        Self {
            id: msg.id,
            sender: msg.sender.clone(),
            recipient: msg.recipient.clone(),
            content: msg.content.clone(),
            timestamp: msg.timestamp.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPayload {
    pub id: String,
    pub task_title: String,
    pub deadline: String,
    pub assigned_by: Option<String>,
    pub status: String,
}

impl TaskPayload {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            task_title: task.task_title.clone(),
            deadline: task.deadline.to_rfc3339(),
            assigned_by: task.assigned_by.clone(),
            status: task.status.as_str().to_string(),
        }
    }
}

/// Handle one inbound text frame. `registered` is the connection's bound
/// username; it transitions from None to Some exactly once, on the first
/// successful register frame.
pub async fn handle_text_frame(
    text: &str,
    tx: &SessionSender,
    state: &AppState,
    registered: &mut Option<String>,
) {
    let frame = match serde_json::from_str::<ClientFrame>(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(username = ?registered, error = %e, "Failed to parse inbound frame");
            send_error(tx, &format!("Error processing message: {e}"));
            return;
        }
    };

    match frame {
        ClientFrame::Register { username } => {
            if registered.is_some() {
                send_error(tx, "Already registered");
            } else {
                handle_register(username, tx, state, registered).await;
            }
        }
        ClientFrame::Unknown => send_error(tx, "Unknown message type"),
        action => {
            // Action frames are only legal after registration.
            let Some(username) = registered.clone() else {
                send_error(tx, "Not registered");
                return;
            };

            match action {
                ClientFrame::SendMessage {
                    recipient,
                    content,
                    temp_id,
                } => {
                    delivery::send_chat_message(state, &username, recipient, content, temp_id, tx)
                        .await
                }
                ClientFrame::GetMessages => delivery::send_history(state, &username, tx).await,
                ClientFrame::Presence { online } => {
                    presence::update_presence(state, &username, online).await
                }
                ClientFrame::MessageAck { message_id } => {
                    delivery::ack_message(state, message_id).await
                }
                ClientFrame::GetPendingTasks => handle_get_pending_tasks(&username, tx, state).await,
                // Handled by the outer match.
                ClientFrame::Register { .. } | ClientFrame::Unknown => {}
            }
        }
    }
}

/// Bind the session, persist the online flag, confirm, replay the backlog,
/// then announce presence to everyone else.
async fn handle_register(
    username: String,
    tx: &SessionSender,
    state: &AppState,
    registered: &mut Option<String>,
) {
    state.sessions.register(&username, tx.clone());
    *registered = Some(username.clone());

    // Persist online flag before any presence broadcast goes out.
    let now = Utc::now().timestamp_millis();
    let users = UserStore::new(state.db.clone());
    if let Err(e) = users.set_online_presence(&username, true, now).await {
        tracing::error!(username = %username, error = %e, "Failed to persist online presence");
    }

    send_frame(
        tx,
        &ServerFrame::RegistrationSuccess {
            username: username.clone(),
        },
    );

    // Replay before the presence announcement so the client has its full
    // backlog before peers start addressing it live.
    delivery::replay_backlog(state, &username, tx).await;

    presence::broadcast_user_presence(&state.sessions, &username, true, now);

    tracing::info!(username = %username, "User registered");
}

async fn handle_get_pending_tasks(username: &str, tx: &SessionSender, state: &AppState) {
    let tasks = TaskStore::new(state.db.clone());
    match tasks.find_pending_by_assignee(username).await {
        Ok(pending) => {
            send_frame(
                tx,
                &ServerFrame::PendingTasks {
                    tasks: pending.iter().map(TaskPayload::from_task).collect(),
                },
            );
        }
        Err(e) => {
            tracing::error!(username = %username, error = %e, "Failed to load pending tasks");
            send_error(tx, "Error processing message: could not load pending tasks");
        }
    }
}

/// Send an error frame to this session only.
pub fn send_error(tx: &SessionSender, message: &str) {
    send_frame(
        tx,
        &ServerFrame::Error {
            message: message.to_string(),
        },
    );
}

//! Delivery engine: decides per message whether to push live or mark
//! pending, replays the backlog on registration, and prunes rows on
//! client acknowledgement.

use chrono::Utc;

use crate::state::AppState;
use crate::store::{MessageStore, NewChatMessage};
use crate::ws::protocol::{MessagePayload, ServerFrame};
use crate::ws::{send_frame, SessionSender};

/// Process a send_message frame from `sender`.
///
/// Persists first, pushes second: a crash between the two leaves a
/// correctly-flagged row rather than a delivered flag with no durable
/// backing. Liveness is checked once, at persist time; a recipient that
/// disconnects between the check and the push loses the live copy (known
/// accepted gap: the row is then flagged delivered with no fallback).
pub async fn send_chat_message(
    state: &AppState,
    sender: &str,
    recipient: String,
    content: String,
    temp_id: Option<String>,
    tx: &SessionSender,
) {
    let messages = MessageStore::new(state.db.clone());
    let delivered = state.sessions.is_registered(&recipient);

    let saved = match messages
        .save(NewChatMessage {
            sender: sender.to_string(),
            recipient: recipient.clone(),
            content,
            timestamp: Utc::now(),
            delivered,
        })
        .await
    {
        Ok(saved) => saved,
        Err(e) => {
            tracing::error!(sender = %sender, recipient = %recipient, error = %e, "Failed to persist message");
            send_frame(
                tx,
                &ServerFrame::Error {
                    message: "Error processing message: message could not be stored".to_string(),
                },
            );
            return;
        }
    };

    if delivered {
        if let Some(recipient_tx) = state.sessions.lookup(&recipient) {
            send_frame(
                &recipient_tx,
                &ServerFrame::NewMessage(MessagePayload::from_message(&saved)),
            );
        }
    }

    // The sender always gets a confirmation carrying the store-assigned id,
    // its own temp id for reconciliation, and the delivered flag.
    send_frame(
        tx,
        &ServerFrame::MessageSent {
            temp_id,
            message_id: saved.id,
            delivered,
        },
    );
}

/// Replay all undelivered messages for `username`, oldest first, each as an
/// individual new_message frame. Flags are not touched here: only an
/// explicit ack clears a row, so a client that re-registers before acking
/// sees the same ids again and must de-duplicate by id.
pub async fn replay_backlog(state: &AppState, username: &str, tx: &SessionSender) {
    let messages = MessageStore::new(state.db.clone());
    match messages.find_undelivered_for_recipient(username).await {
        Ok(backlog) => {
            let count = backlog.len();
            for msg in &backlog {
                send_frame(tx, &ServerFrame::NewMessage(MessagePayload::from_message(msg)));
            }
            if count > 0 {
                tracing::info!(username = %username, count, "Replayed undelivered backlog");
            }
        }
        Err(e) => {
            tracing::error!(username = %username, error = %e, "Failed to load undelivered backlog");
        }
    }
}

/// Full history snapshot for a get_messages frame. Read-only.
pub async fn send_history(state: &AppState, username: &str, tx: &SessionSender) {
    let messages = MessageStore::new(state.db.clone());
    match messages.find_all_for_recipient(username).await {
        Ok(all) => {
            send_frame(
                tx,
                &ServerFrame::MessagesHistory {
                    messages: all.iter().map(MessagePayload::from_message).collect(),
                },
            );
        }
        Err(e) => {
            tracing::error!(username = %username, error = %e, "Failed to load message history");
            send_frame(
                tx,
                &ServerFrame::Error {
                    message: "Error processing message: could not load messages".to_string(),
                },
            );
        }
    }
}

/// Hard-delete an acknowledged message. Acking an id that is already gone
/// is a silent no-op.
pub async fn ack_message(state: &AppState, message_id: i64) {
    let messages = MessageStore::new(state.db.clone());
    match messages.delete_by_id(message_id).await {
        Ok(true) => tracing::info!(message_id, "Deleted message after ack"),
        Ok(false) => tracing::debug!(message_id, "Ack for unknown message id, ignoring"),
        Err(e) => tracing::error!(message_id, error = %e, "Failed to delete acked message"),
    }
}

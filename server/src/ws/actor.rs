use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::chat::presence;
use crate::state::AppState;
use crate::store::UserStore;
use crate::ws::{protocol, SessionSender};

/// Ping interval: server sends a WebSocket ping every 30 seconds to detect
/// connections dropped without a close frame.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for a WebSocket.
///
/// Splits the socket into reader and writer halves:
/// - Writer task: owns the sink, forwards frames from an mpsc channel
/// - Reader loop: processes incoming frames, dispatches to the protocol layer
///
/// The mpsc channel allows any part of the system (direct delivery,
/// broadcast, replay, deadline notifications) to push frames to this client
/// by cloning the sender; the writer task serializes the socket writes.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Username bound by the first successful register frame. Connections
    // start unregistered and may transition to registered exactly once.
    let mut registered: Option<String> = None;

    tracing::info!("WebSocket connection established");

    // Spawn writer task: forwards mpsc frames to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages one at a time
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_frame(&text, &tx, &state, &mut registered).await;
                }
                Message::Binary(_) => {
                    tracing::debug!(
                        username = ?registered,
                        "Ignoring binary frame (protocol is JSON text)"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(username = ?registered, reason = ?frame, "Client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(username = ?registered, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                tracing::info!(username = ?registered, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks, then tear down the session.
    // The reader loop above is the connection's single exit path (close
    // frame, transport error and EOF all land here), so cleanup runs once.
    writer_handle.abort();
    ping_handle.abort();

    if let Some(username) = registered {
        cleanup_session(&state, &username, &tx).await;
    }

    tracing::info!("WebSocket connection closed");
}

/// Deregister, mark offline, broadcast the offline presence event.
///
/// Skipped entirely when this connection was already replaced by a newer
/// registration for the same name: the successor owns the mapping now and
/// a stale close must not tear it down or flip the user offline.
async fn cleanup_session(state: &AppState, username: &str, tx: &SessionSender) {
    if !state.sessions.deregister_if_current(username, tx) {
        tracing::debug!(
            username = %username,
            "Stale connection closed, newer session stays registered"
        );
        return;
    }

    let now = chrono::Utc::now().timestamp_millis();
    let users = UserStore::new(state.db.clone());
    if let Err(e) = users.set_online_presence(username, false, now).await {
        tracing::error!(username = %username, error = %e, "Failed to persist offline presence");
    }

    presence::broadcast_user_presence(&state.sessions, username, false, now);

    tracing::info!(username = %username, "Session deregistered");
}

/// Writer task: receives frames from the mpsc channel and forwards them to
/// the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}

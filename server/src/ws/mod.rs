pub mod actor;
pub mod handler;
pub mod protocol;
pub mod registry;

use axum::extract::ws::Message;
use tokio::sync::mpsc;

use crate::ws::protocol::ServerFrame;

/// Type alias for the sender half of a session's outbound channel.
/// Other parts of the system can clone this to push frames to a specific client.
pub type SessionSender = mpsc::UnboundedSender<Message>;

/// Serialize a frame and enqueue it on a session's outbound channel.
///
/// Each enqueue is one complete text frame; the per-connection writer task
/// owns the socket, so concurrent producers never interleave partial
/// payloads. Enqueueing never blocks; returns false once the session's
/// channel has closed (further sends are no-ops).
pub fn send_frame(tx: &SessionSender, frame: &ServerFrame) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => tx.send(Message::Text(json.into())).is_ok(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize outbound frame");
            false
        }
    }
}

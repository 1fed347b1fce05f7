//! Presence persistence and fan-out.
//!
//! Best-effort and eventually consistent: there is no ack or retry on the
//! broadcast. A missed event self-heals on the next presence change or
//! reconnection.

use chrono::Utc;

use crate::state::AppState;
use crate::store::UserStore;
use crate::ws::protocol::ServerFrame;
use crate::ws::registry::SessionRegistry;
use crate::ws::send_frame;

/// Handle an explicit presence frame: persist the flag, then re-broadcast.
/// If persistence fails the broadcast is skipped and peers keep the last
/// state that actually stuck.
pub async fn update_presence(state: &AppState, username: &str, online: bool) {
    let now = Utc::now().timestamp_millis();
    let users = UserStore::new(state.db.clone());
    if let Err(e) = users.set_online_presence(username, online, now).await {
        tracing::error!(username = %username, error = %e, "Failed to persist presence update");
        return;
    }

    broadcast_user_presence(&state.sessions, username, online, now);
}

/// Push a presence event to every registered session except the subject's
/// own.
pub fn broadcast_user_presence(
    sessions: &SessionRegistry,
    username: &str,
    online: bool,
    last_seen: i64,
) {
    let frame = ServerFrame::UserPresence {
        username: username.to_string(),
        online,
        last_seen,
    };

    sessions.for_each_except(username, |_, tx| {
        let _ = send_frame(tx, &frame);
    });
}

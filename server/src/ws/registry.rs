//! Session registry: maps a username to its live outbound channel.
//! Single source of truth for "is this user currently reachable".

use dashmap::DashMap;
use std::sync::Arc;

use crate::ws::SessionSender;

/// Owned, injected registry of live sessions.
///
/// Holds at most one entry per username; a later registration under the
/// same name replaces the earlier one (last register wins). All operations
/// are atomic per key, so callers never observe a half-updated mapping.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, SessionSender>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a username to an outbound channel, replacing any previous
    /// session for that name. The replaced channel is simply dropped from
    /// the map; its connection becomes unreachable for relay pushes.
    pub fn register(&self, username: &str, tx: SessionSender) {
        self.sessions.insert(username.to_string(), tx);
    }

    /// Look up the outbound channel for a user, if one is registered.
    pub fn lookup(&self, username: &str) -> Option<SessionSender> {
        self.sessions.get(username).map(|entry| entry.value().clone())
    }

    /// True if the user currently has a live session.
    pub fn is_registered(&self, username: &str) -> bool {
        self.sessions.contains_key(username)
    }

    /// Remove the user's entry only if it is still bound to `tx`.
    ///
    /// A connection that was replaced by a newer registration must not
    /// deregister its successor when it finally closes. Returns true if
    /// this call removed the entry.
    pub fn deregister_if_current(&self, username: &str, tx: &SessionSender) -> bool {
        self.sessions
            .remove_if(username, |_, current| current.same_channel(tx))
            .is_some()
    }

    /// Invoke `f` with every registered session except `username`'s own.
    pub fn for_each_except(&self, username: &str, mut f: impl FnMut(&str, &SessionSender)) {
        for entry in self.sessions.iter() {
            if entry.key() != username {
                f(entry.key(), entry.value());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

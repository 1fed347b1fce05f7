//! Persistence collaborators consumed by the relay: the message backlog,
//! user presence flags, and read-only task lookups.
//!
//! Each store wraps the shared connection and runs its SQL on the blocking
//! pool. Stores are cheap to construct; handlers build one per call.

pub mod messages;
pub mod tasks;
pub mod users;

pub use messages::{MessageStore, NewChatMessage};
pub use tasks::TaskStore;
pub use users::UserStore;

use crate::db::DbPool;
use crate::tasks::scheduler::DeadlineScheduler;
use crate::ws::registry::SessionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Live user sessions: one outbound channel per registered username
    pub sessions: SessionRegistry,
    /// One-shot deadline timers keyed by task id
    pub scheduler: DeadlineScheduler,
}

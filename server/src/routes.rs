use axum::{routing::get, Router};

use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Build the axum Router. The relay's whole surface is the WebSocket
/// upgrade plus a health probe; history/account REST lives elsewhere.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler::ws_upgrade))
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

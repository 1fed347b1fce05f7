use tokio::net::TcpListener;

use courier_server::config::{generate_config_template, Config};
use courier_server::db;
use courier_server::routes;
use courier_server::state::AppState;
use courier_server::store::TaskStore;
use courier_server::tasks::scheduler::DeadlineScheduler;
use courier_server::ws::registry::SessionRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "courier_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "courier_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Courier server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    let sessions = SessionRegistry::new();
    let scheduler = DeadlineScheduler::new();

    // Re-arm deadline timers for tasks still pending from a previous run.
    // Deadlines that passed while the server was down fire immediately.
    let task_store = TaskStore::new(db.clone());
    let pending = task_store.find_pending().await?;
    for task in &pending {
        scheduler.schedule_fire_at(task.id.clone(), task.deadline, db.clone(), sessions.clone());
    }
    if !pending.is_empty() {
        tracing::info!(count = pending.len(), "Rescheduled pending task deadlines");
    }

    // Build application state and router
    let app_state = AppState {
        db,
        sessions,
        scheduler,
    };
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

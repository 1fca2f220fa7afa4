use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskbridge::routes::router;
use taskbridge::services::SyncScheduler;
use taskbridge::state::AppState;
use taskbridge::todoist::{TodoistApi, TodoistHttpClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "taskbridge=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite://taskbridge.db".to_string());

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let todoist: Arc<dyn TodoistApi> = Arc::new(TodoistHttpClient::new()?);
    let sync_lock = Arc::new(Mutex::new(()));

    let scheduler = SyncScheduler::new(pool.clone(), todoist.clone(), sync_lock.clone());
    tokio::spawn(scheduler.start());

    let state = AppState {
        db: pool,
        todoist,
        sync_lock,
    };
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

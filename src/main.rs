// src/main.rs

use std::sync::Arc;
use std::time::Duration;

use edupaper::config::Config;
use edupaper::error::set_expose_error_details;
use edupaper::routes;
use edupaper::state::AppState;
use edupaper::store::{Notifier, Storage, memory::MemoryStore, postgres::PgStore};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const MAX_CONNECT_RETRIES: u32 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration from environment (.env included)
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    set_expose_error_details(!config.is_production());

    let (store, notifier): (Arc<dyn Storage>, Arc<dyn Notifier>) = if config.uses_memory_store() {
        tracing::warn!("DATABASE_URL=memory: records are lost on restart");
        let store = Arc::new(MemoryStore::new());
        let notifier: Arc<dyn Notifier> = store.clone();
        (store as Arc<dyn Storage>, notifier)
    } else {
        let pool = connect_with_retry(&config.database_url).await?;
        tracing::info!("Database connected...");

        // Run Migrations Automatically
        tracing::info!("Running migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied successfully.");

        let store = Arc::new(PgStore::new(pool));
        let notifier: Arc<dyn Notifier> = store.clone();
        (store as Arc<dyn Storage>, notifier)
    };

    let state = AppState {
        store,
        notifier,
        config: config.clone(),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn connect_with_retry(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) if retry_count >= MAX_CONNECT_RETRIES => {
                tracing::error!("Failed to connect to database after {} retries: {}", retry_count, e);
                return Err(e);
            }
            Err(_) => {
                retry_count += 1;
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

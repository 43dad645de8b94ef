//! Library Server - catalog and circulation REST API

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use library_server::{
    api,
    config::{AppConfig, DatabaseConfig, LoggingConfig, StorageBackend},
    repository::{LibraryStore, MemoryStore, Repository},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    tracing::info!("Starting Library Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        fees_enabled = config.library.fees_enabled,
        approval_gate_enabled = config.library.approval_gate_enabled,
        default_loan_days = config.library.default_loan_days,
        daily_late_fee = config.library.daily_late_fee,
        "Circulation policy"
    );

    let store = connect_store(&config.database).await?;

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState::new(config, store);
    let app = api::create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("library_server={},tower_http=debug", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect_store(database: &DatabaseConfig) -> anyhow::Result<Arc<dyn LibraryStore>> {
    match database.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(database.max_connections)
                .min_connections(database.min_connections)
                .connect(&database.url)
                .await
                .context("Failed to connect to database")?;

            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;

            tracing::info!("Database migrations completed");

            Ok(Arc::new(Repository::new(pool)))
        }
    }
}

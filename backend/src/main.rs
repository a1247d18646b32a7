//! Stock Ledger - Backend Server
//!
//! Multi-warehouse inventory ledger: products in rack/bin locations, every
//! movement recorded, totals reconciled and reorder suggestions kept current.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stock_ledger::{
    config::{LogFormat, StorageBackend},
    create_app,
    services::audit::build_sink,
    store::{LedgerStore, MemoryLedgerStore, PgLedgerStore},
    AppState, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter.clone().into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting Stock Ledger Server");
    tracing::info!("Environment: {}", config.environment);

    let (store, audit): (Arc<dyn LedgerStore>, _) = match config.storage.backend {
        StorageBackend::Postgres => {
            // Create database connection pool
            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(config.database.acquire_timeout_secs))
                .connect(&config.database.url)
                .await?;

            tracing::info!("Database connection established");

            // Run migrations in development or when asked to
            if config.is_development() || config.database.run_migrations {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;
                tracing::info!("Migrations completed");
            }

            let audit = build_sink(config.audit.sink, Some(db_pool.clone()));
            let store = PgLedgerStore::new(db_pool, config.database.statement_timeout_ms);
            (Arc::new(store) as Arc<dyn LedgerStore>, audit)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            let audit = build_sink(config.audit.sink, None);
            (Arc::new(MemoryLedgerStore::new()) as Arc<dyn LedgerStore>, audit)
        }
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    // Create application state
    let state = AppState::new(store, config, audit);

    // Build application
    let app = create_app(state);

    // Start server
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

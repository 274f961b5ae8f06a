//! B2B Ordering Platform - Backend Server
//!
//! Order lifecycle, preparation and store stock API for a supplier and the
//! client stores it delivers to.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use ordering_backend::{
    config::{Config, StorageBackend},
    create_app,
    repository::InMemoryRepository,
    AppState,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // Load configuration
    let config = Config::load()?;

    tracing::info!("Starting B2B Ordering Server");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("Storage backend: {}", config.storage.backend.as_str());

    let state = match config.storage.backend {
        StorageBackend::Postgres => {
            // Create database connection pool
            tracing::info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .acquire_timeout(Duration::from_secs(30))
                .connect(&config.database.url)
                .await?;

            tracing::info!("Database connection established");

            if config.database.run_migrations {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(&db_pool).await?;
                tracing::info!("Migrations completed");
            }

            AppState::with_postgres(db_pool, config.clone())
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            AppState::in_memory(Arc::new(InMemoryRepository::new()), config.clone())
        }
    };

    // Build application
    let app = create_app(state);

    // Start server
    let ip = config.server.host.parse::<std::net::IpAddr>()?;
    let addr = SocketAddr::new(ip, config.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Human-readable logs by default, JSON lines when `ORD_LOG_FORMAT=json`
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ordering_server=debug,ordering_backend=debug,tower_http=debug,sqlx=warn".into());

    let json = std::env::var("ORD_LOG_FORMAT").is_ok_and(|format| format == "json");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

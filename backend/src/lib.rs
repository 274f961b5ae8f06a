//! B2B Ordering Platform - Backend
//!
//! HTTP API over the ordering core: order lifecycle, preparation gap
//! reconciliation, per-store stock ledger and multi-store consolidation.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod repository;
pub mod routes;
pub mod services;

pub use config::Config;

use repository::{InMemoryRepository, PgRepository};
use services::{ConsolidationService, OrderService, StockLedger};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub stock: StockLedger,
    pub consolidation: ConsolidationService,
    /// Set when running on PostgreSQL, for health checks
    pub db: Option<sqlx::PgPool>,
    pub config: Arc<Config>,
}

impl AppState {
    /// State backed by PostgreSQL
    pub fn with_postgres(db: sqlx::PgPool, config: Config) -> Self {
        let repo = Arc::new(PgRepository::new(db.clone()));
        let mut state = Self::from_parts(repo.clone(), repo.clone(), repo, config);
        state.db = Some(db);
        state
    }

    /// State backed by a process-local store
    pub fn in_memory(repo: Arc<InMemoryRepository>, config: Config) -> Self {
        Self::from_parts(repo.clone(), repo.clone(), repo, config)
    }

    fn from_parts(
        orders: Arc<dyn repository::OrderRepository>,
        stock: Arc<dyn repository::StockRepository>,
        catalog: Arc<dyn repository::ProductCatalog>,
        config: Config,
    ) -> Self {
        Self {
            orders: OrderService::new(
                orders,
                config.ordering.vat_rate,
                config.ordering.order_number_prefix.clone(),
            ),
            stock: StockLedger::new(stock.clone()),
            consolidation: ConsolidationService::new(stock, catalog),
            db: None,
            config: Arc::new(config),
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "B2B Ordering Platform API v1.0"
}

//! Route definitions for the B2B Ordering Platform

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        // Protected routes - order lifecycle
        .nest("/orders", order_routes())
        // Protected routes - multi-store stock views
        .nest("/stock", stock_routes())
        // Protected routes - per-store stock ledger
        .nest("/stores", store_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        .merge(protected)
}

/// Order routes (protected)
fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/:id", get(handlers::get_order))
        .route("/:id/lines", put(handlers::update_order_lines))
        .route("/:id/history", get(handlers::get_order_history))
        .route("/:id/submit", post(handlers::submit_order))
        .route("/:id/confirm", post(handlers::confirm_order))
        .route("/:id/cancel", post(handlers::cancel_order))
        .route("/:id/start-preparation", post(handlers::start_preparation))
        .route("/:id/preparation", put(handlers::adjust_preparation))
        .route("/:id/ready", post(handlers::mark_ready))
        .route("/:id/start-delivery", post(handlers::start_delivery))
        .route("/:id/cancel-delivery", post(handlers::cancel_delivery))
        .route("/:id/complete-delivery", post(handlers::complete_delivery))
}

/// Multi-store stock routes (protected)
fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/consolidated", get(handlers::get_consolidated_stock))
        .route("/low", get(handlers::list_low_stock))
}

/// Store stock routes (protected)
fn store_routes() -> Router<AppState> {
    Router::new()
        .route("/:store_id/stock", get(handlers::list_store_stock))
        .route(
            "/:store_id/stock/:product_id",
            get(handlers::get_stock).put(handlers::adjust_stock),
        )
        .route(
            "/:store_id/stock/:product_id/decrement",
            post(handlers::decrement_stock),
        )
        .route("/:store_id/movements", get(handlers::list_movements))
}

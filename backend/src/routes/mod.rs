//! Route definitions for the Kios Stock Ledger

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{config::Config, handlers, middleware::auth_middleware, AppState};

/// Create API routes; protected groups verify tokens with `config.jwt.secret`
pub fn api_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Protected routes - stock-in ledger
        .nest("/stock-in", stock_in_routes(config.clone()))
        // Protected routes - stock-out ledger
        .nest("/stock-out", stock_out_routes(config.clone()))
        // Protected routes - availability dashboard
        .nest("/availability", availability_routes(config))
}

/// Stock-in routes (protected)
fn stock_in_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_stock_in).post(handlers::record_stock_in),
        )
        .route(
            "/:id",
            get(handlers::get_stock_in)
                .put(handlers::edit_stock_in)
                .delete(handlers::delete_stock_in),
        )
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Stock-out routes (protected)
fn stock_out_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_stock_out).post(handlers::record_stock_out),
        )
        .route(
            "/:id",
            get(handlers::get_stock_out)
                .put(handlers::edit_stock_out)
                .delete(handlers::delete_stock_out),
        )
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

/// Availability routes (protected)
fn availability_routes(config: Arc<Config>) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_availability))
        .route("/show", get(handlers::get_availability))
        .route("/ranking", get(handlers::product_ranking))
        .route("/rebuild", post(handlers::rebuild_availability))
        .route_layer(middleware::from_fn_with_state(config, auth_middleware))
}

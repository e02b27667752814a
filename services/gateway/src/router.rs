//! Route table

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{grid, orders, readings, wallet};
use crate::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route(
            "/v1/readings",
            post(readings::submit_reading).get(readings::list_readings),
        )
        .route("/v1/readings/:id", get(readings::get_reading))
        .route("/v1/readings/:id/mint", post(readings::mint_reading))
        .route(
            "/v1/orders",
            post(orders::create_order).get(orders::list_orders),
        )
        .route(
            "/v1/orders/:id",
            get(orders::get_order).delete(orders::cancel_order),
        )
        .route("/v1/trades", get(orders::list_trades))
        .route(
            "/v1/wallet",
            get(wallet::get_balances),
        )
        .route("/v1/wallet/deposit", post(wallet::deposit))
        .route("/v1/grid-status", get(grid::grid_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

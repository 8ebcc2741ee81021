use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::{auth_middleware, metrics_middleware};
use super::{audit, handlers, history, orders, scans};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Routes acting on behalf of an actor
    let authenticated = Router::new()
        .route("/config", get(handlers::get_config))
        .route("/audit", get(audit::query_audit))
        // Orders
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/transitions", post(orders::apply_transition))
        .route("/orders/{id}/allowed-statuses", get(orders::allowed_statuses))
        .route("/orders/{id}/history", get(history::get_history))
        .route("/orders/{id}/courier", post(orders::assign_courier))
        // Scanning stations
        .route("/scans", post(scans::submit_scan))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .merge(authenticated)
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

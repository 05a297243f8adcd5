//! Axum router construction for the movement API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete Axum router.
///
/// The router includes:
/// - `POST /api/planets/{id}/movements/scout`
/// - `POST /api/planets/{id}/movements/attack`
/// - `POST /api/planets/{id}/movements/occupy`
/// - `POST /api/planets/{id}/movements/support`
/// - `POST /api/planets/{id}/movements/transport`
/// - `GET /api/movements/{id}` -- one of the caller's movements
/// - `GET /api/reports` -- the caller's reports
/// - `GET /api/health` -- liveness probe
///
/// CORS allows any origin; the gateway in front of the API is expected
/// to restrict it.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Dispatch
        .route(
            "/api/planets/{id}/movements/scout",
            post(handlers::dispatch_scout),
        )
        .route(
            "/api/planets/{id}/movements/attack",
            post(handlers::dispatch_attack),
        )
        .route(
            "/api/planets/{id}/movements/occupy",
            post(handlers::dispatch_occupy),
        )
        .route(
            "/api/planets/{id}/movements/support",
            post(handlers::dispatch_support),
        )
        .route(
            "/api/planets/{id}/movements/transport",
            post(handlers::dispatch_transport),
        )
        // Reads
        .route("/api/movements/{id}", get(handlers::get_movement))
        .route("/api/reports", get(handlers::list_reports))
        .route("/api/health", get(handlers::health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

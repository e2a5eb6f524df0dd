//! HTTP API server with observability for the clinic saga services.
//!
//! Provides REST endpoints for doctor schedules and prescriptions, the
//! sagas behind them, and an operator view of escalated compensations,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::{AppState, Backends};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/hr/schedules", post(routes::schedules::create))
        .route(
            "/hr/schedules/{id}",
            get(routes::schedules::get).delete(routes::schedules::delete),
        )
        .route(
            "/hr/schedules/{id}/status",
            patch(routes::schedules::update_status),
        )
        .route("/hr/schedules/{id}/cancel", post(routes::schedules::cancel))
        .route(
            "/exams/{exam_id}/prescriptions",
            post(routes::prescriptions::create),
        )
        .route(
            "/exams/{exam_id}/prescription",
            get(routes::prescriptions::get_by_exam),
        )
        .route("/exams/prescriptions/{id}", get(routes::prescriptions::get))
        .route(
            "/exams/prescriptions/{id}/cancel",
            post(routes::prescriptions::cancel),
        )
        .route(
            "/exams/prescriptions/{id}/dispense",
            post(routes::prescriptions::dispense),
        )
        .route("/admin/escalations", get(routes::escalations::list))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state with in-memory stores and services.
pub fn create_default_state() -> Arc<AppState> {
    Arc::new(AppState::new(Backends::in_memory()))
}

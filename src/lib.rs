//! device-stats library exports

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod normalize;
pub mod readings;
pub mod routes;
pub mod state;
pub mod store;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes::{devices, health, metrics};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health and metrics (Kubernetes probes + Prometheus)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(metrics::prometheus_metrics))
        // Device API
        .route("/api/GetDevices", get(devices::get_devices))
        .route("/api/GetDeviceStats", get(devices::get_device_stats))
        .route("/api/GetDeviceHistory", get(devices::get_device_history))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

//! Prometheus metrics endpoint

use axum::{extract::State, http::header, response::IntoResponse};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::AppError;
use crate::state::AppState;

/// Endpoints counted separately in `requests_total`
#[derive(Debug, Clone, Copy)]
pub enum Endpoint {
    Devices,
    DeviceStats,
    DeviceHistory,
}

impl Endpoint {
    fn label(self) -> &'static str {
        match self {
            Endpoint::Devices => "GetDevices",
            Endpoint::DeviceStats => "GetDeviceStats",
            Endpoint::DeviceHistory => "GetDeviceHistory",
        }
    }
}

/// Application metrics for Prometheus
#[derive(Default)]
pub struct Metrics {
    devices_requests: AtomicU64,
    stats_requests: AtomicU64,
    history_requests: AtomicU64,
    /// Requests rejected with 400
    client_errors_total: AtomicU64,
    /// Requests failed with 500
    upstream_errors_total: AtomicU64,
    /// Stats responses that fell back to the all-default summary
    stats_fallbacks_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_requests(&self, endpoint: Endpoint) {
        let counter = match endpoint {
            Endpoint::Devices => &self.devices_requests,
            Endpoint::DeviceStats => &self.stats_requests,
            Endpoint::DeviceHistory => &self.history_requests,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, err: &AppError) {
        let counter = match err {
            AppError::ClientInput(_) => &self.client_errors_total,
            AppError::Upstream(_) => &self.upstream_errors_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stats_fallbacks(&self) {
        self.stats_fallbacks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            devices_requests: self.devices_requests.load(Ordering::Relaxed),
            stats_requests: self.stats_requests.load(Ordering::Relaxed),
            history_requests: self.history_requests.load(Ordering::Relaxed),
            client_errors_total: self.client_errors_total.load(Ordering::Relaxed),
            upstream_errors_total: self.upstream_errors_total.load(Ordering::Relaxed),
            stats_fallbacks_total: self.stats_fallbacks_total.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
pub struct MetricsSnapshot {
    pub devices_requests: u64,
    pub stats_requests: u64,
    pub history_requests: u64,
    pub client_errors_total: u64,
    pub upstream_errors_total: u64,
    pub stats_fallbacks_total: u64,
}

impl MetricsSnapshot {
    /// Render in the Prometheus text exposition format
    pub fn render(&self) -> String {
        let requests = [
            (Endpoint::Devices, self.devices_requests),
            (Endpoint::DeviceStats, self.stats_requests),
            (Endpoint::DeviceHistory, self.history_requests),
        ]
        .iter()
        .map(|(endpoint, count)| {
            format!(
                "device_stats_requests_total{{endpoint=\"{}\"}} {}\n",
                endpoint.label(),
                count
            )
        })
        .collect::<String>();

        format!(
            r#"# HELP device_stats_requests_total Total number of API requests by endpoint
# TYPE device_stats_requests_total counter
{}
# HELP device_stats_client_errors_total Requests rejected for missing parameters
# TYPE device_stats_client_errors_total counter
device_stats_client_errors_total {}

# HELP device_stats_upstream_errors_total Requests failed by the reading store
# TYPE device_stats_upstream_errors_total counter
device_stats_upstream_errors_total {}

# HELP device_stats_stats_fallbacks_total Stats responses for devices without readings
# TYPE device_stats_stats_fallbacks_total counter
device_stats_stats_fallbacks_total {}

# HELP device_stats_info Build information
# TYPE device_stats_info gauge
device_stats_info{{version="{}"}} 1
"#,
            requests,
            self.client_errors_total,
            self.upstream_errors_total,
            self.stats_fallbacks_total,
            env!("CARGO_PKG_VERSION"),
        )
    }
}

/// GET /metrics
///
/// Returns Prometheus-format metrics
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.metrics.get_metrics().render(),
    )
}

//! Application state shared across handlers

use std::sync::Arc;

use crate::routes::metrics::Metrics;
use crate::store::DocumentStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Reading store client, created once per process
    pub store: Arc<dyn DocumentStore>,
    /// Application metrics for Prometheus
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            metrics: Arc::new(Metrics::new()),
        }
    }
}

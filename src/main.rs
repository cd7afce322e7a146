//! device-stats - per-device sensor statistics API

use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use device_stats::config::{Config, LogFormat};
use device_stats::db::Database;
use device_stats::state::AppState;

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "device_stats=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;
    init_tracing(config.log_format);

    let db = Database::connect_lazy(&config.database).context("Failed to set up database pool")?;
    let state = AppState::new(Arc::new(db));
    let app = device_stats::router(state);

    info!(
        "device-stats v{} starting on {}",
        env!("CARGO_PKG_VERSION"),
        config.listen_addr
    );
    info!(
        "Database: {}",
        config.database.url.split('@').last().unwrap_or("***")
    );

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

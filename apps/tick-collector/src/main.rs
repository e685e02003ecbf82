//! Tick Collector Binary
//!
//! Subscribes to the Coinbase `matches` channel and records every trade in
//! SQLite until SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin tick-collector
//! ```
//!
//! # Environment Variables
//!
//! All optional.
//!
//! ## Feed
//! - `FEED_URL`: WebSocket endpoint (default: wss://ws-feed.exchange.coinbase.com)
//! - `FEED_CHANNEL`: channel name (default: matches)
//! - `FEED_PRODUCT_ID`: product (default: ETH-USDT)
//!
//! ## Storage
//! - `TICK_DB_PATH`: SQLite file (default: coinbase_ethusdt.db)
//! - `TICK_DB_BUSY_TIMEOUT_MS`: lock wait (default: 5000)
//!
//! ## Connection
//! - `TICK_COLLECTOR_HEARTBEAT_INTERVAL_SECS` (default: 30)
//! - `TICK_COLLECTOR_HEARTBEAT_TIMEOUT_SECS` (default: 90)
//! - `TICK_COLLECTOR_RECONNECT_DELAY_INITIAL_MS` (default: 1000)
//! - `TICK_COLLECTOR_RECONNECT_DELAY_MAX_SECS` (default: 60)
//! - `TICK_COLLECTOR_RECONNECT_DELAY_MULTIPLIER` (default: 2.0)
//! - `TICK_COLLECTOR_RECONNECT_JITTER` (default: 0.1)
//! - `TICK_COLLECTOR_MAX_RECONNECT_ATTEMPTS`: 0 = unlimited (default: 0)
//!
//! ## Process
//! - `TICK_COLLECTOR_BUFFER_CAPACITY` (default: 10000)
//! - `TICK_COLLECTOR_ENQUEUE_TIMEOUT_MS` (default: 250)
//! - `TICK_COLLECTOR_METRICS_PORT`: Prometheus port, 0 = disabled (default: 0)
//! - `TICK_COLLECTOR_SHUTDOWN_TIMEOUT_SECS` (default: 10)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: tick-collector)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use tick_collector::infrastructure::telemetry;
use tick_collector::{
    CollectorConfig, ProcessSupervisor, SqliteTradeStore, TradeStore, WebSocketConnector,
    init_metrics,
};
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Another crate may have installed a provider already.
    let _ = rustls::crypto::ring::default_provider().install_default();

    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting Tick Collector");

    let config = CollectorConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    if config.server.metrics_port != 0 {
        let addr = init_metrics(config.server.metrics_port)
            .context("failed to start Prometheus exporter")?;
        tracing::info!(%addr, "Metrics endpoint listening");
    }

    let store = Arc::new(
        SqliteTradeStore::open(&config.database)
            .await
            .with_context(|| format!("failed to open {}", config.database.path.display()))?,
    );
    store
        .initialize()
        .await
        .context("failed to initialize tick_data schema")?;

    let handle = ProcessSupervisor::start(
        &config,
        store.clone(),
        Arc::new(WebSocketConnector::new()),
    );
    let stopped = handle.cancellation_token();

    tokio::select! {
        () = await_shutdown() => {}
        () = stopped.cancelled() => {
            tracing::warn!("Connection supervisor stopped on its own");
        }
    }

    let report = handle.shutdown(config.server.shutdown_timeout).await;
    store.close().await;
    let report = report.context("shutdown did not complete cleanly")?;

    tracing::info!("Tick collector stopped");

    if let Some(e) = report.supervisor_error {
        return Err(e).context("connection supervisor gave up");
    }
    Ok(())
}

/// Load the nearest .env file; `dotenvy` searches the current directory and
/// its ancestors.
fn load_dotenv() {
    let _ = dotenvy::dotenv();
}

/// Log the parsed configuration.
fn log_config(config: &CollectorConfig) {
    tracing::info!(
        url = %config.feed.url,
        channel = %config.feed.channel,
        product_id = %config.feed.product_id,
        db_path = %config.database.path.display(),
        metrics_port = config.server.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        heartbeat_interval_secs = config.websocket.heartbeat_interval.as_secs(),
        heartbeat_timeout_secs = config.websocket.heartbeat_timeout.as_secs(),
        reconnect_delay_initial_ms = config.websocket.reconnect_delay_initial.as_millis(),
        reconnect_delay_max_secs = config.websocket.reconnect_delay_max.as_secs(),
        max_reconnect_attempts = config.websocket.max_reconnect_attempts,
        buffer_capacity = config.pipeline.buffer_capacity,
        "Connection settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}

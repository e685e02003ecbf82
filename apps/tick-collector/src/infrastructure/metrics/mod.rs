//! Prometheus Metrics Module
//!
//! Exposes collector metrics in Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Feed**: messages received, trades decoded, decode errors
//! - **Connection**: supervisor state, reconnect attempts
//! - **Storage**: trades persisted by outcome, storage errors, dropped trades,
//!   insert latency
//!
//! # Integration
//!
//! Metrics are served at `/metrics` on `TICK_COLLECTOR_METRICS_PORT` when the
//! port is non-zero. Without an installed recorder every call is a no-op.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::application::ports::InsertOutcome;
use crate::domain::subscription::ConnectionState;

// =============================================================================
// Exporter
// =============================================================================

static LISTEN_ADDR: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus recorder and its HTTP listener on `port`.
///
/// Must be called from within a Tokio runtime. Subsequent calls are no-ops
/// returning the address bound by the first.
///
/// # Errors
///
/// Returns an error if the recorder or listener cannot be installed.
pub fn init_metrics(port: u16) -> Result<SocketAddr, BuildError> {
    if let Some(addr) = LISTEN_ADDR.get() {
        return Ok(*addr);
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();

    Ok(*LISTEN_ADDR.get_or_init(|| addr))
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Feed counters
    describe_counter!(
        "tick_collector_messages_received_total",
        "Total text messages received from the feed"
    );
    describe_counter!(
        "tick_collector_trades_decoded_total",
        "Total trade executions decoded"
    );
    describe_counter!(
        "tick_collector_decode_errors_total",
        "Total feed messages dropped as undecodable"
    );

    // Connection
    describe_gauge!(
        "tick_collector_connection_state",
        "Connection supervisor state (0=disconnected .. 5=shutting_down)"
    );
    describe_counter!(
        "tick_collector_reconnects_total",
        "Total transitions into backoff"
    );

    // Storage
    describe_counter!(
        "tick_collector_trades_persisted_total",
        "Trades handled by the store, by outcome"
    );
    describe_counter!(
        "tick_collector_storage_errors_total",
        "Total failed trade inserts"
    );
    describe_counter!(
        "tick_collector_trades_dropped_total",
        "Trades dropped because the ingestion queue stayed full"
    );
    describe_histogram!(
        "tick_collector_insert_duration_seconds",
        "Time to insert one trade"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

const fn outcome_label(outcome: InsertOutcome) -> &'static str {
    match outcome {
        InsertOutcome::Inserted => "inserted",
        InsertOutcome::Duplicate => "duplicate",
    }
}

/// Record a text message received from the feed.
pub fn record_message_received() {
    counter!("tick_collector_messages_received_total").increment(1);
}

/// Record a decoded trade execution.
pub fn record_trade_decoded() {
    counter!("tick_collector_trades_decoded_total").increment(1);
}

/// Record an undecodable feed message.
pub fn record_decode_error() {
    counter!("tick_collector_decode_errors_total").increment(1);
}

/// Publish the connection state.
pub fn set_connection_state(state: ConnectionState) {
    gauge!("tick_collector_connection_state").set(state.as_gauge());
}

/// Record a transition into backoff.
pub fn record_reconnect() {
    counter!("tick_collector_reconnects_total").increment(1);
}

/// Record a completed insert.
pub fn record_trade_persisted(outcome: InsertOutcome) {
    counter!(
        "tick_collector_trades_persisted_total",
        "outcome" => outcome_label(outcome)
    )
    .increment(1);
}

/// Record a failed insert.
pub fn record_storage_error() {
    counter!("tick_collector_storage_errors_total").increment(1);
}

/// Record a trade dropped on a full queue.
pub fn record_trade_dropped() {
    counter!("tick_collector_trades_dropped_total").increment(1);
}

/// Record insert latency.
pub fn record_insert_duration(duration: Duration) {
    histogram!("tick_collector_insert_duration_seconds").record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

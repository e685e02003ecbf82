#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Tick Collector - Trade Feed Ingestion
//!
//! A long-running service that holds a subscription to the Coinbase Exchange
//! `matches` channel and records every trade execution exactly once in a
//! local SQLite table, surviving network interruptions indefinitely.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core data types with no I/O
//!   - `trade`: the validated trade execution record
//!   - `subscription`: the feed subscription and its connection state machine
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Interfaces for the feed transport and the trade store
//!   - `services`: Bounded ingestion pipeline with a single writer
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `coinbase`: Codec, WebSocket transport, connection supervisor
//!   - `persistence`: SQLite and in-memory trade stores
//!   - `config`: Environment configuration
//!   - `runtime`: Startup and bounded shutdown
//!   - `metrics` / `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//! Coinbase WS ──► codec ──► TradeSink ──► [bounded queue] ──► writer ──► tick_data
//!                   │
//!                   └─ decode errors logged and dropped
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::subscription::{ConnectionState, InvalidTransition, Subscription};
pub use domain::trade::{Side, TradeError, TradeEvent};

// Ports
pub use application::ports::{
    FeedConnection, FeedConnector, FeedFrame, InsertOutcome, StorageError, StoredTrade,
    TradeStore, TransportError,
};

// Ingestion pipeline
pub use application::services::{
    IngestionPipeline, PipelineReport, PipelineSettings, PipelineStats, SubmitError, TradeSink,
};

// Infrastructure config
pub use infrastructure::config::{
    CollectorConfig, ConfigError, DatabaseSettings, FeedSettings, ServerSettings,
    WebSocketSettings,
};

// Feed adapters
pub use infrastructure::coinbase::{
    ConnectionSupervisor, DecodeError, FeedCodec, FeedMessage, SupervisorConfig, SupervisorError,
    WebSocketConnector,
};

// Stores
pub use infrastructure::persistence::{InMemoryTradeStore, SqliteTradeStore};

// Runtime
pub use infrastructure::runtime::{
    CollectorHandle, ProcessSupervisor, RuntimeError, ShutdownReport,
};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};

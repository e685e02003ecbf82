//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Coinbase WebSocket feed adapters (codec, transport, connection supervisor).
pub mod coinbase;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Trade store adapters (SQLite, in-memory).
pub mod persistence;

/// Process lifecycle: startup and bounded shutdown.
pub mod runtime;

/// OpenTelemetry tracing integration.
pub mod telemetry;

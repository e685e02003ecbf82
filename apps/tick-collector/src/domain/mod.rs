//! Domain Layer - Core collector types and business rules.
//!
//! Pure Rust types with no I/O: the trade record and the feed subscription
//! state machine.

/// Trade execution records.
pub mod trade;

/// Feed subscription and connection state machine.
pub mod subscription;

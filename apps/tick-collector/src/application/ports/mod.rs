//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TradeStore`: durable, idempotent trade persistence
//! - `FeedConnector` / `FeedConnection`: streaming transport to the feed

mod feed_port;
mod trade_store_port;

pub use feed_port::{FeedConnection, FeedConnector, FeedFrame, TransportError};
#[cfg(test)]
pub use trade_store_port::MockTradeStore;
pub use trade_store_port::{InsertOutcome, StorageError, StoredTrade, TradeStore};

//! Trade Store Port (Driven Port)
//!
//! Durable, idempotent persistence of trade executions.

use async_trait::async_trait;

use crate::domain::trade::TradeEvent;

/// Result of a single insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new row was written.
    Inserted,
    /// A row with the same `trade_id` already existed; nothing was written.
    Duplicate,
}

/// A persisted trade row, in storage representation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTrade {
    /// Surrogate key assigned by the store.
    pub id: i64,
    /// Exchange-assigned trade identifier.
    pub trade_id: i64,
    /// Execution price.
    pub price: f64,
    /// Executed quantity.
    pub size: f64,
    /// `buy` or `sell`.
    pub side: String,
    /// Feed timestamp, verbatim.
    pub time: String,
}

/// Storage failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// Could not open or reach the backing store.
    #[error("storage connection error: {0}")]
    Connection(String),

    /// Statement failed (I/O error, disk full, lock contention, ...).
    #[error("storage query error: {0}")]
    Query(String),

    /// Event could not be converted to its storage representation.
    #[error("cannot encode trade {trade_id}: {reason}")]
    Encoding {
        /// Trade that failed to encode.
        trade_id: i64,
        /// What went wrong.
        reason: String,
    },
}

/// Port for the append-only trade store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Ensure the backing schema exists. Safe to call repeatedly.
    async fn initialize(&self) -> Result<(), StorageError>;

    /// Write one trade. A repeated `trade_id` is a no-op reported as
    /// [`InsertOutcome::Duplicate`].
    async fn insert(&self, event: &TradeEvent) -> Result<InsertOutcome, StorageError>;

    /// Look up a trade by its exchange identifier.
    async fn find_by_trade_id(&self, trade_id: i64) -> Result<Option<StoredTrade>, StorageError>;

    /// Number of stored trades.
    async fn count(&self) -> Result<u64, StorageError>;
}

//! Persistence Adapters
//!
//! Implementations of the `TradeStore` port.

mod in_memory;
mod sqlite;

pub use in_memory::InMemoryTradeStore;
pub use sqlite::SqliteTradeStore;

//! In-memory trade store for testing.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::prelude::ToPrimitive;

use crate::application::ports::{InsertOutcome, StorageError, StoredTrade, TradeStore};
use crate::domain::trade::TradeEvent;

/// In-memory implementation of `TradeStore`.
///
/// Same dedup contract as the SQLite store. Suitable for testing and
/// development. Not for production use.
#[derive(Debug, Default)]
pub struct InMemoryTradeStore {
    rows: RwLock<BTreeMap<i64, StoredTrade>>,
}

impl InMemoryTradeStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows in insertion order.
    #[must_use]
    pub fn rows(&self) -> Vec<StoredTrade> {
        let mut rows: Vec<StoredTrade> = self.rows.read().values().cloned().collect();
        rows.sort_by_key(|row| row.id);
        rows
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn initialize(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn insert(&self, event: &TradeEvent) -> Result<InsertOutcome, StorageError> {
        let mut rows = self.rows.write();
        if rows.contains_key(&event.trade_id()) {
            return Ok(InsertOutcome::Duplicate);
        }

        let id = i64::try_from(rows.len()).map_err(|e| StorageError::Query(e.to_string()))? + 1;
        rows.insert(
            event.trade_id(),
            StoredTrade {
                id,
                trade_id: event.trade_id(),
                price: event.price().to_f64().unwrap_or(f64::NAN),
                size: event.size().to_f64().unwrap_or(f64::NAN),
                side: event.side().to_string(),
                time: event.trade_time().to_string(),
            },
        );
        Ok(InsertOutcome::Inserted)
    }

    async fn find_by_trade_id(&self, trade_id: i64) -> Result<Option<StoredTrade>, StorageError> {
        Ok(self.rows.read().get(&trade_id).cloned())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.rows.read().len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::trade::Side;

    fn trade(trade_id: i64) -> TradeEvent {
        TradeEvent::new(trade_id, Decimal::ONE, Decimal::ONE, Side::Sell, "2024-01-01T00:00:00Z")
            .unwrap()
    }

    #[tokio::test]
    async fn dedups_on_trade_id() {
        let store = InMemoryTradeStore::new();

        assert_eq!(store.insert(&trade(9)).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(store.insert(&trade(9)).await.unwrap(), InsertOutcome::Duplicate);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rows_are_in_insertion_order() {
        let store = InMemoryTradeStore::new();
        for id in [3, 1, 2] {
            store.insert(&trade(id)).await.unwrap();
        }

        let ids: Vec<i64> = store.rows().iter().map(|r| r.trade_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(store.find_by_trade_id(1).await.unwrap().unwrap().side, "sell");
    }
}

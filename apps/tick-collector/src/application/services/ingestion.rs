//! Ingestion Pipeline
//!
//! Decouples the network receive loop from storage latency. The receive loop
//! pushes decoded trades into a bounded queue through a [`TradeSink`]; a single
//! [`IngestionPipeline`] writer drains the queue into the [`TradeStore`] in
//! arrival order.
//!
//! ```text
//! receive loop ──submit──► [bounded mpsc] ──recv──► writer ──insert──► TradeStore
//! ```
//!
//! When the queue is full the sink waits up to `enqueue_timeout` and then
//! drops the event, so a slow store can never stall the transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};

use crate::application::ports::{InsertOutcome, TradeStore};
use crate::domain::trade::TradeEvent;
use crate::infrastructure::metrics;

// =============================================================================
// Settings and Stats
// =============================================================================

/// Queue sizing for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Maximum number of trades buffered ahead of the writer.
    pub buffer_capacity: usize,
    /// How long `submit` waits for room before dropping a trade.
    pub enqueue_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: 10_000,
            enqueue_timeout: Duration::from_millis(250),
        }
    }
}

/// Counters shared by the sink and the writer.
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    inserted: AtomicU64,
    duplicates: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl PipelineStats {
    /// Point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> PipelineReport {
        PipelineReport {
            received: self.received.load(Ordering::Relaxed),
            inserted: self.inserted.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Pipeline counters at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Trades handed to the sink.
    pub received: u64,
    /// New rows written.
    pub inserted: u64,
    /// Trades already present in the store.
    pub duplicates: u64,
    /// Trades lost to storage errors.
    pub failed: u64,
    /// Trades dropped because the queue stayed full.
    pub dropped: u64,
}

// =============================================================================
// Sink
// =============================================================================

/// Why a trade was not enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// Queue stayed full past the enqueue timeout; the trade was dropped.
    #[error("ingestion queue full, dropped trade {trade_id}")]
    QueueFull {
        /// The dropped trade.
        trade_id: i64,
    },

    /// The writer is gone.
    #[error("ingestion pipeline closed")]
    Closed,
}

/// Producer handle used by the receive loop.
#[derive(Debug, Clone)]
pub struct TradeSink {
    tx: mpsc::Sender<TradeEvent>,
    enqueue_timeout: Duration,
    stats: Arc<PipelineStats>,
}

impl TradeSink {
    /// Enqueue a trade for persistence, preserving submission order.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::QueueFull`] if the trade was dropped and
    /// [`SubmitError::Closed`] if the writer has stopped.
    pub async fn submit(&self, event: TradeEvent) -> Result<(), SubmitError> {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        let event = match self.tx.try_send(event) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Closed(_)) => return Err(SubmitError::Closed),
            Err(TrySendError::Full(event)) => event,
        };

        tracing::debug!(
            trade_id = event.trade_id(),
            "Ingestion queue full, waiting for writer"
        );

        match self.tx.send_timeout(event, self.enqueue_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(event)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                metrics::record_trade_dropped();
                tracing::warn!(
                    trade_id = event.trade_id(),
                    timeout_ms = self.enqueue_timeout.as_millis(),
                    "Ingestion queue full, trade dropped"
                );
                Err(SubmitError::QueueFull {
                    trade_id: event.trade_id(),
                })
            }
            Err(SendTimeoutError::Closed(_)) => Err(SubmitError::Closed),
        }
    }

    /// Shared pipeline counters.
    #[must_use]
    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Single writer that persists queued trades.
pub struct IngestionPipeline {
    store: Arc<dyn TradeStore>,
    rx: mpsc::Receiver<TradeEvent>,
    stats: Arc<PipelineStats>,
}

/// Create a connected sink/writer pair.
#[must_use]
pub fn channel(
    store: Arc<dyn TradeStore>,
    settings: &PipelineSettings,
) -> (TradeSink, IngestionPipeline) {
    let (tx, rx) = mpsc::channel(settings.buffer_capacity.max(1));
    let stats = Arc::new(PipelineStats::default());

    let sink = TradeSink {
        tx,
        enqueue_timeout: settings.enqueue_timeout,
        stats: Arc::clone(&stats),
    };
    let pipeline = IngestionPipeline { store, rx, stats };

    (sink, pipeline)
}

impl IngestionPipeline {
    /// Persist trades until every [`TradeSink`] is dropped and the queue is
    /// drained.
    pub async fn run(mut self) -> PipelineReport {
        tracing::info!("Ingestion pipeline started");

        while let Some(event) = self.rx.recv().await {
            self.persist(&event).await;
        }

        let report = self.stats.snapshot();
        tracing::info!(
            received = report.received,
            inserted = report.inserted,
            duplicates = report.duplicates,
            failed = report.failed,
            dropped = report.dropped,
            "Ingestion pipeline drained"
        );
        report
    }

    async fn persist(&self, event: &TradeEvent) {
        let started = Instant::now();
        let result = self.store.insert(event).await;
        metrics::record_insert_duration(started.elapsed());

        match result {
            Ok(InsertOutcome::Inserted) => {
                self.stats.inserted.fetch_add(1, Ordering::Relaxed);
                metrics::record_trade_persisted(InsertOutcome::Inserted);
                tracing::debug!(
                    trade_id = event.trade_id(),
                    price = %event.price(),
                    size = %event.size(),
                    side = %event.side(),
                    time = event.trade_time(),
                    "Trade stored"
                );
            }
            Ok(InsertOutcome::Duplicate) => {
                self.stats.duplicates.fetch_add(1, Ordering::Relaxed);
                metrics::record_trade_persisted(InsertOutcome::Duplicate);
                tracing::debug!(trade_id = event.trade_id(), "Duplicate trade ignored");
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                metrics::record_storage_error();
                tracing::error!(
                    trade_id = event.trade_id(),
                    error = %e,
                    "Failed to persist trade, event dropped"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MockTradeStore, StorageError};
    use crate::domain::trade::Side;
    use crate::infrastructure::persistence::InMemoryTradeStore;
    use rust_decimal::Decimal;

    fn trade(trade_id: i64) -> TradeEvent {
        TradeEvent::new(
            trade_id,
            Decimal::new(350_025, 2),
            Decimal::new(5, 1),
            Side::Buy,
            "2024-01-01T00:00:00Z",
        )
        .unwrap()
    }

    fn settings(capacity: usize) -> PipelineSettings {
        PipelineSettings {
            buffer_capacity: capacity,
            enqueue_timeout: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn persists_in_arrival_order() {
        let store = Arc::new(InMemoryTradeStore::new());
        let (sink, pipeline) = channel(store.clone(), &settings(16));

        for id in [30, 10, 20] {
            sink.submit(trade(id)).await.unwrap();
        }
        drop(sink);

        let report = pipeline.run().await;
        assert_eq!(report.inserted, 3);

        let first = store.find_by_trade_id(30).await.unwrap().unwrap();
        let second = store.find_by_trade_id(10).await.unwrap().unwrap();
        let third = store.find_by_trade_id(20).await.unwrap().unwrap();
        assert!(first.id < second.id);
        assert!(second.id < third.id);
    }

    #[tokio::test]
    async fn duplicates_are_counted_not_failed() {
        let store = Arc::new(InMemoryTradeStore::new());
        let (sink, pipeline) = channel(store.clone(), &settings(16));

        sink.submit(trade(101)).await.unwrap();
        sink.submit(trade(101)).await.unwrap();
        drop(sink);

        let report = pipeline.run().await;
        assert_eq!(report.received, 2);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn storage_error_does_not_stop_processing() {
        let mut store = MockTradeStore::new();
        store
            .expect_insert()
            .withf(|event| event.trade_id() == 2)
            .times(1)
            .returning(|_| Err(StorageError::Query("disk I/O error".to_string())));
        store
            .expect_insert()
            .withf(|event| event.trade_id() != 2)
            .times(2)
            .returning(|_| Ok(InsertOutcome::Inserted));

        let (sink, pipeline) = channel(Arc::new(store), &settings(16));
        for id in 1..=3 {
            sink.submit(trade(id)).await.unwrap();
        }
        drop(sink);

        let report = pipeline.run().await;
        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn full_queue_drops_after_timeout() {
        let store = Arc::new(InMemoryTradeStore::new());
        let (sink, _pipeline) = channel(store, &settings(1));

        sink.submit(trade(1)).await.unwrap();
        let err = sink.submit(trade(2)).await.unwrap_err();

        assert_eq!(err, SubmitError::QueueFull { trade_id: 2 });
        let stats = sink.stats().snapshot();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.dropped, 1);
    }

    #[tokio::test]
    async fn full_queue_waits_for_writer() {
        let store = Arc::new(InMemoryTradeStore::new());
        let (sink, pipeline) = channel(
            store.clone(),
            &PipelineSettings {
                buffer_capacity: 1,
                enqueue_timeout: Duration::from_secs(5),
            },
        );

        let writer = tokio::spawn(pipeline.run());
        for id in 1..=50 {
            sink.submit(trade(id)).await.unwrap();
        }
        drop(sink);

        let report = writer.await.unwrap();
        assert_eq!(report.inserted, 50);
        assert_eq!(report.dropped, 0);
    }

    #[tokio::test]
    async fn submit_after_writer_stops_is_closed() {
        let store = Arc::new(InMemoryTradeStore::new());
        let (sink, pipeline) = channel(store, &settings(4));
        drop(pipeline);

        assert_eq!(sink.submit(trade(1)).await, Err(SubmitError::Closed));
    }
}

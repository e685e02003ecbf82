//! Process Supervisor
//!
//! Starts the ingestion writer and the connection supervisor as background
//! tasks and tears them down in order within a bounded time:
//!
//! 1. cancel the token, so the supervisor closes its transport and exits
//! 2. the supervisor drops the last `TradeSink`
//! 3. the writer drains the queue and returns its report
//!
//! If the supervisor exits on its own (reconnect budget exhausted) it cancels
//! the shared token too, so whoever waits on
//! [`CollectorHandle::cancellation_token`] wakes up.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{FeedConnector, TradeStore};
use crate::application::services::ingestion;
use crate::application::services::{PipelineReport, PipelineStats};
use crate::domain::subscription::{ConnectionState, Subscription};
use crate::infrastructure::coinbase::{ConnectionSupervisor, SupervisorConfig, SupervisorError};
use crate::infrastructure::config::CollectorConfig;

/// Shutdown failures.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Tasks were still running when the budget ran out; they were aborted.
    #[error("shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),

    /// A background task panicked.
    #[error("{0} task panicked")]
    TaskPanicked(&'static str),
}

/// Outcome of a completed shutdown.
#[derive(Debug)]
pub struct ShutdownReport {
    /// Final pipeline counters.
    pub pipeline: PipelineReport,
    /// Why the supervisor stopped, if not by cancellation.
    pub supervisor_error: Option<SupervisorError>,
}

/// Entry point for starting the collector.
pub struct ProcessSupervisor;

impl ProcessSupervisor {
    /// Spawn the writer and the connection supervisor.
    ///
    /// The store must already be initialized. Must be called from within a
    /// Tokio runtime.
    #[must_use]
    pub fn start(
        config: &CollectorConfig,
        store: Arc<dyn TradeStore>,
        connector: Arc<dyn FeedConnector>,
    ) -> CollectorHandle {
        let cancel = CancellationToken::new();
        let (sink, pipeline) = ingestion::channel(store, &config.pipeline);
        let stats = sink.stats();

        let subscription = Subscription::new(
            config.feed.url.clone(),
            config.feed.channel.clone(),
            config.feed.product_id.clone(),
        );
        let supervisor = ConnectionSupervisor::new(
            subscription,
            connector,
            sink,
            SupervisorConfig::from_websocket_settings(&config.websocket),
            cancel.clone(),
        );
        let state = supervisor.state();

        let writer = tokio::spawn(pipeline.run());
        let exit_token = cancel.clone();
        let supervisor = tokio::spawn(async move {
            let result = supervisor.run().await;
            exit_token.cancel();
            result
        });

        tracing::info!(
            endpoint = %config.feed.url,
            product_id = %config.feed.product_id,
            "Collector started"
        );

        CollectorHandle {
            cancel,
            state,
            stats,
            supervisor,
            writer,
        }
    }
}

/// Handle to a running collector.
pub struct CollectorHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ConnectionState>,
    stats: Arc<PipelineStats>,
    supervisor: JoinHandle<Result<(), SupervisorError>>,
    writer: JoinHandle<PipelineReport>,
}

impl CollectorHandle {
    /// Watch the connection state.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Current pipeline counters.
    #[must_use]
    pub fn stats(&self) -> PipelineReport {
        self.stats.snapshot()
    }

    /// Token cancelled on shutdown or when the supervisor gives up.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the collector within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] if a task panicked or did not finish in time.
    pub async fn shutdown(mut self, timeout: Duration) -> Result<ShutdownReport, RuntimeError> {
        tracing::info!(timeout_ms = timeout.as_millis(), "Shutting down collector");
        self.cancel.cancel();
        let deadline = Instant::now() + timeout;

        let supervisor_error = match tokio::time::timeout_at(deadline, &mut self.supervisor).await {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(e))) => Some(e),
            Ok(Err(_)) => {
                self.writer.abort();
                return Err(RuntimeError::TaskPanicked("connection supervisor"));
            }
            Err(_) => {
                tracing::warn!("Connection supervisor did not stop in time, aborting");
                self.supervisor.abort();
                self.writer.abort();
                return Err(RuntimeError::ShutdownTimeout(timeout));
            }
        };

        let pipeline = match tokio::time::timeout_at(deadline, &mut self.writer).await {
            Ok(Ok(report)) => report,
            Ok(Err(_)) => return Err(RuntimeError::TaskPanicked("ingestion writer")),
            Err(_) => {
                tracing::warn!("Ingestion writer did not drain in time, aborting");
                self.writer.abort();
                return Err(RuntimeError::ShutdownTimeout(timeout));
            }
        };

        tracing::info!(
            inserted = pipeline.inserted,
            duplicates = pipeline.duplicates,
            failed = pipeline.failed,
            dropped = pipeline.dropped,
            "Collector stopped"
        );

        Ok(ShutdownReport {
            pipeline,
            supervisor_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::application::ports::{FeedConnection, FeedFrame, TransportError};
    use crate::infrastructure::persistence::InMemoryTradeStore;

    /// Serves a fixed list of frames once, then stays silent.
    struct OneShotConnector {
        frames: parking_lot::Mutex<Option<Vec<String>>>,
    }

    struct Silent {
        frames: std::vec::IntoIter<String>,
    }

    #[async_trait]
    impl FeedConnector for OneShotConnector {
        async fn connect(&self, _endpoint: &str) -> Result<Box<dyn FeedConnection>, TransportError> {
            match self.frames.lock().take() {
                Some(frames) => Ok(Box::new(Silent {
                    frames: frames.into_iter(),
                })),
                None => Err(TransportError::ConnectionFailed("down".to_string())),
            }
        }
    }

    #[async_trait]
    impl FeedConnection for Silent {
        async fn send_text(&mut self, _text: String) -> Result<(), TransportError> {
            Ok(())
        }

        async fn ping(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        async fn next_frame(&mut self) -> Result<Option<FeedFrame>, TransportError> {
            match self.frames.next() {
                Some(text) => Ok(Some(FeedFrame::Text(text))),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn config(max_attempts: u32) -> CollectorConfig {
        let mut config = CollectorConfig::default();
        config.feed.url = "ws://127.0.0.1:1".to_string();
        config.websocket.reconnect_delay_initial = Duration::from_millis(5);
        config.websocket.reconnect_delay_max = Duration::from_millis(20);
        config.websocket.reconnect_jitter = 0.0;
        config.websocket.max_reconnect_attempts = max_attempts;
        config
    }

    fn trade_json(trade_id: i64) -> String {
        format!(
            r#"{{"type":"match","trade_id":{trade_id},"side":"sell","size":"2","price":"10.5","time":"2024-01-01T00:00:00Z"}}"#
        )
    }

    #[tokio::test]
    async fn shutdown_drains_and_reports() {
        let store = Arc::new(InMemoryTradeStore::new());
        let connector = Arc::new(OneShotConnector {
            frames: parking_lot::Mutex::new(Some(vec![trade_json(1), trade_json(2)])),
        });

        let handle = ProcessSupervisor::start(&config(0), store.clone(), connector);
        let mut state = handle.state();
        tokio::time::timeout(
            Duration::from_secs(2),
            state.wait_for(|s| *s == ConnectionState::Receiving),
        )
        .await
        .unwrap()
        .unwrap();

        tokio::time::timeout(Duration::from_secs(2), async {
            while handle.stats().inserted < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let report = handle.shutdown(Duration::from_secs(2)).await.unwrap();
        assert_eq!(report.pipeline.inserted, 2);
        assert!(report.supervisor_error.is_none());
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn exhausted_reconnects_cancel_the_token() {
        let store = Arc::new(InMemoryTradeStore::new());
        let connector = Arc::new(OneShotConnector {
            frames: parking_lot::Mutex::new(None),
        });

        let handle = ProcessSupervisor::start(&config(2), store, connector);
        tokio::time::timeout(
            Duration::from_secs(2),
            handle.cancellation_token().cancelled(),
        )
        .await
        .unwrap();

        let report = handle.shutdown(Duration::from_secs(1)).await.unwrap();
        assert!(matches!(
            report.supervisor_error,
            Some(SupervisorError::MaxReconnectAttemptsExceeded(2))
        ));
    }
}

//! Connection Supervisor
//!
//! Owns one [`Subscription`] and keeps it alive: connect, subscribe, receive,
//! and on any failure back off and reconnect, until cancelled.
//!
//! ```text
//! Disconnected ─► Connecting ─► Subscribed ─► Receiving
//!                     ▲  │           │            │
//!                     │  ▼           ▼            ▼
//!                     └─ BackingOff ◄─────────────┘
//!
//! any state ─(cancel)─► ShuttingDown
//! ```
//!
//! Each pass through `Connecting` is a new epoch. The backoff policy resets
//! once an epoch delivers a subscription ack or a trade. A feed that only
//! rejects the subscription, or sends noise and hangs up, keeps growing its
//! delay and uses up a finite attempt budget.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::codec::{FeedCodec, FeedMessage};
use super::heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatMonitor};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{FeedConnection, FeedConnector, FeedFrame, TransportError};
use crate::application::services::{SubmitError, TradeSink};
use crate::domain::subscription::{ConnectionState, InvalidTransition, Subscription};
use crate::infrastructure::config::WebSocketSettings;
use crate::infrastructure::metrics;

/// Upper bound on the close handshake during shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

// =============================================================================
// Error Type
// =============================================================================

/// Conditions that stop the supervisor for good.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// A finite reconnect budget ran out.
    #[error("maximum reconnection attempts ({0}) exceeded")]
    MaxReconnectAttemptsExceeded(u32),

    /// The state machine was driven along an illegal edge.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// The ingestion writer stopped, so trades have nowhere to go.
    #[error("ingestion pipeline closed")]
    PipelineClosed,
}

// =============================================================================
// Configuration
// =============================================================================

/// Supervisor timing configuration.
#[derive(Debug, Clone, Default)]
pub struct SupervisorConfig {
    /// Backoff between epochs.
    pub reconnect: ReconnectConfig,
    /// Per-epoch liveness checks.
    pub heartbeat: HeartbeatConfig,
}

impl SupervisorConfig {
    /// Create configuration from `WebSocketSettings`.
    #[must_use]
    pub const fn from_websocket_settings(settings: &WebSocketSettings) -> Self {
        Self {
            reconnect: ReconnectConfig::from_websocket_settings(settings),
            heartbeat: HeartbeatConfig::from_websocket_settings(settings),
        }
    }
}

/// How one epoch ended.
enum EpochEnd {
    Cancelled,
    Dropped(TransportError),
}

/// What one text frame did for the epoch.
enum FrameOutcome {
    /// A trade or subscription ack: the feed is serving us.
    Delivered,
    /// Ignored or undecodable.
    Skipped,
    /// The feed rejected this connection.
    Rejected(TransportError),
}

// =============================================================================
// Supervisor
// =============================================================================

/// Keeps one feed subscription alive and forwards its trades to a [`TradeSink`].
pub struct ConnectionSupervisor {
    subscription: Subscription,
    connector: Arc<dyn FeedConnector>,
    codec: FeedCodec,
    sink: TradeSink,
    config: SupervisorConfig,
    cancel: CancellationToken,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionSupervisor {
    /// Create a supervisor for `subscription`.
    #[must_use]
    pub fn new(
        subscription: Subscription,
        connector: Arc<dyn FeedConnector>,
        sink: TradeSink,
        config: SupervisorConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (state_tx, _) = watch::channel(subscription.state());
        Self {
            subscription,
            connector,
            codec: FeedCodec::new(),
            sink,
            config,
            cancel,
            state_tx,
        }
    }

    /// Watch the connection state.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Run until cancelled.
    ///
    /// Consumes the supervisor; dropping it releases its [`TradeSink`] so the
    /// ingestion writer can drain.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError`] if the reconnect budget is exhausted, the
    /// ingestion pipeline is gone, or the state machine is violated.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        tracing::info!(
            endpoint = self.subscription.endpoint(),
            channel = self.subscription.channel(),
            product_id = self.subscription.product_id(),
            "Connection supervisor started"
        );

        let result = self.supervise(&mut policy).await;

        if self.subscription.state() != ConnectionState::ShuttingDown {
            self.transition(ConnectionState::ShuttingDown)?;
        }
        tracing::info!(
            epochs = self.subscription.epoch(),
            "Connection supervisor stopped"
        );
        result
    }

    async fn supervise(&mut self, policy: &mut ReconnectPolicy) -> Result<(), SupervisorError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            self.transition(ConnectionState::Connecting)?;

            let error = match self.run_epoch(policy).await? {
                EpochEnd::Cancelled => return Ok(()),
                EpochEnd::Dropped(error) => error,
            };

            self.transition(ConnectionState::BackingOff)?;
            metrics::record_reconnect();

            let Some(delay) = policy.next_delay() else {
                tracing::error!(
                    error = %error,
                    attempts = policy.attempt_count(),
                    "Giving up on feed connection"
                );
                return Err(SupervisorError::MaxReconnectAttemptsExceeded(
                    policy.attempt_count(),
                ));
            };

            tracing::warn!(
                error = %error,
                attempt = policy.attempt_count(),
                delay_ms = delay.as_millis(),
                epoch = self.subscription.epoch(),
                "Feed connection lost, backing off"
            );

            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::info!("Cancelled during reconnect delay");
                    return Ok(());
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One epoch: connect, subscribe, receive until failure or cancellation.
    async fn run_epoch(&mut self, policy: &mut ReconnectPolicy) -> Result<EpochEnd, SupervisorError> {
        let endpoint = self.subscription.endpoint().to_string();
        tracing::info!(endpoint = %endpoint, epoch = self.subscription.epoch(), "Connecting to feed");

        let connected = tokio::select! {
            () = self.cancel.cancelled() => return Ok(EpochEnd::Cancelled),
            connected = self.connector.connect(&endpoint) => connected,
        };
        let mut connection = match connected {
            Ok(connection) => connection,
            Err(e) => return Ok(EpochEnd::Dropped(e)),
        };

        let request = match self.codec.encode_subscribe(&self.subscription) {
            Ok(request) => request,
            Err(e) => return Ok(EpochEnd::Dropped(TransportError::Protocol(e.to_string()))),
        };
        if let Err(e) = connection.send_text(request).await {
            return Ok(EpochEnd::Dropped(e));
        }
        self.transition(ConnectionState::Subscribed)?;

        let end = self.receive(connection.as_mut(), policy).await;

        match tokio::time::timeout(CLOSE_TIMEOUT, connection.close()).await {
            Ok(Ok(())) => tracing::debug!("Feed connection closed"),
            Ok(Err(e)) => tracing::debug!(error = %e, "Error closing feed connection"),
            Err(_) => tracing::debug!("Timed out closing feed connection"),
        }

        end
    }

    async fn receive(
        &mut self,
        connection: &mut dyn FeedConnection,
        policy: &mut ReconnectPolicy,
    ) -> Result<EpochEnd, SupervisorError> {
        let mut heartbeat = HeartbeatMonitor::new(self.config.heartbeat.clone());
        let mut delivered = false;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Ok(EpochEnd::Cancelled),
                event = heartbeat.next_event() => match event {
                    HeartbeatEvent::SendPing => {
                        if let Err(e) = connection.ping().await {
                            return Ok(EpochEnd::Dropped(e));
                        }
                    }
                    HeartbeatEvent::Timeout(silence) => {
                        return Ok(EpochEnd::Dropped(TransportError::HeartbeatTimeout(silence)));
                    }
                },
                frame = connection.next_frame() => {
                    let frame = match frame {
                        Ok(Some(frame)) => frame,
                        Ok(None) => return Ok(EpochEnd::Dropped(TransportError::Closed)),
                        Err(e) => return Ok(EpochEnd::Dropped(e)),
                    };

                    heartbeat.record_activity();
                    if self.subscription.state() == ConnectionState::Subscribed {
                        self.transition(ConnectionState::Receiving)?;
                    }

                    let outcome = match frame {
                        FeedFrame::Text(text) => self.handle_text(&text).await?,
                        FeedFrame::Heartbeat => FrameOutcome::Skipped,
                    };
                    match outcome {
                        FrameOutcome::Delivered if !delivered => {
                            delivered = true;
                            policy.reset();
                        }
                        FrameOutcome::Delivered | FrameOutcome::Skipped => {}
                        FrameOutcome::Rejected(error) => return Ok(EpochEnd::Dropped(error)),
                    }
                }
            }
        }
    }

    /// Decode and route one text frame.
    async fn handle_text(&self, text: &str) -> Result<FrameOutcome, SupervisorError> {
        metrics::record_message_received();

        match self.codec.decode(text) {
            Ok(FeedMessage::Match(event)) => {
                metrics::record_trade_decoded();
                match self.sink.submit(event).await {
                    Ok(()) | Err(SubmitError::QueueFull { .. }) => Ok(FrameOutcome::Delivered),
                    Err(SubmitError::Closed) => Err(SupervisorError::PipelineClosed),
                }
            }
            Ok(FeedMessage::Subscriptions(ack)) => {
                let channels: Vec<&str> = ack.channels.iter().map(|c| c.name.as_str()).collect();
                tracing::info!(?channels, "Subscription confirmed");
                Ok(FrameOutcome::Delivered)
            }
            Ok(FeedMessage::Error(error)) => {
                tracing::error!(
                    message = %error.message,
                    reason = error.reason.as_deref().unwrap_or_default(),
                    "Feed reported an error"
                );
                Ok(FrameOutcome::Rejected(TransportError::Protocol(
                    error.to_string(),
                )))
            }
            Ok(FeedMessage::Ignored(msg_type)) => {
                tracing::trace!(msg_type = %msg_type, "Ignoring feed message");
                Ok(FrameOutcome::Skipped)
            }
            Err(e) => {
                metrics::record_decode_error();
                tracing::warn!(error = %e, "Dropping undecodable feed message");
                Ok(FrameOutcome::Skipped)
            }
        }
    }

    fn transition(&mut self, next: ConnectionState) -> Result<(), SupervisorError> {
        let from = self.subscription.transition(next)?;
        tracing::info!(
            from = %from,
            to = %next,
            epoch = self.subscription.epoch(),
            product_id = self.subscription.product_id(),
            "Connection state changed"
        );
        metrics::set_connection_state(next);
        self.state_tx.send_replace(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::application::ports::TradeStore;
    use crate::application::services::ingestion::{self, PipelineSettings};
    use crate::infrastructure::persistence::InMemoryTradeStore;

    // -------------------------------------------------------------------------
    // Scripted transport
    // -------------------------------------------------------------------------

    enum Step {
        Frame(FeedFrame),
        Fail(TransportError),
        Close,
    }

    enum Script {
        Refuse,
        Serve(Vec<Step>),
    }

    #[derive(Default)]
    struct Recorder {
        connects: Mutex<Vec<Instant>>,
        sent: Mutex<Vec<String>>,
        pings: AtomicUsize,
    }

    struct ScriptedConnector {
        scripts: Mutex<VecDeque<Script>>,
        recorder: Arc<Recorder>,
    }

    impl ScriptedConnector {
        fn new(scripts: Vec<Script>) -> (Arc<Self>, Arc<Recorder>) {
            let recorder = Arc::new(Recorder::default());
            let connector = Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                recorder: Arc::clone(&recorder),
            });
            (connector, recorder)
        }
    }

    #[async_trait]
    impl FeedConnector for ScriptedConnector {
        async fn connect(&self, _endpoint: &str) -> Result<Box<dyn FeedConnection>, TransportError> {
            self.recorder.connects.lock().push(Instant::now());
            let script = self.scripts.lock().pop_front().unwrap_or(Script::Refuse);
            match script {
                Script::Refuse => Err(TransportError::ConnectionFailed("refused".to_string())),
                Script::Serve(steps) => Ok(Box::new(ScriptedConnection {
                    steps: steps.into(),
                    recorder: Arc::clone(&self.recorder),
                })),
            }
        }
    }

    struct ScriptedConnection {
        steps: VecDeque<Step>,
        recorder: Arc<Recorder>,
    }

    #[async_trait]
    impl FeedConnection for ScriptedConnection {
        async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
            self.recorder.sent.lock().push(text);
            Ok(())
        }

        async fn ping(&mut self) -> Result<(), TransportError> {
            self.recorder.pings.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn next_frame(&mut self) -> Result<Option<FeedFrame>, TransportError> {
            match self.steps.pop_front() {
                Some(Step::Frame(frame)) => Ok(Some(frame)),
                Some(Step::Fail(e)) => Err(e),
                Some(Step::Close) => Ok(None),
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn text(s: &str) -> Step {
        Step::Frame(FeedFrame::Text(s.to_string()))
    }

    fn trade(trade_id: i64) -> Step {
        text(&format!(
            r#"{{"type":"match","trade_id":{trade_id},"side":"buy","size":"0.5","price":"3500.25","product_id":"ETH-USDT","time":"2024-01-01T00:00:00Z"}}"#
        ))
    }

    fn config(initial_ms: u64, max_attempts: u32) -> SupervisorConfig {
        SupervisorConfig {
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(initial_ms),
                max_delay: Duration::from_millis(initial_ms * 4),
                multiplier: 2.0,
                jitter_factor: 0.0,
                max_attempts,
            },
            heartbeat: HeartbeatConfig {
                ping_interval: Duration::from_secs(30),
                timeout: Duration::from_secs(90),
            },
        }
    }

    struct Harness {
        store: Arc<InMemoryTradeStore>,
        cancel: CancellationToken,
        state: watch::Receiver<ConnectionState>,
        supervisor: tokio::task::JoinHandle<Result<(), SupervisorError>>,
        writer: tokio::task::JoinHandle<ingestion::PipelineReport>,
    }

    fn start(connector: Arc<ScriptedConnector>, config: SupervisorConfig) -> Harness {
        let store = Arc::new(InMemoryTradeStore::new());
        let (sink, pipeline) = ingestion::channel(store.clone(), &PipelineSettings::default());
        let cancel = CancellationToken::new();
        let supervisor = ConnectionSupervisor::new(
            Subscription::new("wss://feed.test", "matches", "ETH-USDT"),
            connector,
            sink,
            config,
            cancel.clone(),
        );
        let state = supervisor.state();

        Harness {
            store,
            cancel,
            state,
            supervisor: tokio::spawn(supervisor.run()),
            writer: tokio::spawn(pipeline.run()),
        }
    }

    async fn wait_for_count(store: &InMemoryTradeStore, expected: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.count().await.unwrap() < expected {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("trades were not stored in time");
    }

    async fn stop(harness: Harness) -> (Result<(), SupervisorError>, ingestion::PipelineReport) {
        harness.cancel.cancel();
        let result = tokio::time::timeout(Duration::from_secs(2), harness.supervisor)
            .await
            .expect("supervisor did not stop in time")
            .unwrap();
        let report = harness.writer.await.unwrap();
        (result, report)
    }

    // -------------------------------------------------------------------------
    // Tests
    // -------------------------------------------------------------------------

    #[tokio::test]
    async fn subscribes_and_stores_trades() {
        let (connector, recorder) = ScriptedConnector::new(vec![Script::Serve(vec![
            text(r#"{"type":"subscriptions","channels":[{"name":"matches","product_ids":["ETH-USDT"]}]}"#),
            trade(101),
        ])]);
        let harness = start(connector, config(10, 0));

        wait_for_count(&harness.store, 1).await;
        assert_eq!(*harness.state.borrow(), ConnectionState::Receiving);

        let stored = harness.store.find_by_trade_id(101).await.unwrap().unwrap();
        assert!((stored.price - 3500.25).abs() < 1e-9);
        assert_eq!(stored.side, "buy");
        assert_eq!(
            recorder.sent.lock().as_slice(),
            [r#"{"type":"subscribe","channels":[{"name":"matches","product_ids":["ETH-USDT"]}]}"#]
        );

        let (result, report) = stop(harness).await;
        assert!(result.is_ok());
        assert_eq!(report.inserted, 1);
    }

    #[tokio::test]
    async fn decode_errors_do_not_stop_the_loop() {
        let (connector, recorder) = ScriptedConnector::new(vec![Script::Serve(vec![
            trade(101),
            text("not json"),
            text(r#"{"type":"match","trade_id":102,"side":"buy","size":"1.0","time":"2024-01-01T00:00:01Z"}"#),
            text(r#"{"type":"heartbeat","sequence":9}"#),
            trade(103),
        ])]);
        let harness = start(connector, config(10, 0));

        wait_for_count(&harness.store, 2).await;
        assert!(harness.store.find_by_trade_id(102).await.unwrap().is_none());
        assert!(harness.store.find_by_trade_id(103).await.unwrap().is_some());
        assert_eq!(recorder.connects.lock().len(), 1);

        let (result, _) = stop(harness).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn reconnects_after_close_and_dedups_replay() {
        let (connector, recorder) = ScriptedConnector::new(vec![
            Script::Serve(vec![trade(1), trade(2), Step::Close]),
            Script::Serve(vec![trade(2), trade(3)]),
        ]);
        let harness = start(connector, config(50, 0));

        wait_for_count(&harness.store, 3).await;

        let connects = recorder.connects.lock().clone();
        assert_eq!(connects.len(), 2);
        assert!(connects[1] - connects[0] >= Duration::from_millis(50));
        assert_eq!(recorder.sent.lock().len(), 2, "subscribe must be re-sent");

        let (result, report) = stop(harness).await;
        assert!(result.is_ok());
        assert_eq!(report.inserted, 3);
        assert_eq!(report.duplicates, 1);
    }

    #[tokio::test]
    async fn transport_errors_and_feed_errors_trigger_reconnect() {
        let (connector, recorder) = ScriptedConnector::new(vec![
            Script::Serve(vec![Step::Fail(TransportError::Receive("reset".to_string()))]),
            Script::Refuse,
            Script::Serve(vec![text(
                r#"{"type":"error","message":"Failed to subscribe","reason":"bad product"}"#,
            )]),
            Script::Serve(vec![trade(7)]),
        ]);
        let harness = start(connector, config(10, 0));

        wait_for_count(&harness.store, 1).await;
        assert_eq!(recorder.connects.lock().len(), 4);

        let (result, _) = stop(harness).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let (connector, recorder) = ScriptedConnector::new(Vec::new());
        let harness = start(connector, config(5, 3));

        let result = tokio::time::timeout(Duration::from_secs(2), harness.supervisor)
            .await
            .unwrap()
            .unwrap();

        assert!(matches!(
            result,
            Err(SupervisorError::MaxReconnectAttemptsExceeded(3))
        ));
        assert_eq!(recorder.connects.lock().len(), 4);
        assert_eq!(*harness.state.borrow(), ConnectionState::ShuttingDown);
    }

    fn feed_error() -> Step {
        text(r#"{"type":"error","message":"Failed to subscribe","reason":"ETH-XXX is not a valid product"}"#)
    }

    fn gaps(connects: &[Instant]) -> Vec<Duration> {
        connects.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[tokio::test]
    async fn rejected_subscriptions_back_off_and_give_up() {
        let (connector, recorder) = ScriptedConnector::new(
            (0..6).map(|_| Script::Serve(vec![feed_error()])).collect(),
        );
        let harness = start(connector, config(40, 3));

        let result = tokio::time::timeout(Duration::from_secs(2), harness.supervisor)
            .await
            .expect("supervisor kept retrying a rejecting feed")
            .unwrap();

        assert!(matches!(
            result,
            Err(SupervisorError::MaxReconnectAttemptsExceeded(3))
        ));
        let connects = recorder.connects.lock().clone();
        assert_eq!(connects.len(), 4);

        let gaps = gaps(&connects);
        assert!(gaps[0] >= Duration::from_millis(40), "{gaps:?}");
        assert!(gaps[1] >= Duration::from_millis(80), "{gaps:?}");
        assert!(gaps[2] >= Duration::from_millis(160), "{gaps:?}");
    }

    #[tokio::test]
    async fn noise_before_hangup_does_not_reset_backoff() {
        let heartbeat = || text(r#"{"type":"heartbeat","sequence":1}"#);
        let (connector, recorder) = ScriptedConnector::new(vec![
            Script::Serve(vec![heartbeat(), Step::Close]),
            Script::Serve(vec![text("not json"), Step::Close]),
            Script::Serve(vec![heartbeat(), Step::Close]),
            Script::Serve(vec![trade(5)]),
        ]);
        let harness = start(connector, config(30, 0));

        wait_for_count(&harness.store, 1).await;
        let connects = recorder.connects.lock().clone();
        assert_eq!(connects.len(), 4);

        let gaps = gaps(&connects);
        assert!(gaps[1] >= Duration::from_millis(60), "{gaps:?}");
        assert!(gaps[2] >= Duration::from_millis(120), "{gaps:?}");

        let (result, _) = stop(harness).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn delivered_trade_resets_backoff() {
        let (connector, recorder) = ScriptedConnector::new(vec![
            Script::Serve(vec![feed_error()]),
            Script::Serve(vec![feed_error()]),
            Script::Serve(vec![trade(1), Step::Close]),
            Script::Serve(vec![trade(2)]),
        ]);
        let harness = start(connector, config(60, 0));

        wait_for_count(&harness.store, 2).await;
        let gaps = gaps(&recorder.connects.lock());
        assert!(gaps[1] >= Duration::from_millis(120), "{gaps:?}");
        assert!(gaps[2] < Duration::from_millis(120), "{gaps:?}");

        let (result, _) = stop(harness).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn heartbeat_timeout_forces_reconnect() {
        let (connector, recorder) = ScriptedConnector::new(vec![
            Script::Serve(Vec::new()),
            Script::Serve(vec![trade(11)]),
        ]);
        let mut config = config(10, 0);
        config.heartbeat = HeartbeatConfig {
            ping_interval: Duration::from_millis(20),
            timeout: Duration::from_millis(80),
        };
        let harness = start(connector, config);

        wait_for_count(&harness.store, 1).await;
        assert_eq!(recorder.connects.lock().len(), 2);
        assert!(recorder.pings.load(Ordering::SeqCst) >= 1);

        let (result, _) = stop(harness).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn shutdown_interrupts_backoff() {
        let (connector, _recorder) = ScriptedConnector::new(Vec::new());
        let harness = start(connector, config(10_000, 0));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*harness.state.borrow(), ConnectionState::BackingOff);

        let started = Instant::now();
        let state = harness.state.clone();
        let (result, _) = stop(harness).await;

        assert!(result.is_ok());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(*state.borrow(), ConnectionState::ShuttingDown);
    }

    #[tokio::test]
    async fn shutdown_from_receiving_keeps_committed_trades() {
        let (connector, _recorder) =
            ScriptedConnector::new(vec![Script::Serve(vec![trade(1), trade(2), trade(3)])]);
        let harness = start(connector, config(10, 0));

        wait_for_count(&harness.store, 3).await;
        let store = Arc::clone(&harness.store);
        let (result, report) = stop(harness).await;

        assert!(result.is_ok());
        assert_eq!(report.inserted, 3);
        assert_eq!(store.count().await.unwrap(), 3);
    }
}

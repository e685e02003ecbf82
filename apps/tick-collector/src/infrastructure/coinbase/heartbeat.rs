//! Heartbeat Monitor
//!
//! Tracks connection liveness for one epoch. The supervisor polls
//! [`HeartbeatMonitor::next_event`] alongside the frame stream: it asks for a
//! ping every `ping_interval` and reports a timeout once no inbound traffic
//! has been seen for `timeout`.
//!
//! Any inbound frame counts as activity, so a busy feed never needs pongs.

use std::time::Duration;

use tokio::time::{Instant, sleep_until};

use crate::infrastructure::config::WebSocketSettings;

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between pings.
    pub ping_interval: Duration,
    /// Silence after which the connection is considered dead.
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            timeout: Duration::from_secs(90),
        }
    }
}

impl HeartbeatConfig {
    /// Create configuration from `WebSocketSettings`.
    #[must_use]
    pub const fn from_websocket_settings(settings: &WebSocketSettings) -> Self {
        Self {
            ping_interval: settings.heartbeat_interval,
            timeout: settings.heartbeat_timeout,
        }
    }
}

/// What the supervisor should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Send a ping frame.
    SendPing,
    /// No traffic for the given duration; drop the connection.
    Timeout(Duration),
}

/// Per-connection liveness tracker.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    last_activity: Instant,
    next_ping: Instant,
}

impl HeartbeatMonitor {
    /// Start monitoring a freshly opened connection.
    #[must_use]
    pub fn new(config: HeartbeatConfig) -> Self {
        let now = Instant::now();
        Self {
            next_ping: now + config.ping_interval,
            last_activity: now,
            config,
        }
    }

    /// Record inbound traffic.
    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Time since the last inbound traffic.
    #[must_use]
    pub fn silence(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Wait for the next ping deadline or liveness timeout.
    ///
    /// Cancel safe: state only changes when the future completes.
    pub async fn next_event(&mut self) -> HeartbeatEvent {
        let deadline = self.last_activity + self.config.timeout;

        tokio::select! {
            biased;
            () = sleep_until(deadline) => HeartbeatEvent::Timeout(self.silence()),
            () = sleep_until(self.next_ping) => {
                self.next_ping = Instant::now() + self.config.ping_interval;
                HeartbeatEvent::SendPing
            }
        }
    }
}

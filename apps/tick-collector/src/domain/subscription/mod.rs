//! Feed Subscription State
//!
//! Describes the single logical feed subscription: where to connect, which
//! channel and instrument to subscribe to, and where the connection is in its
//! lifecycle.
//!
//! # State Machine
//!
//! ```text
//! Disconnected ──► Connecting ──► Subscribed ──► Receiving
//!                      ▲              │              │
//!                      │              ▼              ▼
//!                      └──────── BackingOff ◄────────┘
//!
//! (any state) ──► ShuttingDown
//! ```
//!
//! A failed connect goes straight from `Connecting` to `BackingOff`.
//! `ShuttingDown` is terminal.

use std::fmt;

// =============================================================================
// Connection State
// =============================================================================

/// Lifecycle state of the feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// Not connected, no attempt in progress.
    #[default]
    Disconnected,
    /// Transport handshake in progress.
    Connecting,
    /// Subscribe request sent, waiting for the first inbound message.
    Subscribed,
    /// Feed is delivering messages.
    Receiving,
    /// Waiting out the reconnect delay after a fault.
    BackingOff,
    /// Stop requested; terminal.
    ShuttingDown,
}

impl ConnectionState {
    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::{
            BackingOff, Connecting, Disconnected, Receiving, ShuttingDown, Subscribed,
        };

        match (self, next) {
            (ShuttingDown, _) => false,
            (_, ShuttingDown) => true,
            (Disconnected | BackingOff, Connecting)
            | (Connecting, Subscribed | BackingOff)
            | (Subscribed, Receiving | BackingOff)
            | (Receiving, BackingOff) => true,
            _ => false,
        }
    }

    /// Whether the transport is up in this state.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Subscribed | Self::Receiving)
    }

    /// Stable name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribed => "subscribed",
            Self::Receiving => "receiving",
            Self::BackingOff => "backing_off",
            Self::ShuttingDown => "shutting_down",
        }
    }

    /// Numeric code for the connection-state gauge.
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Disconnected => 0.0,
            Self::Connecting => 1.0,
            Self::Subscribed => 2.0,
            Self::Receiving => 3.0,
            Self::BackingOff => 4.0,
            Self::ShuttingDown => 5.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal connection state transition {from} -> {to}")]
pub struct InvalidTransition {
    /// State before the attempted change.
    pub from: ConnectionState,
    /// Requested state.
    pub to: ConnectionState,
}

// =============================================================================
// Subscription
// =============================================================================

/// The single feed subscription owned by a connection supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    endpoint: String,
    channel: String,
    product_id: String,
    state: ConnectionState,
    epoch: u64,
}

impl Subscription {
    /// Create a subscription in the `Disconnected` state.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        channel: impl Into<String>,
        product_id: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            channel: channel.into(),
            product_id: product_id.into(),
            state: ConnectionState::Disconnected,
            epoch: 0,
        }
    }

    /// Feed endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Channel name (e.g. `matches`).
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Instrument identifier (e.g. `ETH-USDT`).
    #[must_use]
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    /// Current connection state.
    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Number of connection attempts started so far.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Move to `next`, returning the previous state.
    ///
    /// Entering `Connecting` starts a new epoch.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] if `next` is not a legal successor.
    pub fn transition(&mut self, next: ConnectionState) -> Result<ConnectionState, InvalidTransition> {
        let from = self.state;
        if !from.can_transition_to(next) {
            return Err(InvalidTransition { from, to: next });
        }

        if next == ConnectionState::Connecting {
            self.epoch += 1;
        }
        self.state = next;
        Ok(from)
    }
}

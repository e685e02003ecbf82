//! Feed Transport Port (Driven Port)
//!
//! Interface for the streaming connection to the trade feed. The connection
//! supervisor only sees text frames and liveness signals; framing, TLS and
//! control frames belong to the adapter.

use async_trait::async_trait;

/// One inbound unit from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFrame {
    /// A text payload for the codec.
    Text(String),
    /// Control traffic (ping/pong) that only proves the link is alive.
    Heartbeat,
}

/// Transport-level failure. Always recoverable by reconnecting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Handshake or TCP/TLS connect failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Writing a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading a frame failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// Peer closed the connection.
    #[error("connection closed by peer")]
    Closed,

    /// No inbound traffic within the heartbeat timeout.
    #[error("no traffic for {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    /// The feed reported a protocol error for this connection.
    #[error("feed error: {0}")]
    Protocol(String),
}

/// An open connection to the feed.
#[async_trait]
pub trait FeedConnection: Send {
    /// Send a text frame.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Send a liveness probe.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Wait for the next frame. `Ok(None)` means the peer closed cleanly.
    async fn next_frame(&mut self) -> Result<Option<FeedFrame>, TransportError>;

    /// Close the connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Factory for feed connections.
#[async_trait]
pub trait FeedConnector: Send + Sync {
    /// Open a connection to `endpoint`.
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn FeedConnection>, TransportError>;
}

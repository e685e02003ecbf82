//! Coinbase Feed Adapters
//!
//! WebSocket client for the Coinbase Exchange trade feed (`matches` channel):
//!
//! - **codec**: JSON decode of inbound messages, subscribe encoding
//! - **transport**: `tokio-tungstenite` connection behind the feed port
//! - **supervisor**: connect/subscribe/receive/backoff state machine

pub mod codec;
pub mod heartbeat;
pub mod messages;
pub mod reconnect;
pub mod supervisor;
pub mod transport;

pub use codec::{CodecError, DecodeError, DecodeErrorKind, FeedCodec, FeedMessage};
pub use heartbeat::{HeartbeatConfig, HeartbeatEvent, HeartbeatMonitor};
pub use messages::{ChannelSpec, FeedErrorMessage, SubscribeRequest, SubscriptionsAck};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use supervisor::{ConnectionSupervisor, SupervisorConfig, SupervisorError};
pub use transport::{WebSocketConnection, WebSocketConnector};

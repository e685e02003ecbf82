//! Coinbase Feed Message Types
//!
//! Wire format types for the Coinbase Exchange WebSocket feed. Every message is
//! a single JSON object with a `type` discriminator.
//!
//! # Message Types
//!
//! ## Outbound
//! - `subscribe`: channel and product selection
//!
//! ## Inbound
//! - `subscriptions`: acknowledgement listing the active channels
//! - `match` / `last_match`: one executed trade
//! - `error`: the feed rejected the request on this connection
//!
//! Everything else (`heartbeat`, `ticker`, ...) is ignored by the codec.
//!
//! # References
//!
//! - [Exchange WebSocket feed](https://docs.cdp.coinbase.com/exchange/docs/websocket-overview)

use serde::{Deserialize, Serialize};

/// Inbound message type for a trade execution.
pub const MATCH_TYPE: &str = "match";

/// Inbound replay of the most recent match, sent right after subscribing.
pub const LAST_MATCH_TYPE: &str = "last_match";

/// Inbound subscription acknowledgement.
pub const SUBSCRIPTIONS_TYPE: &str = "subscriptions";

/// Inbound protocol error.
pub const ERROR_TYPE: &str = "error";

// =============================================================================
// Outbound
// =============================================================================

/// Subscribe request.
///
/// # Wire Format (JSON)
/// ```json
/// {"type":"subscribe","channels":[{"name":"matches","product_ids":["ETH-USDT"]}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeRequest {
    /// Always `subscribe`.
    #[serde(rename = "type")]
    pub msg_type: String,

    /// Requested channels.
    pub channels: Vec<ChannelSpec>,
}

impl SubscribeRequest {
    /// Subscribe to one channel for one product.
    #[must_use]
    pub fn single(channel: impl Into<String>, product_id: impl Into<String>) -> Self {
        Self {
            msg_type: "subscribe".to_string(),
            channels: vec![ChannelSpec {
                name: channel.into(),
                product_ids: vec![product_id.into()],
            }],
        }
    }
}

/// A channel and the products it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSpec {
    /// Channel name, e.g. `matches`.
    pub name: String,

    /// Product identifiers, e.g. `ETH-USDT`.
    #[serde(default)]
    pub product_ids: Vec<String>,
}

// =============================================================================
// Inbound
// =============================================================================

/// Subscription acknowledgement.
///
/// # Wire Format (JSON)
/// ```json
/// {"type":"subscriptions","channels":[{"name":"matches","product_ids":["ETH-USDT"]}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionsAck {
    /// Channels now active on this connection.
    #[serde(default)]
    pub channels: Vec<ChannelSpec>,
}

/// Feed-side error.
///
/// # Wire Format (JSON)
/// ```json
/// {"type":"error","message":"Failed to subscribe","reason":"ETH-XXX is not a valid product"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedErrorMessage {
    /// Short description.
    #[serde(default)]
    pub message: String,

    /// Optional detail.
    #[serde(default)]
    pub reason: Option<String>,
}

impl std::fmt::Display for FeedErrorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

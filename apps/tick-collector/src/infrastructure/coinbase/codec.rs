//! Feed Codec
//!
//! Decodes inbound feed text into [`FeedMessage`] values and encodes the
//! outbound subscribe request.
//!
//! Decoding is a two-step affair: parse a generic JSON object, then dispatch
//! on its `type` field. Only trade executions are fully validated; anything
//! the collector does not care about, including objects with no string
//! `type`, comes back as [`FeedMessage::Ignored`].
//!
//! Numeric fields arrive as strings (`"3500.25"`) on the Coinbase feed. JSON
//! numbers are accepted as well so replayed or hand-written fixtures decode.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::messages::{
    ERROR_TYPE, FeedErrorMessage, LAST_MATCH_TYPE, MATCH_TYPE, SUBSCRIPTIONS_TYPE,
    SubscribeRequest, SubscriptionsAck,
};
use crate::domain::subscription::Subscription;
use crate::domain::trade::{Side, TradeError, TradeEvent};

/// Longest payload excerpt included in error messages.
const PAYLOAD_EXCERPT_CHARS: usize = 200;

// =============================================================================
// Types
// =============================================================================

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedMessage {
    /// A validated trade execution.
    Match(TradeEvent),
    /// Subscription acknowledgement.
    Subscriptions(SubscriptionsAck),
    /// The feed reported an error for this connection.
    Error(FeedErrorMessage),
    /// A JSON object of a type the collector does not consume. Empty when
    /// the object carries no string `type`.
    Ignored(String),
}

/// Why a payload could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeErrorKind {
    /// Not valid JSON.
    #[error("malformed JSON: {0}")]
    Json(String),

    /// Valid JSON, but not an object.
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// A required field is absent or null.
    #[error("missing field `{0}`")]
    MissingField(&'static str),

    /// A numeric field does not hold a number.
    #[error("invalid number in `{field}`: {value}")]
    InvalidNumber {
        /// Offending field.
        field: &'static str,
        /// Raw field value.
        value: String,
    },

    /// `side` is not `buy` or `sell`.
    #[error("invalid side: {0}")]
    InvalidSide(String),

    /// `time` is not a string.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Fields parsed but the trade itself is invalid.
    #[error("invalid trade: {0}")]
    InvalidTrade(#[from] TradeError),

    /// A known message type with an unexpected shape.
    #[error("invalid `{msg_type}` message: {reason}")]
    InvalidShape {
        /// Message type.
        msg_type: String,
        /// Parser detail.
        reason: String,
    },
}

/// A payload that failed to decode, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} (payload: {})", excerpt(.payload))]
pub struct DecodeError {
    payload: String,
    kind: DecodeErrorKind,
}

impl DecodeError {
    fn new(payload: &str, kind: impl Into<DecodeErrorKind>) -> Self {
        Self {
            payload: payload.to_string(),
            kind: kind.into(),
        }
    }

    /// The raw payload that failed.
    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// The failure reason.
    #[must_use]
    pub const fn kind(&self) -> &DecodeErrorKind {
        &self.kind
    }
}

/// Encoding failures.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}

fn excerpt(payload: &str) -> &str {
    match payload.char_indices().nth(PAYLOAD_EXCERPT_CHARS) {
        Some((idx, _)) => &payload[..idx],
        None => payload,
    }
}

// =============================================================================
// Codec
// =============================================================================

/// JSON codec for the Coinbase feed.
#[derive(Debug, Default, Clone)]
pub struct FeedCodec;

impl FeedCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for malformed JSON, a payload that is not an
    /// object, or a trade execution with a missing or invalid field.
    pub fn decode(&self, text: &str) -> Result<FeedMessage, DecodeError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| DecodeError::new(text, DecodeErrorKind::Json(e.to_string())))?;

        let Value::Object(object) = value else {
            return Err(DecodeError::new(text, DecodeErrorKind::NotAnObject));
        };

        let Some(msg_type) = object
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned)
        else {
            return Ok(FeedMessage::Ignored(String::new()));
        };

        match msg_type.as_str() {
            MATCH_TYPE | LAST_MATCH_TYPE => decode_match(&object)
                .map(FeedMessage::Match)
                .map_err(|kind| DecodeError::new(text, kind)),
            SUBSCRIPTIONS_TYPE => decode_shape::<SubscriptionsAck>(&msg_type, object)
                .map(FeedMessage::Subscriptions)
                .map_err(|kind| DecodeError::new(text, kind)),
            ERROR_TYPE => decode_shape::<FeedErrorMessage>(&msg_type, object)
                .map(FeedMessage::Error)
                .map_err(|kind| DecodeError::new(text, kind)),
            _ => Ok(FeedMessage::Ignored(msg_type)),
        }
    }

    /// Encode the subscribe request for `subscription`.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_subscribe(&self, subscription: &Subscription) -> Result<String, CodecError> {
        let request =
            SubscribeRequest::single(subscription.channel(), subscription.product_id());
        Ok(serde_json::to_string(&request)?)
    }
}

fn decode_shape<T: serde::de::DeserializeOwned>(
    msg_type: &str,
    object: Map<String, Value>,
) -> Result<T, DecodeErrorKind> {
    let msg_type = msg_type.to_string();
    serde_json::from_value(Value::Object(object)).map_err(|e| DecodeErrorKind::InvalidShape {
        msg_type,
        reason: e.to_string(),
    })
}

fn decode_match(object: &Map<String, Value>) -> Result<TradeEvent, DecodeErrorKind> {
    let trade_id = trade_id_field(object)?;
    let price = decimal_field(object, "price")?;
    let size = decimal_field(object, "size")?;

    let side = required(object, "side")?;
    let side = side
        .as_str()
        .and_then(|s| Side::from_str(s).ok())
        .ok_or_else(|| DecodeErrorKind::InvalidSide(side.to_string()))?;

    // Stored verbatim; any ISO-8601 form the feed sends is accepted.
    let time = required(object, "time")?;
    let time = time
        .as_str()
        .ok_or_else(|| DecodeErrorKind::InvalidTimestamp(time.to_string()))?;

    Ok(TradeEvent::new(trade_id, price, size, side, time)?)
}

fn required<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Value, DecodeErrorKind> {
    match object.get(field) {
        None | Some(Value::Null) => Err(DecodeErrorKind::MissingField(field)),
        Some(value) => Ok(value),
    }
}

fn trade_id_field(object: &Map<String, Value>) -> Result<i64, DecodeErrorKind> {
    let value = required(object, "trade_id")?;
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| DecodeErrorKind::InvalidNumber {
        field: "trade_id",
        value: value.to_string(),
    })
}

fn decimal_field(
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<Decimal, DecodeErrorKind> {
    let value = required(object, field)?;
    let parsed = match value {
        Value::String(s) => parse_decimal(s.trim()),
        Value::Number(n) => parse_decimal(&n.to_string()),
        _ => None,
    };
    parsed.ok_or_else(|| DecodeErrorKind::InvalidNumber {
        field,
        value: value.to_string(),
    })
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

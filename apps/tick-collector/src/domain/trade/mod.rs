//! Trade Execution Types
//!
//! The unit of record for the collector: one completed trade as reported by
//! the feed. A `TradeEvent` can only be built with every field present and
//! valid, so nothing partial ever reaches the store.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Side
// =============================================================================

/// Aggressor side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Taker bought.
    Buy,
    /// Taker sold.
    Sell,
}

impl Side {
    /// Wire and storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = TradeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            other => Err(TradeError::InvalidSide(other.to_string())),
        }
    }
}

// =============================================================================
// Trade Event
// =============================================================================

/// Validation failures when building a [`TradeEvent`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    /// Price below zero.
    #[error("price must be non-negative, got {0}")]
    NegativePrice(Decimal),

    /// Size below zero.
    #[error("size must be non-negative, got {0}")]
    NegativeSize(Decimal),

    /// Side other than buy/sell.
    #[error("invalid side: {0:?}")]
    InvalidSide(String),

    /// Empty trade timestamp.
    #[error("trade time cannot be empty")]
    EmptyTradeTime,
}

/// One trade execution, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    trade_id: i64,
    price: Decimal,
    size: Decimal,
    side: Side,
    trade_time: String,
}

impl TradeEvent {
    /// Build a validated trade event.
    ///
    /// `trade_time` is kept verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`TradeError`] if price or size is negative or the time is empty.
    pub fn new(
        trade_id: i64,
        price: Decimal,
        size: Decimal,
        side: Side,
        trade_time: impl Into<String>,
    ) -> Result<Self, TradeError> {
        if price.is_sign_negative() && !price.is_zero() {
            return Err(TradeError::NegativePrice(price));
        }
        if size.is_sign_negative() && !size.is_zero() {
            return Err(TradeError::NegativeSize(size));
        }

        let trade_time = trade_time.into();
        if trade_time.trim().is_empty() {
            return Err(TradeError::EmptyTradeTime);
        }

        Ok(Self {
            trade_id,
            price,
            size,
            side,
            trade_time,
        })
    }

    /// Exchange-assigned trade identifier (dedup key).
    #[must_use]
    pub const fn trade_id(&self) -> i64 {
        self.trade_id
    }

    /// Execution price.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    /// Executed quantity.
    #[must_use]
    pub const fn size(&self) -> Decimal {
        self.size
    }

    /// Aggressor side.
    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Feed-supplied timestamp, exactly as received.
    #[must_use]
    pub fn trade_time(&self) -> &str {
        &self.trade_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_round_trips_through_str() {
        assert_eq!("buy".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("sell".parse::<Side>().unwrap(), Side::Sell);
        assert_eq!(Side::Buy.as_str(), "buy");
        assert_eq!(Side::Sell.to_string(), "sell");
    }

    #[test]
    fn side_rejects_unknown_and_uppercase() {
        assert_eq!(
            "BUY".parse::<Side>(),
            Err(TradeError::InvalidSide("BUY".to_string()))
        );
        assert!("hold".parse::<Side>().is_err());
    }

    #[test]
    fn trade_event_keeps_fields() {
        let event = TradeEvent::new(
            101,
            Decimal::new(350_025, 2),
            Decimal::new(5, 1),
            Side::Buy,
            "2024-01-01T00:00:00Z",
        )
        .unwrap();

        assert_eq!(event.trade_id(), 101);
        assert_eq!(event.price(), Decimal::new(350_025, 2));
        assert_eq!(event.size(), Decimal::new(5, 1));
        assert_eq!(event.side(), Side::Buy);
        assert_eq!(event.trade_time(), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn trade_event_allows_zero_values() {
        let event = TradeEvent::new(1, Decimal::ZERO, Decimal::ZERO, Side::Sell, "t").unwrap();
        assert!(event.price().is_zero());
        assert!(event.size().is_zero());
    }

    #[test]
    fn trade_event_rejects_negative_price() {
        let err = TradeEvent::new(1, Decimal::new(-1, 0), Decimal::ONE, Side::Buy, "t").unwrap_err();
        assert_eq!(err, TradeError::NegativePrice(Decimal::new(-1, 0)));
    }

    #[test]
    fn trade_event_rejects_negative_size() {
        let err = TradeEvent::new(1, Decimal::ONE, Decimal::new(-5, 1), Side::Buy, "t").unwrap_err();
        assert_eq!(err, TradeError::NegativeSize(Decimal::new(-5, 1)));
    }

    #[test]
    fn trade_event_rejects_blank_time() {
        let err = TradeEvent::new(1, Decimal::ONE, Decimal::ONE, Side::Buy, "  ").unwrap_err();
        assert_eq!(err, TradeError::EmptyTradeTime);
    }
}

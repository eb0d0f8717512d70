//! Bar type and the candle predicates level detection is built on.

use crate::domain::{Decimal, TimeMs};
use serde::{Deserialize, Serialize};

/// One OHLC bar of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Position in its series, starting at 0.
    pub index: usize,
    /// Bar open time.
    pub open_time: TimeMs,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

/// Candle body direction. Doji candles (close == open) have none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
}

impl Bar {
    pub fn new(
        index: usize,
        open_time: TimeMs,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
    ) -> Self {
        Self {
            index,
            open_time,
            open,
            high,
            low,
            close,
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn direction(&self) -> Option<Direction> {
        if self.is_bullish() {
            Some(Direction::Bullish)
        } else if self.is_bearish() {
            Some(Direction::Bearish)
        } else {
            None
        }
    }

    pub fn body_top(&self) -> Decimal {
        std::cmp::max(self.open, self.close)
    }

    pub fn body_bottom(&self) -> Decimal {
        std::cmp::min(self.open, self.close)
    }

    /// The body strictly straddles `price`.
    pub fn body_crosses(&self, price: Decimal) -> bool {
        (self.open > price && self.close < price) || (self.open < price && self.close > price)
    }

    /// The upper wick reaches `price` while the body stays below it.
    pub fn upper_wick_touches(&self, price: Decimal) -> bool {
        self.body_top() < price && price <= self.high
    }

    /// The lower wick reaches `price` while the body stays above it.
    pub fn lower_wick_touches(&self, price: Decimal) -> bool {
        self.body_bottom() > price && price >= self.low
    }

    /// Any part of the bar, wick or body, reaches `price`.
    pub fn touches(&self, price: Decimal) -> bool {
        self.low <= price && price <= self.high
    }
}

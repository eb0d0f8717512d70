//! Domain types for multi-timeframe level detection.
//!
//! This module provides:
//! - Lossless price handling via the Decimal wrapper
//! - Domain primitives: TimeMs, Timeframe
//! - Bar and its candle predicates (direction, body cross, wick touch)
//! - BarSeries, the index-addressable series with an unconfirmed tail

pub mod bar;
pub mod decimal;
pub mod primitives;
pub mod series;

pub use bar::{Bar, Direction};
pub use decimal::Decimal;
pub use primitives::{TimeMs, Timeframe, TimeframeParseError};
pub use series::{BarSeries, SeriesError, SeriesUpdate};

//! Bar source abstraction for loading per-timeframe price history.

use crate::domain::{Bar, Timeframe};
use async_trait::async_trait;
use std::fmt;

pub mod csv;
pub mod mock;

pub use self::csv::CsvBarSource;
pub use mock::MockBarSource;

/// Supplies the full bar history of a timeframe.
///
/// Bars must come back ordered by index starting at 0, with non-decreasing
/// open times. The last bar may still be forming.
#[async_trait]
pub trait BarSource: Send + Sync + fmt::Debug {
    /// Fetch all bars for `timeframe`.
    async fn fetch_bars(&self, timeframe: Timeframe) -> Result<Vec<Bar>, DataSourceError>;
}

/// Error type for bar source operations.
#[derive(Debug, Clone)]
pub enum DataSourceError {
    /// No data exists for the requested timeframe.
    NotFound(String),
    /// Reading the underlying storage failed.
    Io(String),
    /// Compressed input could not be decoded.
    Decompress(String),
    /// A row could not be turned into a bar.
    ParseError(String),
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NotFound(what) => write!(f, "No bar data: {}", what),
            DataSourceError::Io(msg) => write!(f, "I/O error: {}", msg),
            DataSourceError::Decompress(msg) => write!(f, "Decompress error: {}", msg),
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}

//! Append-only bar series with a single unconfirmed tail bar.

use crate::domain::{Bar, TimeMs, Timeframe};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("{timeframe}: expected bar index {expected} or {tail}, got {got}")]
    OutOfOrder {
        timeframe: Timeframe,
        expected: usize,
        tail: usize,
        got: usize,
    },
    #[error("{timeframe}: bar {index} opens at {open_time} before its predecessor")]
    TimeWentBackwards {
        timeframe: Timeframe,
        index: usize,
        open_time: TimeMs,
    },
}

/// What a call to [`BarSeries::push_or_update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesUpdate {
    /// A new tail bar was appended; `closed` is the index that just became
    /// immutable, if there was a previous tail.
    Appended { closed: Option<usize> },
    /// The forming tail bar was replaced in place.
    TailUpdated,
}

/// Bars of one timeframe, indexed from 0.
///
/// The last bar is treated as still forming until another bar is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarSeries {
    timeframe: Timeframe,
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            bars: Vec::new(),
        }
    }

    /// Build a series from bars in order, validating indices and open times.
    pub fn from_bars(timeframe: Timeframe, bars: Vec<Bar>) -> Result<Self, SeriesError> {
        let mut series = Self::new(timeframe);
        for bar in bars {
            series.push_or_update(bar)?;
        }
        Ok(series)
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Index of the first bar opening at or after `time`, or `len()` if none.
    pub fn first_index_at_or_after(&self, time: TimeMs) -> usize {
        self.bars.partition_point(|bar| bar.open_time < time)
    }

    /// Index of the forming bar.
    pub fn last_index(&self) -> Option<usize> {
        self.bars.len().checked_sub(1)
    }

    /// Index of the newest bar that can no longer change.
    pub fn last_closed_index(&self) -> Option<usize> {
        self.bars.len().checked_sub(2)
    }

    pub fn is_unconfirmed(&self, index: usize) -> bool {
        self.last_index() == Some(index)
    }

    /// Append a new tail bar or replace the forming one.
    ///
    /// `bar.index` must equal `len()` (append) or `len() - 1` (update).
    pub fn push_or_update(&mut self, bar: Bar) -> Result<SeriesUpdate, SeriesError> {
        let len = self.bars.len();
        if bar.index == len {
            if let Some(prev) = self.bars.last() {
                if bar.open_time < prev.open_time {
                    return Err(SeriesError::TimeWentBackwards {
                        timeframe: self.timeframe,
                        index: bar.index,
                        open_time: bar.open_time,
                    });
                }
            }
            self.bars.push(bar);
            return Ok(SeriesUpdate::Appended {
                closed: len.checked_sub(1),
            });
        }

        if len > 0 && bar.index == len - 1 {
            if len >= 2 && bar.open_time < self.bars[len - 2].open_time {
                return Err(SeriesError::TimeWentBackwards {
                    timeframe: self.timeframe,
                    index: bar.index,
                    open_time: bar.open_time,
                });
            }
            self.bars[len - 1] = bar;
            return Ok(SeriesUpdate::TailUpdated);
        }

        Err(SeriesError::OutOfOrder {
            timeframe: self.timeframe,
            expected: len,
            tail: len.saturating_sub(1),
            got: bar.index,
        })
    }
}

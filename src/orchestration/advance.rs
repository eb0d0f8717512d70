//! Single-timeframe advance step.

use crate::domain::{Bar, BarSeries, SeriesError, SeriesUpdate, Timeframe};
use crate::engine::{lookback_floor, select_dominant, DominantLevels, LevelRegistry};
use serde::Serialize;
use tracing::debug;

/// Bars and levels of one timeframe. The registry is only ever written by
/// [`TimeframeState::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeframeState {
    series: BarSeries,
    registry: LevelRegistry,
}

/// Layer-1 output for one timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub timeframe: Timeframe,
    /// Index of the forming bar the selection was made against.
    pub bar_index: usize,
    pub dominant: DominantLevels,
}

impl TimeframeState {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            series: BarSeries::new(timeframe),
            registry: LevelRegistry::new(timeframe),
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.series.timeframe()
    }

    pub fn series(&self) -> &BarSeries {
        &self.series
    }

    pub fn registry(&self) -> &LevelRegistry {
        &self.registry
    }

    /// Feed one bar (a new tail or a revision of the forming one), update the
    /// registry if a bar closed, and re-run Layer 1.
    pub fn apply(&mut self, bar: Bar, lookback: usize) -> Result<Selection, SeriesError> {
        let update = self.series.push_or_update(bar)?;
        if let SeriesUpdate::Appended {
            closed: Some(closed),
        } = update
        {
            if self.registry.on_bar_closed(&self.series, closed) {
                debug!(
                    timeframe = %self.timeframe(),
                    closed,
                    levels = self.registry.len(),
                    "bar closed"
                );
            }
        }
        Ok(self.select(lookback))
    }

    /// Oldest creation index this timeframe's own Layer 1 still needs.
    pub fn retention_floor(&self, lookback: usize) -> usize {
        self.registry
            .last_closed()
            .map_or(0, |closed| LevelRegistry::retention_floor(closed, lookback))
    }

    /// Drop levels created before `floor`. Returns how many were removed.
    pub fn retain_from(&mut self, floor: usize) -> usize {
        self.registry.evict_before(floor)
    }

    /// Layer 1 against the current forming bar.
    pub fn select(&self, lookback: usize) -> Selection {
        let Some(bar_index) = self.series.last_index() else {
            return Selection {
                timeframe: self.timeframe(),
                bar_index: 0,
                dominant: DominantLevels::default(),
            };
        };
        Selection {
            timeframe: self.timeframe(),
            bar_index,
            dominant: select_dominant(
                &self.registry,
                bar_index,
                lookback_floor(bar_index, lookback),
            ),
        }
    }
}

/// Move a standalone `state` forward by one bar, evicting levels past its own
/// retention floor.
///
/// Any driver (tests, batch replay, a live adapter) can call this; on error
/// the input state is dropped and the caller keeps whatever copy it holds.
/// A timeframe that feeds Layer 2 as the finer side of a pair is advanced by
/// [`MtfEngine`](super::MtfEngine) instead, which keeps what the pair needs.
pub fn advance(
    mut state: TimeframeState,
    bar: Bar,
    lookback: usize,
) -> Result<(TimeframeState, Selection), SeriesError> {
    let selection = state.apply(bar, lookback)?;
    let floor = state.retention_floor(lookback);
    state.retain_from(floor);
    Ok((state, selection))
}

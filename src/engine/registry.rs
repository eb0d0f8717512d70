//! Per-timeframe registry of levels keyed by creation bar index.

use super::level::{BreakoutFilter, SrLevel};
use crate::domain::{BarSeries, Timeframe};
use std::collections::BTreeMap;
use tracing::debug;

/// Selection only considers levels created within `lookback * 2` bars.
pub const SELECTION_WINDOW_FACTOR: usize = 2;

/// Levels older than `lookback * 4` bars are dropped from memory.
pub const RETENTION_FACTOR: usize = 4;

/// Oldest creation index still eligible for selection at `current_index`.
pub fn lookback_floor(current_index: usize, lookback: usize) -> usize {
    current_index.saturating_sub(lookback.saturating_mul(SELECTION_WINDOW_FACTOR))
}

/// Levels of one timeframe.
///
/// Iteration is ordered by creation index, which keeps every selection over
/// the registry deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelRegistry {
    timeframe: Timeframe,
    levels: BTreeMap<usize, SrLevel>,
    last_closed: Option<usize>,
}

impl LevelRegistry {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            levels: BTreeMap::new(),
            last_closed: None,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Last bar index fed through [`LevelRegistry::on_bar_closed`].
    pub fn last_closed(&self) -> Option<usize> {
        self.last_closed
    }

    pub fn get(&self, creation_index: usize) -> Option<&SrLevel> {
        self.levels.get(&creation_index)
    }

    pub fn levels(&self) -> impl Iterator<Item = &SrLevel> {
        self.levels.values()
    }

    /// Levels created at or after `floor`.
    pub fn in_window(&self, floor: usize) -> impl Iterator<Item = &SrLevel> {
        self.levels.range(floor..).map(|(_, level)| level)
    }

    /// Insert a level under its creation index, returning any level it replaced.
    pub fn insert(&mut self, level: SrLevel) -> Option<SrLevel> {
        self.levels.insert(level.creation_index(), level)
    }

    /// Process bar `index` of `series` once it has closed.
    ///
    /// Creates the level formed by bars `index - 1` and `index`, then runs the
    /// breakout and rejection checks of every registered level against bar
    /// `index`. Returns false without touching anything when there is no
    /// previous bar, when either bar is missing from the series, or when
    /// `index` was already processed.
    pub fn on_bar_closed(&mut self, series: &BarSeries, index: usize) -> bool {
        if index < 1 {
            return false;
        }
        if self.last_closed.is_some_and(|last| index <= last) {
            debug!(timeframe = %self.timeframe, index, "bar already processed");
            return false;
        }
        let (Some(prev), Some(curr)) = (series.get(index - 1), series.get(index)) else {
            return false;
        };

        let level = SrLevel::create(prev, curr);
        debug!(
            timeframe = %self.timeframe,
            creation_index = level.creation_index(),
            price = %level.price(),
            support = level.is_support(),
            classic = level.is_classic(),
            "level created"
        );
        self.insert(level);

        for level in self.levels.values_mut() {
            level.check_breakout(curr, BreakoutFilter::Any);
            level.check_rejection(curr);
        }
        self.last_closed = Some(index);
        true
    }

    /// Remove levels created before `floor`. Returns how many were removed.
    pub fn evict_before(&mut self, floor: usize) -> usize {
        let kept = self.levels.split_off(&floor);
        let evicted = self.levels.len();
        self.levels = kept;
        if evicted > 0 {
            debug!(timeframe = %self.timeframe, floor, evicted, "levels evicted");
        }
        evicted
    }

    /// Eviction horizon for the given lookback, wider than the selection window.
    pub fn retention_floor(current_index: usize, lookback: usize) -> usize {
        current_index.saturating_sub(lookback.saturating_mul(RETENTION_FACTOR))
    }
}

//! Support/resistance level state machine.
//!
//! A level is born from two consecutive bars and afterwards only ever grows
//! its event logs. Every historical view of a level is derived from those
//! forward-only logs by [`SrLevel::revert_to`]; nothing is undone in place.

use crate::domain::{Bar, Decimal, Direction, TimeMs};
use serde::Serialize;
use std::fmt;

/// Bars after creation during which no event is recorded.
pub const COOLDOWN_BARS: usize = 2;

/// Which side of price a level currently acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Support,
    Resistance,
}

impl Polarity {
    pub fn flipped(self) -> Self {
        match self {
            Polarity::Support => Polarity::Resistance,
            Polarity::Resistance => Polarity::Support,
        }
    }
}

/// Restricts which candles [`SrLevel::check_breakout`] may record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakoutFilter {
    #[default]
    Any,
    Only(Direction),
}

impl BreakoutFilter {
    fn admits(self, bar: &Bar) -> bool {
        match self {
            BreakoutFilter::Any => true,
            BreakoutFilter::Only(direction) => bar.direction() == Some(direction),
        }
    }
}

/// A bar index paired with that bar's open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LevelEvent {
    pub bar_index: usize,
    pub time: TimeMs,
}

impl LevelEvent {
    fn at(bar: &Bar) -> Self {
        Self {
            bar_index: bar.index,
            time: bar.open_time,
        }
    }
}

/// Events of one kind, strictly increasing by bar index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct EventLog(Vec<LevelEvent>);

impl EventLog {
    /// Append an event. Returns false (and records nothing) if the log already
    /// holds an event at or after `event.bar_index`.
    fn push(&mut self, event: LevelEvent) -> bool {
        if self.last_index().is_some_and(|last| last >= event.bar_index) {
            return false;
        }
        self.0.push(event);
        true
    }

    /// Drop events with `after < bar_index <= through`. Returns how many went.
    fn remove_range(&mut self, after: usize, through: usize) -> usize {
        let before = self.0.len();
        self.0
            .retain(|e| e.bar_index <= after || e.bar_index > through);
        before - self.0.len()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LevelEvent> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&LevelEvent> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&LevelEvent> {
        self.0.last()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.0.last().map(|e| e.bar_index)
    }

    pub fn contains_index(&self, bar_index: usize) -> bool {
        self.find(bar_index).is_some()
    }

    pub fn find(&self, bar_index: usize) -> Option<&LevelEvent> {
        self.0
            .binary_search_by_key(&bar_index, |e| e.bar_index)
            .ok()
            .map(|pos| &self.0[pos])
    }

    fn indices(&self) -> String {
        self.0
            .iter()
            .map(|e| e.bar_index.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    fn times(&self) -> String {
        self.0
            .iter()
            .map(|e| e.time.to_utc_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A support/resistance level anchored to the close of the bar that formed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SrLevel {
    creation_index: usize,
    price: Decimal,
    creation_time: TimeMs,
    is_classic: bool,
    polarity: Polarity,
    is_fresh: bool,
    breakouts: EventLog,
    flips: EventLog,
    rejections_up: EventLog,
    rejections_down: EventLog,
}

impl SrLevel {
    /// Form a level at `prev.close` from two consecutive bars.
    ///
    /// The level is support when `curr` closes up, resistance otherwise, and
    /// classic when the two candles point in opposite directions.
    pub fn create(prev: &Bar, curr: &Bar) -> Self {
        let is_classic = (curr.is_bearish() && prev.is_bullish())
            || (curr.is_bullish() && prev.is_bearish());
        let polarity = if curr.is_bullish() {
            Polarity::Support
        } else {
            Polarity::Resistance
        };

        Self {
            creation_index: prev.index,
            price: prev.close,
            creation_time: prev.open_time,
            is_classic,
            polarity,
            is_fresh: true,
            breakouts: EventLog::default(),
            flips: EventLog::default(),
            rejections_up: EventLog::default(),
            rejections_down: EventLog::default(),
        }
    }

    pub fn creation_index(&self) -> usize {
        self.creation_index
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn creation_time(&self) -> TimeMs {
        self.creation_time
    }

    pub fn is_classic(&self) -> bool {
        self.is_classic
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn is_support(&self) -> bool {
        self.polarity == Polarity::Support
    }

    pub fn is_resistance(&self) -> bool {
        self.polarity == Polarity::Resistance
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh
    }

    pub fn breakouts(&self) -> &EventLog {
        &self.breakouts
    }

    pub fn flips(&self) -> &EventLog {
        &self.flips
    }

    pub fn rejections_up(&self) -> &EventLog {
        &self.rejections_up
    }

    pub fn rejections_down(&self) -> &EventLog {
        &self.rejections_down
    }

    /// Events are only recorded once the cool-down after creation has passed.
    pub fn accepts_events_at(&self, bar_index: usize) -> bool {
        bar_index >= self.creation_index + COOLDOWN_BARS
    }

    /// Record a breakout if `bar`'s body crosses the level.
    ///
    /// A bearish break through support or a bullish break through resistance
    /// also records a flip and reverses polarity. When `filter` does not admit
    /// the candle nothing is recorded and false is returned; otherwise the
    /// return value is whether the body crossed, cool-down or not.
    pub fn check_breakout(&mut self, bar: &Bar, filter: BreakoutFilter) -> bool {
        if !filter.admits(bar) {
            return false;
        }
        let crossed = bar.body_crosses(self.price);
        if !crossed || !self.accepts_events_at(bar.index) {
            return crossed;
        }

        let event = LevelEvent::at(bar);
        if !self.breakouts.push(event) {
            return crossed;
        }
        self.is_fresh = true;

        let reverses = matches!(
            (bar.direction(), self.polarity),
            (Some(Direction::Bearish), Polarity::Support)
                | (Some(Direction::Bullish), Polarity::Resistance)
        );
        if reverses {
            self.flips.push(event);
            self.polarity = self.polarity.flipped();
        }
        crossed
    }

    /// Record wick rejections, each side checked independently.
    ///
    /// Returns whether either wick touched, cool-down or not.
    pub fn check_rejection(&mut self, bar: &Bar) -> bool {
        let up = bar.upper_wick_touches(self.price);
        let down = bar.lower_wick_touches(self.price);
        if !self.accepts_events_at(bar.index) {
            return up || down;
        }

        let event = LevelEvent::at(bar);
        if up && self.rejections_up.push(event) {
            self.is_fresh = false;
        }
        if down && self.rejections_down.push(event) {
            self.is_fresh = false;
        }
        up || down
    }

    /// The level as it stood right after bar `target`, seen from `current`.
    ///
    /// Events in `(target, current]` are dropped from an independent copy;
    /// each dropped flip reverses the copy's polarity once. `self` is never
    /// touched, so any number of calls in any order agree with each other.
    pub fn revert_to(&self, target: usize, current: usize) -> SrLevel {
        let mut snapshot = self.clone();
        if target >= current {
            return snapshot;
        }

        let dropped_flips = snapshot.flips.remove_range(target, current);
        let dropped = dropped_flips
            + snapshot.breakouts.remove_range(target, current)
            + snapshot.rejections_up.remove_range(target, current)
            + snapshot.rejections_down.remove_range(target, current);

        if dropped_flips % 2 == 1 {
            snapshot.polarity = snapshot.polarity.flipped();
        }
        if dropped > 0 {
            snapshot.is_fresh = snapshot.freshness_from_log();
        }
        snapshot
    }

    /// Fresh when the most recent remaining event is a breakout, or when no
    /// rejection remains at all.
    fn freshness_from_log(&self) -> bool {
        let last_rejection = std::cmp::max(
            self.rejections_up.last_index(),
            self.rejections_down.last_index(),
        );
        match last_rejection {
            None => true,
            Some(rejection) => self
                .breakouts
                .last_index()
                .is_some_and(|breakout| breakout >= rejection),
        }
    }

    /// Multi-line description joined with `delimiter`.
    pub fn describe(&self, delimiter: &str) -> String {
        let mut parts = vec![
            format!(
                "S/R Type: {}{}",
                if self.is_support() { "Support" } else { "Resistance" },
                if self.is_classic { " (Classic)" } else { "" }
            ),
            format!(
                "created at bar[{}] @{}",
                self.creation_index,
                self.creation_time.to_utc_string()
            ),
            format!("level: {}", self.price),
            format!("isFresh: {}", self.is_fresh),
        ];
        for (name, log) in [
            ("Bo", &self.breakouts),
            ("RejUp", &self.rejections_up),
            ("RejLo", &self.rejections_down),
        ] {
            if !log.is_empty() {
                parts.push(format!("index{}: {}", name, log.indices()));
            }
        }
        for (name, log) in [
            ("Bo", &self.breakouts),
            ("RejUp", &self.rejections_up),
            ("RejLo", &self.rejections_down),
        ] {
            if !log.is_empty() {
                parts.push(format!("time{}: {}", name, log.times()));
            }
        }
        parts.join(delimiter)
    }
}

impl fmt::Display for SrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe("\n"))
    }
}

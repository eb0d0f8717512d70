//! Layer 1: per-timeframe dominant resistance and support.
//!
//! Selection is anchored to the most recent confirmed rejection bar
//! (`main_index`) rather than to the forming bar, so it does not move while
//! the live bar is still printing.

use super::level::SrLevel;
use super::registry::LevelRegistry;
use crate::domain::TimeMs;
use serde::Serialize;

/// Result of dominant-level selection for one timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DominantLevels {
    /// Highest resistance rejected at `main_index`, as it stood then.
    pub resistance: Option<SrLevel>,
    /// Lowest support rejected at `main_index`, as it stood then.
    pub support: Option<SrLevel>,
    /// Anchor bar; 0 when no level has a qualifying rejection.
    pub main_index: usize,
}

impl DominantLevels {
    pub fn is_empty(&self) -> bool {
        self.resistance.is_none() && self.support.is_none()
    }

    /// Time of the up-rejection that made the resistance dominant.
    pub fn resistance_rejection_time(&self) -> Option<TimeMs> {
        self.resistance
            .as_ref()
            .and_then(|level| level.rejections_up().find(self.main_index))
            .map(|event| event.time)
    }

    /// Time of the down-rejection that made the support dominant.
    pub fn support_rejection_time(&self) -> Option<TimeMs> {
        self.support
            .as_ref()
            .and_then(|level| level.rejections_down().find(self.main_index))
            .map(|event| event.time)
    }
}

/// Latest rejection on a level's current side, strictly before `bar_index`.
fn reaction_index(level: &SrLevel, bar_index: usize) -> Option<usize> {
    let last = if level.is_support() {
        level.rejections_down().last_index()
    } else {
        level.rejections_up().last_index()
    };
    last.filter(|&index| index < bar_index)
}

/// Most recent confirmed reaction bar among levels created at or after
/// `lookback_floor`.
pub fn find_main_index(registry: &LevelRegistry, bar_index: usize, lookback_floor: usize) -> usize {
    registry
        .in_window(lookback_floor)
        .filter_map(|level| reaction_index(level, bar_index))
        .max()
        .unwrap_or(0)
}

/// Choose the dominant resistance and support as of the latest reaction bar.
///
/// A level qualifies when, reconstructed at `main_index`, it sits on the
/// matching side and was rejected exactly at `main_index`, and when it was
/// still fresh one bar earlier. Ties on price keep the older level.
pub fn select_dominant(
    registry: &LevelRegistry,
    bar_index: usize,
    lookback_floor: usize,
) -> DominantLevels {
    let main_index = find_main_index(registry, bar_index, lookback_floor);
    // Events are never recorded at index 0 or 1, so nothing can qualify.
    if main_index == 0 {
        return DominantLevels::default();
    }

    let mut resistance: Option<SrLevel> = None;
    let mut support: Option<SrLevel> = None;

    for level in registry.in_window(lookback_floor) {
        let at_main = level.revert_to(main_index, bar_index);
        let before_main = level.revert_to(main_index - 1, bar_index);
        if !before_main.is_fresh() {
            continue;
        }

        if at_main.is_resistance()
            && at_main.rejections_up().last_index() == Some(main_index)
            && resistance
                .as_ref()
                .map_or(true, |best| at_main.price() > best.price())
        {
            resistance = Some(at_main);
        } else if at_main.is_support()
            && at_main.rejections_down().last_index() == Some(main_index)
            && support
                .as_ref()
                .map_or(true, |best| at_main.price() < best.price())
        {
            support = Some(at_main);
        }
    }

    DominantLevels {
        resistance,
        support,
        main_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, Decimal, Timeframe};
    use crate::engine::level::BreakoutFilter;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn bar(index: usize, open: &str, high: &str, low: &str, close: &str) -> Bar {
        Bar::new(
            index,
            TimeMs::new(index as i64 * 1000),
            d(open),
            d(high),
            d(low),
            d(close),
        )
    }

    /// Resistance at `price` created at `index`: bearish candle closing at
    /// `price` followed by another bearish candle.
    fn resistance(index: usize, price: &str) -> SrLevel {
        let p = d(price);
        let above = (p.inner() + rust_decimal::Decimal::ONE).to_string();
        let below = (p.inner() - rust_decimal::Decimal::ONE).to_string();
        SrLevel::create(
            &bar(index, &above, &above, price, price),
            &bar(index + 1, price, price, &below, &below),
        )
    }

    fn up_rejection(index: usize, price: &str) -> Bar {
        let p = d(price).inner();
        let top = (p - rust_decimal::Decimal::ONE).to_string();
        let bottom = (p - rust_decimal::Decimal::TWO).to_string();
        let high = (p + rust_decimal::Decimal::ONE).to_string();
        bar(index, &bottom, &high, &bottom, &top)
    }

    #[test]
    fn test_empty_registry_selects_nothing() {
        let registry = LevelRegistry::new(Timeframe::D1);
        let selection = select_dominant(&registry, 10, 0);
        assert!(selection.is_empty());
        assert_eq!(selection.main_index, 0);
    }

    #[test]
    fn test_highest_resistance_rejected_at_main_wins() {
        let mut registry = LevelRegistry::new(Timeframe::D1);
        let mut low = resistance(2, "100");
        let mut high = resistance(3, "100.5");
        let rejection = bar(8, "99", "101", "98", "99.5");
        low.check_rejection(&rejection);
        high.check_rejection(&rejection);
        registry.insert(low);
        registry.insert(high);

        let selection = select_dominant(&registry, 12, 0);
        assert_eq!(selection.main_index, 8);
        assert_eq!(selection.resistance.as_ref().unwrap().price(), d("100.5"));
        assert!(selection.support.is_none());
        assert_eq!(selection.resistance_rejection_time(), Some(TimeMs::new(8000)));
    }

    #[test]
    fn test_rejection_on_forming_bar_is_ignored() {
        let mut registry = LevelRegistry::new(Timeframe::D1);
        let mut level = resistance(2, "100");
        level.check_rejection(&up_rejection(6, "100"));
        level.check_rejection(&up_rejection(9, "100"));
        registry.insert(level);

        let selection = select_dominant(&registry, 9, 0);
        // Last up-rejection is 9 == bar_index, so no anchor qualifies.
        assert_eq!(selection.main_index, 0);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_level_stale_before_main_is_skipped() {
        let mut registry = LevelRegistry::new(Timeframe::D1);
        let mut level = resistance(2, "100");
        level.check_rejection(&up_rejection(6, "100"));
        level.check_rejection(&up_rejection(8, "100"));
        registry.insert(level);

        let selection = select_dominant(&registry, 12, 0);
        assert_eq!(selection.main_index, 8);
        assert!(selection.resistance.is_none());
    }

    #[test]
    fn test_broken_then_rejected_level_is_fresh_again() {
        let mut registry = LevelRegistry::new(Timeframe::D1);
        let mut level = resistance(2, "100");
        level.check_rejection(&up_rejection(5, "100"));
        // Bearish body cross: stays resistance, becomes fresh again.
        level.check_breakout(&bar(6, "101", "101.5", "98", "99"), BreakoutFilter::Any);
        level.check_rejection(&up_rejection(8, "100"));
        registry.insert(level);

        let selection = select_dominant(&registry, 12, 0);
        assert_eq!(selection.main_index, 8);
        assert_eq!(selection.resistance.unwrap().price(), d("100"));
    }

    #[test]
    fn test_levels_below_floor_are_not_considered() {
        let mut registry = LevelRegistry::new(Timeframe::D1);
        let mut level = resistance(2, "100");
        level.check_rejection(&up_rejection(8, "100"));
        registry.insert(level);

        let selection = select_dominant(&registry, 12, 3);
        assert_eq!(selection.main_index, 0);
        assert!(selection.is_empty());
    }
}

use mtf_sr::engine::{find_main_index, lookback_floor, select_dominant};
use mtf_sr::{advance, Bar, Decimal, LevelRegistry, SrLevel, TimeMs, Timeframe, TimeframeState};

fn bar(index: usize, open: i64, high: i64, low: i64, close: i64) -> Bar {
    Bar::new(
        index,
        TimeMs::new(index as i64 * 14_400_000),
        Decimal::from(open),
        Decimal::from(high),
        Decimal::from(low),
        Decimal::from(close),
    )
}

/// Support at 100 created at bar 10 and rejected by a lower wick at bar 15.
fn support_rejected_at_15() -> SrLevel {
    let mut level = SrLevel::create(&bar(10, 103, 104, 99, 100), &bar(11, 100, 106, 100, 105));
    level.check_rejection(&bar(15, 102, 103, 99, 101));
    level
}

#[test]
fn test_single_rejected_support() {
    let mut registry = LevelRegistry::new(Timeframe::H4);
    registry.insert(support_rejected_at_15());

    let floor = lookback_floor(20, 60);
    assert_eq!(find_main_index(&registry, 20, floor), 15);

    let dominant = select_dominant(&registry, 20, floor);
    assert_eq!(dominant.main_index, 15);
    assert!(dominant.resistance.is_none());
    let support = dominant.support.unwrap();
    assert_eq!(support.price(), Decimal::from(100));
    assert_eq!(support.creation_index(), 10);
}

#[test]
fn test_rejection_on_forming_bar_is_ignored() {
    let mut registry = LevelRegistry::new(Timeframe::H4);
    registry.insert(support_rejected_at_15());

    let dominant = select_dominant(&registry, 15, lookback_floor(15, 60));
    assert_eq!(dominant.main_index, 0);
    assert!(dominant.is_empty());
}

#[test]
fn test_level_outside_window_is_ignored() {
    let mut registry = LevelRegistry::new(Timeframe::H4);
    registry.insert(support_rejected_at_15());

    // Window floor 200 - 2 * 60 = 80 excludes the level created at bar 10.
    let dominant = select_dominant(&registry, 200, lookback_floor(200, 60));
    assert_eq!(dominant.main_index, 0);
    assert!(dominant.support.is_none());
}

#[test]
fn test_lowest_support_wins() {
    let mut registry = LevelRegistry::new(Timeframe::H4);
    registry.insert(support_rejected_at_15());
    // Support at 101 created at bar 12, lower-wick rejection at bar 15.
    let mut higher = SrLevel::create(&bar(12, 104, 105, 100, 101), &bar(13, 101, 107, 101, 106));
    higher.check_rejection(&bar(15, 102, 103, 100, 102));
    assert_eq!(higher.rejections_down().last_index(), Some(15));
    registry.insert(higher);

    let dominant = select_dominant(&registry, 20, lookback_floor(20, 60));
    assert_eq!(dominant.main_index, 15);
    assert_eq!(dominant.support.unwrap().price(), Decimal::from(100));
}

#[test]
fn test_selection_through_advance() {
    // Bar 1 into bar 2 forms support at 100. Bar 5 wicks down to 99 and up
    // to the bar-0 resistance at 105, which bar 6 then breaks and flips.
    // Bar 7 is still forming.
    let bars = vec![
        bar(0, 106, 107, 104, 105),
        bar(1, 105, 106, 99, 100),
        bar(2, 100, 104, 100, 103),
        bar(3, 103, 106, 102, 105),
        bar(4, 105, 107, 104, 106),
        bar(5, 104, 105, 99, 103),
        bar(6, 103, 108, 102, 107),
        bar(7, 107, 109, 106, 108),
    ];
    let mut state = TimeframeState::new(Timeframe::H4);
    let mut last = None;
    for b in bars {
        let (next, selection) = advance(state, b, 60).unwrap();
        state = next;
        last = Some(selection);
    }
    let selection = last.unwrap();
    assert_eq!(selection.bar_index, 7);
    assert_eq!(selection.dominant.main_index, 5);
    let support = selection.dominant.support.unwrap();
    assert_eq!(support.creation_index(), 1);
    assert_eq!(support.price(), Decimal::from(100));
    // Seen as of bar 5, before the flip.
    let resistance = selection.dominant.resistance.unwrap();
    assert_eq!(resistance.creation_index(), 0);
    assert_eq!(resistance.price(), Decimal::from(105));
    assert!(resistance.is_resistance());
    assert!(resistance.breakouts().is_empty());

    let live = state.registry().get(0).unwrap();
    assert!(live.is_support());
    assert_eq!(live.breakouts().last_index(), Some(6));
}

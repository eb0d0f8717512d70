//! Layer 2: cross-timeframe breakout confluence.
//!
//! A dominant level on the higher timeframe defines a time window (its
//! reaction bar). Inside that window the finer timeframe is scanned for the
//! first touch of each dominant level; from each touch the nearest unbroken,
//! classic, opposite-polarity finer level becomes a candidate, and whichever
//! candidate breaks first decides the signal.

use super::dominant::DominantLevels;
use super::level::{BreakoutFilter, Polarity, SrLevel};
use super::registry::{lookback_floor, LevelRegistry};
use crate::domain::{BarSeries, Decimal, Direction, TimeMs};
use serde::Serialize;

/// Higher-timeframe bars after the reaction bar during which a candidate
/// breakout still counts.
pub const CONFIRMATION_HTF_BARS: usize = 2;

/// Directional outcome of a confluence evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Bearish,
    #[default]
    Neutral,
    Bullish,
}

impl Signal {
    /// -1, 0 or +1.
    pub fn as_i8(&self) -> i8 {
        match self {
            Signal::Bearish => -1,
            Signal::Neutral => 0,
            Signal::Bullish => 1,
        }
    }
}

/// How a candidate's breakout is confirmed on the finer timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Confirmation {
    /// Earliest breakout in the candidate's recorded log, any direction.
    #[default]
    Recorded,
    /// Replay finer bars and only accept a bullish break of the resistance
    /// candidate and a bearish break of the support candidate.
    Directional,
}

/// First finer-timeframe bars touching the dominant levels, set once per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FirstTouches {
    pub support: Option<usize>,
    pub resistance: Option<usize>,
}

/// Where a candidate broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakoutHit {
    pub index: usize,
    pub time: TimeMs,
    /// False when the hit is the still-forming finer bar.
    pub confirmed: bool,
}

/// Result of one higher/lower timeframe evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Confluence {
    pub signal: Signal,
    /// Highest unbroken support found from the resistance touch (`HS`).
    pub support: Option<SrLevel>,
    /// Lowest unbroken resistance found from the support touch (`LR`).
    pub resistance: Option<SrLevel>,
    pub time_bos: Option<TimeMs>,
    pub time_bor: Option<TimeMs>,
    pub first_touches: FirstTouches,
}

impl Confluence {
    fn neutral() -> Self {
        Self::default()
    }
}

/// Everything Layer 2 reads.
#[derive(Debug, Clone, Copy)]
pub struct ConfluenceInput<'a> {
    pub dominant: &'a DominantLevels,
    pub higher: &'a BarSeries,
    pub lower: &'a BarSeries,
    pub lower_registry: &'a LevelRegistry,
    pub lookback_bars: usize,
    pub confirmation: Confirmation,
}

#[derive(Debug, Clone)]
struct Candidate {
    level: SrLevel,
    hit: Option<BreakoutHit>,
}

/// Half-open time range; `end == None` is unbounded.
#[derive(Debug, Clone, Copy)]
struct TimeWindow {
    start: TimeMs,
    end: Option<TimeMs>,
}

impl TimeWindow {
    fn contains(&self, time: TimeMs) -> bool {
        time >= self.start && self.end.map_or(true, |end| time < end)
    }

    fn ended_by(&self, time: TimeMs) -> bool {
        self.end.is_some_and(|end| time >= end)
    }
}

/// Oldest finer creation index any evaluation against `higher` can still
/// reach.
///
/// The dominant levels' `main_index` never falls below the higher timeframe's
/// lookback floor, a first touch never opens before that higher bar, and
/// candidates are searched at most `lookback_bars` below the touch. The
/// result never decreases as either series grows.
pub fn reachable_lower_floor(higher: &BarSeries, lower: &BarSeries, lookback_bars: usize) -> usize {
    let Some(current) = higher.last_index() else {
        return 0;
    };
    let Some(oldest) = higher.get(lookback_floor(current, lookback_bars)) else {
        return 0;
    };
    lower
        .first_index_at_or_after(oldest.open_time)
        .saturating_sub(lookback_bars)
}

pub fn evaluate(input: &ConfluenceInput<'_>) -> Confluence {
    let dominant = input.dominant;
    if dominant.is_empty() {
        return Confluence::neutral();
    }
    let Some(main_bar) = input.higher.get(dominant.main_index) else {
        return Confluence::neutral();
    };
    let Some(current) = input.lower.last_index() else {
        return Confluence::neutral();
    };
    let open_time_at = |index: usize| input.higher.get(index).map(|bar| bar.open_time);

    let reaction = TimeWindow {
        start: main_bar.open_time,
        end: open_time_at(dominant.main_index + 1),
    };
    let horizon = TimeWindow {
        start: main_bar.open_time,
        end: open_time_at(dominant.main_index + 1 + CONFIRMATION_HTF_BARS),
    };

    let first_touches = find_first_touches(
        input.lower,
        &reaction,
        dominant.support.as_ref().map(SrLevel::price),
        dominant.resistance.as_ref().map(SrLevel::price),
    );

    let resistance = first_touches.support.and_then(|found_at| {
        find_candidate(input, found_at, current, Polarity::Resistance).map(|level| {
            let hit = confirm_breakout(input, &level, found_at, &horizon, Direction::Bullish);
            Candidate { level, hit }
        })
    });
    let support = first_touches.resistance.and_then(|found_at| {
        find_candidate(input, found_at, current, Polarity::Support).map(|level| {
            let hit = confirm_breakout(input, &level, found_at, &horizon, Direction::Bearish);
            Candidate { level, hit }
        })
    });

    let mut confluence = decide(support, resistance);
    confluence.first_touches = first_touches;
    confluence
}

/// Forward scan inside `window` for the first bar touching each price.
fn find_first_touches(
    lower: &BarSeries,
    window: &TimeWindow,
    support_price: Option<Decimal>,
    resistance_price: Option<Decimal>,
) -> FirstTouches {
    let mut touches = FirstTouches::default();
    let start = lower.first_index_at_or_after(window.start);
    for bar in lower.bars()[start..]
        .iter()
        .take_while(|bar| window.contains(bar.open_time))
    {
        if touches.support.is_none() && support_price.is_some_and(|p| bar.touches(p)) {
            touches.support = Some(bar.index);
        }
        if touches.resistance.is_none() && resistance_price.is_some_and(|p| bar.touches(p)) {
            touches.resistance = Some(bar.index);
        }
        let support_done = support_price.is_none() || touches.support.is_some();
        let resistance_done = resistance_price.is_none() || touches.resistance.is_some();
        if support_done && resistance_done {
            break;
        }
    }
    touches
}

/// Nearest classic level of `polarity` with no breakout as of `found_at`,
/// looking back at most `lookback_bars` creation indices. Resistance keeps the
/// lowest price, support the highest; on equal prices the nearer level wins.
fn find_candidate(
    input: &ConfluenceInput<'_>,
    found_at: usize,
    current: usize,
    polarity: Polarity,
) -> Option<SrLevel> {
    let floor = found_at.saturating_sub(input.lookback_bars);
    let mut best: Option<SrLevel> = None;

    for creation_index in (floor..found_at).rev() {
        let Some(level) = input.lower_registry.get(creation_index) else {
            continue;
        };
        let as_found = level.revert_to(found_at, current);
        if as_found.polarity() != polarity
            || !as_found.is_classic()
            || !as_found.breakouts().is_empty()
        {
            continue;
        }
        let better = best.as_ref().map_or(true, |b| match polarity {
            Polarity::Resistance => level.price() < b.price(),
            Polarity::Support => level.price() > b.price(),
        });
        if better {
            best = Some(level.clone());
        }
    }
    best
}

/// First breakout of `level` after `found_at` and before the horizon ends,
/// falling back to an unconfirmed touch by the forming bar.
fn confirm_breakout(
    input: &ConfluenceInput<'_>,
    level: &SrLevel,
    found_at: usize,
    horizon: &TimeWindow,
    direction: Direction,
) -> Option<BreakoutHit> {
    let lower = input.lower;
    let last = lower.last_index()?;

    let confirmed = match input.confirmation {
        Confirmation::Recorded => level
            .breakouts()
            .iter()
            .filter(|event| event.bar_index > found_at && event.bar_index < last)
            .find(|event| !horizon.ended_by(event.time))
            .map(|event| BreakoutHit {
                index: event.bar_index,
                time: event.time,
                confirmed: true,
            }),
        Confirmation::Directional => {
            let mut probe = level.revert_to(found_at, last);
            let mut hit = None;
            for bar in lower.bars().iter().skip(found_at + 1).take_while(|b| b.index < last) {
                if horizon.ended_by(bar.open_time) {
                    break;
                }
                let recorded = probe.breakouts().len();
                probe.check_breakout(bar, BreakoutFilter::Only(direction));
                if probe.breakouts().len() > recorded {
                    hit = Some(BreakoutHit {
                        index: bar.index,
                        time: bar.open_time,
                        confirmed: true,
                    });
                    break;
                }
            }
            hit
        }
    };
    if confirmed.is_some() {
        return confirmed;
    }

    let forming = lower.get(last)?;
    if last > found_at && !horizon.ended_by(forming.open_time) && forming.touches(level.price()) {
        return Some(BreakoutHit {
            index: last,
            time: forming.open_time,
            confirmed: false,
        });
    }
    None
}

fn decide(support: Option<Candidate>, resistance: Option<Candidate>) -> Confluence {
    let bos = support.as_ref().and_then(|c| c.hit);
    let bor = resistance.as_ref().and_then(|c| c.hit);
    let unconfirmed = bos.is_some_and(|h| !h.confirmed) || bor.is_some_and(|h| !h.confirmed);

    let keep_both = |support: Option<Candidate>, resistance: Option<Candidate>| Confluence {
        signal: Signal::Neutral,
        support: support.map(|c| c.level),
        resistance: resistance.map(|c| c.level),
        time_bos: bos.map(|h| h.time),
        time_bor: bor.map(|h| h.time),
        first_touches: FirstTouches::default(),
    };

    match (bos, bor) {
        (None, None) => keep_both(support, resistance),
        _ if unconfirmed => keep_both(support, resistance),
        (Some(s), Some(r)) if s.index == r.index => Confluence::neutral(),
        _ => {
            let s_index = bos.map_or(usize::MAX, |h| h.index);
            let r_index = bor.map_or(usize::MAX, |h| h.index);
            if s_index < r_index {
                Confluence {
                    signal: Signal::Bearish,
                    support: support.map(|c| c.level),
                    time_bos: bos.map(|h| h.time),
                    ..Confluence::neutral()
                }
            } else {
                Confluence {
                    signal: Signal::Bullish,
                    resistance: resistance.map(|c| c.level),
                    time_bor: bor.map(|h| h.time),
                    ..Confluence::neutral()
                }
            }
        }
    }
}

//! Multi-timeframe engine: Layer 1 on every timeframe, Layer 2 on every
//! adjacent (higher, lower) pair.

use super::advance::{Selection, TimeframeState};
use crate::domain::{Bar, SeriesError, Timeframe};
use crate::engine::{
    evaluate, reachable_lower_floor, Confirmation, Confluence, ConfluenceInput, Signal,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("timeframe {0} is not configured")]
    UnknownTimeframe(Timeframe),
    #[error("timeframes must be non-empty and strictly coarse to fine, got {0:?}")]
    InvalidTimeframes(Vec<Timeframe>),
    #[error(transparent)]
    Series(#[from] SeriesError),
}

/// Parameters shared by every timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub lookback_bars: usize,
    pub confirmation: Confirmation,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lookback_bars: 60,
            confirmation: Confirmation::Recorded,
        }
    }
}

/// Layer-2 result for one adjacent timeframe pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairConfluence {
    pub higher: Timeframe,
    pub lower: Timeframe,
    pub confluence: Confluence,
}

/// Everything the engine knows after a bar.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EngineOutput {
    /// One entry per timeframe, coarse to fine.
    pub selections: Vec<Selection>,
    /// One entry per adjacent pair, coarse to fine.
    pub confluences: Vec<PairConfluence>,
}

impl EngineOutput {
    pub fn selection(&self, timeframe: Timeframe) -> Option<&Selection> {
        self.selections.iter().find(|s| s.timeframe == timeframe)
    }

    pub fn confluence(&self, higher: Timeframe, lower: Timeframe) -> Option<&PairConfluence> {
        self.confluences
            .iter()
            .find(|p| p.higher == higher && p.lower == lower)
    }

    pub fn signal(&self, higher: Timeframe, lower: Timeframe) -> Signal {
        self.confluence(higher, lower)
            .map(|p| p.confluence.signal)
            .unwrap_or_default()
    }
}

/// Owns one [`TimeframeState`] per configured timeframe.
#[derive(Debug, Clone)]
pub struct MtfEngine {
    settings: EngineSettings,
    frames: Vec<TimeframeState>,
}

impl MtfEngine {
    /// `timeframes` must be listed coarse to fine, e.g. `[D1, H4, H1]`.
    pub fn new(timeframes: &[Timeframe], settings: EngineSettings) -> Result<Self, EngineError> {
        let ordered = timeframes.windows(2).all(|pair| pair[0] > pair[1]);
        if timeframes.is_empty() || !ordered {
            return Err(EngineError::InvalidTimeframes(timeframes.to_vec()));
        }
        Ok(Self {
            settings,
            frames: timeframes.iter().copied().map(TimeframeState::new).collect(),
        })
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    pub fn timeframes(&self) -> Vec<Timeframe> {
        self.frames.iter().map(TimeframeState::timeframe).collect()
    }

    pub fn frame(&self, timeframe: Timeframe) -> Option<&TimeframeState> {
        self.frames.iter().find(|f| f.timeframe() == timeframe)
    }

    /// Feed a bar of `timeframe` and recompute all selections and confluences.
    pub fn on_bar(&mut self, timeframe: Timeframe, bar: Bar) -> Result<EngineOutput, EngineError> {
        let lookback = self.settings.lookback_bars;
        let frame = self
            .frames
            .iter_mut()
            .find(|f| f.timeframe() == timeframe)
            .ok_or(EngineError::UnknownTimeframe(timeframe))?;
        frame.apply(bar, lookback)?;
        self.evict();
        Ok(self.evaluate())
    }

    /// Evict every registry down to the oldest level a later evaluation can
    /// still read: its own Layer-1 retention floor, lowered for the finer side
    /// of each pair to whatever Layer 2 can still reach.
    fn evict(&mut self) {
        let lookback = self.settings.lookback_bars;
        let floors: Vec<usize> = self
            .frames
            .iter()
            .enumerate()
            .map(|(position, frame)| {
                let own = frame.retention_floor(lookback);
                match position.checked_sub(1).and_then(|h| self.frames.get(h)) {
                    Some(higher) => own.min(reachable_lower_floor(
                        higher.series(),
                        frame.series(),
                        lookback,
                    )),
                    None => own,
                }
            })
            .collect();

        for (frame, floor) in self.frames.iter_mut().zip(floors) {
            frame.retain_from(floor);
        }
    }

    /// Layer 1 for every timeframe, then Layer 2 for every adjacent pair.
    pub fn evaluate(&self) -> EngineOutput {
        let lookback = self.settings.lookback_bars;
        let selections: Vec<Selection> =
            self.frames.iter().map(|f| f.select(lookback)).collect();

        let confluences = self
            .frames
            .windows(2)
            .zip(selections.iter())
            .map(|(pair, higher_selection)| {
                let (higher, lower) = (&pair[0], &pair[1]);
                let confluence = evaluate(&ConfluenceInput {
                    dominant: &higher_selection.dominant,
                    higher: higher.series(),
                    lower: lower.series(),
                    lower_registry: lower.registry(),
                    lookback_bars: lookback,
                    confirmation: self.settings.confirmation,
                });
                PairConfluence {
                    higher: higher.timeframe(),
                    lower: lower.timeframe(),
                    confluence,
                }
            })
            .collect();

        EngineOutput {
            selections,
            confluences,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, TimeMs};

    fn bar(index: usize, time: i64) -> Bar {
        let p = Decimal::from(100);
        Bar::new(index, TimeMs::new(time), p, p, p, p)
    }

    #[test]
    fn test_timeframes_must_be_coarse_to_fine() {
        assert!(MtfEngine::new(&[Timeframe::D1, Timeframe::H4], EngineSettings::default()).is_ok());
        assert!(matches!(
            MtfEngine::new(&[Timeframe::H4, Timeframe::D1], EngineSettings::default()),
            Err(EngineError::InvalidTimeframes(_))
        ));
        assert!(matches!(
            MtfEngine::new(&[Timeframe::H4, Timeframe::H4], EngineSettings::default()),
            Err(EngineError::InvalidTimeframes(_))
        ));
        assert!(MtfEngine::new(&[], EngineSettings::default()).is_err());
    }

    #[test]
    fn test_output_shape() {
        let mut engine = MtfEngine::new(
            &[Timeframe::W1, Timeframe::D1, Timeframe::H4],
            EngineSettings::default(),
        )
        .unwrap();
        let output = engine.on_bar(Timeframe::D1, bar(0, 0)).unwrap();
        assert_eq!(output.selections.len(), 3);
        assert_eq!(output.confluences.len(), 2);
        assert_eq!(output.confluences[0].higher, Timeframe::W1);
        assert_eq!(output.confluences[1].lower, Timeframe::H4);
        assert_eq!(output.signal(Timeframe::D1, Timeframe::H4), Signal::Neutral);
        assert_eq!(output.selection(Timeframe::D1).unwrap().bar_index, 0);
    }

    #[test]
    fn test_finer_levels_kept_for_the_coarser_window() {
        let settings = EngineSettings {
            lookback_bars: 2,
            ..EngineSettings::default()
        };
        let mut engine = MtfEngine::new(&[Timeframe::D1, Timeframe::H4], settings).unwrap();
        // Ten daily bars of six H4 bars each, merged coarse first.
        for day in 0..10 {
            engine.on_bar(Timeframe::D1, bar(day, day as i64 * 6)).unwrap();
            for h in 0..6 {
                let index = day * 6 + h;
                engine.on_bar(Timeframe::H4, bar(index, index as i64)).unwrap();
            }
        }

        // Daily: closed 8, own floor 8 - 2 * 4 = 0 keeps keys 0..=7.
        let daily = engine.frame(Timeframe::D1).unwrap();
        assert_eq!(daily.registry().len(), 8);

        // H4: own floor 58 - 8 = 50, but the daily window starts at day
        // 9 - 4 = 5, i.e. H4 bar 30, minus the lookback: 28.
        let h4 = engine.frame(Timeframe::H4).unwrap();
        assert_eq!(h4.retention_floor(2), 50);
        assert!(h4.registry().get(27).is_none());
        assert!(h4.registry().get(28).is_some());
        assert_eq!(h4.registry().len(), 58 - 28);
    }

    #[test]
    fn test_unknown_timeframe() {
        let mut engine =
            MtfEngine::new(&[Timeframe::D1, Timeframe::H4], EngineSettings::default()).unwrap();
        assert!(matches!(
            engine.on_bar(Timeframe::M5, bar(0, 0)),
            Err(EngineError::UnknownTimeframe(Timeframe::M5))
        ));
    }
}

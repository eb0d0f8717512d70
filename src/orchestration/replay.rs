//! Batch replay of stored bar history through the multi-timeframe engine.

use super::pipeline::{EngineError, EngineOutput, EngineSettings, MtfEngine};
use crate::datasource::{BarSource, DataSourceError};
use crate::domain::{Bar, TimeMs, Timeframe};
use crate::engine::Signal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    DataSource(#[from] DataSourceError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// A pair's signal moved to a new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalChange {
    pub time: TimeMs,
    pub higher: Timeframe,
    pub lower: Timeframe,
    pub signal: Signal,
}

#[derive(Debug)]
pub struct ReplayReport {
    pub bars_processed: usize,
    pub signal_changes: Vec<SignalChange>,
    /// Output after the final bar.
    pub output: EngineOutput,
    /// Engine state after the final bar, ready for further bars.
    pub engine: MtfEngine,
}

/// Loads every timeframe from a [`BarSource`] and feeds the bars to an
/// [`MtfEngine`] in time order.
#[derive(Debug, Clone)]
pub struct Replayer {
    source: Arc<dyn BarSource>,
    settings: EngineSettings,
}

impl Replayer {
    pub fn new(source: Arc<dyn BarSource>, settings: EngineSettings) -> Self {
        Self { source, settings }
    }

    /// Replay `timeframes` (coarse to fine) from the first stored bar to the last.
    pub async fn replay(&self, timeframes: &[Timeframe]) -> Result<ReplayReport, ReplayError> {
        let mut engine = MtfEngine::new(timeframes, self.settings)?;

        let mut per_timeframe = Vec::with_capacity(timeframes.len());
        for &timeframe in timeframes {
            let bars = self.source.fetch_bars(timeframe).await?;
            tracing::info!("Loaded {} {} bars", bars.len(), timeframe);
            per_timeframe.push((timeframe, bars));
        }
        let merged = merge_chronologically(per_timeframe);

        let mut last_signals: HashMap<(Timeframe, Timeframe), Signal> = HashMap::new();
        let mut signal_changes = Vec::new();
        let mut output = engine.evaluate();
        let mut bars_processed = 0;

        for (timeframe, bar) in merged {
            let time = bar.open_time;
            output = engine.on_bar(timeframe, bar)?;
            bars_processed += 1;

            for pair in &output.confluences {
                let signal = pair.confluence.signal;
                let previous = last_signals
                    .insert((pair.higher, pair.lower), signal)
                    .unwrap_or_default();
                if previous != signal {
                    tracing::info!(
                        "Signal {}/{} changed {:?} -> {:?} at {}",
                        pair.higher,
                        pair.lower,
                        previous,
                        signal,
                        time.to_utc_string()
                    );
                    signal_changes.push(SignalChange {
                        time,
                        higher: pair.higher,
                        lower: pair.lower,
                        signal,
                    });
                }
            }
        }

        tracing::info!(
            "Replay finished: {} bars, {} signal changes",
            bars_processed,
            signal_changes.len()
        );

        Ok(ReplayReport {
            bars_processed,
            signal_changes,
            output,
            engine,
        })
    }
}

/// Interleave per-timeframe bar lists by open time. On equal open times the
/// coarser timeframe goes first, so a finer bar never sees a higher
/// timeframe bar that has not opened yet.
pub fn merge_chronologically(per_timeframe: Vec<(Timeframe, Vec<Bar>)>) -> Vec<(Timeframe, Bar)> {
    let mut merged: Vec<(Timeframe, Bar)> = per_timeframe
        .into_iter()
        .flat_map(|(timeframe, bars)| bars.into_iter().map(move |bar| (timeframe, bar)))
        .collect();
    merged.sort_by(|(tf_a, a), (tf_b, b)| {
        a.open_time
            .cmp(&b.open_time)
            .then_with(|| tf_b.cmp(tf_a))
            .then_with(|| a.index.cmp(&b.index))
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::MockBarSource;
    use crate::domain::Decimal;

    fn flat_bar(index: usize, time: i64) -> Bar {
        let p = Decimal::from(100);
        Bar::new(index, TimeMs::new(time), p, p, p, p)
    }

    #[test]
    fn test_merge_puts_coarse_first_on_ties() {
        let merged = merge_chronologically(vec![
            (Timeframe::H4, vec![flat_bar(0, 0), flat_bar(1, 4), flat_bar(2, 8)]),
            (Timeframe::D1, vec![flat_bar(0, 0), flat_bar(1, 8)]),
        ]);
        let order: Vec<(Timeframe, usize)> =
            merged.iter().map(|(tf, bar)| (*tf, bar.index)).collect();
        assert_eq!(
            order,
            vec![
                (Timeframe::D1, 0),
                (Timeframe::H4, 0),
                (Timeframe::H4, 1),
                (Timeframe::D1, 1),
                (Timeframe::H4, 2),
            ]
        );
    }

    #[tokio::test]
    async fn test_replay_counts_bars() {
        let source = MockBarSource::new()
            .with_bars(Timeframe::D1, (0..3).map(|i| flat_bar(i, i as i64 * 6)).collect())
            .with_bars(Timeframe::H4, (0..18).map(|i| flat_bar(i, i as i64)).collect());
        let replayer = Replayer::new(Arc::new(source), EngineSettings::default());

        let report = replayer
            .replay(&[Timeframe::D1, Timeframe::H4])
            .await
            .unwrap();
        assert_eq!(report.bars_processed, 21);
        assert!(report.signal_changes.is_empty());
        assert_eq!(report.output.selection(Timeframe::H4).unwrap().bar_index, 17);
        assert_eq!(report.engine.frame(Timeframe::D1).unwrap().series().len(), 3);
    }

    #[tokio::test]
    async fn test_replay_missing_timeframe_fails() {
        let source = MockBarSource::new().with_bars(Timeframe::D1, vec![flat_bar(0, 0)]);
        let replayer = Replayer::new(Arc::new(source), EngineSettings::default());
        let err = replayer
            .replay(&[Timeframe::D1, Timeframe::H4])
            .await
            .unwrap_err();
        assert!(matches!(err, ReplayError::DataSource(DataSourceError::NotFound(_))));
    }
}

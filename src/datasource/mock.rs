//! Mock bar source for tests and replays without files.

use super::{BarSource, DataSourceError};
use crate::domain::{Bar, Timeframe};
use async_trait::async_trait;
use std::collections::HashMap;

/// Bar source that returns predefined bars per timeframe.
#[derive(Debug, Clone, Default)]
pub struct MockBarSource {
    bars: HashMap<Timeframe, Vec<Bar>>,
}

impl MockBarSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bars returned for `timeframe`.
    pub fn with_bars(mut self, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        self.bars.insert(timeframe, bars);
        self
    }

    /// Append one bar to `timeframe`.
    pub fn with_bar(mut self, timeframe: Timeframe, bar: Bar) -> Self {
        self.bars.entry(timeframe).or_default().push(bar);
        self
    }
}

#[async_trait]
impl BarSource for MockBarSource {
    async fn fetch_bars(&self, timeframe: Timeframe) -> Result<Vec<Bar>, DataSourceError> {
        self.bars
            .get(&timeframe)
            .cloned()
            .ok_or_else(|| DataSourceError::NotFound(timeframe.to_string()))
    }
}

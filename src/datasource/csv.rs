//! CSV bar files, plain or lz4-framed.
//!
//! One file per timeframe inside a directory: `<dir>/<LABEL>.csv` or
//! `<dir>/<LABEL>.csv.lz4`, with the header `open_time_ms,open,high,low,close`.
//! Bar indices follow row order.

use super::{BarSource, DataSourceError};
use crate::domain::{Bar, Decimal, TimeMs, Timeframe};
use async_trait::async_trait;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CsvBarSource {
    dir: PathBuf,
}

impl CsvBarSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn plain_path(&self, timeframe: Timeframe) -> PathBuf {
        self.dir.join(format!("{}.csv", timeframe.label()))
    }

    pub fn lz4_path(&self, timeframe: Timeframe) -> PathBuf {
        self.dir.join(format!("{}.csv.lz4", timeframe.label()))
    }

    pub fn decompress_lz4_frame(lz4_bytes: &[u8]) -> Result<Vec<u8>, DataSourceError> {
        let mut decoder = lz4_flex::frame::FrameDecoder::new(lz4_bytes);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| DataSourceError::Decompress(e.to_string()))?;
        Ok(out)
    }

    pub fn parse_csv(csv_bytes: &[u8]) -> Result<Vec<Bar>, DataSourceError> {
        #[derive(Debug, serde::Deserialize)]
        struct Row {
            open_time_ms: i64,
            open: String,
            high: String,
            low: String,
            close: String,
        }

        fn price(row: usize, field: &str, raw: &str) -> Result<Decimal, DataSourceError> {
            Decimal::from_str_canonical(raw).map_err(|e| {
                DataSourceError::ParseError(format!("row {}: invalid {}: {}", row, field, e))
            })
        }

        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(::csv::Trim::All)
            .from_reader(csv_bytes);

        let mut bars = Vec::new();
        for (index, record) in reader.deserialize::<Row>().enumerate() {
            let row = record.map_err(|e| DataSourceError::ParseError(e.to_string()))?;
            let bar = Bar::new(
                index,
                TimeMs::new(row.open_time_ms),
                price(index, "open", &row.open)?,
                price(index, "high", &row.high)?,
                price(index, "low", &row.low)?,
                price(index, "close", &row.close)?,
            );
            if bar.high < bar.body_top() || bar.low > bar.body_bottom() {
                return Err(DataSourceError::ParseError(format!(
                    "row {}: high/low do not contain the body",
                    index
                )));
            }
            bars.push(bar);
        }
        Ok(bars)
    }

    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, DataSourceError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(DataSourceError::Io(format!("{}: {}", path.display(), e))),
        }
    }
}

#[async_trait]
impl BarSource for CsvBarSource {
    async fn fetch_bars(&self, timeframe: Timeframe) -> Result<Vec<Bar>, DataSourceError> {
        let plain = self.plain_path(timeframe);
        if let Some(bytes) = Self::read_optional(&plain).await? {
            debug!(path = %plain.display(), bytes = bytes.len(), "reading bars");
            return Self::parse_csv(&bytes);
        }

        let compressed = self.lz4_path(timeframe);
        if let Some(bytes) = Self::read_optional(&compressed).await? {
            debug!(path = %compressed.display(), bytes = bytes.len(), "reading lz4 bars");
            let csv = Self::decompress_lz4_frame(&bytes)?;
            return Self::parse_csv(&csv);
        }

        Err(DataSourceError::NotFound(format!(
            "{} (looked for {} and {})",
            timeframe,
            plain.display(),
            compressed.display()
        )))
    }
}

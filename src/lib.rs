pub mod annotation;
pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use annotation::{Annotation, AnnotationSink, JsonLinesSink, RecordingSink, Styling};
pub use config::Config;
pub use datasource::{BarSource, CsvBarSource, DataSourceError, MockBarSource};
pub use domain::{Bar, BarSeries, Decimal, Direction, TimeMs, Timeframe};
pub use engine::{Confirmation, Confluence, DominantLevels, LevelRegistry, Signal, SrLevel};
pub use error::AppError;
pub use orchestration::{advance, EngineOutput, EngineSettings, MtfEngine, Replayer, TimeframeState};

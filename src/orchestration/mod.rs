pub mod advance;
pub mod pipeline;
pub mod replay;

pub use advance::{advance, Selection, TimeframeState};
pub use pipeline::{EngineError, EngineOutput, EngineSettings, MtfEngine, PairConfluence};
pub use replay::{merge_chronologically, ReplayError, ReplayReport, Replayer, SignalChange};

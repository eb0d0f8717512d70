//! Pure computation engine for level detection and selection.
//!
//! Nothing in here performs I/O or holds global state: registries are owned
//! values, and every query takes the series and registries it reads.

pub mod confluence;
pub mod dominant;
pub mod level;
pub mod registry;

pub use confluence::{
    evaluate, reachable_lower_floor, BreakoutHit, Confirmation, Confluence, ConfluenceInput,
    FirstTouches, Signal, CONFIRMATION_HTF_BARS,
};
pub use dominant::{find_main_index, select_dominant, DominantLevels};
pub use level::{BreakoutFilter, EventLog, LevelEvent, Polarity, SrLevel, COOLDOWN_BARS};
pub use registry::{lookback_floor, LevelRegistry, RETENTION_FACTOR, SELECTION_WINDOW_FACTOR};

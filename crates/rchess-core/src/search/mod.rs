//! Search algorithms and their parameters

pub mod core;
pub mod limits;
pub mod params;
pub mod stop;
pub mod types;

pub use self::core::{AdvancedSearch, SearchCore, StandardSearch};
pub use limits::{SearchLimits, SearchLimitsBuilder};
pub use params::{PruningParams, SearchParams};
pub use stop::StopSignal;
pub use types::{
    DRAW_SCORE, INFINITE, MATE_SCORE, MATE_THRESHOLD, MAX_PLY, ResultSource, RootOutcome,
    SearchResult, SearchState, SearchStats, is_mate_score, mate_in, mated_in,
};

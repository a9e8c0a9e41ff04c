//! # rchess-core
//!
//! Adaptive game-tree search for chess.
//!
//! ## Module layout
//!
//! - `position`: board handle with do/undo history and Zobrist fingerprints
//! - `eval`: static evaluation trait and the default material evaluator
//! - `book`: opening book lookup
//! - `tt`: generation-aged, lock-free transposition table
//! - `ordering`: move ordering (TT hint, MVV-LVA, killers, history)
//! - `search`: negamax alpha-beta core, quiescence, pruning, limits and stats
//! - `time`: search budget and deadline tracking
//! - `parallel`: root-splitting parallel search and its worker pool
//! - `engine`: strategy selection and the top-level search coordinator
//! - `config`: tunable parameters loaded from JSON

pub mod book;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod ordering;
pub mod parallel;
pub mod position;
pub mod search;
pub mod time;
pub mod tt;

pub use book::{MemoryBook, OpeningBook};
pub use config::EngineConfig;
pub use engine::{
    CoordinatorState, EngineKind, EngineSelector, FixedMemoryProbe, MemoryProbe,
    SearchCoordinator, SearchCoordinatorBuilder, SearchHandle, SelectorConfig,
};
pub use error::{ConfigError, PositionError, SearchError};
pub use eval::{Evaluator, MaterialEvaluator};
pub use position::{Move, Position, PositionHasher};
pub use search::{ResultSource, SearchLimits, SearchResult, SearchStats};
pub use time::{GameClock, TimeBudget, TimeManager, TimeState};
pub use tt::{Bound, TTEntry, TranspositionTable};

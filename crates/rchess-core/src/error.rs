//! Error types for the search core

use std::time::Duration;

use crate::engine::EngineKind;

/// Errors raised by the position handle
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    /// FEN string could not be parsed
    #[error("invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },

    /// No piece on the source square of a move
    #[error("no piece on source square of move {0}")]
    NoPieceOnSource(String),

    /// Source square holds a piece of the side not to move
    #[error("move {0} moves a piece of the side not to move")]
    WrongSide(String),

    /// Move is not legal in the current position
    #[error("illegal move {0}")]
    IllegalMove(String),
}

/// Errors raised while searching
#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    /// Terminal position, nothing to search
    #[error("no legal moves in position")]
    NoLegalMoves,

    /// Legal moves exist but none of them could be applied
    #[error("no root move could be searched")]
    NoSearchableMoves,

    /// Position handle rejected an operation
    #[error(transparent)]
    Position(#[from] PositionError),

    /// A strategy panicked or returned an unusable result
    #[error("{engine:?} strategy failed: {reason}")]
    StrategyFailed { engine: EngineKind, reason: String },

    /// A parallel worker panicked or disconnected
    #[error("parallel worker {worker} failed")]
    WorkerFailed { worker: usize },

    /// Worker pool is shut down or has no workers
    #[error("worker pool is closed")]
    PoolClosed,

    /// Every strategy in the fallback chain failed at this depth
    #[error("all strategies failed at depth {depth}")]
    AllStrategiesFailed { depth: u32 },

    /// Caller-side hard deadline elapsed before the search finished
    #[error("search did not finish within {0:?}")]
    Timeout(Duration),

    /// Search thread went away without reporting a result
    #[error("search thread disconnected")]
    Disconnected,

    /// Spawning a search or worker thread failed
    #[error(transparent)]
    Spawn(#[from] std::io::Error),

    /// Coordinator built from an invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while loading or validating configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A parameter is out of its accepted range
    #[error("{field} is out of range: {reason}")]
    Invalid { field: &'static str, reason: String },
}

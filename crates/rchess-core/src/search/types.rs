//! Common types for search algorithms

use std::time::Duration;

use crate::engine::EngineKind;
use crate::ordering::OrderingStats;
use crate::position::Move;
use crate::tt::Bound;

/// Maximum search ply
pub const MAX_PLY: u32 = 128;

/// Score of a mate at the root
pub const MATE_SCORE: i32 = 32_000;

/// Scores at or beyond this magnitude are mate scores
pub const MATE_THRESHOLD: i32 = MATE_SCORE - MAX_PLY as i32;

/// Window bound wider than any reachable score
pub const INFINITE: i32 = MATE_SCORE + 1;

pub const DRAW_SCORE: i32 = 0;

/// Score for delivering mate `ply` plies from the root
#[inline]
pub fn mate_in(ply: u32) -> i32 {
    MATE_SCORE - ply as i32
}

/// Score for being mated `ply` plies from the root
#[inline]
pub fn mated_in(ply: u32) -> i32 {
    -MATE_SCORE + ply as i32
}

#[inline]
pub fn is_mate_score(score: i32) -> bool {
    score.abs() >= MATE_THRESHOLD
}

/// Search statistics
///
/// One instance is kept per request and merged from every core and worker that
/// contributed to it.
#[derive(Clone, Debug, Default)]
pub struct SearchStats {
    /// Nodes searched (including quiescence)
    pub nodes: u64,
    /// Quiescence nodes
    pub qnodes: u64,
    /// Time elapsed
    pub elapsed: Duration,
    /// Principal variation
    pub pv: Vec<Move>,
    /// Search depth reached
    pub depth: u32,
    /// Selective depth reached
    pub seldepth: u32,
    /// Number of aspiration window failures
    pub aspiration_failures: u32,
    /// Number of transposition table hits
    pub tt_hits: u64,
    /// Number of null move pruning cuts
    pub null_cuts: u64,
    /// Number of late move reductions
    pub lmr_count: u64,
    /// Reduced searches that had to be repeated at full depth
    pub lmr_researches: u64,
    /// Quiet moves skipped by futility pruning
    pub futility_prunes: u64,
    /// Nodes cut by razoring
    pub razor_cuts: u64,
    /// Strategies abandoned for a simpler one
    pub strategy_fallbacks: u32,
    /// Completed iterative deepening iterations
    pub iterations: u32,
    /// Move ordering quality
    pub ordering: OrderingStats,
}

impl SearchStats {
    /// Fold another set of counters into this one. Depths take the maximum,
    /// counters are summed, elapsed time and PV are left alone.
    pub fn merge(&mut self, other: &SearchStats) {
        self.nodes += other.nodes;
        self.qnodes += other.qnodes;
        self.depth = self.depth.max(other.depth);
        self.seldepth = self.seldepth.max(other.seldepth);
        self.aspiration_failures += other.aspiration_failures;
        self.tt_hits += other.tt_hits;
        self.null_cuts += other.null_cuts;
        self.lmr_count += other.lmr_count;
        self.lmr_researches += other.lmr_researches;
        self.futility_prunes += other.futility_prunes;
        self.razor_cuts += other.razor_cuts;
        self.strategy_fallbacks += other.strategy_fallbacks;
        self.iterations += other.iterations;
        self.ordering.merge(&other.ordering);
    }

    /// Nodes per second
    pub fn nps(&self) -> u64 {
        let ms = self.elapsed.as_millis() as u64;
        if ms == 0 { 0 } else { self.nodes * 1000 / ms }
    }
}

/// Where a request's move came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    /// Terminal position, no move returned
    NoLegalMoves,
    /// Opening book hit
    Book,
    /// Only one legal move, returned without searching
    ForcedMove,
    /// Last completed iterative deepening depth
    Search,
    /// One-ply greedy evaluation because no depth completed
    GreedyFallback,
}

/// Search result
#[derive(Clone, Debug)]
pub struct SearchResult {
    /// Best move found
    pub best_move: Option<Move>,
    /// Evaluation score (from side to move perspective)
    pub score: i32,
    /// Depth of the iteration the move came from (0 when not searched)
    pub depth: u32,
    /// Strategy that produced the last completed iteration
    pub engine: Option<EngineKind>,
    pub source: ResultSource,
    /// Search statistics
    pub stats: SearchStats,
}

impl SearchResult {
    /// Create a new search result
    pub fn new(
        best_move: Option<Move>,
        score: i32,
        source: ResultSource,
        stats: SearchStats,
    ) -> Self {
        Self {
            best_move,
            score,
            depth: stats.depth,
            engine: None,
            source,
            stats,
        }
    }

    /// Result for a position without legal moves
    pub fn no_move(score: i32) -> Self {
        Self::new(None, score, ResultSource::NoLegalMoves, SearchStats::default())
    }

    pub fn is_mate(&self) -> bool {
        is_mate_score(self.score)
    }
}

/// Outcome of one root search at a fixed depth
#[derive(Clone, Debug)]
pub struct RootOutcome {
    pub best_move: Option<Move>,
    pub score: i32,
    /// The search was stopped before finishing this depth; the result must not be
    /// committed
    pub aborted: bool,
    pub stats: SearchStats,
}

/// Search state for tracking node types during search
#[derive(Debug, Clone, Copy)]
pub struct SearchState {
    /// Original alpha value when entering the node
    pub original_alpha: i32,
    /// Original beta value when entering the node
    pub original_beta: i32,
    /// Final score returned from the node
    pub score: i32,
}

impl SearchState {
    /// Determine the bound type based on original bounds and final score
    pub fn bound(&self) -> Bound {
        if self.score <= self.original_alpha {
            Bound::Upper
        } else if self.score >= self.original_beta {
            Bound::Lower
        } else {
            Bound::Exact
        }
    }
}

//! Tunable search parameters
//!
//! Every threshold used by the pruning rules and by the iterative deepening
//! driver lives here so that it can be tuned from configuration.

use serde::{Deserialize, Serialize};

/// Pruning, reduction and extension parameters of the alpha-beta core
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruningParams {
    // Null move pruning: R = base + depth / divisor
    pub null_move_min_depth: i32,
    pub null_move_base_reduction: i32,
    pub null_move_depth_divisor: i32,

    // Late move reductions
    pub lmr_min_depth: i32,
    pub lmr_min_moves: usize,

    // Futility pruning of quiet moves (margin per ply of depth, cp)
    pub futility_max_depth: i32,
    pub futility_margin: i32,

    // Reverse futility (static beta) pruning
    pub reverse_futility_max_depth: i32,
    pub reverse_futility_margin: i32,

    // Razoring into quiescence
    pub razor_max_depth: i32,
    pub razor_margin: i32,

    /// Extensions allowed along one line
    pub max_extensions: u32,
    /// Plies of quiescence below the horizon
    pub qsearch_max_depth: u32,
}

impl Default for PruningParams {
    fn default() -> Self {
        Self {
            null_move_min_depth: 3,
            null_move_base_reduction: 2,
            null_move_depth_divisor: 4,
            lmr_min_depth: 3,
            lmr_min_moves: 3,
            futility_max_depth: 3,
            futility_margin: 150,
            reverse_futility_max_depth: 3,
            reverse_futility_margin: 120,
            razor_max_depth: 2,
            razor_margin: 300,
            max_extensions: 16,
            qsearch_max_depth: 8,
        }
    }
}

/// Iterative deepening, aspiration window and depth adaptation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    /// Below this depth every iteration uses the full window
    pub aspiration_min_depth: u32,
    /// Half width of the aspiration window (cp)
    pub aspiration_margin: i32,

    /// Adaptive max depth before adjustments
    pub base_depth: u32,
    pub min_depth: u32,
    pub max_depth: u32,
    /// Positions with at most this many pieces (kings included) are endgames
    pub endgame_piece_threshold: u32,
    pub endgame_depth_bonus: u32,
    /// Legal move count at which the depth is reduced by one
    pub high_branching_threshold: usize,
    /// Legal move count at or below which the depth is increased by one
    pub narrow_move_threshold: usize,

    /// Stop iterating once a mate score is found
    pub mate_early_stop: bool,
    /// Consecutive depths on which every strategy failed before iterative
    /// deepening gives up
    pub max_failed_depths: u32,
    /// Maximum PV length reported
    pub pv_max_len: usize,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            aspiration_min_depth: 4,
            aspiration_margin: 50,
            base_depth: 8,
            min_depth: 1,
            max_depth: 32,
            endgame_piece_threshold: 10,
            endgame_depth_bonus: 2,
            high_branching_threshold: 40,
            narrow_move_threshold: 4,
            mate_early_stop: true,
            max_failed_depths: 3,
            pv_max_len: 32,
        }
    }
}

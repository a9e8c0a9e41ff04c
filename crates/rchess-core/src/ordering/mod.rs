//! Move ordering
//!
//! Scores every legal move and sorts descending so that the moves most likely
//! to produce a cutoff are searched first. Cutoffs are fed back through
//! [`MoveOrderer::record_cutoff`], which updates the killer and history tables
//! used by the next `order` call.

use chess::Piece;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::eval::piece_value;
use crate::position::{Move, Position};

mod history;
mod killer_table;

pub use history::HistoryTable;
pub use killer_table::{KILLERS_PER_PLY, KillerTable};

const TT_MOVE_SCORE: i32 = 1_000_000;
const CAPTURE_BASE: i32 = 100_000;
const PROMOTION_BASE: i32 = 95_000;
const KILLER_BASE: i32 = 90_000;

/// Move ordering parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingParams {
    /// History entries are halved once one of them reaches this value
    pub history_ceiling: i32,
}

impl Default for OrderingParams {
    fn default() -> Self {
        Self {
            history_ceiling: 16_384,
        }
    }
}

/// Ordering statistics of one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderingStats {
    /// Beta cutoffs reported by the search
    pub cutoffs: u64,
    /// Cutoffs produced by the first move searched
    pub first_move_cutoffs: u64,
    /// `order` calls where the TT hint was legal and placed first
    pub tt_hint_hits: u64,
}

impl OrderingStats {
    pub fn merge(&mut self, other: &OrderingStats) {
        self.cutoffs += other.cutoffs;
        self.first_move_cutoffs += other.first_move_cutoffs;
        self.tt_hint_hits += other.tt_hint_hits;
    }

    /// Share of cutoffs found on the first move, a measure of ordering quality
    pub fn first_move_cutoff_rate(&self) -> f64 {
        if self.cutoffs == 0 {
            0.0
        } else {
            self.first_move_cutoffs as f64 / self.cutoffs as f64
        }
    }
}

/// MVV-LVA value in pawn units
#[inline]
fn mvv_lva_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => 1,
        Piece::Knight | Piece::Bishop => 3,
        Piece::Rook => 5,
        Piece::Queen => 9,
        Piece::King => 10,
    }
}

/// Killer and history driven move orderer. One per search thread.
pub struct MoveOrderer {
    killers: KillerTable,
    history: HistoryTable,
    stats: OrderingStats,
    params: OrderingParams,
}

impl Default for MoveOrderer {
    fn default() -> Self {
        Self::new(OrderingParams::default())
    }
}

impl MoveOrderer {
    pub fn new(params: OrderingParams) -> Self {
        Self {
            killers: KillerTable::new(),
            history: HistoryTable::new(params.history_ceiling),
            stats: OrderingStats::default(),
            params,
        }
    }

    /// Order `moves` for searching at `ply`
    pub fn order(
        &mut self,
        pos: &Position,
        moves: Vec<Move>,
        ply: usize,
        tt_hint: Option<Move>,
    ) -> Vec<Move> {
        let tt_hint = tt_hint.filter(|hint| moves.contains(hint));
        if tt_hint.is_some() {
            self.stats.tt_hint_hits += 1;
        }

        let mut scored: SmallVec<[(Move, i32); 64]> = moves
            .into_iter()
            .map(|mv| (mv, self.score_move(pos, mv, ply, tt_hint)))
            .collect();

        // Stable sort keeps generation order among equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        scored.into_iter().map(|(mv, _)| mv).collect()
    }

    /// Score of a single move; higher is searched earlier
    pub fn score_move(&self, pos: &Position, mv: Move, ply: usize, tt_hint: Option<Move>) -> i32 {
        if Some(mv) == tt_hint {
            return TT_MOVE_SCORE;
        }

        let mut score = 0;
        let mut tactical = false;

        if let Some(victim) = pos.captured_piece(mv) {
            let attacker = pos.moved_piece(mv).map_or(0, mvv_lva_value);
            score += CAPTURE_BASE + 10 * mvv_lva_value(victim) - attacker;
            tactical = true;
        }

        if let Some(promoted) = mv.get_promotion() {
            score += PROMOTION_BASE + piece_value(promoted);
            tactical = true;
        }

        if tactical {
            return score;
        }

        if let Some(slot) = self.killers.slot_of(ply, mv) {
            return KILLER_BASE - slot as i32;
        }

        self.history.get(pos.side_to_move(), mv)
    }

    /// Feed a beta cutoff back into the tables.
    ///
    /// `quiets_tried` are the quiet moves searched at this node before `mv`;
    /// they receive the bonus as a malus.
    pub fn record_cutoff(
        &mut self,
        pos: &Position,
        mv: Move,
        ply: usize,
        depth: i32,
        quiets_tried: &[Move],
        first_move: bool,
    ) {
        self.stats.cutoffs += 1;
        if first_move {
            self.stats.first_move_cutoffs += 1;
        }

        if !pos.is_quiet(mv) {
            return;
        }

        let bonus = depth.max(1).saturating_mul(depth.max(1));
        let color = pos.side_to_move();

        self.killers.update(ply, mv);
        self.history.update(color, mv, bonus);
        for &quiet in quiets_tried.iter().filter(|&&quiet| quiet != mv) {
            self.history.update(color, quiet, -bonus);
        }
    }

    /// Killers at `ply`, most recent first
    pub fn killers(&self, ply: usize) -> [Option<Move>; KILLERS_PER_PLY] {
        self.killers.get(ply)
    }

    pub fn history(&self) -> &HistoryTable {
        &self.history
    }

    pub fn stats(&self) -> OrderingStats {
        self.stats
    }

    /// Statistics gathered since the last call; killers and history are kept
    pub fn take_stats(&mut self) -> OrderingStats {
        std::mem::take(&mut self.stats)
    }

    pub fn params(&self) -> &OrderingParams {
        &self.params
    }
}

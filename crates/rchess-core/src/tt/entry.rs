//! Transposition table entry types and bit layout

use chess::{ALL_PIECES, ALL_SQUARES, ChessMove};
use serde::{Deserialize, Serialize};

use crate::position::Move;
use crate::search::{MATE_SCORE, MATE_THRESHOLD};

/// Bound type of a stored score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bound {
    /// Exact score (PV node)
    Exact = 1,
    /// Lower bound (cut node, fail high)
    Lower = 2,
    /// Upper bound (all node, fail low)
    Upper = 3,
}

impl Bound {
    #[inline]
    fn from_bits(bits: u64) -> Option<Self> {
        match bits {
            1 => Some(Bound::Exact),
            2 => Some(Bound::Lower),
            3 => Some(Bound::Upper),
            _ => None,
        }
    }
}

// Data word layout:
//   bits  0..16  move (bit 15 = present)
//   bits 16..32  score (i16, two's complement)
//   bits 32..40  depth
//   bits 40..42  bound
//   bits 42..50  generation
const MOVE_MASK: u64 = 0xFFFF;
const MOVE_PRESENT: u16 = 1 << 15;
const SCORE_SHIFT: u32 = 16;
const DEPTH_SHIFT: u32 = 32;
const BOUND_SHIFT: u32 = 40;
const BOUND_MASK: u64 = 0x3;
const GEN_SHIFT: u32 = 42;

/// Cached search result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TTEntry {
    pub best_move: Option<Move>,
    /// Score in table form, see [`score_to_tt`]
    pub score: i32,
    pub depth: u8,
    pub bound: Bound,
    /// Generation the entry was written in. Filled in by the table on `put`.
    pub generation: u8,
}

impl TTEntry {
    pub fn new(best_move: Option<Move>, score: i32, depth: u8, bound: Bound) -> Self {
        Self {
            best_move,
            score,
            depth,
            bound,
            generation: 0,
        }
    }

    /// Pack into the 64-bit data word. Never returns 0 because the bound bits are
    /// always set.
    pub(crate) fn pack(&self) -> u64 {
        let mv = self.best_move.map_or(0, encode_move) as u64;
        let score = self.score.clamp(i16::MIN as i32, i16::MAX as i32) as i16 as u16 as u64;
        mv | (score << SCORE_SHIFT)
            | ((self.depth as u64) << DEPTH_SHIFT)
            | ((self.bound as u64) << BOUND_SHIFT)
            | ((self.generation as u64) << GEN_SHIFT)
    }

    /// Unpack a data word; `None` for an empty or malformed word
    pub(crate) fn unpack(data: u64) -> Option<Self> {
        let bound = Bound::from_bits((data >> BOUND_SHIFT) & BOUND_MASK)?;
        Some(Self {
            best_move: decode_move((data & MOVE_MASK) as u16),
            score: ((data >> SCORE_SHIFT) & 0xFFFF) as u16 as i16 as i32,
            depth: ((data >> DEPTH_SHIFT) & 0xFF) as u8,
            bound,
            generation: ((data >> GEN_SHIFT) & 0xFF) as u8,
        })
    }

    /// Whether the stored bound lets the caller cut off with window `[alpha, beta]`
    #[inline]
    pub fn cuts_off(&self, score: i32, alpha: i32, beta: i32) -> bool {
        match self.bound {
            Bound::Exact => true,
            Bound::Lower => score >= beta,
            Bound::Upper => score <= alpha,
        }
    }
}

/// Encode a move into 16 bits
#[inline]
pub(crate) fn encode_move(mv: ChessMove) -> u16 {
    let from = mv.get_source().to_index() as u16;
    let to = mv.get_dest().to_index() as u16;
    let promo = mv.get_promotion().map_or(0, |p| p.to_index() as u16);
    MOVE_PRESENT | from | (to << 6) | (promo << 12)
}

#[inline]
pub(crate) fn decode_move(bits: u16) -> Option<ChessMove> {
    if bits & MOVE_PRESENT == 0 {
        return None;
    }
    let from = ALL_SQUARES[(bits & 0x3F) as usize];
    let to = ALL_SQUARES[((bits >> 6) & 0x3F) as usize];
    let promo = match (bits >> 12) & 0x7 {
        0 => None,
        idx => ALL_PIECES.get(idx as usize).copied(),
    };
    Some(ChessMove::new(from, to, promo))
}

/// Convert a search score at `ply` into table form (mate distance from this node)
#[inline]
pub fn score_to_tt(score: i32, ply: u32) -> i32 {
    if score >= MATE_THRESHOLD {
        score + ply as i32
    } else if score <= -MATE_THRESHOLD {
        score - ply as i32
    } else {
        score
    }
}

/// Convert a table score back into a search score at `ply`
#[inline]
pub fn score_from_tt(score: i32, ply: u32) -> i32 {
    if score >= MATE_THRESHOLD {
        (score - ply as i32).min(MATE_SCORE)
    } else if score <= -MATE_THRESHOLD {
        (score + ply as i32).max(-MATE_SCORE)
    } else {
        score
    }
}

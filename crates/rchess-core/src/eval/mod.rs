//! Static evaluation

use chess::{ALL_PIECES, Color, Piece};

use crate::position::Position;

/// Piece values in centipawns, indexed by `Piece::to_index()`
pub const PIECE_VALUES: [i32; 6] = [100, 320, 330, 500, 900, 0];

/// Value of a piece in centipawns (king is 0)
#[inline]
pub fn piece_value(piece: Piece) -> i32 {
    PIECE_VALUES[piece.to_index()]
}

/// Trait for position evaluation
///
/// Contract:
/// - Returns a score in centipawns from the side-to-move perspective.
/// - Positive values favor the side to move; negative values favor the opponent.
/// - The search calls it only on positions at rest (no pending do/undo).
///
/// Implementations are shared between search threads.
pub trait Evaluator: Send + Sync {
    /// Evaluate position from side to move perspective
    fn evaluate(&self, pos: &Position) -> i32;
}

/// Implement Evaluator for Arc<T> where T: Evaluator
impl<T: Evaluator + ?Sized> Evaluator for std::sync::Arc<T> {
    fn evaluate(&self, pos: &Position) -> i32 {
        (**self).evaluate(pos)
    }
}

/// Material plus piece-square evaluation
#[derive(Clone, Copy, Debug, Default)]
pub struct MaterialEvaluator;

// Piece-square tables from white's point of view, a1 = index 0.
#[rustfmt::skip]
const PAWN_PST: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
     5, 10, 10,-20,-20, 10, 10,  5,
     5, -5,-10,  0,  0,-10, -5,  5,
     0,  0,  0, 20, 20,  0,  0,  0,
     5,  5, 10, 25, 25, 10,  5,  5,
    10, 10, 20, 30, 30, 20, 10, 10,
    50, 50, 50, 50, 50, 50, 50, 50,
     0,  0,  0,  0,  0,  0,  0,  0,
];

#[rustfmt::skip]
const KNIGHT_PST: [i32; 64] = [
   -50,-40,-30,-30,-30,-30,-40,-50,
   -40,-20,  0,  5,  5,  0,-20,-40,
   -30,  5, 10, 15, 15, 10,  5,-30,
   -30,  0, 15, 20, 20, 15,  0,-30,
   -30,  5, 15, 20, 20, 15,  5,-30,
   -30,  0, 10, 15, 15, 10,  0,-30,
   -40,-20,  0,  0,  0,  0,-20,-40,
   -50,-40,-30,-30,-30,-30,-40,-50,
];

#[rustfmt::skip]
const BISHOP_PST: [i32; 64] = [
   -20,-10,-10,-10,-10,-10,-10,-20,
   -10,  5,  0,  0,  0,  0,  5,-10,
   -10, 10, 10, 10, 10, 10, 10,-10,
   -10,  0, 10, 10, 10, 10,  0,-10,
   -10,  5,  5, 10, 10,  5,  5,-10,
   -10,  0,  5, 10, 10,  5,  0,-10,
   -10,  0,  0,  0,  0,  0,  0,-10,
   -20,-10,-10,-10,-10,-10,-10,-20,
];

#[rustfmt::skip]
const ROOK_PST: [i32; 64] = [
     0,  0,  0,  5,  5,  0,  0,  0,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
     5, 10, 10, 10, 10, 10, 10,  5,
     0,  0,  0,  0,  0,  0,  0,  0,
];

#[rustfmt::skip]
const KING_MIDDLE_PST: [i32; 64] = [
    20, 30, 10,  0,  0, 10, 30, 20,
    20, 20,  0,  0,  0,  0, 20, 20,
   -10,-20,-20,-20,-20,-20,-20,-10,
   -20,-30,-30,-40,-40,-30,-30,-20,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
];

#[rustfmt::skip]
const KING_END_PST: [i32; 64] = [
   -50,-30,-30,-30,-30,-30,-30,-50,
   -30,-30,  0,  0,  0,  0,-30,-30,
   -30,-10, 20, 30, 30, 20,-10,-30,
   -30,-10, 30, 40, 40, 30,-10,-30,
   -30,-10, 30, 40, 40, 30,-10,-30,
   -30,-10, 20, 30, 30, 20,-10,-30,
   -30,-20,-10,  0,  0,-10,-20,-30,
   -50,-40,-30,-20,-20,-30,-40,-50,
];

/// Non-pawn material (both sides) at or below which the king table switches to
/// the endgame one
const ENDGAME_MATERIAL: i32 = 1300;

impl MaterialEvaluator {
    fn pst(piece: Piece, idx: usize, endgame: bool) -> i32 {
        match piece {
            Piece::Pawn => PAWN_PST[idx],
            Piece::Knight => KNIGHT_PST[idx],
            Piece::Bishop => BISHOP_PST[idx],
            Piece::Rook => ROOK_PST[idx],
            Piece::Queen => 0,
            Piece::King if endgame => KING_END_PST[idx],
            Piece::King => KING_MIDDLE_PST[idx],
        }
    }
}

impl Evaluator for MaterialEvaluator {
    fn evaluate(&self, pos: &Position) -> i32 {
        let board = pos.board();

        let non_pawn: i32 = [Piece::Knight, Piece::Bishop, Piece::Rook, Piece::Queen]
            .into_iter()
            .map(|p| board.pieces(p).popcnt() as i32 * piece_value(p))
            .sum();
        let endgame = non_pawn <= ENDGAME_MATERIAL;

        let mut score = 0;
        for color in [Color::White, Color::Black] {
            let sign = if color == Color::White { 1 } else { -1 };
            let ours = *board.color_combined(color);
            for piece in ALL_PIECES {
                for sq in *board.pieces(piece) & ours {
                    // Tables are written for white; mirror ranks for black
                    let idx = match color {
                        Color::White => sq.to_index(),
                        Color::Black => sq.to_index() ^ 56,
                    };
                    score += sign * (piece_value(piece) + Self::pst(piece, idx, endgame));
                }
            }
        }

        if pos.side_to_move() == Color::White { score } else { -score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_is_balanced() {
        let pos = Position::startpos();
        assert_eq!(MaterialEvaluator.evaluate(&pos), 0);
    }

    #[test]
    fn test_side_to_move_perspective() {
        // White is a queen up
        let white = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        let black = Position::from_fen("4k3/8/8/8/8/8/8/3QK3 b - - 0 1").unwrap();
        let w = MaterialEvaluator.evaluate(&white);
        let b = MaterialEvaluator.evaluate(&black);
        assert!(w > 800, "queen up should be clearly winning, got {w}");
        assert_eq!(w, -b);
    }

    #[test]
    fn test_mirrored_position_is_symmetric() {
        let a = Position::from_fen("4k3/8/8/3n4/8/8/8/4K3 w - - 0 1").unwrap();
        let b = Position::from_fen("4k3/8/8/8/3N4/8/8/4K3 b - - 0 1").unwrap();
        assert_eq!(MaterialEvaluator.evaluate(&a), MaterialEvaluator.evaluate(&b));
    }
}

//! Zobrist hashing

use chess::{ALL_PIECES, Board, ChessMove, Color, File, Piece, Square};

use super::Position;

/// Zobrist key table
pub struct Zobrist {
    /// Side to move (XORed in when black is to move)
    pub side: u64,
    /// Piece on square [Color][Piece][Square]
    pub psq: [[[u64; 64]; 6]; 2],
    /// Castling rights [Color][CastleRights index], index 0 (no rights) stays 0
    pub castling: [[u64; 4]; 2],
    /// En passant file
    pub ep_file: [u64; 8],
}

impl Zobrist {
    /// Build the table from a fixed seed
    pub const fn init() -> Self {
        let mut zobrist = Zobrist {
            side: 0,
            psq: [[[0; 64]; 6]; 2],
            castling: [[0; 4]; 2],
            ep_file: [0; 8],
        };

        let mut seed = 0x9E37_79B9_7F4A_7C15u64;

        seed = xorshift64(seed);
        zobrist.side = seed;

        let mut c = 0;
        while c < 2 {
            let mut pc = 0;
            while pc < 6 {
                let mut sq = 0;
                while sq < 64 {
                    seed = xorshift64(seed);
                    zobrist.psq[c][pc][sq] = seed;
                    sq += 1;
                }
                pc += 1;
            }
            c += 1;
        }

        let mut c = 0;
        while c < 2 {
            let mut rights = 1;
            while rights < 4 {
                seed = xorshift64(seed);
                zobrist.castling[c][rights] = seed;
                rights += 1;
            }
            c += 1;
        }

        let mut file = 0;
        while file < 8 {
            seed = xorshift64(seed);
            zobrist.ep_file[file] = seed;
            file += 1;
        }

        zobrist
    }
}

/// XorShift64 step (const fn)
const fn xorshift64(mut x: u64) -> u64 {
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

/// Global Zobrist table
pub static ZOBRIST: Zobrist = Zobrist::init();

/// Computes 64-bit position fingerprints.
///
/// The fingerprint covers piece placement, side to move, castling rights and the
/// en passant file. Move counters are not part of it, so transposed move orders
/// that reach the same position produce the same key.
pub struct PositionHasher;

impl PositionHasher {
    /// Fingerprint of a position handle
    #[inline]
    pub fn hash(pos: &Position) -> u64 {
        Self::hash_board(pos.board())
    }

    /// Fingerprint of a bare board
    pub fn hash_board(board: &Board) -> u64 {
        let mut key = Self::rights_key(board);

        for color in [Color::White, Color::Black] {
            let ci = color.to_index();
            let ours = *board.color_combined(color);
            for piece in ALL_PIECES {
                let pi = piece.to_index();
                for sq in *board.pieces(piece) & ours {
                    key ^= ZOBRIST.psq[ci][pi][sq.to_index()];
                }
            }
        }

        if board.side_to_move() == Color::Black {
            key ^= ZOBRIST.side;
        }

        key
    }

    /// Castling rights and en passant part of the fingerprint
    fn rights_key(board: &Board) -> u64 {
        let mut key = 0;
        for color in [Color::White, Color::Black] {
            key ^= ZOBRIST.castling[color.to_index()][board.castle_rights(color).to_index()];
        }
        if let Some(ep) = board.en_passant() {
            key ^= ZOBRIST.ep_file[ep.get_file().to_index()];
        }
        key
    }

    /// Key change from `before` to `after` when `mv` is played.
    ///
    /// `mv` must be legal in `before`; `after` is the board it produces.
    pub fn move_delta(before: &Board, after: &Board, mv: ChessMove) -> u64 {
        let us = before.side_to_move();
        let them = !us;
        let (src, dst) = (mv.get_source(), mv.get_dest());
        let mut delta = ZOBRIST.side ^ Self::rights_key(before) ^ Self::rights_key(after);

        let Some(moved) = before.piece_on(src) else {
            return delta;
        };
        let placed = mv.get_promotion().unwrap_or(moved);
        delta ^= psq(us, moved, src) ^ psq(us, placed, dst);

        if let Some(captured) = before.piece_on(dst) {
            delta ^= psq(them, captured, dst);
        } else if moved == Piece::Pawn && src.get_file() != dst.get_file() {
            let victim = Square::make_square(src.get_rank(), dst.get_file());
            delta ^= psq(them, Piece::Pawn, victim);
        }

        let file_distance = src.get_file().to_index().abs_diff(dst.get_file().to_index());
        if moved == Piece::King && file_distance == 2 {
            let (rook_from, rook_to) = if dst.get_file() == File::G {
                (File::H, File::F)
            } else {
                (File::A, File::D)
            };
            let rank = src.get_rank();
            delta ^= psq(us, Piece::Rook, Square::make_square(rank, rook_from))
                ^ psq(us, Piece::Rook, Square::make_square(rank, rook_to));
        }

        delta
    }

    /// Key change of a null move from `before` to `after`
    pub fn null_move_delta(before: &Board, after: &Board) -> u64 {
        ZOBRIST.side ^ Self::rights_key(before) ^ Self::rights_key(after)
    }
}

#[inline]
fn psq(color: Color, piece: Piece, sq: Square) -> u64 {
    ZOBRIST.psq[color.to_index()][piece.to_index()][sq.to_index()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zobrist_keys_distinct() {
        let mut seen = std::collections::HashSet::new();
        assert!(seen.insert(ZOBRIST.side));
        for c in 0..2 {
            for pc in 0..6 {
                for sq in 0..64 {
                    assert!(seen.insert(ZOBRIST.psq[c][pc][sq]), "duplicate psq key");
                }
            }
            assert_eq!(ZOBRIST.castling[c][0], 0, "no-rights slot must not change the key");
        }
        for file in 0..8 {
            assert!(seen.insert(ZOBRIST.ep_file[file]));
        }
    }

    #[test]
    fn test_hash_is_deterministic() {
        let board = Board::default();
        assert_eq!(PositionHasher::hash_board(&board), PositionHasher::hash_board(&board));
        assert_ne!(PositionHasher::hash_board(&board), 0);
    }

    #[test]
    fn test_side_to_move_changes_hash() {
        let white = Position::from_fen("8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap();
        let black = Position::from_fen("8/8/8/4k3/8/8/8/4K3 b - - 0 1").unwrap();
        assert_eq!(white.key() ^ black.key(), ZOBRIST.side);
    }

    #[test]
    fn test_castling_rights_change_hash() {
        let all = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let none = Position::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w - - 0 1").unwrap();
        assert_ne!(all.key(), none.key());
    }

    #[test]
    fn test_move_counters_do_not_change_hash() {
        let a = Position::from_fen("8/8/8/4k3/8/8/8/4K3 w - - 0 1").unwrap();
        let b = Position::from_fen("8/8/8/4k3/8/8/8/4K3 w - - 37 80").unwrap();
        assert_eq!(a.key(), b.key());
    }
}

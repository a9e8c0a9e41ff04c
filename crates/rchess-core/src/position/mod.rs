//! Position handle used by the search
//!
//! `Position` wraps a `chess::Board` with an undo history so that the search can
//! work on one mutable handle: every `do_move` pushes the previous state and every
//! `undo_move` pops it. The handle also tracks the fifty-move counter, game ply
//! and Zobrist key, which the board itself does not carry.

use std::str::FromStr;

use chess::{Board, ChessMove, Color, EMPTY, MoveGen, Piece, Square};

use crate::error::PositionError;

pub mod zobrist;

pub use zobrist::{PositionHasher, ZOBRIST};

/// Move type used throughout the crate
pub type Move = ChessMove;

/// Standard starting position
pub const STARTPOS_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// State saved before each move so it can be undone
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct StateInfo {
    board: Board,
    key: u64,
    halfmove_clock: u32,
    /// None for a null move
    mv: Option<Move>,
}

/// Mutable position handle with do/undo support
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Position {
    board: Board,
    key: u64,
    halfmove_clock: u32,
    game_ply: u32,
    history: Vec<StateInfo>,
}

impl Default for Position {
    fn default() -> Self {
        Self::startpos()
    }
}

impl Position {
    /// Starting position
    pub fn startpos() -> Self {
        Self::from_board(Board::default(), 0, 0)
    }

    /// Parse a FEN string. Missing move counters default to `0 1`.
    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let tokens: Vec<&str> = fen.split_whitespace().collect();
        if tokens.len() < 4 {
            return Err(PositionError::InvalidFen {
                fen: fen.to_string(),
                reason: "expected at least 4 fields".to_string(),
            });
        }

        let board = Board::from_str(&tokens[..4].join(" ")).map_err(|e| {
            PositionError::InvalidFen {
                fen: fen.to_string(),
                reason: e.to_string(),
            }
        })?;

        let parse_counter = |idx: usize, default: u32| -> Result<u32, PositionError> {
            match tokens.get(idx) {
                Some(token) => token.parse().map_err(|_| PositionError::InvalidFen {
                    fen: fen.to_string(),
                    reason: format!("bad move counter '{token}'"),
                }),
                None => Ok(default),
            }
        };
        let halfmove_clock = parse_counter(4, 0)?;
        let fullmove = parse_counter(5, 1)?.max(1);
        let game_ply = (fullmove - 1) * 2 + u32::from(board.side_to_move() == Color::Black);

        Ok(Self::from_board(board, halfmove_clock, game_ply))
    }

    fn from_board(board: Board, halfmove_clock: u32, game_ply: u32) -> Self {
        Self {
            board,
            key: PositionHasher::hash_board(&board),
            halfmove_clock,
            game_ply,
            history: Vec::with_capacity(256),
        }
    }

    /// Underlying board
    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Zobrist fingerprint of the current state
    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    /// Plies since the last capture or pawn move
    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    /// Plies played since the start of the game
    #[inline]
    pub fn game_ply(&self) -> u32 {
        self.game_ply
    }

    /// Number of moves (including null moves) currently on the undo stack
    #[inline]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// All legal moves in generator order
    pub fn legal_moves(&self) -> Vec<Move> {
        MoveGen::new_legal(&self.board).collect()
    }

    /// Number of legal moves
    pub fn legal_move_count(&self) -> usize {
        MoveGen::new_legal(&self.board).len()
    }

    #[inline]
    pub fn in_check(&self) -> bool {
        *self.board.checkers() != EMPTY
    }

    /// Piece and its color on a square
    #[inline]
    pub fn piece_on(&self, sq: Square) -> Option<(Piece, Color)> {
        let piece = self.board.piece_on(sq)?;
        let color = self.board.color_on(sq)?;
        Some((piece, color))
    }

    /// Piece moved by `mv`
    #[inline]
    pub fn moved_piece(&self, mv: Move) -> Option<Piece> {
        self.board.piece_on(mv.get_source())
    }

    /// Piece captured by `mv`, including en passant
    pub fn captured_piece(&self, mv: Move) -> Option<Piece> {
        if let Some(piece) = self.board.piece_on(mv.get_dest()) {
            return Some(piece);
        }
        if self.is_en_passant(mv) {
            return Some(Piece::Pawn);
        }
        None
    }

    #[inline]
    pub fn is_capture(&self, mv: Move) -> bool {
        self.captured_piece(mv).is_some()
    }

    /// Neither a capture nor a promotion
    #[inline]
    pub fn is_quiet(&self, mv: Move) -> bool {
        mv.get_promotion().is_none() && !self.is_capture(mv)
    }

    fn is_en_passant(&self, mv: Move) -> bool {
        self.board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            && mv.get_source().get_file() != mv.get_dest().get_file()
            && self.board.piece_on(mv.get_dest()).is_none()
    }

    /// Whether `mv` leaves the opponent in check
    pub fn gives_check(&self, mv: Move) -> bool {
        *self.board.make_move_new(mv).checkers() != EMPTY
    }

    /// Whether `color` has any piece other than pawns and the king
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        let pawns_and_kings = *self.board.pieces(Piece::Pawn) | *self.board.pieces(Piece::King);
        (*self.board.color_combined(color) & !pawns_and_kings) != EMPTY
    }

    /// Total number of pieces on the board, kings included
    pub fn piece_count(&self) -> u32 {
        self.board.combined().popcnt()
    }

    /// Apply a move.
    ///
    /// Only the source square is checked; legality is assumed to come from
    /// `legal_moves`.
    pub fn do_move(&mut self, mv: Move) -> Result<(), PositionError> {
        let source = mv.get_source();
        let Some(moved) = self.board.piece_on(source) else {
            return Err(PositionError::NoPieceOnSource(mv.to_string()));
        };
        if self.board.color_on(source) != Some(self.board.side_to_move()) {
            return Err(PositionError::WrongSide(mv.to_string()));
        }

        let resets_clock = moved == Piece::Pawn || self.is_capture(mv);

        self.history.push(StateInfo {
            board: self.board,
            key: self.key,
            halfmove_clock: self.halfmove_clock,
            mv: Some(mv),
        });
        let next = self.board.make_move_new(mv);
        self.key ^= PositionHasher::move_delta(&self.board, &next, mv);
        self.board = next;
        self.halfmove_clock = if resets_clock { 0 } else { self.halfmove_clock + 1 };
        self.game_ply += 1;
        Ok(())
    }

    /// Undo the last move (or null move). Returns the undone move, `None` if
    /// it was a null move or the history is empty.
    pub fn undo_move(&mut self) -> Option<Move> {
        let state = self.history.pop()?;
        self.board = state.board;
        self.key = state.key;
        self.halfmove_clock = state.halfmove_clock;
        self.game_ply -= 1;
        state.mv
    }

    /// Pass the turn. Fails (returns false) when in check.
    pub fn do_null_move(&mut self) -> bool {
        let Some(next) = self.board.null_move() else {
            return false;
        };
        self.history.push(StateInfo {
            board: self.board,
            key: self.key,
            halfmove_clock: self.halfmove_clock,
            mv: None,
        });
        self.key ^= PositionHasher::null_move_delta(&self.board, &next);
        self.board = next;
        self.halfmove_clock += 1;
        self.game_ply += 1;
        true
    }

    pub fn undo_null_move(&mut self) {
        self.undo_move();
    }

    /// Whether the current position already occurred since the last
    /// irreversible move.
    pub fn is_repetition(&self) -> bool {
        self.history
            .iter()
            .rev()
            .take(self.halfmove_clock as usize)
            .skip(1)
            .step_by(2)
            .any(|state| state.key == self.key)
    }

    #[inline]
    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove_clock >= 100
    }

    /// Find the legal move with the given UCI notation (e.g. `e2e4`, `e7e8q`)
    pub fn parse_uci(&self, uci: &str) -> Option<Move> {
        MoveGen::new_legal(&self.board).find(|mv| mv.to_string() == uci)
    }

    /// FEN including this handle's move counters
    pub fn fen(&self) -> String {
        let board_fen = self.board.to_string();
        let fields: Vec<&str> = board_fen.split_whitespace().take(4).collect();
        format!("{} {} {}", fields.join(" "), self.halfmove_clock, self.game_ply / 2 + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(pos: &mut Position, moves: &[&str]) {
        for uci in moves {
            let mv = pos.parse_uci(uci).unwrap_or_else(|| panic!("illegal move {uci}"));
            pos.do_move(mv).unwrap();
        }
    }

    #[test]
    fn test_startpos_has_20_moves() {
        let pos = Position::startpos();
        assert_eq!(pos.legal_moves().len(), 20);
        assert_eq!(pos.side_to_move(), Color::White);
        assert!(!pos.in_check());
    }

    #[test]
    fn test_fen_round_trip() {
        let fen = "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3";
        let pos = Position::from_fen(fen).unwrap();
        assert_eq!(pos.fen(), fen);
        assert_eq!(pos.halfmove_clock(), 2);
        assert_eq!(pos.game_ply(), 4);
    }

    #[test]
    fn test_invalid_fen_rejected() {
        assert!(matches!(
            Position::from_fen("not a fen"),
            Err(PositionError::InvalidFen { .. })
        ));
        assert!(Position::from_fen("8/8/8/8/8/8/8/8 w - - x 1").is_err());
    }

    #[test]
    fn test_do_undo_restores_state() {
        let mut pos = Position::startpos();
        let before = pos.clone();
        play(&mut pos, &["e2e4", "e7e5", "g1f3"]);
        assert_eq!(pos.history_len(), 3);
        assert_eq!(pos.halfmove_clock(), 1);
        for _ in 0..3 {
            assert!(pos.undo_move().is_some());
        }
        assert_eq!(pos, before);
        assert!(pos.undo_move().is_none());
    }

    #[test]
    fn test_do_move_rejects_empty_source() {
        let mut pos = Position::startpos();
        let bogus = ChessMove::new(Square::E4, Square::E5, None);
        assert!(matches!(pos.do_move(bogus), Err(PositionError::NoPieceOnSource(_))));
        let wrong_side = ChessMove::new(Square::E7, Square::E5, None);
        assert!(matches!(pos.do_move(wrong_side), Err(PositionError::WrongSide(_))));
        assert_eq!(pos.history_len(), 0);
    }

    fn assert_keys_follow(fen: &str, moves: &[&str]) {
        let mut pos = Position::from_fen(fen).unwrap();
        let mut keys = vec![pos.key()];
        for uci in moves {
            play(&mut pos, &[uci]);
            assert_eq!(pos.key(), PositionHasher::hash(&pos), "after {uci} in {fen}");
            keys.push(pos.key());
        }
        while pos.undo_move().is_some() {
            keys.pop();
            assert_eq!(Some(&pos.key()), keys.last());
            assert_eq!(pos.key(), PositionHasher::hash(&pos));
        }
    }

    #[test]
    fn test_incremental_key_matches_full_hash() {
        // Quiet moves, pawn pushes and a capture
        let moves = ["d2d4", "g8f6", "c2c4", "e7e6", "b1c3", "f8b4", "a2a3", "b4c3"];
        assert_keys_follow(STARTPOS_FEN, &moves);
        // En passant
        assert_keys_follow(STARTPOS_FEN, &["e2e4", "d7d5", "e4d5", "c7c5", "d5c6"]);
        // Castling both ways, then a capture on the back rank
        assert_keys_follow(
            "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1",
            &["e1g1", "e8c8", "f1f8", "d8f8"],
        );
        // Capturing a rook on its home square drops that castling right
        assert_keys_follow("r3k2r/6B1/8/8/8/8/8/R3K2R w KQkq - 0 1", &["g7h8", "e8c8"]);
        // Promotions with and without capture
        assert_keys_follow("1n6/P6k/8/8/8/8/7p/4K3 w - - 0 1", &["a7b8q", "h2h1n", "b8b5"]);
    }

    #[test]
    fn test_null_move_key_clears_en_passant() {
        let mut pos = Position::startpos();
        play(&mut pos, &["e2e4", "a7a6", "e4e5", "d7d5"]);
        assert!(pos.board().en_passant().is_some());
        assert!(pos.do_null_move());
        assert_eq!(pos.key(), PositionHasher::hash(&pos));
        pos.undo_null_move();
        assert_eq!(pos.key(), PositionHasher::hash(&pos));
    }

    #[test]
    fn test_null_move() {
        let mut pos = Position::startpos();
        let key = pos.key();
        assert!(pos.do_null_move());
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_eq!(pos.key(), key ^ ZOBRIST.side);
        pos.undo_null_move();
        assert_eq!(pos.key(), key);

        let mut checked = Position::from_fen("4k3/8/8/8/8/8/4r3/4K3 w - - 0 1").unwrap();
        assert!(checked.in_check());
        assert!(!checked.do_null_move());
    }

    #[test]
    fn test_repetition_detection() {
        let mut pos = Position::startpos();
        play(&mut pos, &["g1f3", "g8f6", "f3g1", "f6g8"]);
        assert!(pos.is_repetition());
        let mut fresh = Position::startpos();
        play(&mut fresh, &["g1f3", "g8f6"]);
        assert!(!fresh.is_repetition());
    }

    #[test]
    fn test_en_passant_is_capture() {
        let mut pos = Position::startpos();
        play(&mut pos, &["e2e4", "a7a6", "e4e5", "d7d5"]);
        let ep = pos.parse_uci("e5d6").expect("en passant available");
        assert_eq!(pos.captured_piece(ep), Some(Piece::Pawn));
        assert!(!pos.is_quiet(ep));
    }

    #[test]
    fn test_material_queries() {
        let pos = Position::from_fen("4k3/pppp4/8/8/8/8/4P3/4K2R w K - 0 1").unwrap();
        assert!(pos.has_non_pawn_material(Color::White));
        assert!(!pos.has_non_pawn_material(Color::Black));
        assert_eq!(pos.piece_count(), 8);
    }
}

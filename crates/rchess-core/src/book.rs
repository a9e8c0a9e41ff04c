//! Opening book lookup

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::position::{Move, Position, PositionHasher};

/// Opening book consulted before any search.
///
/// A returned move is checked against the legal move list by the caller.
pub trait OpeningBook: Send + Sync {
    fn lookup(&self, pos: &Position) -> Option<Move>;
}

/// In-memory book keyed by position fingerprint
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MemoryBook {
    /// Fingerprint -> move in UCI notation
    entries: HashMap<u64, String>,
}

impl MemoryBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a book move for a position
    pub fn insert(&mut self, pos: &Position, uci: impl Into<String>) {
        self.entries.insert(PositionHasher::hash(pos), uci.into());
    }

    /// Build a book by replaying lines of UCI moves from the start position.
    ///
    /// Each line contributes one entry per ply. Lines stop at the first move
    /// that is illegal in the replayed position.
    pub fn from_lines<'a>(lines: impl IntoIterator<Item = &'a [&'a str]>) -> Self {
        let mut book = Self::new();
        for line in lines {
            let mut pos = Position::startpos();
            for uci in line {
                let Some(mv) = pos.parse_uci(uci) else {
                    log::warn!("book line stops at illegal move {uci}");
                    break;
                };
                book.entries.entry(pos.key()).or_insert_with(|| uci.to_string());
                if pos.do_move(mv).is_err() {
                    break;
                }
            }
        }
        book
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OpeningBook for MemoryBook {
    fn lookup(&self, pos: &Position) -> Option<Move> {
        let uci = self.entries.get(&PositionHasher::hash(pos))?;
        pos.parse_uci(uci)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_lookup() {
        let mut book = MemoryBook::new();
        let pos = Position::startpos();
        book.insert(&pos, "e2e4");
        assert_eq!(book.lookup(&pos).map(|m| m.to_string()), Some("e2e4".to_string()));

        let other = Position::from_fen("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(book.lookup(&other).is_none());
    }

    #[test]
    fn test_book_from_lines() {
        let line: &[&str] = &["e2e4", "c7c5", "g1f3"];
        let book = MemoryBook::from_lines([line]);
        assert_eq!(book.len(), 3);

        let mut pos = Position::startpos();
        let mv = pos.parse_uci("e2e4").unwrap();
        pos.do_move(mv).unwrap();
        assert_eq!(book.lookup(&pos).map(|m| m.to_string()), Some("c7c5".to_string()));
    }

    #[test]
    fn test_illegal_book_move_is_ignored() {
        let mut book = MemoryBook::new();
        let pos = Position::startpos();
        book.insert(&pos, "e2e5");
        assert!(book.lookup(&pos).is_none());
    }
}

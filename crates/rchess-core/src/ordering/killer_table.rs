//! Killer moves table
//!
//! Quiet moves that caused a beta cutoff, stored per ply. Each search thread
//! owns its own table.

use crate::position::Move;
use crate::search::MAX_PLY;

/// Maximum number of plies to track killer moves
const MAX_KILLER_PLY: usize = MAX_PLY as usize;

/// Number of killer moves per ply
pub const KILLERS_PER_PLY: usize = 2;

/// Killer moves indexed by [ply][slot], slot 0 is the most recent
pub struct KillerTable {
    killers: Vec<[Option<Move>; KILLERS_PER_PLY]>,
}

impl Default for KillerTable {
    fn default() -> Self {
        Self::new()
    }
}

impl KillerTable {
    pub fn new() -> Self {
        Self {
            killers: vec![[None; KILLERS_PER_PLY]; MAX_KILLER_PLY],
        }
    }

    /// Record a cutoff move at `ply`. Callers pass quiet moves only.
    pub fn update(&mut self, ply: usize, mv: Move) {
        let Some(slots) = self.killers.get_mut(ply) else {
            return;
        };
        if slots[0] == Some(mv) {
            return;
        }
        slots[1] = slots[0];
        slots[0] = Some(mv);
    }

    /// Killers at `ply`, most recent first
    pub fn get(&self, ply: usize) -> [Option<Move>; KILLERS_PER_PLY] {
        self.killers.get(ply).copied().unwrap_or([None; KILLERS_PER_PLY])
    }

    /// Slot of `mv` at `ply`, if it is a killer
    pub fn slot_of(&self, ply: usize, mv: Move) -> Option<usize> {
        self.get(ply).iter().position(|&k| k == Some(mv))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::{ChessMove, Square};

    #[test]
    fn test_killer_update_and_order() {
        let mut killers = KillerTable::new();
        let a = ChessMove::new(Square::G1, Square::F3, None);
        let b = ChessMove::new(Square::B1, Square::C3, None);
        let c = ChessMove::new(Square::E2, Square::E3, None);

        killers.update(4, a);
        assert_eq!(killers.get(4), [Some(a), None]);

        killers.update(4, b);
        assert_eq!(killers.get(4), [Some(b), Some(a)]);

        // Re-adding the most recent killer is a no-op
        killers.update(4, b);
        assert_eq!(killers.get(4), [Some(b), Some(a)]);

        killers.update(4, c);
        assert_eq!(killers.get(4), [Some(c), Some(b)]);
        assert_eq!(killers.slot_of(4, b), Some(1));
        assert_eq!(killers.slot_of(4, a), None);
        assert_eq!(killers.slot_of(5, c), None);
    }

    #[test]
    fn test_out_of_range_ply_is_ignored() {
        let mut killers = KillerTable::new();
        let a = ChessMove::new(Square::G1, Square::F3, None);
        killers.update(MAX_KILLER_PLY + 3, a);
        assert_eq!(killers.get(MAX_KILLER_PLY + 3), [None, None]);
    }
}

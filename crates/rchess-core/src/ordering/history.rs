//! History heuristic
//!
//! Butterfly table indexed by [color][from][to]. Cutoff moves gain `depth²`,
//! quiet moves searched before the cutoff lose the same amount. When any entry
//! reaches the ceiling the whole table is halved, which keeps values bounded and
//! lets old information fade.

use chess::Color;

use crate::position::Move;

const TABLE_SIZE: usize = 2 * 64 * 64;

pub struct HistoryTable {
    table: Vec<i32>,
    ceiling: i32,
    agings: u64,
}

impl HistoryTable {
    pub fn new(ceiling: i32) -> Self {
        Self {
            table: vec![0; TABLE_SIZE],
            ceiling: ceiling.max(1),
            agings: 0,
        }
    }

    #[inline]
    fn index(color: Color, mv: Move) -> usize {
        (color.to_index() << 12) | (mv.get_source().to_index() << 6) | mv.get_dest().to_index()
    }

    #[inline]
    pub fn get(&self, color: Color, mv: Move) -> i32 {
        self.table[Self::index(color, mv)]
    }

    /// Add `bonus` (negative for a malus); halves the table when the result
    /// reaches the ceiling in either direction
    pub fn update(&mut self, color: Color, mv: Move, bonus: i32) {
        let idx = Self::index(color, mv);
        let value = self.table[idx].saturating_add(bonus);
        self.table[idx] = value.clamp(-self.ceiling, self.ceiling);
        if value.abs() >= self.ceiling {
            self.age();
        }
    }

    /// Halve every entry
    pub fn age(&mut self) {
        for value in self.table.iter_mut() {
            *value /= 2;
        }
        self.agings += 1;
    }

    /// Number of times the table was halved
    pub fn agings(&self) -> u64 {
        self.agings
    }
}

//! Time budgets

use serde::{Deserialize, Serialize};

/// Time management tunable parameters
///
/// All fields are primitives so the struct stays `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeParameters {
    /// Reserved for communication and cleanup, subtracted from every budget
    pub overhead_ms: u64,
    /// Lower bound of any finite hard limit
    pub min_think_ms: u64,
    /// Soft limit as a fraction of the hard limit for fixed move times
    pub soft_ratio: f64,
    /// Moves left assumed when the clock does not say
    pub moves_horizon: u32,
    /// Share of the increment spent on each move
    pub increment_usage: f64,
    /// Hard limit as a multiple of the per-move target for clocks
    pub hard_multiplier: f64,
    /// Never plan to use more than this share of the remaining time
    pub max_usage_ratio: f64,
}

impl Default for TimeParameters {
    fn default() -> Self {
        Self {
            overhead_ms: 30,
            min_think_ms: 10,
            soft_ratio: 0.5,
            moves_horizon: 30,
            increment_usage: 0.8,
            hard_multiplier: 3.0,
            max_usage_ratio: 0.25,
        }
    }
}

/// Remaining game time of the side to move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameClock {
    pub remaining_ms: u64,
    #[serde(default)]
    pub increment_ms: u64,
    #[serde(default)]
    pub moves_to_go: Option<u32>,
}

/// Soft and hard deadline of one search, in milliseconds from its start.
///
/// The soft limit ends iterative deepening between iterations; the hard limit
/// aborts the iteration in flight. `soft_ms <= hard_ms` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBudget {
    pub soft_ms: u64,
    pub hard_ms: u64,
}

impl TimeBudget {
    pub fn new(soft_ms: u64, hard_ms: u64) -> Self {
        Self {
            soft_ms: soft_ms.min(hard_ms),
            hard_ms,
        }
    }

    /// No deadline
    pub fn infinite() -> Self {
        Self::new(u64::MAX, u64::MAX)
    }

    pub fn is_infinite(&self) -> bool {
        self.hard_ms == u64::MAX
    }

    /// Fixed time per move
    pub fn fixed(ms: u64, params: &TimeParameters) -> Self {
        let hard = ms.saturating_sub(params.overhead_ms).max(params.min_think_ms);
        let soft = (hard as f64 * params.soft_ratio) as u64;
        Self::new(soft, hard)
    }

    /// Budget derived from the game clock
    pub fn from_clock(clock: &GameClock, params: &TimeParameters) -> Self {
        let remaining = clock.remaining_ms.saturating_sub(params.overhead_ms);
        let moves_left = u64::from(clock.moves_to_go.unwrap_or(params.moves_horizon).max(1));
        let increment = (clock.increment_ms as f64 * params.increment_usage) as u64;
        let target = remaining / moves_left + increment;

        let cap = ((remaining as f64 * params.max_usage_ratio) as u64).max(params.min_think_ms);
        let hard = ((target as f64 * params.hard_multiplier) as u64)
            .min(cap)
            .max(params.min_think_ms);
        Self::new(target, hard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_budget() {
        let params = TimeParameters::default();
        let budget = TimeBudget::fixed(1000, &params);
        assert_eq!(budget.hard_ms, 970);
        assert_eq!(budget.soft_ms, 485);
        assert!(!budget.is_infinite());

        // Never below the minimum think time
        let tiny = TimeBudget::fixed(5, &params);
        assert_eq!(tiny.hard_ms, params.min_think_ms);
        assert!(tiny.soft_ms <= tiny.hard_ms);
    }

    #[test]
    fn test_clock_budget() {
        let params = TimeParameters::default();
        let clock = GameClock {
            remaining_ms: 60_030,
            increment_ms: 1000,
            moves_to_go: None,
        };
        let budget = TimeBudget::from_clock(&clock, &params);
        // 60000 / 30 + 800
        assert_eq!(budget.soft_ms, 2800);
        assert_eq!(budget.hard_ms, 8400);
    }

    #[test]
    fn test_clock_budget_is_capped_by_remaining_time() {
        let params = TimeParameters::default();
        let clock = GameClock {
            remaining_ms: 2030,
            increment_ms: 0,
            moves_to_go: Some(1),
        };
        let budget = TimeBudget::from_clock(&clock, &params);
        assert_eq!(budget.hard_ms, 500);
        assert_eq!(budget.soft_ms, 500, "soft limit is clamped to the hard limit");
    }

    #[test]
    fn test_infinite_budget() {
        let budget = TimeBudget::infinite();
        assert!(budget.is_infinite());
        assert_eq!(budget.soft_ms, u64::MAX);
    }
}

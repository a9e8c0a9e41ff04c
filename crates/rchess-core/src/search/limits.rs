//! Search limits of one request

use crate::time::{GameClock, TimeBudget, TimeParameters};

/// Limits of one `find_best_move` request
///
/// ```
/// use rchess_core::SearchLimits;
///
/// let limits = SearchLimits::builder().depth(6).fixed_time_ms(500).build();
/// assert_eq!(limits.depth, Some(6));
/// ```
#[derive(Clone, Debug, Default)]
pub struct SearchLimits {
    /// Maximum depth. When unset the coordinator derives one from the position.
    pub depth: Option<u32>,
    /// Fixed time for this move
    pub fixed_time_ms: Option<u64>,
    /// Game clock of the side to move; ignored when a fixed time is given
    pub clock: Option<GameClock>,
    /// Node limit per searching thread
    pub nodes: Option<u64>,
}

impl SearchLimits {
    pub fn builder() -> SearchLimitsBuilder {
        SearchLimitsBuilder::default()
    }

    /// Depth-only limits
    pub fn depth(depth: u32) -> Self {
        Self::builder().depth(depth).build()
    }

    /// Deadline of this request
    pub fn budget(&self, params: &TimeParameters) -> TimeBudget {
        if let Some(ms) = self.fixed_time_ms {
            TimeBudget::fixed(ms, params)
        } else if let Some(clock) = &self.clock {
            TimeBudget::from_clock(clock, params)
        } else {
            TimeBudget::infinite()
        }
    }
}

/// Builder for [`SearchLimits`]
#[derive(Default)]
pub struct SearchLimitsBuilder {
    limits: SearchLimits,
}

impl SearchLimitsBuilder {
    pub fn depth(mut self, depth: u32) -> Self {
        self.limits.depth = Some(depth.max(1));
        self
    }

    pub fn fixed_time_ms(mut self, ms: u64) -> Self {
        self.limits.fixed_time_ms = Some(ms);
        self
    }

    pub fn clock(mut self, clock: GameClock) -> Self {
        self.limits.clock = Some(clock);
        self
    }

    pub fn nodes(mut self, nodes: u64) -> Self {
        self.limits.nodes = Some(nodes);
        self
    }

    pub fn build(self) -> SearchLimits {
        self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_precedence() {
        let params = TimeParameters::default();
        let clock = GameClock {
            remaining_ms: 10_000,
            increment_ms: 0,
            moves_to_go: None,
        };

        let limits = SearchLimits::builder().fixed_time_ms(200).clock(clock).build();
        assert_eq!(limits.budget(&params), TimeBudget::fixed(200, &params));

        let limits = SearchLimits::builder().clock(clock).build();
        assert_eq!(limits.budget(&params), TimeBudget::from_clock(&clock, &params));

        assert!(SearchLimits::depth(3).budget(&params).is_infinite());
    }

    #[test]
    fn test_depth_is_at_least_one() {
        assert_eq!(SearchLimits::builder().depth(0).build().depth, Some(1));
    }
}

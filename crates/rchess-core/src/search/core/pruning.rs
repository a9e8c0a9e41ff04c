//! Pruning and reduction conditions
//!
//! Pure predicates over [`PruningParams`]; the node code decides where to
//! apply them.

use crate::search::is_mate_score;
use crate::search::params::PruningParams;

impl PruningParams {
    /// Null move pruning preconditions besides "side to move has pieces"
    #[inline]
    pub fn can_do_null_move(
        &self,
        depth: i32,
        in_check: bool,
        static_eval: i32,
        beta: i32,
    ) -> bool {
        !in_check
            && depth >= self.null_move_min_depth
            && static_eval >= beta
            && !is_mate_score(beta)
    }

    /// R = base + depth / divisor
    #[inline]
    pub fn null_move_reduction(&self, depth: i32) -> i32 {
        self.null_move_base_reduction + depth / self.null_move_depth_divisor.max(1)
    }

    /// Static beta pruning: the static eval beats beta by a depth-scaled margin
    #[inline]
    pub fn can_do_reverse_futility(
        &self,
        depth: i32,
        in_check: bool,
        static_eval: i32,
        beta: i32,
    ) -> bool {
        !in_check
            && depth <= self.reverse_futility_max_depth
            && !is_mate_score(beta)
            && static_eval - self.reverse_futility_margin * depth >= beta
    }

    #[inline]
    pub fn can_do_razoring(
        &self,
        depth: i32,
        in_check: bool,
        static_eval: i32,
        alpha: i32,
    ) -> bool {
        !in_check
            && depth <= self.razor_max_depth
            && !is_mate_score(alpha)
            && static_eval + self.razor_margin <= alpha
    }

    /// Whether quiet moves at this node may be skipped when their static
    /// margin cannot reach alpha
    #[inline]
    pub fn can_do_futility(
        &self,
        depth: i32,
        in_check: bool,
        static_eval: i32,
        alpha: i32,
    ) -> bool {
        !in_check
            && depth <= self.futility_max_depth
            && !is_mate_score(alpha)
            && static_eval + self.futility_margin * depth <= alpha
    }

    #[inline]
    pub fn can_do_lmr(&self, depth: i32, moves_searched: usize) -> bool {
        depth >= self.lmr_min_depth && moves_searched >= self.lmr_min_moves
    }

    /// Reduction in plies, always leaves at least one ply to search
    #[inline]
    pub fn lmr_reduction(&self, depth: i32, moves_searched: usize) -> i32 {
        let mut reduction = 1;
        if depth >= 6 && moves_searched >= 12 {
            reduction += 2;
        } else if depth >= 4 && moves_searched >= 6 {
            reduction += 1;
        }
        reduction.min(depth - 2).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::MATE_SCORE;

    #[test]
    fn test_null_move_conditions() {
        let params = PruningParams::default();
        assert!(params.can_do_null_move(3, false, 50, 0));
        assert!(!params.can_do_null_move(2, false, 50, 0), "too shallow");
        assert!(!params.can_do_null_move(5, true, 50, 0), "in check");
        assert!(!params.can_do_null_move(5, false, -50, 0), "eval below beta");
        assert!(!params.can_do_null_move(5, false, 50, MATE_SCORE - 10), "mate window");
        assert_eq!(params.null_move_reduction(3), 2);
        assert_eq!(params.null_move_reduction(8), 4);
    }

    #[test]
    fn test_lmr_reduction_bounds() {
        let params = PruningParams::default();
        assert!(!params.can_do_lmr(2, 10));
        assert!(!params.can_do_lmr(5, 2));
        assert!(params.can_do_lmr(3, 3));

        assert_eq!(params.lmr_reduction(3, 3), 1);
        assert_eq!(params.lmr_reduction(4, 6), 2);
        assert_eq!(params.lmr_reduction(8, 20), 3);
        for depth in 2..20 {
            for moves in 0..40 {
                let r = params.lmr_reduction(depth, moves);
                assert!(depth - 1 - r >= 1, "depth {depth} moves {moves} reduced to nothing");
            }
        }
    }

    #[test]
    fn test_margin_conditions() {
        let params = PruningParams::default();
        assert!(params.can_do_reverse_futility(1, false, 200, 50));
        assert!(!params.can_do_reverse_futility(1, false, 100, 50));
        assert!(params.can_do_razoring(1, false, -400, 0));
        assert!(!params.can_do_razoring(3, false, -400, 0));
        assert!(params.can_do_futility(2, false, -400, 0));
        assert!(!params.can_do_futility(2, true, -400, 0));
    }
}

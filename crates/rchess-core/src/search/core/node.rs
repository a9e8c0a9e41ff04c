//! Interior node search

use log::debug;
use smallvec::SmallVec;

use super::SearchCore;
use crate::position::{Move, Position};
use crate::search::types::{
    DRAW_SCORE, INFINITE, MAX_PLY, SearchState, is_mate_score, mate_in, mated_in,
};
use crate::tt::{TTEntry, score_from_tt, score_to_tt};

impl<const USE_PRUNING: bool> SearchCore<USE_PRUNING> {
    /// Negamax alpha-beta with PVS. Returns 0 once stopped; callers check
    /// `self.stopped` before using a score.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn alpha_beta(
        &mut self,
        pos: &mut Position,
        mut depth: i32,
        mut alpha: i32,
        mut beta: i32,
        ply: u32,
        mut extensions: u32,
        allow_null: bool,
    ) -> i32 {
        if self.should_stop() {
            return 0;
        }
        self.count_node(ply);

        if ply > 0 {
            if pos.is_repetition() || pos.is_fifty_move_draw() {
                return DRAW_SCORE;
            }

            // Mate distance pruning
            alpha = alpha.max(mated_in(ply));
            beta = beta.min(mate_in(ply + 1));
            if alpha >= beta {
                return alpha;
            }
        }

        if ply >= MAX_PLY - 1 {
            return self.evaluator.evaluate(pos);
        }

        let in_check = pos.in_check();
        if in_check && extensions < self.params.max_extensions {
            depth += 1;
            extensions += 1;
        }

        if depth <= 0 {
            return self.quiescence(pos, alpha, beta, ply, 0);
        }

        let original_alpha = alpha;
        let pv_node = beta - alpha > 1;
        let key = pos.key();

        let mut tt_move = None;
        if let Some(entry) = self.tt.get(key) {
            self.stats.tt_hits += 1;
            tt_move = entry.best_move;
            if !pv_node && entry.depth as i32 >= depth {
                let score = score_from_tt(entry.score, ply);
                if entry.cuts_off(score, alpha, beta) {
                    return score;
                }
            }
        }

        let static_eval = if USE_PRUNING && !in_check {
            self.evaluator.evaluate(pos)
        } else {
            -INFINITE
        };

        if USE_PRUNING && !pv_node && !in_check {
            let pruned = self.try_node_pruning(
                pos,
                depth,
                alpha,
                beta,
                ply,
                extensions,
                allow_null,
                static_eval,
            );
            if let Some(score) = pruned {
                return score;
            }
            if self.stopped {
                return 0;
            }
        }

        let moves = pos.legal_moves();
        if moves.is_empty() {
            return if in_check { mated_in(ply) } else { DRAW_SCORE };
        }

        // Forced reply
        if moves.len() == 1 && extensions < self.params.max_extensions {
            depth += 1;
            extensions += 1;
        }

        let moves = self.orderer.order(pos, moves, ply as usize, tt_move);

        let futility = USE_PRUNING
            && !pv_node
            && self.params.can_do_futility(depth, in_check, static_eval, alpha);

        let mut best_score = -INFINITE;
        let mut best_move: Option<Move> = None;
        let mut searched = 0usize;
        let mut quiets_tried: SmallVec<[Move; 32]> = SmallVec::new();

        for mv in moves {
            let quiet = pos.is_quiet(mv);

            if let Err(err) = pos.do_move(mv) {
                debug!("skipping move {mv} at ply {ply}: {err}");
                continue;
            }
            let gives_check = pos.in_check();

            if futility && searched > 0 && quiet && !gives_check {
                pos.undo_move();
                self.stats.futility_prunes += 1;
                continue;
            }

            let new_depth = depth - 1;
            let score = if searched == 0 {
                -self.alpha_beta(pos, new_depth, -beta, -alpha, ply + 1, extensions, true)
            } else {
                let reducible = USE_PRUNING && quiet && !in_check && !gives_check;
                let reduction = if reducible && self.params.can_do_lmr(depth, searched) {
                    self.params.lmr_reduction(depth, searched)
                } else {
                    0
                };
                if reduction > 0 {
                    self.stats.lmr_count += 1;
                }

                let next = ply + 1;
                let mut score = -self.alpha_beta(
                    pos,
                    new_depth - reduction,
                    -alpha - 1,
                    -alpha,
                    next,
                    extensions,
                    true,
                );
                if reduction > 0 && score > alpha && !self.stopped {
                    self.stats.lmr_researches += 1;
                    score = -self.alpha_beta(
                        pos,
                        new_depth,
                        -alpha - 1,
                        -alpha,
                        next,
                        extensions,
                        true,
                    );
                }
                if score > alpha && score < beta && !self.stopped {
                    score = -self.alpha_beta(pos, new_depth, -beta, -alpha, next, extensions, true);
                }
                score
            };

            pos.undo_move();
            if self.stopped {
                return 0;
            }
            searched += 1;

            if score > best_score {
                best_score = score;
                if score > alpha {
                    best_move = Some(mv);
                    if score >= beta {
                        let first_move = searched == 1;
                        self.orderer.record_cutoff(
                            pos,
                            mv,
                            ply as usize,
                            depth,
                            &quiets_tried,
                            first_move,
                        );
                        break;
                    }
                    alpha = score;
                }
            }

            if quiet {
                quiets_tried.push(mv);
            }
        }

        if searched == 0 {
            // Every move failed to apply
            return self.evaluator.evaluate(pos);
        }

        let bound = SearchState {
            original_alpha,
            original_beta: beta,
            score: best_score,
        }
        .bound();
        let stored_depth = depth.clamp(0, 255) as u8;
        let entry = TTEntry::new(best_move, score_to_tt(best_score, ply), stored_depth, bound);
        self.tt.put(key, entry);

        best_score
    }

    /// Reverse futility, razoring and null move pruning. `Some(score)` when the
    /// node can be cut.
    #[allow(clippy::too_many_arguments)]
    fn try_node_pruning(
        &mut self,
        pos: &mut Position,
        depth: i32,
        alpha: i32,
        beta: i32,
        ply: u32,
        extensions: u32,
        allow_null: bool,
        static_eval: i32,
    ) -> Option<i32> {
        if self.params.can_do_reverse_futility(depth, false, static_eval, beta) {
            return Some(static_eval);
        }

        if self.params.can_do_razoring(depth, false, static_eval, alpha) {
            let score = self.quiescence(pos, alpha, alpha + 1, ply, 0);
            if self.stopped {
                return None;
            }
            if score <= alpha {
                self.stats.razor_cuts += 1;
                return Some(score);
            }
        }

        if allow_null
            && self.params.can_do_null_move(depth, false, static_eval, beta)
            && pos.has_non_pawn_material(pos.side_to_move())
            && pos.do_null_move()
        {
            let reduction = self.params.null_move_reduction(depth);
            let null_depth = depth - 1 - reduction;
            let score =
                -self.alpha_beta(pos, null_depth, -beta, -beta + 1, ply + 1, extensions, false);
            pos.undo_null_move();
            if self.stopped {
                return None;
            }
            if score >= beta {
                self.stats.null_cuts += 1;
                return Some(if is_mate_score(score) { beta } else { score });
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256PlusPlus;

    use super::*;
    use crate::eval::MaterialEvaluator;
    use crate::ordering::OrderingParams;
    use crate::search::params::PruningParams;
    use crate::search::stop::StopSignal;
    use crate::search::core::{AdvancedSearch, StandardSearch};
    use crate::tt::TranspositionTable;

    fn advanced() -> AdvancedSearch {
        AdvancedSearch::new(
            Arc::new(MaterialEvaluator),
            Arc::new(TranspositionTable::new(1)),
            PruningParams::default(),
            OrderingParams::default(),
            StopSignal::default(),
        )
    }

    #[test]
    fn test_position_unchanged_after_search() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0xC0FFEE);
        let mut search = advanced();
        for _ in 0..6 {
            let mut pos = Position::startpos();
            for _ in 0..rng.random_range(0..16) {
                let moves = pos.legal_moves();
                if moves.is_empty() {
                    break;
                }
                let mv = moves[rng.random_range(0..moves.len())];
                pos.do_move(mv).expect("legal move");
            }
            let before = pos.clone();
            let fen = pos.fen();
            search.search(&mut pos, 3, -INFINITE, INFINITE);
            assert_eq!(pos, before);
            assert_eq!(pos.fen(), fen);
        }
    }

    #[test]
    fn test_repetition_scores_draw() {
        let mut pos = Position::startpos();
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            let mv = pos.parse_uci(uci).expect("legal");
            pos.do_move(mv).expect("legal move");
        }
        let mut search = advanced();
        // The position after the cycle repeats the start position
        assert_eq!(search.alpha_beta(&mut pos, 2, -INFINITE, INFINITE, 1, 0, true), DRAW_SCORE);
    }

    #[test]
    fn test_mate_distance_prunes_hopeless_window() {
        let mut pos = Position::startpos();
        let mut search = advanced();
        // At ply 5 nothing can beat a mate found at ply 2
        let alpha = mate_in(2);
        let score = search.alpha_beta(&mut pos, 4, alpha, alpha + 1, 5, 0, true);
        assert_eq!(score, alpha);
    }

    #[test]
    fn test_null_move_cuts_in_quiet_advantage() {
        // White is a queen up; a null window far below the eval is cut
        let mut pos =
            Position::from_fen("4k3/pppp4/8/8/8/8/PPPP4/3QK3 w - - 0 1").expect("valid fen");
        let mut search = advanced();
        let score = search.alpha_beta(&mut pos, 6, -301, -300, 1, 0, true);
        assert!(score >= -300);
        assert!(search.take_stats().null_cuts > 0);
    }

    #[test]
    fn test_standard_never_prunes() {
        let mut pos = Position::startpos();
        let mut search = StandardSearch::new(
            Arc::new(MaterialEvaluator),
            Arc::new(TranspositionTable::new(1)),
            PruningParams::default(),
            OrderingParams::default(),
            StopSignal::default(),
        );
        search.search(&mut pos, 4, -INFINITE, INFINITE);
        let stats = search.take_stats();
        assert_eq!(stats.null_cuts, 0);
        assert_eq!(stats.lmr_count, 0);
        assert_eq!(stats.futility_prunes, 0);
        assert_eq!(stats.razor_cuts, 0);
    }

    #[test]
    fn test_advanced_prunes_at_depth() {
        let mut pos = Position::startpos();
        let mut search = advanced();
        search.search(&mut pos, 5, -INFINITE, INFINITE);
        let stats = search.take_stats();
        assert!(stats.lmr_count > 0, "late quiet moves are reduced");
    }
}

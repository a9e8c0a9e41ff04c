//! Quiescence search
//!
//! Resolves captures and promotions below the horizon so that leaf scores are
//! taken in quiet positions. When in check every evasion is searched; at the
//! first quiescence ply quiet checking moves are searched as well.

use log::debug;

use super::SearchCore;
use crate::position::Position;
use crate::search::types::{DRAW_SCORE, INFINITE, MAX_PLY, mated_in};

impl<const USE_PRUNING: bool> SearchCore<USE_PRUNING> {
    pub(crate) fn quiescence(
        &mut self,
        pos: &mut Position,
        mut alpha: i32,
        beta: i32,
        ply: u32,
        qdepth: u32,
    ) -> i32 {
        if self.should_stop() {
            return 0;
        }
        self.count_node(ply);
        self.stats.qnodes += 1;

        if ply >= MAX_PLY - 1 {
            return self.evaluator.evaluate(pos);
        }

        let in_check = pos.in_check();
        let mut best_score = -INFINITE;

        if !in_check {
            let stand_pat = self.evaluator.evaluate(pos);
            if stand_pat >= beta || qdepth >= self.params.qsearch_max_depth {
                return stand_pat;
            }
            best_score = stand_pat;
            alpha = alpha.max(stand_pat);
        } else if qdepth >= self.params.qsearch_max_depth {
            return self.evaluator.evaluate(pos);
        }

        let moves = pos.legal_moves();
        if moves.is_empty() {
            return if in_check { mated_in(ply) } else { DRAW_SCORE };
        }

        let candidates: Vec<_> = if in_check {
            moves
        } else {
            moves
                .into_iter()
                .filter(|&mv| !pos.is_quiet(mv) || (qdepth == 0 && pos.gives_check(mv)))
                .collect()
        };
        let candidates = self.orderer.order(pos, candidates, ply as usize, None);

        for mv in candidates {
            if let Err(err) = pos.do_move(mv) {
                debug!("skipping quiescence move {mv}: {err}");
                continue;
            }
            let score = -self.quiescence(pos, -beta, -alpha, ply + 1, qdepth + 1);
            pos.undo_move();
            if self.stopped {
                return 0;
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    if score >= beta {
                        break;
                    }
                    alpha = score;
                }
            }
        }

        if best_score == -INFINITE {
            // In check and no evasion could be applied
            return self.evaluator.evaluate(pos);
        }
        best_score
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::eval::{Evaluator, MaterialEvaluator};
    use crate::ordering::OrderingParams;
    use crate::search::core::StandardSearch;
    use crate::search::params::PruningParams;
    use crate::search::stop::StopSignal;
    use crate::tt::TranspositionTable;

    fn search_with(params: PruningParams) -> StandardSearch {
        StandardSearch::new(
            Arc::new(MaterialEvaluator),
            Arc::new(TranspositionTable::new(1)),
            params,
            OrderingParams::default(),
            StopSignal::default(),
        )
    }

    #[test]
    fn test_stand_pat_in_quiet_position() {
        let mut pos = Position::startpos();
        let mut search = search_with(PruningParams::default());
        let score = search.quiescence(&mut pos, -INFINITE, INFINITE, 0, 0);
        assert_eq!(score, MaterialEvaluator.evaluate(&pos));
    }

    #[test]
    fn test_resolves_capture_sequence() {
        // Queen takes a pawn defended by a pawn: the recapture is seen
        let mut pos = Position::from_fen("k7/8/2p5/3p4/8/8/8/K2Q4 w - - 0 1").expect("valid fen");
        let mut search = search_with(PruningParams::default());
        let stand_pat = MaterialEvaluator.evaluate(&pos);
        let score = search.quiescence(&mut pos, -INFINITE, INFINITE, 0, 0);
        assert!(score >= stand_pat, "declining the bad capture keeps the stand pat");
        assert!(score < stand_pat + 100, "Qxd5 cxd5 is not counted as winning a pawn");
    }

    #[test]
    fn test_depth_bound_stops_at_stand_pat() {
        let mut pos = Position::from_fen("k7/8/2p5/3p4/8/8/8/K2Q4 w - - 0 1").expect("valid fen");
        let params = PruningParams {
            qsearch_max_depth: 0,
            ..PruningParams::default()
        };
        let mut search = search_with(params);
        let score = search.quiescence(&mut pos, -INFINITE, INFINITE, 0, 0);
        assert_eq!(score, MaterialEvaluator.evaluate(&pos));
        assert_eq!(search.take_stats().qnodes, 1);
    }

    #[test]
    fn test_checkmate_inside_quiescence() {
        let mut pos = Position::from_fen("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1").expect("valid fen");
        let mut search = search_with(PruningParams::default());
        assert_eq!(search.quiescence(&mut pos, -INFINITE, INFINITE, 3, 1), mated_in(3));
    }
}

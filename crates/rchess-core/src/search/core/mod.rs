//! Negamax alpha-beta core
//!
//! `SearchCore` is generic over whether selective pruning is enabled:
//! - `StandardSearch` (`USE_PRUNING = false`): PVS, TT cutoffs, check and
//!   forced-reply extensions, quiescence
//! - `AdvancedSearch` (`USE_PRUNING = true`): additionally null move, reverse
//!   futility, razoring, futility pruning and late move reductions
//!
//! One core is owned by one thread. The transposition table is the only state
//! shared with other cores.

mod node;
mod pruning;
mod qsearch;

use std::sync::Arc;

use log::debug;

use crate::error::SearchError;
use crate::eval::Evaluator;
use crate::ordering::{MoveOrderer, OrderingParams};
use crate::position::{Move, Position};
use crate::search::params::PruningParams;
use crate::search::stop::StopSignal;
use crate::search::types::{INFINITE, RootOutcome, SearchState, SearchStats};
use crate::tt::{TTEntry, TranspositionTable, score_to_tt};

/// Nodes between two reads of the clock and the node budget
const POLL_INTERVAL_MASK: u64 = 0x3FF;

/// Alpha-beta searcher without selective pruning
pub type StandardSearch = SearchCore<false>;

/// Alpha-beta searcher with selective pruning
pub type AdvancedSearch = SearchCore<true>;

pub struct SearchCore<const USE_PRUNING: bool> {
    evaluator: Arc<dyn Evaluator>,
    tt: Arc<TranspositionTable>,
    orderer: MoveOrderer,
    params: PruningParams,
    signal: StopSignal,
    /// Statistics of the current root call
    stats: SearchStats,
    /// Nodes searched by this core, compared against the node limit
    request_nodes: u64,
    stopped: bool,
}

impl<const USE_PRUNING: bool> SearchCore<USE_PRUNING> {
    pub fn new(
        evaluator: Arc<dyn Evaluator>,
        tt: Arc<TranspositionTable>,
        params: PruningParams,
        ordering: OrderingParams,
        signal: StopSignal,
    ) -> Self {
        Self {
            evaluator,
            tt,
            orderer: MoveOrderer::new(ordering),
            params,
            signal,
            stats: SearchStats::default(),
            request_nodes: 0,
            stopped: false,
        }
    }

    /// Replace the stop signal without touching the heuristics
    pub fn set_signal(&mut self, signal: StopSignal) {
        self.signal = signal;
    }

    /// Point the core at another table (after a resize)
    pub fn set_tt(&mut self, tt: Arc<TranspositionTable>) {
        self.tt = tt;
    }

    pub fn tt(&self) -> &Arc<TranspositionTable> {
        &self.tt
    }

    pub fn signal(&self) -> &StopSignal {
        &self.signal
    }

    /// Whether the last search was interrupted
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Forget a previous interruption before searching single moves with
    /// [`search_move`](Self::search_move)
    pub fn clear_stop(&mut self) {
        self.stopped = false;
    }

    /// Take the statistics gathered since the last call, ordering counters
    /// included
    pub fn take_stats(&mut self) -> SearchStats {
        let mut stats = std::mem::take(&mut self.stats);
        stats.ordering = self.orderer.take_stats();
        stats
    }

    /// Negamax score of `pos` at `depth` within `[alpha, beta]`, from the side
    /// to move's perspective. Fail-soft.
    pub fn search(&mut self, pos: &mut Position, depth: u32, alpha: i32, beta: i32) -> i32 {
        self.stopped = false;
        self.alpha_beta(pos, depth as i32, alpha, beta, 0, 0, true)
    }

    /// Search every legal root move at `depth`
    pub fn search_root(
        &mut self,
        pos: &mut Position,
        depth: u32,
        alpha: i32,
        beta: i32,
    ) -> Result<RootOutcome, SearchError> {
        let moves = self.order_root_moves(pos)?;
        self.search_root_moves(pos, &moves, depth, alpha, beta)
    }

    /// Legal root moves, best first
    pub fn order_root_moves(&mut self, pos: &Position) -> Result<Vec<Move>, SearchError> {
        let moves = pos.legal_moves();
        if moves.is_empty() {
            return Err(SearchError::NoLegalMoves);
        }
        let tt_move = self.tt.get(pos.key()).and_then(|entry| entry.best_move);
        Ok(self.orderer.order(pos, moves, 0, tt_move))
    }

    /// PVS over an already ordered list of root moves
    pub fn search_root_moves(
        &mut self,
        pos: &mut Position,
        moves: &[Move],
        depth: u32,
        alpha: i32,
        beta: i32,
    ) -> Result<RootOutcome, SearchError> {
        self.stopped = false;
        let depth = depth.max(1);
        let original_alpha = alpha;
        let mut alpha = alpha;
        let mut best_move = None;
        let mut best_score = -INFINITE;
        let mut searched = 0usize;

        for &mv in moves {
            let score = if searched == 0 {
                self.search_move(pos, mv, depth, alpha, beta)
            } else {
                match self.search_move(pos, mv, depth, alpha, alpha + 1) {
                    Ok(Some(score)) if score > alpha && score < beta => {
                        self.search_move(pos, mv, depth, alpha, beta)
                    }
                    other => other,
                }
            };

            let score = match score {
                Ok(Some(score)) => score,
                Ok(None) => break,
                Err(err) => {
                    debug!("skipping root move {mv}: {err}");
                    continue;
                }
            };
            searched += 1;

            if score > best_score {
                best_score = score;
                best_move = Some(mv);
                if score > alpha {
                    alpha = score;
                    if score >= beta {
                        break;
                    }
                }
            }
        }

        let aborted = self.stopped;
        if searched == 0 && !aborted {
            return Err(SearchError::NoSearchableMoves);
        }

        if !aborted {
            self.store_root(pos, best_move, best_score, depth, original_alpha, beta);
        }

        self.stats.depth = self.stats.depth.max(depth);
        Ok(RootOutcome {
            best_move,
            score: best_score,
            aborted,
            stats: self.take_stats(),
        })
    }

    /// Store a finished root result searched with window `[alpha, beta]`
    pub fn store_root(
        &self,
        pos: &Position,
        best_move: Option<Move>,
        score: i32,
        depth: u32,
        alpha: i32,
        beta: i32,
    ) {
        let bound = SearchState {
            original_alpha: alpha,
            original_beta: beta,
            score,
        }
        .bound();
        let entry = TTEntry::new(best_move, score_to_tt(score, 0), depth.min(255) as u8, bound);
        self.tt.put(pos.key(), entry);
    }

    /// Score of one root move searched at `depth` within `[alpha, beta]`.
    ///
    /// `Ok(None)` when the search was stopped, `Err` when the move could not be
    /// applied. The position is unchanged on return.
    pub fn search_move(
        &mut self,
        pos: &mut Position,
        mv: Move,
        depth: u32,
        alpha: i32,
        beta: i32,
    ) -> Result<Option<i32>, SearchError> {
        pos.do_move(mv)?;
        let score = -self.alpha_beta(pos, depth as i32 - 1, -beta, -alpha, 1, 0, true);
        pos.undo_move();
        Ok((!self.stopped).then_some(score))
    }

    /// Poll the stop signal; the clock and node budget are read every
    /// `POLL_INTERVAL_MASK + 1` nodes
    #[inline]
    fn should_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        let poll = self.request_nodes & POLL_INTERVAL_MASK == 0;
        if self.signal.is_raised() || (poll && self.signal.is_exhausted(self.request_nodes)) {
            self.stopped = true;
        }
        self.stopped
    }

    #[inline]
    fn count_node(&mut self, ply: u32) {
        self.stats.nodes += 1;
        self.request_nodes += 1;
        self.stats.seldepth = self.stats.seldepth.max(ply);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chess::Square;

    use crate::eval::MaterialEvaluator;
    use crate::search::{MATE_SCORE, mate_in};

    fn core<const P: bool>() -> SearchCore<P> {
        SearchCore::new(
            Arc::new(MaterialEvaluator),
            Arc::new(TranspositionTable::new(1)),
            PruningParams::default(),
            OrderingParams::default(),
            StopSignal::default(),
        )
    }

    #[test]
    fn test_root_search_returns_legal_move() {
        let mut pos = Position::startpos();
        let before = pos.clone();
        let mut search = core::<true>();
        let outcome = search.search_root(&mut pos, 3, -INFINITE, INFINITE).expect("search");
        assert!(!outcome.aborted);
        let mv = outcome.best_move.expect("a move");
        assert!(before.legal_moves().contains(&mv));
        assert_eq!(pos, before, "position restored");
        assert!(outcome.stats.nodes > 20);
        assert_eq!(outcome.stats.depth, 3);
    }

    #[test]
    fn test_finds_back_rank_mate() {
        // Rook lift to a8 mates
        let mut pos = Position::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").expect("valid fen");
        for pruning in [false, true] {
            let outcome = if pruning {
                core::<true>().search_root(&mut pos, 2, -INFINITE, INFINITE)
            } else {
                core::<false>().search_root(&mut pos, 2, -INFINITE, INFINITE)
            }
            .expect("search");
            assert_eq!(outcome.best_move, pos.parse_uci("a1a8"));
            assert_eq!(outcome.score, mate_in(1));
        }
    }

    #[test]
    fn test_mated_and_stalemate_scores() {
        let mut search = core::<false>();

        // Black to move is checkmated
        let mut mated = Position::from_fen("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1").expect("valid fen");
        assert_eq!(search.search(&mut mated, 3, -INFINITE, INFINITE), -MATE_SCORE);

        let mut stalemate =
            Position::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").expect("valid fen");
        assert_eq!(search.search(&mut stalemate, 3, -INFINITE, INFINITE), 0);
    }

    #[test]
    fn test_wins_hanging_queen() {
        let mut pos = Position::from_fen("k7/8/8/3q4/8/8/3R4/K7 w - - 0 1").expect("valid fen");
        let outcome = core::<true>().search_root(&mut pos, 3, -INFINITE, INFINITE).expect("search");
        assert_eq!(outcome.best_move, pos.parse_uci("d2d5"));
        assert!(outcome.score > 300);
    }

    #[test]
    fn test_stop_signal_aborts_without_storing() {
        let request = Arc::new(AtomicBool::new(true));
        let tt = Arc::new(TranspositionTable::new(1));
        let mut search: AdvancedSearch = SearchCore::new(
            Arc::new(MaterialEvaluator),
            tt.clone(),
            PruningParams::default(),
            OrderingParams::default(),
            StopSignal::new(request.clone()),
        );
        let mut pos = Position::startpos();
        let before = pos.clone();
        let outcome = search.search_root(&mut pos, 5, -INFINITE, INFINITE).expect("search");
        assert!(outcome.aborted);
        assert!(search.is_stopped());
        assert!(tt.get(pos.key()).is_none(), "aborted root is not stored");
        assert_eq!(pos, before);

        request.store(false, Ordering::Relaxed);
        let outcome = search.search_root(&mut pos, 2, -INFINITE, INFINITE).expect("search");
        assert!(!outcome.aborted, "stop flag is re-read for each root call");
    }

    #[test]
    fn test_node_limit_stops_search() {
        let mut search: StandardSearch = SearchCore::new(
            Arc::new(MaterialEvaluator),
            Arc::new(TranspositionTable::new(1)),
            PruningParams::default(),
            OrderingParams::default(),
            StopSignal::default().with_node_limit(Some(2_000)),
        );
        let mut pos = Position::startpos();
        let outcome = search.search_root(&mut pos, 30, -INFINITE, INFINITE).expect("search");
        assert!(outcome.aborted);
        assert!(outcome.stats.nodes < 2_000 + POLL_INTERVAL_MASK + 2);
    }

    #[test]
    fn test_standard_and_advanced_agree_on_tactics() {
        // At depth 1 both variants go straight into quiescence
        let fen = "r3k3/8/8/8/8/8/8/4K1N1 w - - 0 1";
        let mut pos = Position::from_fen(fen).expect("valid fen");
        let standard =
            core::<false>().search_root(&mut pos, 1, -INFINITE, INFINITE).expect("search");
        let advanced =
            core::<true>().search_root(&mut pos, 1, -INFINITE, INFINITE).expect("search");
        assert_eq!(standard.score, advanced.score);
    }

    #[test]
    fn test_root_result_is_stored_in_tt() {
        let mut search = core::<false>();
        let mut pos = Position::startpos();
        let outcome = search.search_root(&mut pos, 2, -INFINITE, INFINITE).expect("search");
        let entry = search.tt().get(pos.key()).expect("root entry");
        assert_eq!(entry.best_move, outcome.best_move);
        assert_eq!(entry.depth, 2);
    }

    #[test]
    fn test_unplayable_root_move_is_skipped() {
        let mut pos = Position::startpos();
        let before = pos.clone();
        let empty_source = Move::new(Square::E4, Square::E5, None);
        let knight = pos.parse_uci("b1c3").expect("legal");

        let mut search = core::<false>();
        let outcome = search
            .search_root_moves(&mut pos, &[empty_source, knight], 2, -INFINITE, INFINITE)
            .expect("search");
        assert_eq!(outcome.best_move, Some(knight));
        assert!(!outcome.aborted);
        assert_eq!(pos, before);

        let result = search.search_root_moves(&mut pos, &[empty_source], 2, -INFINITE, INFINITE);
        assert!(matches!(result, Err(SearchError::NoSearchableMoves)));
        assert_eq!(pos, before);
    }

    #[test]
    fn test_stats_carry_ordering_counters() {
        let mut pos = Position::startpos();
        let mut search = core::<true>();
        let outcome = search.search_root(&mut pos, 4, -INFINITE, INFINITE).expect("search");
        let ordering = outcome.stats.ordering;
        assert!(ordering.cutoffs > 0);
        assert!(ordering.first_move_cutoffs <= ordering.cutoffs);
        assert_eq!(search.take_stats().ordering.cutoffs, 0, "counters were handed over");
    }

    #[test]
    fn test_no_legal_moves_is_an_error() {
        let mut pos = Position::from_fen("R5k1/5ppp/8/8/8/8/8/6K1 b - - 0 1").expect("valid fen");
        let result = core::<true>().search_root(&mut pos, 2, -INFINITE, INFINITE);
        assert!(matches!(result, Err(SearchError::NoLegalMoves)));
    }
}

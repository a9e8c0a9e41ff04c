//! Parallel root splitting
//!
//! The calling thread searches the first ordered root move with the full
//! window (eldest brother). The remaining moves are then handed out to the
//! pool workers through a shared index; each worker searches its moves with a
//! null window around the best score proven so far and re-searches with the
//! full window when a move improves on it. A fail-high on any worker stops the
//! others.
//!
//! The transposition table is the only structure written by several threads.
//! Every worker owns its position copy and its killer/history tables.

mod thread_pool;
mod worker;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use crossbeam::channel;
use log::{debug, warn};

use crate::error::SearchError;
use crate::eval::Evaluator;
use crate::ordering::OrderingParams;
use crate::position::Position;
use crate::search::{AdvancedSearch, PruningParams, RootOutcome, StopSignal};
use crate::tt::TranspositionTable;

pub use thread_pool::ThreadPool;
pub(crate) use thread_pool::panic_message;
use worker::{MoveScore, RootSplit, RootTask, WorkerReport};

/// Everything a worker needs to build its own search core
#[derive(Clone)]
pub struct SharedContext {
    pub evaluator: Arc<dyn Evaluator>,
    pub tt: Arc<TranspositionTable>,
    pub pruning: PruningParams,
    pub ordering: OrderingParams,
    /// Request-level stop signal; workers add their split's local flag
    pub signal: StopSignal,
}

/// Root-splitting search over a [`ThreadPool`]
pub struct ParallelSearchEngine<'a> {
    pool: &'a ThreadPool,
    context: SharedContext,
    session_id: u64,
}

impl<'a> ParallelSearchEngine<'a> {
    /// `session_id` identifies the request; workers reset their heuristics
    /// when it changes
    pub fn new(pool: &'a ThreadPool, context: SharedContext, session_id: u64) -> Self {
        Self {
            pool,
            context,
            session_id,
        }
    }

    /// Search the root of `pos` at `depth` within `[alpha, beta]`.
    ///
    /// `main` searches the eldest brother on the calling thread. A worker
    /// failure returns [`SearchError::WorkerFailed`] only after every other
    /// worker has been stopped and drained.
    pub fn search(
        &self,
        main: &mut AdvancedSearch,
        pos: &mut Position,
        depth: u32,
        alpha: i32,
        beta: i32,
    ) -> Result<RootOutcome, SearchError> {
        if self.pool.is_closed() || self.pool.size() == 0 {
            return Err(SearchError::PoolClosed);
        }
        let depth = depth.max(1);

        let moves = main.order_root_moves(pos)?;
        main.clear_stop();

        let eldest = moves[0];
        let eldest_score = match main.search_move(pos, eldest, depth, alpha, beta)? {
            Some(score) => score,
            None => {
                return Ok(RootOutcome {
                    best_move: None,
                    score: 0,
                    aborted: true,
                    stats: main.take_stats(),
                });
            }
        };
        let mut stats = main.take_stats();

        let mut best = MoveScore {
            index: 0,
            score: eldest_score,
        };

        if eldest_score < beta && moves.len() > 1 {
            let split = Arc::new(RootSplit::new(
                moves.clone(),
                1,
                alpha.max(eldest_score),
                beta,
                depth,
            ));
            let root = Arc::new(pos.clone());
            let (report_tx, report_rx) = channel::unbounded();

            let mut dispatched = 0usize;
            let mut failure: Option<SearchError> = None;
            let helpers = self.pool.size().min(moves.len() - 1);
            for index in 0..helpers {
                let task = RootTask {
                    session_id: self.session_id,
                    root: root.clone(),
                    split: split.clone(),
                    context: self.context.clone(),
                    report_tx: report_tx.clone(),
                };
                match self.pool.dispatch(index, task) {
                    Ok(()) => dispatched += 1,
                    Err(err) => {
                        split.stop.store(true, Ordering::Release);
                        failure = Some(err);
                        break;
                    }
                }
            }
            drop(report_tx);

            let mut aborted = false;
            for _ in 0..dispatched {
                match report_rx.recv() {
                    Ok(WorkerReport::Done {
                        worker,
                        improvements,
                        stats: worker_stats,
                        aborted: worker_aborted,
                    }) => {
                        debug!("worker {worker} finished with {} improvements", improvements.len());
                        stats.merge(&worker_stats);
                        aborted |= worker_aborted;
                        for candidate in improvements {
                            if candidate.score > best.score
                                || (candidate.score == best.score && candidate.index < best.index)
                            {
                                best = candidate;
                            }
                        }
                    }
                    Ok(WorkerReport::Failed { worker, reason }) => {
                        warn!("parallel worker {worker} failed: {reason}");
                        split.stop.store(true, Ordering::Release);
                        failure.get_or_insert(SearchError::WorkerFailed { worker });
                    }
                    Err(_) => {
                        // Every sender is gone: a worker died without reporting
                        split.stop.store(true, Ordering::Release);
                        failure.get_or_insert(SearchError::WorkerFailed { worker: 0 });
                        break;
                    }
                }
            }

            if let Some(err) = failure {
                return Err(err);
            }

            if aborted || main.signal().request_stopped() {
                return Ok(RootOutcome {
                    best_move: None,
                    score: 0,
                    aborted: true,
                    stats,
                });
            }
        }

        let best_move = moves.get(best.index).copied();
        main.store_root(pos, best_move, best.score, depth, alpha, beta);
        stats.depth = stats.depth.max(depth);

        Ok(RootOutcome {
            best_move,
            score: best.score,
            aborted: false,
            stats,
        })
    }
}

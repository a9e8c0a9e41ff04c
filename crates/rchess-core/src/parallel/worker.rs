//! Root-split task executed on a pool worker

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};

use crossbeam::channel::Sender;
use log::debug;

use super::SharedContext;
use crate::position::{Move, Position};
use crate::search::{AdvancedSearch, SearchStats};

/// Root moves of one parallel iteration, shared by every worker
pub(crate) struct RootSplit {
    /// Ordered root moves; index 0 (eldest brother) is searched by the caller
    pub moves: Vec<Move>,
    /// Next move index to hand out
    pub next: AtomicUsize,
    /// Best score proven so far, the lower bound of every window
    pub best: AtomicI32,
    pub beta: i32,
    pub depth: u32,
    /// Raised on a fail-high or a worker failure
    pub stop: Arc<AtomicBool>,
}

impl RootSplit {
    pub fn new(moves: Vec<Move>, first_free: usize, best: i32, beta: i32, depth: u32) -> Self {
        Self {
            moves,
            next: AtomicUsize::new(first_free),
            best: AtomicI32::new(best),
            beta,
            depth,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }
}

pub(crate) struct RootTask {
    pub session_id: u64,
    pub root: Arc<Position>,
    pub split: Arc<RootSplit>,
    pub context: SharedContext,
    pub report_tx: Sender<WorkerReport>,
}

/// A root move whose score beat the shared best when it was searched
#[derive(Debug, Clone, Copy)]
pub(crate) struct MoveScore {
    pub index: usize,
    pub score: i32,
}

pub(crate) enum WorkerReport {
    Done {
        worker: usize,
        improvements: Vec<MoveScore>,
        stats: SearchStats,
        /// Stopped by the request (cancel, deadline, node budget) rather than
        /// by the split itself
        aborted: bool,
    },
    Failed {
        worker: usize,
        reason: String,
    },
}

/// Worker-owned state reused across tasks
pub(crate) struct WorkerLocal {
    session_id: u64,
    position: Option<Position>,
    core: Option<AdvancedSearch>,
}

impl WorkerLocal {
    pub fn new() -> Self {
        Self {
            session_id: 0,
            position: None,
            core: None,
        }
    }

    pub fn run(&mut self, worker: usize, task: RootTask) -> WorkerReport {
        let RootTask {
            session_id,
            root,
            split,
            context,
            report_tx: _,
        } = task;
        let signal = context.signal.clone().with_local(split.stop.clone());

        // New request: fresh killers and history
        if self.session_id != session_id || self.core.is_none() {
            self.core = Some(AdvancedSearch::new(
                context.evaluator.clone(),
                context.tt.clone(),
                context.pruning,
                context.ordering,
                signal.clone(),
            ));
            self.session_id = session_id;
        }

        // Reuse the position copy while the root is unchanged
        if !self.position.as_ref().is_some_and(|pos| pos.key() == root.key() && *pos == *root) {
            self.position = Some(Position::clone(&root));
        }

        let (Some(core), Some(pos)) = (self.core.as_mut(), self.position.as_mut()) else {
            return WorkerReport::Failed {
                worker,
                reason: "worker state missing".to_string(),
            };
        };
        core.set_signal(signal);
        core.set_tt(context.tt.clone());
        core.clear_stop();

        let improvements = search_split(core, pos, &split);
        let aborted = core.is_stopped() && !split.stop.load(Ordering::Acquire);

        WorkerReport::Done {
            worker,
            improvements,
            stats: core.take_stats(),
            aborted,
        }
    }
}

/// Take moves from the split until none are left or the split stops
fn search_split(
    core: &mut AdvancedSearch,
    pos: &mut Position,
    split: &RootSplit,
) -> Vec<MoveScore> {
    let mut improvements = Vec::new();

    while !split.stop.load(Ordering::Acquire) {
        let index = split.next.fetch_add(1, Ordering::AcqRel);
        let Some(&mv) = split.moves.get(index) else {
            break;
        };

        let alpha = split.best.load(Ordering::Acquire);
        if alpha >= split.beta {
            split.stop.store(true, Ordering::Release);
            break;
        }

        // Null window around the shared best, full window when it improves
        let score = match core.search_move(pos, mv, split.depth, alpha, alpha + 1) {
            Ok(Some(score)) if score > alpha && score < split.beta => {
                core.search_move(pos, mv, split.depth, alpha, split.beta)
            }
            other => other,
        };
        let score = match score {
            Ok(Some(score)) => score,
            Ok(None) => break,
            Err(err) => {
                debug!("worker skipping root move {mv}: {err}");
                continue;
            }
        };

        if score <= alpha {
            continue;
        }
        split.best.fetch_max(score, Ordering::AcqRel);
        improvements.push(MoveScore { index, score });
        if score >= split.beta {
            split.stop.store(true, Ordering::Release);
            break;
        }
    }

    improvements
}

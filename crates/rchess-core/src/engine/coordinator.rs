//! Top-level search coordinator
//!
//! Owns everything that outlives a single request (transposition table,
//! worker pool, time manager, configuration) and drives iterative deepening
//! for each request:
//!
//! 1. trivial positions are answered without searching (no legal move, book
//!    move, single legal move)
//! 2. each depth picks a strategy with [`EngineSelector`] and walks its
//!    fallback chain until one of them completes the depth
//! 3. the last completed depth wins; when none completed, a one-ply greedy
//!    choice is returned
//!
//! Strategy failures never escape a request: errors and panics are logged
//! and the next strategy in the chain is tried.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use crossbeam::channel;
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};

use super::handle::SearchHandle;
use super::memory::MemoryProbe;
use super::selector::{EngineKind, EngineSelector, PositionProfile, SelectionInput};
use crate::book::OpeningBook;
use crate::config::{EngineConfig, MAX_HASH_MB, MAX_THREADS, MIN_HASH_MB};
use crate::error::SearchError;
use crate::eval::{Evaluator, MaterialEvaluator};
use crate::parallel::{ParallelSearchEngine, SharedContext, ThreadPool, panic_message};
use crate::position::{Move, Position};
use crate::search::{
    AdvancedSearch, DRAW_SCORE, INFINITE, MATE_SCORE, MAX_PLY, ResultSource, RootOutcome,
    SearchLimits, SearchParams, SearchResult, SearchStats, StandardSearch, StopSignal,
    is_mate_score,
};
use crate::time::TimeManager;
use crate::tt::{ReplacementStats, TranspositionTable};

/// Lifecycle of the current (or last) request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordinatorState {
    #[default]
    Idle,
    Initializing,
    IterativeDeepening,
    Completed,
    Cancelled,
    /// No depth completed; the greedy fallback answered
    Failed,
}

/// Adaptive search entry point.
///
/// Cheap to clone; clones share the same table and pool. One request runs at
/// a time, concurrent requests queue on an internal lock. Every request has
/// its own cancel flag.
///
/// ```
/// use rchess_core::{Position, SearchCoordinator, SearchLimits};
///
/// let coordinator = SearchCoordinator::builder().build().unwrap();
/// let mut pos = Position::startpos();
/// let result = coordinator.find_best_move(&mut pos, &SearchLimits::depth(2));
/// assert!(result.best_move.is_some());
/// ```
#[derive(Clone)]
pub struct SearchCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: RwLock<EngineConfig>,
    evaluator: Arc<dyn Evaluator>,
    book: Option<Arc<dyn OpeningBook>>,
    memory_probe: Option<Arc<dyn MemoryProbe>>,
    tt: RwLock<Arc<TranspositionTable>>,
    /// Helper threads; the requesting thread is the remaining search thread
    pool: Mutex<ThreadPool>,
    /// Cancel flag of the request holding `request_lock`
    current_cancel: Mutex<Option<Arc<AtomicBool>>>,
    timer: TimeManager,
    state: Mutex<CoordinatorState>,
    request_lock: Mutex<()>,
    session: AtomicU64,
}

/// Builder for [`SearchCoordinator`]
#[derive(Default)]
pub struct SearchCoordinatorBuilder {
    config: EngineConfig,
    evaluator: Option<Arc<dyn Evaluator>>,
    book: Option<Arc<dyn OpeningBook>>,
    memory_probe: Option<Arc<dyn MemoryProbe>>,
}

impl SearchCoordinatorBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Static evaluator; [`MaterialEvaluator`] when unset
    pub fn evaluator(mut self, evaluator: impl Evaluator + 'static) -> Self {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    pub fn book(mut self, book: impl OpeningBook + 'static) -> Self {
        self.book = Some(Arc::new(book));
        self
    }

    /// Memory usage source; transposition table occupancy when unset
    pub fn memory_probe(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.memory_probe = Some(Arc::new(probe));
        self
    }

    pub fn build(self) -> Result<SearchCoordinator, SearchError> {
        self.config.validate()?;
        let pool = ThreadPool::new(self.config.threads - 1)?;
        let tt = Arc::new(TranspositionTable::new(self.config.hash_mb));
        info!(
            "search coordinator ready: threads={} hash={}MB",
            self.config.threads, self.config.hash_mb
        );

        Ok(SearchCoordinator {
            inner: Arc::new(CoordinatorInner {
                config: RwLock::new(self.config),
                evaluator: self.evaluator.unwrap_or_else(|| Arc::new(MaterialEvaluator)),
                book: self.book,
                memory_probe: self.memory_probe,
                tt: RwLock::new(tt),
                pool: Mutex::new(pool),
                current_cancel: Mutex::new(None),
                timer: TimeManager::new(),
                state: Mutex::new(CoordinatorState::Idle),
                request_lock: Mutex::new(()),
                session: AtomicU64::new(0),
            }),
        })
    }
}

/// Per-request working set
struct Request {
    config: EngineConfig,
    tt: Arc<TranspositionTable>,
    signal: StopSignal,
    session_id: u64,
    standard: StandardSearch,
    advanced: AdvancedSearch,
    stats: SearchStats,
}

/// Publishes a request's cancel flag as the running one until dropped
struct RunningRequest<'a> {
    slot: &'a Mutex<Option<Arc<AtomicBool>>>,
}

impl<'a> RunningRequest<'a> {
    fn install(slot: &'a Mutex<Option<Arc<AtomicBool>>>, cancel: Arc<AtomicBool>) -> Self {
        *slot.lock() = Some(cancel);
        Self { slot }
    }
}

impl Drop for RunningRequest<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

/// Best result of a completed depth
#[derive(Debug, Clone, Copy)]
struct CompletedDepth {
    best_move: Move,
    score: i32,
    depth: u32,
    engine: EngineKind,
}

enum DepthOutcome {
    Completed(RootOutcome, EngineKind),
    Aborted,
    Failed,
}

impl SearchCoordinator {
    pub fn builder() -> SearchCoordinatorBuilder {
        SearchCoordinatorBuilder::default()
    }

    /// Coordinator with the material evaluator and no book
    pub fn new(config: EngineConfig) -> Result<Self, SearchError> {
        Self::builder().config(config).build()
    }

    /// Search `pos` within `limits` and return the best move found.
    ///
    /// The position is searched in place and is equal to its input on
    /// return.
    pub fn find_best_move(&self, pos: &mut Position, limits: &SearchLimits) -> SearchResult {
        self.run_request(pos, limits, Arc::new(AtomicBool::new(false)))
    }

    /// Run [`find_best_move`](Self::find_best_move) on the `rchess-search`
    /// thread.
    ///
    /// The request's cancel flag exists before the thread starts, so
    /// [`SearchHandle::cancel`] right after this call is never lost, even
    /// while the request still queues behind another one.
    pub fn find_best_move_async(
        &self,
        pos: Position,
        limits: SearchLimits,
    ) -> Result<SearchHandle, SearchError> {
        let cancel = Arc::new(AtomicBool::new(false));
        let (result_tx, result_rx) = channel::bounded(1);
        let coordinator = self.clone();
        let request_cancel = cancel.clone();
        let thread = thread::Builder::new()
            .name("rchess-search".to_string())
            .spawn(move || {
                let mut pos = pos;
                let result = coordinator.run_request(&mut pos, &limits, request_cancel);
                if result_tx.send(result).is_err() {
                    debug!("search handle dropped before the result arrived");
                }
            })?;
        Ok(SearchHandle::new(result_rx, thread, self.clone(), cancel))
    }

    /// Ask the running request to stop. The request returns the last
    /// completed depth (or the greedy fallback). Queued requests are not
    /// affected.
    pub fn cancel(&self) {
        let current = self.inner.current_cancel.lock();
        match current.as_ref() {
            Some(flag) => {
                flag.store(true, Ordering::Release);
                self.inner.timer.cancel();
                debug!("search cancel requested");
            }
            None => debug!("cancel requested with no search running"),
        }
    }

    /// Raise one request's flag; the timer is only touched while that request
    /// is the running one
    pub(crate) fn cancel_request(&self, flag: &Arc<AtomicBool>) {
        flag.store(true, Ordering::Release);
        let current = self.inner.current_cancel.lock();
        if current.as_ref().is_some_and(|running| Arc::ptr_eq(running, flag)) {
            self.inner.timer.cancel();
        }
        debug!("search cancel requested");
    }

    /// Shut the worker pool down. Idempotent; later requests run on the
    /// calling thread only.
    pub fn cleanup(&self) {
        let mut pool = self.inner.pool.lock();
        if !pool.is_closed() {
            pool.shutdown();
            info!("search workers released");
        }
    }

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state.lock()
    }

    /// Change the number of search threads (the requesting thread included).
    /// Reopens a pool closed by [`cleanup`](Self::cleanup).
    pub fn set_threads(&self, threads: usize) -> Result<(), SearchError> {
        let clamped = threads.clamp(1, MAX_THREADS);
        if clamped != threads {
            warn!("thread count {threads} out of range, using {clamped}");
        }
        if let Err(err) = self.inner.pool.lock().resize(clamped - 1) {
            error!("failed to resize worker pool to {clamped} threads: {err}");
            return Err(err);
        }
        self.inner.config.write().threads = clamped;
        info!("search threads set to {clamped}");
        Ok(())
    }

    /// Replace the transposition table. Waits for a running request.
    pub fn set_hash_size(&self, mb: usize) {
        let clamped = mb.clamp(MIN_HASH_MB, MAX_HASH_MB);
        if clamped != mb {
            warn!("hash size {mb}MB out of range, using {clamped}MB");
        }
        let _request = self.inner.request_lock.lock();
        *self.inner.tt.write() = Arc::new(TranspositionTable::new(clamped));
        self.inner.config.write().hash_mb = clamped;
        info!("hash size set to {clamped}MB");
    }

    pub fn clear_hash(&self) {
        self.inner.tt.read().clear();
    }

    pub fn tt_stats(&self) -> ReplacementStats {
        self.inner.tt.read().replacement_stats()
    }

    /// Shared transposition table
    pub fn transposition_table(&self) -> Arc<TranspositionTable> {
        self.inner.tt.read().clone()
    }

    pub fn config(&self) -> EngineConfig {
        self.inner.config.read().clone()
    }

    fn set_state(&self, state: CoordinatorState) {
        *self.inner.state.lock() = state;
    }

    fn run_request(
        &self,
        pos: &mut Position,
        limits: &SearchLimits,
        cancel: Arc<AtomicBool>,
    ) -> SearchResult {
        let _request = self.inner.request_lock.lock();
        let _running = RunningRequest::install(&self.inner.current_cancel, cancel.clone());
        let start = Instant::now();
        self.set_state(CoordinatorState::Initializing);

        let config = self.inner.config.read().clone();
        let session_id = self.inner.session.fetch_add(1, Ordering::Relaxed) + 1;
        let timer = &self.inner.timer;
        timer.start_search(limits.budget(&config.time));
        if cancel.load(Ordering::Acquire) {
            timer.cancel();
        }

        let tt = self.inner.tt.read().clone();
        let hashfull = tt.hashfull();
        if hashfull >= config.tt_clear_permille {
            info!("transposition table {hashfull} permille full, clearing");
            tt.clear();
        }
        tt.new_search();

        let legal = pos.legal_moves();
        if let Some(result) = self.trivial_result(pos, &legal) {
            return self.finish(result, CoordinatorState::Completed, start);
        }

        let signal = StopSignal::new(cancel.clone())
            .with_timer(timer.clone())
            .with_node_limit(limits.nodes);
        let max_depth = match limits.depth {
            Some(depth) => depth.clamp(1, MAX_PLY - 1),
            None => adaptive_depth(pos.piece_count(), legal.len(), &config.search),
        };
        debug!(
            "request {session_id}: {} legal moves, max depth {max_depth}, soft={}ms hard={}ms",
            legal.len(),
            timer.soft_limit_ms(),
            timer.hard_limit_ms()
        );

        let evaluator = self.inner.evaluator.clone();
        let mut request = Request {
            standard: StandardSearch::new(
                evaluator.clone(),
                tt.clone(),
                config.pruning,
                config.ordering,
                signal.clone(),
            ),
            advanced: AdvancedSearch::new(
                evaluator,
                tt.clone(),
                config.pruning,
                config.ordering,
                signal.clone(),
            ),
            config,
            tt,
            signal,
            session_id,
            stats: SearchStats::default(),
        };

        self.set_state(CoordinatorState::IterativeDeepening);
        let best = self.iterative_deepening(&mut request, pos, &legal, max_depth);

        let cancelled = cancel.load(Ordering::Acquire);
        let mut stats = std::mem::take(&mut request.stats);
        let (result, state) = match best {
            Some(done) => {
                stats.depth = done.depth;
                let pv_max_len = request.config.search.pv_max_len;
                stats.pv = principal_variation(&request.tt, pos, done.best_move, pv_max_len);
                let result = SearchResult {
                    best_move: Some(done.best_move),
                    score: done.score,
                    depth: done.depth,
                    engine: Some(done.engine),
                    source: ResultSource::Search,
                    stats,
                };
                let state = if cancelled {
                    CoordinatorState::Cancelled
                } else {
                    CoordinatorState::Completed
                };
                (result, state)
            }
            None => {
                warn!("no depth completed, using one-ply greedy move");
                stats.depth = 0;
                let (best_move, score) = self.greedy_move(pos, &legal);
                stats.pv = best_move.into_iter().collect();
                let result =
                    SearchResult::new(best_move, score, ResultSource::GreedyFallback, stats);
                let state = if cancelled {
                    CoordinatorState::Cancelled
                } else {
                    CoordinatorState::Failed
                };
                (result, state)
            }
        };

        self.finish(result, state, start)
    }

    /// Answers that need no search
    fn trivial_result(&self, pos: &Position, legal: &[Move]) -> Option<SearchResult> {
        if legal.is_empty() {
            let score = if pos.in_check() { -MATE_SCORE } else { DRAW_SCORE };
            debug!("no legal moves, score {score}");
            return Some(SearchResult::no_move(score));
        }

        if let Some(book) = &self.inner.book {
            match book.lookup(pos) {
                Some(mv) if legal.contains(&mv) => {
                    debug!("book move {mv}");
                    return Some(single_move_result(mv, ResultSource::Book));
                }
                Some(mv) => warn!("ignoring illegal book move {mv} in {}", pos.fen()),
                None => {}
            }
        }

        if let [only] = legal {
            debug!("single legal move {only}");
            return Some(single_move_result(*only, ResultSource::ForcedMove));
        }

        None
    }

    fn iterative_deepening(
        &self,
        request: &mut Request,
        pos: &mut Position,
        legal: &[Move],
        max_depth: u32,
    ) -> Option<CompletedDepth> {
        let selector = EngineSelector::new(request.config.selector);
        let profile = PositionProfile::analyze(pos, legal);
        let complex = profile.is_complex(selector.config());
        let params = request.config.search;
        let mut best: Option<CompletedDepth> = None;
        let mut failed_in_row = 0;

        for depth in 1..=max_depth {
            if request.signal.request_stopped() {
                break;
            }
            if depth > 1 && self.inner.timer.should_stop() {
                debug!("soft deadline reached before depth {depth}");
                break;
            }

            let (workers, resources_closed) = {
                let pool = self.inner.pool.lock();
                (pool.size() + 1, pool.is_closed())
            };
            let kind = selector.select(&SelectionInput {
                depth,
                legal_moves: legal.len(),
                memory_usage: self.memory_usage(&request.tt),
                complex,
                game_ply: pos.game_ply(),
                workers,
                resources_closed,
            });

            let (alpha, beta) = match best {
                Some(prev)
                    if depth >= params.aspiration_min_depth && !is_mate_score(prev.score) =>
                {
                    let margin = params.aspiration_margin;
                    (prev.score.saturating_sub(margin), prev.score.saturating_add(margin))
                }
                _ => (-INFINITE, INFINITE),
            };

            let mut outcome = self.search_depth(request, kind, pos, depth, alpha, beta);
            if let DepthOutcome::Completed(root, _) = &outcome {
                let narrow = alpha > -INFINITE || beta < INFINITE;
                if narrow && (root.score <= alpha || root.score >= beta) {
                    debug!(
                        "depth {depth}: score {} outside aspiration window [{alpha}, {beta}], re-searching",
                        root.score
                    );
                    request.stats.aspiration_failures += 1;
                    outcome = self.search_depth(request, kind, pos, depth, -INFINITE, INFINITE);
                }
            }

            match outcome {
                DepthOutcome::Completed(root, engine) => {
                    let Some(best_move) = root.best_move else {
                        break;
                    };
                    failed_in_row = 0;
                    request.stats.iterations += 1;
                    debug!(
                        "depth {depth} [{engine:?}]: {best_move} score {} nodes {}",
                        root.score, request.stats.nodes
                    );
                    best = Some(CompletedDepth {
                        best_move,
                        score: root.score,
                        depth,
                        engine,
                    });
                    if params.mate_early_stop && is_mate_score(root.score) {
                        debug!("mate score at depth {depth}, stopping");
                        break;
                    }
                }
                DepthOutcome::Aborted => {
                    let kept = best.map_or(0, |b| b.depth);
                    debug!("depth {depth} interrupted, keeping depth {kept}");
                    break;
                }
                DepthOutcome::Failed => {
                    warn!("{}", SearchError::AllStrategiesFailed { depth });
                    failed_in_row += 1;
                    if failed_in_row >= params.max_failed_depths {
                        warn!("{failed_in_row} depths failed in a row, stopping at depth {depth}");
                        break;
                    }
                }
            }
        }

        best
    }

    /// One depth, walking the fallback chain of `kind`
    fn search_depth(
        &self,
        request: &mut Request,
        kind: EngineKind,
        pos: &mut Position,
        depth: u32,
        alpha: i32,
        beta: i32,
    ) -> DepthOutcome {
        let snapshot = pos.clone();

        for (attempt, &engine) in kind.fallback_chain().iter().enumerate() {
            if attempt > 0 {
                request.stats.strategy_fallbacks += 1;
            }

            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                self.run_strategy(request, engine, pos, depth, alpha, beta)
            }));

            if *pos != snapshot {
                error!("{engine:?} search left the position modified at depth {depth}, restoring");
                *pos = snapshot.clone();
            }

            let failure = match result {
                Ok(Ok(mut root)) => {
                    if root.aborted {
                        root.stats.depth = 0;
                        request.stats.merge(&root.stats);
                        return DepthOutcome::Aborted;
                    }
                    request.stats.merge(&root.stats);
                    if root.best_move.is_some() {
                        return DepthOutcome::Completed(root, engine);
                    }
                    SearchError::StrategyFailed {
                        engine,
                        reason: "no move returned".to_string(),
                    }
                }
                Ok(Err(err)) => err,
                Err(payload) => SearchError::StrategyFailed {
                    engine,
                    reason: format!("panicked: {}", panic_message(payload.as_ref())),
                },
            };
            warn!("{engine:?} search failed at depth {depth}: {failure}");
        }

        DepthOutcome::Failed
    }

    fn run_strategy(
        &self,
        request: &mut Request,
        engine: EngineKind,
        pos: &mut Position,
        depth: u32,
        alpha: i32,
        beta: i32,
    ) -> Result<RootOutcome, SearchError> {
        match engine {
            EngineKind::Standard => request.standard.search_root(pos, depth, alpha, beta),
            EngineKind::Advanced => request.advanced.search_root(pos, depth, alpha, beta),
            EngineKind::Parallel => {
                let pool = self.inner.pool.lock();
                let context = SharedContext {
                    evaluator: self.inner.evaluator.clone(),
                    tt: request.tt.clone(),
                    pruning: request.config.pruning,
                    ordering: request.config.ordering,
                    signal: request.signal.clone(),
                };
                ParallelSearchEngine::new(&pool, context, request.session_id).search(
                    &mut request.advanced,
                    pos,
                    depth,
                    alpha,
                    beta,
                )
            }
        }
    }

    fn memory_usage(&self, tt: &TranspositionTable) -> f64 {
        match &self.inner.memory_probe {
            Some(probe) => probe.usage_ratio(),
            None => f64::from(tt.hashfull()) / 1000.0,
        }
    }

    /// Move maximizing the negated static evaluation one ply down
    fn greedy_move(&self, pos: &mut Position, legal: &[Move]) -> (Option<Move>, i32) {
        let snapshot = pos.clone();
        let evaluator = &self.inner.evaluator;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut best: Option<(Move, i32)> = None;
            for &mv in legal {
                if pos.do_move(mv).is_err() {
                    continue;
                }
                let score = -evaluator.evaluate(pos);
                pos.undo_move();
                if best.is_none_or(|(_, best_score)| score > best_score) {
                    best = Some((mv, score));
                }
            }
            best
        }));
        if *pos != snapshot {
            error!("greedy evaluation left the position modified, restoring");
            *pos = snapshot;
        }

        match outcome {
            Ok(Some((mv, score))) => (Some(mv), score),
            Ok(None) => (legal.first().copied(), 0),
            Err(payload) => {
                warn!("greedy evaluation panicked: {}", panic_message(payload.as_ref()));
                (legal.first().copied(), 0)
            }
        }
    }

    fn finish(
        &self,
        mut result: SearchResult,
        state: CoordinatorState,
        start: Instant,
    ) -> SearchResult {
        result.stats.elapsed = start.elapsed();
        self.inner.timer.finish();
        self.set_state(state);

        let stats = &result.stats;
        info!(
            "search finished: move={} score={} depth={} source={:?} engine={:?} nodes={} nps={} time={}ms fallbacks={} state={state:?}",
            result.best_move.map_or_else(|| "none".to_string(), |mv| mv.to_string()),
            result.score,
            result.depth,
            result.source,
            result.engine,
            stats.nodes,
            stats.nps(),
            stats.elapsed.as_millis(),
            stats.strategy_fallbacks,
        );
        result
    }
}

/// Max depth derived from the position when the request sets none
pub fn adaptive_depth(piece_count: u32, legal_moves: usize, params: &SearchParams) -> u32 {
    let mut depth = params.base_depth;
    if piece_count <= params.endgame_piece_threshold {
        depth = depth.saturating_add(params.endgame_depth_bonus);
    }
    if legal_moves >= params.high_branching_threshold {
        depth = depth.saturating_sub(1);
    } else if legal_moves <= params.narrow_move_threshold {
        depth = depth.saturating_add(1);
    }
    let ceiling = params.max_depth.clamp(1, MAX_PLY - 1);
    depth.clamp(params.min_depth.clamp(1, ceiling), ceiling)
}

fn single_move_result(mv: Move, source: ResultSource) -> SearchResult {
    let stats = SearchStats {
        pv: vec![mv],
        ..SearchStats::default()
    };
    SearchResult::new(Some(mv), 0, source, stats)
}

/// `best_move` followed by the table's best moves
fn principal_variation(
    tt: &TranspositionTable,
    pos: &mut Position,
    best_move: Move,
    max_len: usize,
) -> Vec<Move> {
    let mut pv = vec![best_move];
    if max_len > 1 && pos.do_move(best_move).is_ok() {
        pv.extend(tt.extract_pv(pos, max_len - 1));
        pos.undo_move();
    }
    pv
}

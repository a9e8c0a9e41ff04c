//! Parallel strategy through the coordinator, including worker failures

use rchess_core::{
    EngineConfig, EngineKind, Evaluator, MaterialEvaluator, Position, ResultSource,
    SearchCoordinator, SearchLimits, SelectorConfig,
};

/// Start position after 1.Nf3 Nf6 2.Ng1 Ng8, past the opening-ply gate
const OPENING_PLAYED_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 4 3";

fn parallel_config(threads: usize) -> EngineConfig {
    EngineConfig {
        threads,
        selector: SelectorConfig {
            parallel_depth_threshold: 2,
            parallel_move_threshold: 10,
            opening_half_moves: 2,
            memory_pressure_threshold: 1.0,
            ..SelectorConfig::default()
        },
        ..EngineConfig::default()
    }
}

#[test]
fn test_parallel_strategy_is_selected_and_legal() {
    let coordinator = SearchCoordinator::new(parallel_config(3)).expect("coordinator");
    let mut pos = Position::from_fen(OPENING_PLAYED_FEN).expect("valid fen");
    let before = pos.clone();

    let result = coordinator.find_best_move(&mut pos, &SearchLimits::depth(4));
    assert_eq!(result.engine, Some(EngineKind::Parallel));
    assert_eq!(result.source, ResultSource::Search);
    assert_eq!(result.stats.strategy_fallbacks, 0);
    assert!(pos.legal_moves().contains(&result.best_move.expect("a move")));
    assert_eq!(pos, before);
}

#[test]
fn test_parallel_finds_same_tactic_as_serial() {
    // Past the opening; Rxd5 wins the queen
    let fen = "k7/8/8/3q4/8/8/3R4/K7 w - - 0 30";
    let mut config = parallel_config(2);
    config.selector.parallel_move_threshold = 5;

    let parallel = SearchCoordinator::new(config).expect("coordinator");
    let serial = SearchCoordinator::new(EngineConfig::default()).expect("coordinator");

    let mut pos = Position::from_fen(fen).expect("valid fen");
    let parallel_result = parallel.find_best_move(&mut pos, &SearchLimits::depth(4));
    let serial_result = serial.find_best_move(&mut pos, &SearchLimits::depth(4));

    assert_eq!(parallel_result.engine, Some(EngineKind::Parallel));
    assert_eq!(parallel_result.best_move, pos.parse_uci("d2d5"));
    assert_eq!(serial_result.best_move, parallel_result.best_move);
}

#[test]
fn test_single_thread_never_runs_parallel() {
    let coordinator = SearchCoordinator::new(parallel_config(1)).expect("coordinator");
    let mut pos = Position::from_fen(OPENING_PLAYED_FEN).expect("valid fen");
    let result = coordinator.find_best_move(&mut pos, &SearchLimits::depth(3));
    assert_eq!(result.engine, Some(EngineKind::Advanced));
}

/// Panics whenever it runs on a pool worker
struct WorkerPanickingEvaluator;

impl Evaluator for WorkerPanickingEvaluator {
    fn evaluate(&self, pos: &Position) -> i32 {
        let on_worker = std::thread::current()
            .name()
            .is_some_and(|name| name.starts_with("rchess-worker"));
        if on_worker {
            panic!("evaluator failure on pool worker");
        }
        MaterialEvaluator.evaluate(pos)
    }
}

#[test]
fn test_worker_panic_falls_back_to_advanced() {
    let coordinator = SearchCoordinator::builder()
        .config(parallel_config(3))
        .evaluator(WorkerPanickingEvaluator)
        .build()
        .expect("coordinator");
    let mut pos = Position::from_fen(OPENING_PLAYED_FEN).expect("valid fen");
    let before = pos.clone();

    let result = coordinator.find_best_move(&mut pos, &SearchLimits::depth(3));
    assert_eq!(result.source, ResultSource::Search);
    assert_eq!(result.engine, Some(EngineKind::Advanced));
    assert!(result.stats.strategy_fallbacks >= 1);
    assert_eq!(result.depth, 3);
    assert!(pos.legal_moves().contains(&result.best_move.expect("a move")));
    assert_eq!(pos, before, "position restored after the failed attempt");
}

#[test]
fn test_set_threads_enables_parallel() {
    let coordinator = SearchCoordinator::new(parallel_config(1)).expect("coordinator");
    coordinator.set_threads(2).expect("resize");
    let mut pos = Position::from_fen(OPENING_PLAYED_FEN).expect("valid fen");
    let result = coordinator.find_best_move(&mut pos, &SearchLimits::depth(3));
    assert_eq!(result.engine, Some(EngineKind::Parallel));
}

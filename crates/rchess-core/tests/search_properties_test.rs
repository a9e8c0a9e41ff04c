//! Properties that hold for every request: position restored, aspiration
//! re-search agrees with a full window, strategy selection is monotone

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rchess_core::engine::{PositionProfile, SelectionInput};
use rchess_core::{
    EngineConfig, EngineKind, EngineSelector, Position, SearchCoordinator, SearchLimits,
    SelectorConfig,
};

#[test]
fn test_random_positions_are_restored_after_search() {
    let coordinator = SearchCoordinator::new(EngineConfig {
        threads: 2,
        selector: SelectorConfig {
            parallel_depth_threshold: 2,
            parallel_move_threshold: 1,
            opening_half_moves: 0,
            ..SelectorConfig::default()
        },
        ..EngineConfig::default()
    })
    .expect("coordinator");
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0x5EED_CAFE);

    for _ in 0..12 {
        let mut pos = Position::startpos();
        for _ in 0..rng.random_range(1..24) {
            let moves = pos.legal_moves();
            if moves.is_empty() {
                break;
            }
            let mv = moves[rng.random_range(0..moves.len())];
            pos.do_move(mv).expect("legal move");
        }

        let before = pos.clone();
        let fen = pos.fen();
        let result = coordinator.find_best_move(&mut pos, &SearchLimits::depth(3));
        assert_eq!(pos.fen(), fen);
        assert_eq!(pos, before, "history and fingerprint restored");
        if let Some(mv) = result.best_move {
            assert!(pos.legal_moves().contains(&mv));
        }
    }
}

fn standard_only(aspiration_min_depth: u32, aspiration_margin: i32) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.selector.advanced_depth_threshold = 100;
    config.search.aspiration_min_depth = aspiration_min_depth;
    config.search.aspiration_margin = aspiration_margin;
    config
}

#[test]
fn test_aspiration_failure_matches_full_window() {
    // Quiet pawn ending: no checks or captures within reach
    let fen = "k7/8/8/8/8/8/PPP5/7K w - - 0 1";
    let depth = 4;

    let narrow = SearchCoordinator::new(standard_only(2, 1)).expect("coordinator");
    let full = SearchCoordinator::new(standard_only(100, 50)).expect("coordinator");

    let mut pos = Position::from_fen(fen).expect("valid fen");
    let narrow_result = narrow.find_best_move(&mut pos, &SearchLimits::depth(depth));
    let full_result = full.find_best_move(&mut pos, &SearchLimits::depth(depth));

    assert!(narrow_result.stats.aspiration_failures > 0, "window of one centipawn must fail");
    assert_eq!(full_result.stats.aspiration_failures, 0);
    assert_eq!(narrow_result.engine, Some(EngineKind::Standard));
    assert_eq!(narrow_result.depth, full_result.depth);
    assert_eq!(narrow_result.score, full_result.score);
    assert!(pos.legal_moves().contains(&narrow_result.best_move.expect("a move")));
}

fn input(depth: u32, legal_moves: usize, complex: bool) -> SelectionInput {
    SelectionInput {
        depth,
        legal_moves,
        memory_usage: 0.2,
        complex,
        game_ply: 30,
        workers: 4,
        resources_closed: false,
    }
}

#[test]
fn test_selection_is_monotone_past_parallel_thresholds() {
    let config = SelectorConfig::default();
    let selector = EngineSelector::new(config);

    for depth in config.parallel_depth_threshold..config.parallel_depth_threshold + 20 {
        for legal_moves in config.parallel_move_threshold..config.parallel_move_threshold + 40 {
            assert_eq!(
                selector.select(&input(depth, legal_moves, false)),
                EngineKind::Parallel,
                "depth {depth}, {legal_moves} moves"
            );
            assert_ne!(selector.select(&input(depth, legal_moves, true)), EngineKind::Parallel);
        }
    }
}

#[test]
fn test_complexity_comes_from_the_position() {
    let config = SelectorConfig::default();
    let quiet = Position::startpos();
    assert!(!PositionProfile::analyze(&quiet, &quiet.legal_moves()).is_complex(&config));

    // Kiwipete: 48 legal moves, several captures
    let kiwipete = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
    let busy = Position::from_fen(kiwipete).expect("valid fen");
    let profile = PositionProfile::analyze(&busy, &busy.legal_moves());
    assert_eq!(profile.legal_moves, 48);
    assert!(profile.is_complex(&config));
}

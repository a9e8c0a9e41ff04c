//! Search strategy selection
//!
//! A pure decision over the shape of the current iteration. Precedence:
//! 1. `Parallel` when it is enabled and the iteration is deep and wide enough,
//!    workers are available, the position is not complex, the opening is over
//!    and memory usage is below the pressure threshold
//! 2. `Advanced` when the depth is large enough or the position is complex
//! 3. `Standard` otherwise

use serde::{Deserialize, Serialize};

use crate::position::{Move, Position};

/// Search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Alpha-beta without selective pruning
    Standard,
    /// Alpha-beta with null move, LMR, futility and razoring
    Advanced,
    /// Root splitting over the worker pool
    Parallel,
}

impl EngineKind {
    /// Strategies to try in order, starting with `self`
    pub fn fallback_chain(self) -> &'static [EngineKind] {
        match self {
            EngineKind::Parallel => {
                &[EngineKind::Parallel, EngineKind::Advanced, EngineKind::Standard]
            }
            EngineKind::Advanced => &[EngineKind::Advanced, EngineKind::Standard],
            EngineKind::Standard => &[EngineKind::Standard],
        }
    }
}

/// Selection thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub parallel_enabled: bool,
    pub parallel_depth_threshold: u32,
    pub parallel_move_threshold: usize,
    pub advanced_depth_threshold: u32,
    /// A position with more legal moves than this is complex
    pub complex_move_threshold: usize,
    /// A position with more captures than this is complex
    pub complex_capture_threshold: usize,
    /// Parallel search is not used before this game ply
    pub opening_half_moves: u32,
    /// Memory usage ratio above which parallel search is refused
    pub memory_pressure_threshold: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            parallel_enabled: true,
            parallel_depth_threshold: 5,
            parallel_move_threshold: 20,
            advanced_depth_threshold: 3,
            complex_move_threshold: 35,
            complex_capture_threshold: 6,
            opening_half_moves: 8,
            memory_pressure_threshold: 0.85,
        }
    }
}

/// Features of the root position used for selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionProfile {
    pub legal_moves: usize,
    pub captures: usize,
    pub in_check: bool,
}

impl PositionProfile {
    pub fn analyze(pos: &Position, legal_moves: &[Move]) -> Self {
        Self {
            legal_moves: legal_moves.len(),
            captures: legal_moves.iter().filter(|&&mv| pos.is_capture(mv)).count(),
            in_check: pos.in_check(),
        }
    }

    pub fn is_complex(&self, config: &SelectorConfig) -> bool {
        self.in_check
            || self.legal_moves > config.complex_move_threshold
            || self.captures > config.complex_capture_threshold
    }
}

/// Inputs of one selection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionInput {
    pub depth: u32,
    pub legal_moves: usize,
    /// Memory usage ratio in `[0, 1]`
    pub memory_usage: f64,
    pub complex: bool,
    pub game_ply: u32,
    /// Configured search threads
    pub workers: usize,
    /// The worker pool has been shut down
    pub resources_closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EngineSelector {
    config: SelectorConfig,
}

impl EngineSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn select(&self, input: &SelectionInput) -> EngineKind {
        let cfg = &self.config;
        let parallel = cfg.parallel_enabled
            && input.depth >= cfg.parallel_depth_threshold
            && input.legal_moves >= cfg.parallel_move_threshold
            && input.workers > 1
            && !input.resources_closed
            && !input.complex
            && input.game_ply > cfg.opening_half_moves
            && input.memory_usage <= cfg.memory_pressure_threshold;
        if parallel {
            EngineKind::Parallel
        } else if input.depth >= cfg.advanced_depth_threshold || input.complex {
            EngineKind::Advanced
        } else {
            EngineKind::Standard
        }
    }
}

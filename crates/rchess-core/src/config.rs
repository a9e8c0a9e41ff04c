//! Engine configuration
//!
//! Every tunable of the search lives in [`EngineConfig`]. Missing JSON fields
//! take their default, so a config file only needs the values it changes:
//!
//! ```
//! use rchess_core::EngineConfig;
//!
//! let json = r#"{"threads": 4, "search": {"aspiration_margin": 30}}"#;
//! let config = EngineConfig::from_json_str(json).unwrap();
//! assert_eq!(config.threads, 4);
//! assert_eq!(config.search.aspiration_margin, 30);
//! assert_eq!(config.hash_mb, EngineConfig::default().hash_mb);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::SelectorConfig;
use crate::error::ConfigError;
use crate::ordering::OrderingParams;
use crate::search::{MATE_THRESHOLD, MAX_PLY, PruningParams, SearchParams};
use crate::time::TimeParameters;

pub const MIN_HASH_MB: usize = 1;
pub const MAX_HASH_MB: usize = 4096;
pub const MAX_THREADS: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Search threads including the calling thread
    pub threads: usize,
    /// Transposition table size
    pub hash_mb: usize,
    /// Occupancy (permille) at which the table is cleared before a request
    pub tt_clear_permille: u32,
    pub selector: SelectorConfig,
    pub search: SearchParams,
    pub pruning: PruningParams,
    pub ordering: OrderingParams,
    pub time: TimeParameters,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 16,
            tt_clear_permille: 980,
            selector: SelectorConfig::default(),
            search: SearchParams::default(),
            pruning: PruningParams::default(),
            ordering: OrderingParams::default(),
            time: TimeParameters::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the search cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads == 0 || self.threads > MAX_THREADS {
            return Err(invalid("threads", format!("{} not in 1..={MAX_THREADS}", self.threads)));
        }
        if !(MIN_HASH_MB..=MAX_HASH_MB).contains(&self.hash_mb) {
            return Err(invalid(
                "hash_mb",
                format!("{} not in {MIN_HASH_MB}..={MAX_HASH_MB}", self.hash_mb),
            ));
        }
        if self.tt_clear_permille == 0 || self.tt_clear_permille > 1000 {
            return Err(invalid(
                "tt_clear_permille",
                format!("{} not in 1..=1000", self.tt_clear_permille),
            ));
        }

        let search = &self.search;
        if search.min_depth == 0 || search.min_depth > search.max_depth {
            return Err(invalid(
                "search.min_depth",
                format!("{} must be in 1..={}", search.min_depth, search.max_depth),
            ));
        }
        if search.max_depth >= MAX_PLY {
            return Err(invalid(
                "search.max_depth",
                format!("{} not below {MAX_PLY}", search.max_depth),
            ));
        }
        if search.aspiration_margin <= 0 || search.aspiration_margin >= MATE_THRESHOLD {
            return Err(invalid(
                "search.aspiration_margin",
                format!("{} not in 1..{MATE_THRESHOLD}", search.aspiration_margin),
            ));
        }

        let memory = self.selector.memory_pressure_threshold;
        if !(0.0..=1.0).contains(&memory) {
            return Err(invalid(
                "selector.memory_pressure_threshold",
                format!("{memory} not in [0, 1]"),
            ));
        }

        if self.pruning.null_move_depth_divisor <= 0 {
            return Err(invalid("pruning.null_move_depth_divisor", "must be positive".to_string()));
        }
        if self.ordering.history_ceiling <= 0 {
            return Err(invalid("ordering.history_ceiling", "must be positive".to_string()));
        }

        let time = &self.time;
        if !(time.soft_ratio > 0.0 && time.soft_ratio <= 1.0) {
            return Err(invalid("time.soft_ratio", format!("{} not in (0, 1]", time.soft_ratio)));
        }
        if time.hard_multiplier < 1.0 {
            return Err(invalid("time.hard_multiplier", "must be at least 1".to_string()));
        }
        if time.moves_horizon == 0 {
            return Err(invalid("time.moves_horizon", "must be positive".to_string()));
        }

        Ok(())
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

//! Engine configuration
//!
//! All tunable knobs for a correlation run, with defaults pulled from
//! named constants. Validation happens before any run touches data.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::profile::ProfileKind;

// ============================================================================
// DEFAULTS (Constants)
// ============================================================================

/// Entry/exit timestamps further apart than this are never candidates.
pub const DEFAULT_CORRELATION_WINDOW_SECS: u64 = 300;

/// Pairs scoring below this final correlation are dropped.
pub const DEFAULT_MIN_CONFIDENCE_THRESHOLD: f64 = 30.0;

/// Minimum pairs sharing a guard before a cluster is emitted.
pub const DEFAULT_MIN_CLUSTER_OBSERVATIONS: usize = 3;

/// Minimum times a pattern must repeat before boosting.
pub const DEFAULT_MIN_REPETITIONS_FOR_BOOST: u64 = 2;

/// Log-base multiplier for the repetition boost.
pub const DEFAULT_REPETITION_BOOST_FACTOR: f64 = 1.5;

/// Hard cap on the repetition boost multiplier.
pub const DEFAULT_MAX_REPETITION_BOOST: f64 = 2.0;

// ============================================================================
// ENGINE CONFIG
// ============================================================================

/// Configuration for a correlation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Correlation window in seconds; the time signal is zero beyond it.
    pub correlation_window_secs: u64,

    /// Minimum final correlation (0-100) for a pair to be emitted.
    pub min_confidence_threshold: f64,

    /// Minimum group size for cluster emission.
    pub min_cluster_observations: usize,

    /// When false, every repetition boost is 1.0 and nothing is recorded.
    pub enable_repetition_weighting: bool,

    /// Pattern count below which no boost applies.
    pub min_repetitions_for_boost: u64,

    /// Multiplier applied per log2 of the repetition count.
    pub repetition_boost_factor: f64,

    /// Ceiling on the boost multiplier.
    pub max_repetition_boost: f64,

    /// When true, an observation whose fingerprint is absent from the
    /// snapshot fails the whole run instead of dropping its candidates.
    pub strict_relay_resolution: bool,

    /// Profile used when the engine is built without an explicit one.
    /// `Custom` has no preset; custom weights must be supplied directly.
    pub default_weight_profile: ProfileKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            correlation_window_secs: DEFAULT_CORRELATION_WINDOW_SECS,
            min_confidence_threshold: DEFAULT_MIN_CONFIDENCE_THRESHOLD,
            min_cluster_observations: DEFAULT_MIN_CLUSTER_OBSERVATIONS,
            enable_repetition_weighting: true,
            min_repetitions_for_boost: DEFAULT_MIN_REPETITIONS_FOR_BOOST,
            repetition_boost_factor: DEFAULT_REPETITION_BOOST_FACTOR,
            max_repetition_boost: DEFAULT_MAX_REPETITION_BOOST,
            strict_relay_resolution: false,
            default_weight_profile: ProfileKind::Standard,
        }
    }
}

impl EngineConfig {
    /// Reject out-of-range knobs before any data is processed.
    pub fn validate(&self) -> Result<()> {
        if self.correlation_window_secs == 0 {
            return Err(EngineError::InvalidConfig(
                "correlation_window_secs must be positive".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.min_confidence_threshold) {
            return Err(EngineError::InvalidConfig(format!(
                "min_confidence_threshold must be in [0, 100], got {}",
                self.min_confidence_threshold
            )));
        }
        if self.min_cluster_observations == 0 {
            return Err(EngineError::InvalidConfig(
                "min_cluster_observations must be at least 1".to_string(),
            ));
        }
        if self.repetition_boost_factor < 1.0 {
            return Err(EngineError::InvalidConfig(format!(
                "repetition_boost_factor must be >= 1.0, got {}",
                self.repetition_boost_factor
            )));
        }
        if self.max_repetition_boost < 1.0 {
            return Err(EngineError::InvalidConfig(format!(
                "max_repetition_boost must be >= 1.0, got {}",
                self.max_repetition_boost
            )));
        }
        Ok(())
    }
}

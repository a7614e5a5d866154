//! Scoring rules and constants
//!
//! The numeric contract of the scoring pipeline. No logic here.

// ============================================================================
// COMPOSITE SCORING
// ============================================================================

/// The repetition boost is applied softly: final = base * (1 + (b-1) * 0.5).
/// A max boost of 2.0 therefore adds at most 50% to the base score.
pub const SOFT_BOOST_FACTOR: f64 = 0.5;

/// Share of the final correlation in the guard confidence blend.
pub const GUARD_CORRELATION_WEIGHT: f64 = 0.7;

/// Share of the guard selection probability in the guard confidence blend.
pub const GUARD_PROBABILITY_WEIGHT: f64 = 0.3;

// ============================================================================
// CONFIDENCE BANDS
// ============================================================================

/// Final correlation at or above this is high confidence.
pub const HIGH_CONFIDENCE_MIN: f64 = 70.0;

/// Final correlation at or above this (and below high) is medium.
pub const MEDIUM_CONFIDENCE_MIN: f64 = 40.0;

// ============================================================================
// TIME SIGNAL PROSE BUCKETS (seconds)
// ============================================================================

pub const NEARLY_SIMULTANEOUS_SECS: f64 = 1.0;
pub const CLOSELY_ALIGNED_SECS: f64 = 10.0;
pub const LATENCY_VARIANCE_SECS: f64 = 60.0;

// ============================================================================
// VOLUME SIGNAL PROSE BUCKETS (percentage difference)
// ============================================================================

pub const NEARLY_IDENTICAL_DIFF_PCT: f64 = 5.0;
pub const OVERHEAD_DIFF_PCT: f64 = 20.0;

// ============================================================================
// PATTERN SIGNAL
// ============================================================================

/// Neutral score when timing data is missing on either side.
pub const NEUTRAL_PATTERN_SCORE: f64 = 50.0;

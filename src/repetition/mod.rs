//! Repetition Module
//!
//! Frequency tracking over observation patterns. Repeated patterns are
//! statistically more significant, so repeat sightings earn a capped
//! boost multiplier on the composite score.
//!
//! The tracker is the only mutable engine state; share one across runs
//! via `SharedRepetitionTracker` to accumulate counts across batches.

pub mod tracker;

pub use tracker::{
    pattern_key, PatternCount, RepetitionStats, RepetitionTracker, SharedRepetitionTracker,
    PATTERN_KEY_DELIMITER, VOLUME_BUCKET_BYTES,
};

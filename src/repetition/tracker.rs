//! Repetition tracker
//!
//! Counts how often observation patterns recur and converts counts into
//! boost multipliers with logarithmic diminishing returns.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::correlation::types::Observation;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Separator inside pattern keys. Fingerprints are hex, so ':' can never
/// collide with a fingerprint character.
pub const PATTERN_KEY_DELIMITER: char = ':';

/// Volumes are bucketed to 100 kB so near-identical transfers group
/// together.
pub const VOLUME_BUCKET_BYTES: u64 = 100_000;

/// How many patterns the statistics report lists.
pub const DEFAULT_TOP_PATTERNS: usize = 10;

// ============================================================================
// PATTERN KEY
// ============================================================================

/// Deterministic key grouping observations considered "the same pattern":
/// relay fingerprint, observation side, and bucketed volume.
pub fn pattern_key(observation: &Observation) -> String {
    let bucket = (observation.bytes / VOLUME_BUCKET_BYTES) * VOLUME_BUCKET_BYTES;
    format!(
        "{}{sep}{}{sep}{}",
        observation.relay_fingerprint,
        observation.observation_type.as_str(),
        bucket,
        sep = PATTERN_KEY_DELIMITER
    )
}

// ============================================================================
// TRACKER
// ============================================================================

/// Handle for sharing one tracker across runs; a single writer lock is
/// all the mutual exclusion the engine needs.
pub type SharedRepetitionTracker = Arc<RwLock<RepetitionTracker>>;

/// Frequency map over pattern keys, plus a per-relay observation index
/// for diagnostics.
#[derive(Debug, Clone)]
pub struct RepetitionTracker {
    enabled: bool,
    min_repetitions: u64,
    boost_factor: f64,
    max_boost: f64,

    pattern_frequency: HashMap<String, u64>,
    /// relay fingerprint -> ids of observations seen there
    relay_observations: HashMap<String, Vec<String>>,
}

impl RepetitionTracker {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            enabled: config.enable_repetition_weighting,
            min_repetitions: config.min_repetitions_for_boost,
            boost_factor: config.repetition_boost_factor,
            max_boost: config.max_repetition_boost,
            pattern_frequency: HashMap::new(),
            relay_observations: HashMap::new(),
        }
    }

    pub fn into_shared(self) -> SharedRepetitionTracker {
        Arc::new(RwLock::new(self))
    }

    /// Record one observation. No-op when repetition weighting is off.
    pub fn record(&mut self, observation: &Observation) {
        if !self.enabled {
            return;
        }
        let key = pattern_key(observation);
        *self.pattern_frequency.entry(key).or_insert(0) += 1;
        self.relay_observations
            .entry(observation.relay_fingerprint.clone())
            .or_default()
            .push(observation.id.clone());
    }

    /// Boost multiplier for one observation's pattern:
    /// 1.0 below the repetition minimum, otherwise
    /// min(max_boost, 1 + log2(count) * (boost_factor - 1)).
    pub fn boost_for(&self, observation: &Observation) -> f64 {
        if !self.enabled {
            return 1.0;
        }
        let count = self
            .pattern_frequency
            .get(&pattern_key(observation))
            .copied()
            .unwrap_or(0);
        if count < self.min_repetitions {
            return 1.0;
        }
        let boost = 1.0 + (count as f64).log2() * (self.boost_factor - 1.0);
        let boost = boost.min(self.max_boost);
        log::debug!(
            "repetition boost for {}: {:.2}x (count {})",
            pattern_key(observation),
            boost,
            count
        );
        boost
    }

    /// Combined boost for a candidate pair: arithmetic mean of the entry
    /// and exit boosts.
    pub fn combined_boost(&self, entry: &Observation, exit: &Observation) -> f64 {
        (self.boost_for(entry) + self.boost_for(exit)) / 2.0
    }

    /// Ids of every observation recorded at a relay.
    pub fn observations_for_relay(&self, fingerprint: &str) -> &[String] {
        self.relay_observations
            .get(fingerprint)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Top patterns by count; ties break lexicographically so the order
    /// is reproducible.
    pub fn top_patterns(&self, limit: usize) -> Vec<PatternCount> {
        let mut patterns: Vec<PatternCount> = self
            .pattern_frequency
            .iter()
            .map(|(pattern, count)| PatternCount {
                pattern: pattern.clone(),
                count: *count,
            })
            .collect();
        patterns.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.pattern.cmp(&b.pattern)));
        patterns.truncate(limit);
        patterns
    }

    pub fn stats(&self) -> RepetitionStats {
        let total_patterns = self.pattern_frequency.len();
        let repeated_patterns = self
            .pattern_frequency
            .values()
            .filter(|&&count| count >= 2)
            .count();
        let max_repetitions = self.pattern_frequency.values().copied().max().unwrap_or(0);
        let total_observations: u64 = self.pattern_frequency.values().sum();
        let average_repetitions = if total_patterns == 0 {
            0.0
        } else {
            total_observations as f64 / total_patterns as f64
        };

        RepetitionStats {
            total_patterns,
            repeated_patterns,
            max_repetitions,
            average_repetitions,
            top_patterns: self.top_patterns(DEFAULT_TOP_PATTERNS),
        }
    }

    pub fn clear(&mut self) {
        self.pattern_frequency.clear();
        self.relay_observations.clear();
    }
}

// ============================================================================
// STATISTICS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternCount {
    pub pattern: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepetitionStats {
    pub total_patterns: usize,
    /// Patterns seen at least twice
    pub repeated_patterns: usize,
    pub max_repetitions: u64,
    pub average_repetitions: f64,
    pub top_patterns: Vec<PatternCount>,
}

// ============================================================================
// TESTS
// ============================================================================

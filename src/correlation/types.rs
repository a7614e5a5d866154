//! Correlation types
//!
//! Data structures only - scoring logic lives in `signals.rs` and
//! `engine.rs`. Everything here is plain serializable data; a report can
//! round-trip through JSON without loss.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rules::{HIGH_CONFIDENCE_MIN, MEDIUM_CONFIDENCE_MIN};

// ============================================================================
// OBSERVATIONS
// ============================================================================

/// Which side of the overlay network the observation was taken on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationType {
    /// Traffic seen entering the network
    EntryObserved,
    /// Traffic seen exiting the network
    ExitObserved,
}

impl ObservationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationType::EntryObserved => "entry_observed",
            ObservationType::ExitObserved => "exit_observed",
        }
    }
}

impl std::fmt::Display for ObservationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One traffic metadata record: when, where, how much. No payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Unique identifier
    pub id: String,
    /// Absolute timestamp in microseconds
    pub timestamp_us: i64,
    pub observation_type: ObservationType,
    /// Fingerprint of the relay where traffic was seen
    pub relay_fingerprint: String,
    /// Total bytes observed
    pub bytes: u64,
    /// Inter-arrival deltas in milliseconds, if captured
    #[serde(default)]
    pub packet_timings: Option<Vec<f64>>,
}

impl Observation {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.timestamp_us)
    }
}

// ============================================================================
// SCORE BREAKDOWN
// ============================================================================

/// One signal's contribution to the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBreakdown {
    pub score: f64,
    pub weight: f64,
    pub contribution: f64,
    pub reasoning: String,
}

/// How a pair's final correlation was calculated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub time: SignalBreakdown,
    pub volume: SignalBreakdown,
    pub pattern: SignalBreakdown,
    pub base_correlation: f64,
    pub repetition_boost: f64,
    pub final_correlation: f64,
}

// ============================================================================
// CONFIDENCE BANDS
// ============================================================================

/// Verdict band for an emitted pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn from_score(final_correlation: f64) -> Self {
        if final_correlation >= HIGH_CONFIDENCE_MIN {
            ConfidenceBand::High
        } else if final_correlation >= MEDIUM_CONFIDENCE_MIN {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        }
    }
}

// ============================================================================
// SESSION PAIR
// ============================================================================

/// Two observations hypothesized to belong to the same session, with the
/// full scoring trail. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPair {
    /// entry id + "_" + exit id
    pub pair_id: String,
    pub entry: Observation,
    pub exit: Observation,

    /// |t_exit - t_entry| in seconds
    pub time_delta_secs: f64,

    /// Weighted blend of the three signals, 0-100
    pub base_correlation: f64,
    /// Combined repetition boost multiplier, >= 1.0
    pub repetition_boost: f64,
    /// Boost-adjusted composite, 0-100
    pub final_correlation: f64,

    /// The entry observation's relay
    pub hypothesized_guard: String,
    /// Confidence in the guard hypothesis, 0-100
    pub guard_confidence: f64,

    /// Step-by-step plain-language audit trail
    pub reasoning: Vec<String>,
    pub score_breakdown: ScoreBreakdown,
}

impl SessionPair {
    pub fn confidence_band(&self) -> ConfidenceBand {
        ConfidenceBand::from_score(self.final_correlation)
    }
}

// ============================================================================
// AUDIT
// ============================================================================

/// Why a candidate or group was dropped. Data outcomes, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    UnknownRelay,
    Infeasible,
    BelowThreshold,
    BelowMinClusterObservations,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::UnknownRelay => "unknown_relay",
            AuditOutcome::Infeasible => "infeasible",
            AuditOutcome::BelowThreshold => "below_threshold",
            AuditOutcome::BelowMinClusterObservations => "below_min_cluster_observations",
        }
    }
}

/// One dropped candidate or group, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Pair id or guard fingerprint the entry is about
    pub subject: String,
    pub outcome: AuditOutcome,
    pub detail: String,
}

// ============================================================================
// REPORT
// ============================================================================

/// Result of one correlation run: ranked pairs plus the audit trail of
/// everything that was considered and dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub pairs: Vec<SessionPair>,
    pub audit: Vec<AuditEntry>,
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Cooperative cancellation flag, checked between candidates.
/// A cancelled run returns an error; partial results are never emitted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

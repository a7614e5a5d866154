//! Cluster types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::correlation::types::AuditEntry;

/// A set of session pairs sharing a hypothesized guard - evidence of a
/// repeated behavioral pattern rather than a one-off coincidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationCluster {
    pub cluster_id: String,

    pub session_pair_ids: Vec<String>,
    /// Unique observation ids across the member pairs
    pub observation_ids: Vec<String>,
    pub observation_count: usize,

    pub first_observation: DateTime<Utc>,
    pub last_observation: DateTime<Utc>,

    /// Guards the member pairs hypothesize (a single element today)
    pub probable_guards: Vec<String>,

    /// Mean final correlation over the member pairs, 0-100
    pub consistency_score: f64,
    /// How persistently the guard recurs, 0-100
    pub guard_persistence_score: f64,
    /// Blend of consistency and persistence, 0-100
    pub cluster_confidence: f64,

    pub reasoning: Vec<String>,
}

/// Clusters plus audit entries for groups that fell below the minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterReport {
    pub clusters: Vec<CorrelationCluster>,
    pub audit: Vec<AuditEntry>,
}

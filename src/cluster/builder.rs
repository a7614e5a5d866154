//! Cluster builder
//!
//! Groups session pairs by hypothesized guard and scores each group.
//! Groups are processed in lexicographic guard order and numbered from
//! one, so identical inputs always yield identical clusters.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use super::types::{ClusterReport, CorrelationCluster};
use crate::config::EngineConfig;
use crate::correlation::types::{AuditEntry, AuditOutcome, SessionPair};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Share of mean pair correlation in the cluster confidence blend.
const CONSISTENCY_WEIGHT: f64 = 0.6;

/// Share of guard persistence in the cluster confidence blend.
const PERSISTENCE_WEIGHT: f64 = 0.4;

/// Each pair behind the same guard adds this much persistence, capped at 100.
const PERSISTENCE_PER_PAIR: f64 = 10.0;

/// Persistence above this earns a consistent-behavior reasoning note.
const STRONG_PERSISTENCE_MIN: f64 = 70.0;

// ============================================================================
// BUILDER
// ============================================================================

/// Group pairs by hypothesized guard and emit a cluster for every group
/// meeting the configured minimum. Sub-threshold groups are audit
/// entries, not errors.
pub fn build_clusters(pairs: &[SessionPair], config: &EngineConfig) -> ClusterReport {
    log::info!("clustering {} session pairs", pairs.len());

    let mut groups: BTreeMap<&str, Vec<&SessionPair>> = BTreeMap::new();
    for pair in pairs {
        groups
            .entry(pair.hypothesized_guard.as_str())
            .or_default()
            .push(pair);
    }

    let mut clusters = Vec::new();
    let mut audit = Vec::new();
    let mut next_id = 1usize;

    for (guard_fp, group) in &groups {
        if group.len() < config.min_cluster_observations {
            audit.push(AuditEntry {
                subject: guard_fp.to_string(),
                outcome: AuditOutcome::BelowMinClusterObservations,
                detail: format!(
                    "{} pair(s) share guard {}, below min_cluster_observations ({})",
                    group.len(),
                    guard_fp,
                    config.min_cluster_observations
                ),
            });
            continue;
        }
        clusters.push(build_cluster(next_id, guard_fp, group));
        next_id += 1;
    }

    clusters.sort_by(|a, b| {
        b.cluster_confidence
            .partial_cmp(&a.cluster_confidence)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.probable_guards.cmp(&b.probable_guards))
    });

    log::info!("created {} correlation clusters", clusters.len());
    ClusterReport { clusters, audit }
}

fn build_cluster(id: usize, guard_fp: &str, group: &[&SessionPair]) -> CorrelationCluster {
    let observation_ids: BTreeSet<String> = group
        .iter()
        .flat_map(|pair| [pair.entry.id.clone(), pair.exit.id.clone()])
        .collect();

    let first_us = group
        .iter()
        .flat_map(|pair| [pair.entry.timestamp_us, pair.exit.timestamp_us])
        .min()
        .unwrap_or(0);
    let last_us = group
        .iter()
        .flat_map(|pair| [pair.entry.timestamp_us, pair.exit.timestamp_us])
        .max()
        .unwrap_or(0);

    let consistency_score = group
        .iter()
        .map(|pair| pair.final_correlation)
        .sum::<f64>()
        / group.len() as f64;

    let guard_persistence_score = (group.len() as f64 * PERSISTENCE_PER_PAIR).min(100.0);

    let cluster_confidence =
        CONSISTENCY_WEIGHT * consistency_score + PERSISTENCE_WEIGHT * guard_persistence_score;

    let span_hours = (last_us - first_us) as f64 / 3_600_000_000.0;

    let mut reasoning = vec![
        format!("Found {} correlated session pairs", group.len()),
        format!("All pairs share hypothesized guard: {}", guard_fp),
        format!("Average correlation strength: {:.1}%", consistency_score),
        format!("Observations span {:.1} hours", span_hours),
    ];
    if guard_persistence_score > STRONG_PERSISTENCE_MIN {
        reasoning.push(
            "Strong guard persistence indicates consistent client behavior".to_string(),
        );
    }

    CorrelationCluster {
        cluster_id: format!("cluster-{}", id),
        session_pair_ids: group.iter().map(|pair| pair.pair_id.clone()).collect(),
        observation_count: observation_ids.len(),
        observation_ids: observation_ids.into_iter().collect(),
        first_observation: micros_to_datetime(first_us),
        last_observation: micros_to_datetime(last_us),
        probable_guards: vec![guard_fp.to_string()],
        consistency_score,
        guard_persistence_score,
        cluster_confidence,
        reasoning,
    }
}

fn micros_to_datetime(timestamp_us: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(timestamp_us).unwrap_or(DateTime::UNIX_EPOCH)
}

// ============================================================================
// TESTS
// ============================================================================

//! End-to-end correlation scenarios
//!
//! Exercises the full pipeline - topology, signals, assembler, tracker,
//! clusters - with fixed inputs and checks the scoring contract end to
//! end.

use crate::cluster::build_clusters;
use crate::config::EngineConfig;
use crate::correlation::engine::CorrelationEngine;
use crate::correlation::types::{ConfidenceBand, Observation, ObservationType};
use crate::profile::{ProfileKind, WeightProfile};
use crate::topology::{Relay, RelayFlag, TopologySnapshot};

fn fp(c: char) -> String {
    std::iter::repeat(c).take(40).collect()
}

fn relay(c: char, flags: Vec<RelayFlag>, weight: f64, subnet: &str) -> Relay {
    Relay {
        fingerprint: fp(c),
        nickname: None,
        flags,
        consensus_weight: weight,
        subnet16: subnet.to_string(),
        as_number: None,
        country: None,
    }
}

/// One guard (G1 = 'A'), one exit (X1 = 'C'), distinct subnets.
fn snapshot() -> TopologySnapshot {
    TopologySnapshot::from_relays(
        "snap-scenarios",
        vec![
            relay('A', vec![RelayFlag::Guard, RelayFlag::Running], 300.0, "10.1.0.0/16"),
            relay('C', vec![RelayFlag::Exit, RelayFlag::Running], 200.0, "10.3.0.0/16"),
        ],
    )
    .unwrap()
}

fn entry(id: &str, t_us: i64, bytes: u64) -> Observation {
    Observation {
        id: id.to_string(),
        timestamp_us: t_us,
        observation_type: ObservationType::EntryObserved,
        relay_fingerprint: fp('A'),
        bytes,
        packet_timings: None,
    }
}

fn exit(id: &str, t_us: i64, bytes: u64) -> Observation {
    Observation {
        id: id.to_string(),
        timestamp_us: t_us,
        observation_type: ObservationType::ExitObserved,
        relay_fingerprint: fp('C'),
        bytes,
        packet_timings: None,
    }
}

// ----------------------------------------------------------------------
// Concrete scenarios
// ----------------------------------------------------------------------

#[test]
fn test_tight_match_scores_high() {
    let snapshot = snapshot();
    let mut engine = CorrelationEngine::new(EngineConfig::default()).unwrap();
    let report = engine
        .correlate(
            &snapshot,
            &[entry("e1", 1_000_000_000, 2_500_000)],
            &[exit("x1", 1_000_000_800, 2_520_000)],
        )
        .unwrap();

    assert_eq!(report.pairs.len(), 1);
    let pair = &report.pairs[0];
    assert_eq!(pair.pair_id, "e1_x1");

    // s_t ~ 100 (0.8 ms apart), s_v ~ 99.2, s_p = 50 (no timings)
    let breakdown = &pair.score_breakdown;
    assert!(breakdown.time.score > 99.9);
    assert!((breakdown.volume.score - 99.2063).abs() < 0.001);
    assert_eq!(breakdown.pattern.score, 50.0);

    // base = 0.40*s_t + 0.30*s_v + 0.30*50
    assert!((pair.base_correlation - 84.76).abs() < 0.05);
    // Fresh patterns, no boost
    assert_eq!(pair.repetition_boost, 1.0);
    assert_eq!(pair.final_correlation, pair.base_correlation);
    assert_eq!(pair.confidence_band(), ConfidenceBand::High);

    // Single guard in the snapshot -> selection probability 1.0
    let expected_guard_confidence = 0.7 * pair.final_correlation + 0.3 * 100.0;
    assert!((pair.guard_confidence - expected_guard_confidence).abs() < 1e-9);
    assert_eq!(pair.hypothesized_guard, fp('A'));
}

#[test]
fn test_outside_window_never_becomes_candidate() {
    let snapshot = snapshot();
    let mut engine = CorrelationEngine::new(EngineConfig::default()).unwrap();
    // 600 seconds apart, window is 300
    let report = engine
        .correlate(
            &snapshot,
            &[entry("e1", 1_000_000_000, 2_500_000)],
            &[exit("x1", 601_000_000_000, 2_520_000)],
        )
        .unwrap();

    assert!(report.pairs.is_empty());
    assert!(report.audit.is_empty());
}

#[test]
fn test_volume_mismatch_scores_medium() {
    let snapshot = snapshot();
    let mut engine = CorrelationEngine::new(EngineConfig::default()).unwrap();
    // 1 second apart, 1MB vs 5MB
    let report = engine
        .correlate(
            &snapshot,
            &[entry("e1", 0, 1_000_000)],
            &[exit("x1", 1_000_000, 5_000_000)],
        )
        .unwrap();

    assert_eq!(report.pairs.len(), 1);
    let pair = &report.pairs[0];
    assert_eq!(pair.score_breakdown.volume.score, 20.0);
    assert!(pair.score_breakdown.time.score > 99.6);
    // base = 0.40*99.67 + 0.30*20 + 0.30*50 ~ 60.9
    assert!((pair.base_correlation - 60.87).abs() < 0.05);
    assert_eq!(pair.confidence_band(), ConfidenceBand::Medium);
}

#[test]
fn test_repetition_boost_saturates_and_applies_softly() {
    let snapshot = snapshot();
    let mut engine = CorrelationEngine::new(EngineConfig::default()).unwrap();

    // The same entry/exit pattern four times: identical relays and
    // volume buckets, all simultaneous. Volumes chosen so the base is
    // exactly 65: s_t = 100, s_v = 100*30/90 = 33.33, s_p = 50.
    let entries: Vec<Observation> = (0..4)
        .map(|n| entry(&format!("e{}", n), 0, 30_000))
        .collect();
    let exits: Vec<Observation> = (0..4)
        .map(|n| exit(&format!("x{}", n), 0, 90_000))
        .collect();

    let report = engine.correlate(&snapshot, &entries, &exits).unwrap();

    // All 16 candidates accepted; each side's pattern count is 4, so the
    // per-observation boost is min(2.0, 1 + log2(4)*0.5) = 2.0.
    assert_eq!(report.pairs.len(), 16);
    for pair in &report.pairs {
        assert!((pair.base_correlation - 65.0).abs() < 0.05);
        assert_eq!(pair.repetition_boost, 2.0);
        // final = 65 * (1 + (2-1)*0.5) = 97.5
        assert!((pair.final_correlation - 97.5).abs() < 0.08);
        assert_eq!(pair.confidence_band(), ConfidenceBand::High);
    }

    let stats = engine.repetition_stats();
    assert_eq!(stats.total_patterns, 2);
    assert_eq!(stats.max_repetitions, 4);
}

#[test]
fn test_time_focused_profile_shifts_base() {
    let snapshot = snapshot();
    let profile = WeightProfile::preset(ProfileKind::TimeFocused).unwrap();
    let mut engine = CorrelationEngine::with_profile(EngineConfig::default(), profile).unwrap();

    let report = engine
        .correlate(
            &snapshot,
            &[entry("e1", 1_000_000_000, 2_500_000)],
            &[exit("x1", 1_000_000_800, 2_520_000)],
        )
        .unwrap();

    let pair = &report.pairs[0];
    // base = 0.60*s_t + 0.20*s_v + 0.20*50 ~ 89.8
    assert!((pair.base_correlation - 89.84).abs() < 0.05);
    assert!(pair
        .reasoning
        .iter()
        .any(|line| line.contains("Time-Focused Profile")));
}

#[test]
fn test_cluster_formation_from_engine_output() {
    let snapshot = snapshot();
    let mut engine = CorrelationEngine::new(EngineConfig::default()).unwrap();

    // Five well-separated sessions through the same guard: each entry
    // only pairs with its own exit inside the window.
    let spacing_us = 1_000_000_000; // ~16.7 minutes
    let entries: Vec<Observation> = (0..5i64)
        .map(|n| entry(&format!("e{}", n), n * spacing_us, 2_500_000))
        .collect();
    let exits: Vec<Observation> = (0..5i64)
        .map(|n| exit(&format!("x{}", n), n * spacing_us + 800, 2_520_000))
        .collect();

    let report = engine.correlate(&snapshot, &entries, &exits).unwrap();
    assert_eq!(report.pairs.len(), 5);

    let cluster_report = build_clusters(&report.pairs, engine.config());
    assert_eq!(cluster_report.clusters.len(), 1);

    let cluster = &cluster_report.clusters[0];
    assert_eq!(cluster.session_pair_ids.len(), 5);
    assert_eq!(cluster.probable_guards, vec![fp('A')]);
    assert_eq!(cluster.guard_persistence_score, 50.0);
    let expected = 0.6 * cluster.consistency_score + 0.4 * 50.0;
    assert!((cluster.cluster_confidence - expected).abs() < 1e-9);
}

// ----------------------------------------------------------------------
// Universal properties
// ----------------------------------------------------------------------

#[test]
fn test_determinism_across_runs() {
    let snapshot = snapshot();
    let entries: Vec<Observation> = (0..4)
        .map(|n| entry(&format!("e{}", n), n as i64 * 5_000_000, 2_000_000 + n as u64 * 700))
        .collect();
    let exits: Vec<Observation> = (0..4)
        .map(|n| exit(&format!("x{}", n), n as i64 * 5_000_000 + 900_000, 2_010_000))
        .collect();

    let run = || {
        let mut engine = CorrelationEngine::new(EngineConfig::default()).unwrap();
        let report = engine.correlate(&snapshot, &entries, &exits).unwrap();
        let clusters = build_clusters(&report.pairs, engine.config());
        (
            serde_json::to_string(&report).unwrap(),
            serde_json::to_string(&clusters).unwrap(),
        )
    };

    let (pairs_a, clusters_a) = run();
    let (pairs_b, clusters_b) = run();
    assert_eq!(pairs_a, pairs_b);
    assert_eq!(clusters_a, clusters_b);
}

#[test]
fn test_every_preset_keeps_base_in_bounds() {
    let snapshot = snapshot();
    for kind in [
        ProfileKind::Standard,
        ProfileKind::TimeFocused,
        ProfileKind::VolumeFocused,
        ProfileKind::PatternFocused,
    ] {
        let profile = WeightProfile::preset(kind).unwrap();
        let mut engine =
            CorrelationEngine::with_profile(EngineConfig::default(), profile).unwrap();
        let report = engine
            .correlate(
                &snapshot,
                &[entry("e1", 0, 2_500_000)],
                &[exit("x1", 800, 2_520_000)],
            )
            .unwrap();
        for pair in &report.pairs {
            assert!((0.0..=100.0).contains(&pair.base_correlation));
            assert!(pair.final_correlation <= 100.0);
        }
    }
}

#[test]
fn test_threshold_and_caps_hold_for_all_emitted_pairs() {
    let snapshot = snapshot();
    let config = EngineConfig::default();
    let mut engine = CorrelationEngine::new(config.clone()).unwrap();

    // Near the window edge with strongly mismatched volumes, so some
    // candidates land on each side of the threshold
    let entries: Vec<Observation> = (0..6)
        .map(|n| entry(&format!("e{}", n), 0, 100_000 * (n as u64 + 1)))
        .collect();
    let exits: Vec<Observation> = (0..6)
        .map(|n| exit(&format!("x{}", n), 299_000_000, 40_000_000 / (n as u64 + 1)))
        .collect();

    let report = engine.correlate(&snapshot, &entries, &exits).unwrap();
    assert!(!report.pairs.is_empty());
    assert!(!report.audit.is_empty());
    for pair in &report.pairs {
        assert!(pair.final_correlation >= config.min_confidence_threshold);
        assert!(pair.final_correlation <= 100.0);
        assert!(pair.repetition_boost >= 1.0);
        assert!(pair.repetition_boost <= config.max_repetition_boost);
    }
    // Dropped candidates are accounted for in the audit
    let candidates = entries.len() * exits.len();
    assert_eq!(report.pairs.len() + report.audit.len(), candidates);
}

#[test]
fn test_reasoning_is_complete() {
    let snapshot = snapshot();
    let mut engine = CorrelationEngine::new(EngineConfig::default()).unwrap();
    let report = engine
        .correlate(
            &snapshot,
            &[entry("e1", 0, 2_500_000)],
            &[exit("x1", 800, 2_520_000)],
        )
        .unwrap();

    let pair = &report.pairs[0];
    assert!(pair.reasoning.len() >= 6);
    let joined = pair.reasoning.join(" | ");
    assert!(joined.contains("Correlating entry observation"));
    assert!(joined.contains("Time correlation score"));
    assert!(joined.contains("Volume similarity score"));
    assert!(joined.contains("pattern data unavailable"));
    assert!(joined.contains("Standard Balanced Profile"));
    assert!(joined.contains("repetition boost"));
    assert!(joined.contains("hypothesizing this relay as the guard"));
    assert!(joined.contains("CONFIDENCE"));
}

#[test]
fn test_disabled_repetition_matches_fresh_patterns() {
    let snapshot = snapshot();

    // Unique volume buckets -> every pattern is a first sighting
    let entries: Vec<Observation> = (0..3)
        .map(|n| entry(&format!("e{}", n), 0, 1_000_000 * (n as u64 + 1)))
        .collect();
    let exits: Vec<Observation> = (0..3)
        .map(|n| exit(&format!("x{}", n), 500_000, 1_000_000 * (n as u64 + 1) + 20_000))
        .collect();

    let mut enabled = CorrelationEngine::new(EngineConfig::default()).unwrap();
    let with_repetition = enabled.correlate(&snapshot, &entries, &exits).unwrap();

    let disabled_config = EngineConfig {
        enable_repetition_weighting: false,
        ..Default::default()
    };
    let mut disabled = CorrelationEngine::new(disabled_config).unwrap();
    let without_repetition = disabled.correlate(&snapshot, &entries, &exits).unwrap();

    assert_eq!(
        serde_json::to_string(&with_repetition).unwrap(),
        serde_json::to_string(&without_repetition).unwrap()
    );
}

#[test]
fn test_ranked_ordering_is_stable() {
    let snapshot = snapshot();
    let mut engine = CorrelationEngine::new(EngineConfig::default()).unwrap();

    // Two exits at different distances from one entry: the tighter,
    // higher-scoring pair must rank first.
    let report = engine
        .correlate(
            &snapshot,
            &[entry("e1", 0, 2_500_000)],
            &[
                exit("far", 200_000_000, 2_500_000),
                exit("near", 1_000_000, 2_500_000),
            ],
        )
        .unwrap();

    assert_eq!(report.pairs.len(), 2);
    assert_eq!(report.pairs[0].pair_id, "e1_near");
    assert_eq!(report.pairs[1].pair_id, "e1_far");
    assert!(report.pairs[0].final_correlation >= report.pairs[1].final_correlation);
}

#[test]
fn test_report_serializes_without_loss() {
    let snapshot = snapshot();
    let mut engine = CorrelationEngine::new(EngineConfig::default()).unwrap();
    let timings = vec![10.0, 12.5, 11.0, 9.5];

    let mut e1 = entry("e1", 0, 2_500_000);
    e1.packet_timings = Some(timings.clone());
    let mut x1 = exit("x1", 800, 2_520_000);
    x1.packet_timings = Some(timings);

    let report = engine.correlate(&snapshot, &[e1], &[x1]).unwrap();
    let json = serde_json::to_string(&report).unwrap();
    let decoded: crate::correlation::types::CorrelationReport =
        serde_json::from_str(&json).unwrap();
    assert_eq!(report, decoded);
}

#[test]
fn test_shared_tracker_accumulates_across_runs() {
    let snapshot = snapshot();
    let config = EngineConfig::default();
    let tracker = crate::repetition::RepetitionTracker::new(&config).into_shared();

    let run_pair = |tracker: crate::repetition::SharedRepetitionTracker| {
        let mut engine = CorrelationEngine::with_shared_tracker(
            EngineConfig::default(),
            WeightProfile::standard(),
            tracker,
        )
        .unwrap();
        engine
            .correlate(
                &snapshot,
                &[entry("e1", 0, 30_000)],
                &[exit("x1", 0, 90_000)],
            )
            .unwrap()
            .pairs[0]
            .repetition_boost
    };

    // First batch: single sighting of each pattern, no boost.
    assert_eq!(run_pair(tracker.clone()), 1.0);
    // Second batch over the same tracker: counts reach 2, boost 1.5.
    assert!((run_pair(tracker) - 1.5).abs() < 1e-9);
}

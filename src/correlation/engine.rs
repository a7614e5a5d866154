//! Correlation engine
//!
//! Pairs entry and exit observations against a frozen topology snapshot.
//! Candidates inside the time window are scored from three weak signals,
//! blended through the active weight profile, boosted for repeated
//! patterns, and filtered against the confidence threshold. Every score
//! ships with its full reasoning trail.
//!
//! A run is synchronous and deterministic: fixed inputs and
//! configuration always produce the same pairs in the same order.

use std::cmp::Ordering;
use std::collections::HashSet;

use super::rules::{
    GUARD_CORRELATION_WEIGHT, GUARD_PROBABILITY_WEIGHT, SOFT_BOOST_FACTOR,
};
use super::signals;
use super::types::{
    AuditEntry, AuditOutcome, CancelToken, ConfidenceBand, CorrelationReport, Observation,
    ObservationType, ScoreBreakdown, SessionPair, SignalBreakdown,
};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::profile::WeightProfile;
use crate::repetition::tracker::{RepetitionStats, RepetitionTracker, SharedRepetitionTracker};
use crate::topology::{is_valid_fingerprint, TopologySnapshot, TopologyView};

// ============================================================================
// ENGINE
// ============================================================================

pub struct CorrelationEngine {
    config: EngineConfig,
    profile: WeightProfile,
    tracker: SharedRepetitionTracker,
}

enum CandidateOutcome {
    Accepted(Box<SessionPair>),
    BelowThreshold { final_correlation: f64 },
}

impl CorrelationEngine {
    /// Engine with the configured default profile and a fresh tracker.
    pub fn new(config: EngineConfig) -> Result<Self> {
        let profile =
            WeightProfile::preset(config.default_weight_profile).ok_or_else(|| {
                EngineError::InvalidConfig(
                    "default_weight_profile 'custom' has no preset; supply the \
                     profile via with_profile"
                        .to_string(),
                )
            })?;
        Self::with_profile(config, profile)
    }

    /// Engine with a specific weight profile and a fresh tracker.
    pub fn with_profile(config: EngineConfig, profile: WeightProfile) -> Result<Self> {
        let tracker = RepetitionTracker::new(&config).into_shared();
        Self::with_shared_tracker(config, profile, tracker)
    }

    /// Engine reusing an existing tracker, e.g. to accumulate repetition
    /// counts across ingestion batches.
    pub fn with_shared_tracker(
        config: EngineConfig,
        profile: WeightProfile,
        tracker: SharedRepetitionTracker,
    ) -> Result<Self> {
        config.validate()?;
        profile.validate()?;
        log::info!(
            "correlation engine initialized with weight profile '{}' \
             (time {:.2}, volume {:.2}, pattern {:.2})",
            profile.profile_name,
            profile.weight_time,
            profile.weight_volume,
            profile.weight_pattern
        );
        Ok(Self {
            config,
            profile,
            tracker,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn weight_profile(&self) -> &WeightProfile {
        &self.profile
    }

    /// Swap the profile for future runs; the new profile is revalidated.
    pub fn set_weight_profile(&mut self, profile: WeightProfile) -> Result<()> {
        profile.validate()?;
        log::info!(
            "weight profile updated to '{}' (time {:.2}, volume {:.2}, pattern {:.2})",
            profile.profile_name,
            profile.weight_time,
            profile.weight_volume,
            profile.weight_pattern
        );
        self.profile = profile;
        Ok(())
    }

    /// Handle to the engine's tracker, shareable with other runs.
    pub fn tracker(&self) -> SharedRepetitionTracker {
        self.tracker.clone()
    }

    pub fn repetition_stats(&self) -> RepetitionStats {
        self.tracker.read().stats()
    }

    /// Correlate entry observations with exit observations.
    pub fn correlate(
        &mut self,
        snapshot: &TopologySnapshot,
        entries: &[Observation],
        exits: &[Observation],
    ) -> Result<CorrelationReport> {
        self.correlate_with_cancel(snapshot, entries, exits, &CancelToken::new())
    }

    /// Correlate with cooperative cancellation. The token is checked
    /// between candidates; a cancelled run emits nothing.
    pub fn correlate_with_cancel(
        &mut self,
        snapshot: &TopologySnapshot,
        entries: &[Observation],
        exits: &[Observation],
        cancel: &CancelToken,
    ) -> Result<CorrelationReport> {
        log::info!(
            "correlating {} entry observations with {} exit observations \
             against snapshot '{}'",
            entries.len(),
            exits.len(),
            snapshot.snapshot_id
        );

        self.validate_observations(snapshot, entries, exits)?;

        // Every observation is submitted to the tracker before any
        // pairing, so boosts queried during assembly see final counts.
        {
            let mut tracker = self.tracker.write();
            for observation in entries.iter().chain(exits.iter()) {
                tracker.record(observation);
            }
        }

        let view = TopologyView::new(snapshot);
        let window_us = self.config.correlation_window_secs as i64 * 1_000_000;

        let mut pairs = Vec::new();
        let mut audit = Vec::new();

        for entry in entries {
            for exit in exits {
                if cancel.is_cancelled() {
                    log::warn!("correlation run cancelled after {} accepted pairs", pairs.len());
                    return Err(EngineError::Cancelled);
                }

                let delta_us = (exit.timestamp_us - entry.timestamp_us).abs();
                if delta_us > window_us {
                    continue;
                }

                let pair_id = format!("{}_{}", entry.id, exit.id);

                let unknown = [entry, exit]
                    .into_iter()
                    .find(|o| !view.contains(&o.relay_fingerprint));
                if let Some(observation) = unknown {
                    audit.push(AuditEntry {
                        subject: pair_id,
                        outcome: AuditOutcome::UnknownRelay,
                        detail: format!(
                            "unknown relay '{}' referenced by observation '{}'",
                            observation.relay_fingerprint, observation.id
                        ),
                    });
                    continue;
                }

                let feasibility =
                    view.path_feasibility(&entry.relay_fingerprint, &exit.relay_fingerprint)?;
                if !feasibility.feasible {
                    audit.push(AuditEntry {
                        subject: pair_id,
                        outcome: AuditOutcome::Infeasible,
                        detail: feasibility.violations.join("; "),
                    });
                    continue;
                }

                let delta_secs = delta_us as f64 / 1_000_000.0;
                match self.assemble_pair(&view, entry, exit, pair_id, delta_secs)? {
                    CandidateOutcome::Accepted(pair) => pairs.push(*pair),
                    CandidateOutcome::BelowThreshold { final_correlation } => {
                        audit.push(AuditEntry {
                            subject: format!("{}_{}", entry.id, exit.id),
                            outcome: AuditOutcome::BelowThreshold,
                            detail: format!(
                                "final correlation {:.1}% below threshold {:.1}%",
                                final_correlation, self.config.min_confidence_threshold
                            ),
                        });
                    }
                }
            }
        }

        // Ranked output: strongest first, then tightest timing, then
        // pair id for a stable total order.
        pairs.sort_by(|a, b| {
            b.final_correlation
                .partial_cmp(&a.final_correlation)
                .unwrap_or(Ordering::Equal)
                .then_with(|| {
                    a.time_delta_secs
                        .partial_cmp(&b.time_delta_secs)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.pair_id.cmp(&b.pair_id))
        });

        log::info!(
            "found {} session pairs ({} candidates dropped)",
            pairs.len(),
            audit.len()
        );

        Ok(CorrelationReport { pairs, audit })
    }

    // ------------------------------------------------------------------
    // Candidate assembly
    // ------------------------------------------------------------------

    fn assemble_pair(
        &self,
        view: &TopologyView<'_>,
        entry: &Observation,
        exit: &Observation,
        pair_id: String,
        delta_secs: f64,
    ) -> Result<CandidateOutcome> {
        let (time_score, time_explanation) =
            signals::time_correlation(delta_secs, self.config.correlation_window_secs);
        let (volume_score, volume_explanation) = signals::volume_similarity(entry.bytes, exit.bytes);
        let (pattern_score, pattern_explanation) = signals::pattern_similarity(
            entry.packet_timings.as_deref(),
            exit.packet_timings.as_deref(),
        );

        let time_contribution = time_score * self.profile.weight_time;
        let volume_contribution = volume_score * self.profile.weight_volume;
        let pattern_contribution = pattern_score * self.profile.weight_pattern;
        let base_correlation = time_contribution + volume_contribution + pattern_contribution;

        if !(0.0..=100.0).contains(&base_correlation) {
            return Err(EngineError::InternalInvariant(format!(
                "base correlation {} out of range for pair '{}'",
                base_correlation, pair_id
            )));
        }

        let boost = self.tracker.read().combined_boost(entry, exit);
        let final_correlation =
            (base_correlation * (1.0 + (boost - 1.0) * SOFT_BOOST_FACTOR)).min(100.0);

        if final_correlation < self.config.min_confidence_threshold {
            return Ok(CandidateOutcome::BelowThreshold { final_correlation });
        }

        let guard_probability = view.guard_selection_probability(&entry.relay_fingerprint)?;
        let guard_confidence = (GUARD_CORRELATION_WEIGHT * final_correlation
            + GUARD_PROBABILITY_WEIGHT * 100.0 * guard_probability)
            .min(100.0);

        let composite_explanation = format!(
            "Composite correlation using the {} profile: \
             time ({:.0}%) x {:.1} = {:.1}, volume ({:.0}%) x {:.1} = {:.1}, \
             pattern ({:.0}%) x {:.1} = {:.1}. Base correlation: {:.1}%.",
            self.profile.display_label(),
            self.profile.weight_time * 100.0,
            time_score,
            time_contribution,
            self.profile.weight_volume * 100.0,
            volume_score,
            volume_contribution,
            self.profile.weight_pattern * 100.0,
            pattern_score,
            pattern_contribution,
            base_correlation
        );

        // Phrased off the boost value alone so a disabled tracker and a
        // first-sighting pattern produce identical output.
        let repetition_explanation = if boost > 1.0 {
            format!(
                "Repetition boost applied: this traffic pattern recurs across the \
                 ingested observations (boost factor {:.2}x). Correlation adjusted \
                 from {:.1}% to {:.1}%.",
                boost, base_correlation, final_correlation
            )
        } else {
            format!(
                "No repetition boost applied. Final correlation: {:.1}%.",
                final_correlation
            )
        };

        let guard_explanation = format!(
            "Entry observation places traffic at relay {}... - hypothesizing this \
             relay as the guard. The relay holds {:.2}% of guard selection weight. \
             Guard confidence: {:.1}%.",
            &entry.relay_fingerprint[..16],
            guard_probability * 100.0,
            guard_confidence
        );

        let verdict = match ConfidenceBand::from_score(final_correlation) {
            ConfidenceBand::High => format!(
                "HIGH CONFIDENCE ({:.1}%): strong evidence these observations belong \
                 to the same session; multiple indicators align.",
                final_correlation
            ),
            ConfidenceBand::Medium => format!(
                "MEDIUM CONFIDENCE ({:.1}%): moderate correlation; some indicators \
                 suggest the same session, but uncertainty remains.",
                final_correlation
            ),
            ConfidenceBand::Low => format!(
                "LOW CONFIDENCE ({:.1}%): weak correlation; may be coincidental.",
                final_correlation
            ),
        };

        let reasoning = vec![
            format!(
                "Correlating entry observation '{}' with exit observation '{}' \
                 ({:.2} seconds apart).",
                entry.id, exit.id, delta_secs
            ),
            time_explanation.clone(),
            volume_explanation.clone(),
            pattern_explanation.clone(),
            composite_explanation,
            repetition_explanation,
            guard_explanation,
            verdict,
        ];

        let score_breakdown = ScoreBreakdown {
            time: SignalBreakdown {
                score: time_score,
                weight: self.profile.weight_time,
                contribution: time_contribution,
                reasoning: time_explanation,
            },
            volume: SignalBreakdown {
                score: volume_score,
                weight: self.profile.weight_volume,
                contribution: volume_contribution,
                reasoning: volume_explanation,
            },
            pattern: SignalBreakdown {
                score: pattern_score,
                weight: self.profile.weight_pattern,
                contribution: pattern_contribution,
                reasoning: pattern_explanation,
            },
            base_correlation,
            repetition_boost: boost,
            final_correlation,
        };

        Ok(CandidateOutcome::Accepted(Box::new(SessionPair {
            pair_id,
            entry: entry.clone(),
            exit: exit.clone(),
            time_delta_secs: delta_secs,
            base_correlation,
            repetition_boost: boost,
            final_correlation,
            hypothesized_guard: entry.relay_fingerprint.clone(),
            guard_confidence,
            reasoning,
            score_breakdown,
        })))
    }

    // ------------------------------------------------------------------
    // Input validation
    // ------------------------------------------------------------------

    fn validate_observations(
        &self,
        snapshot: &TopologySnapshot,
        entries: &[Observation],
        exits: &[Observation],
    ) -> Result<()> {
        let mut seen_ids = HashSet::new();

        let expected = entries
            .iter()
            .map(|o| (o, ObservationType::EntryObserved))
            .chain(exits.iter().map(|o| (o, ObservationType::ExitObserved)));

        for (observation, expected_type) in expected {
            if observation.id.trim().is_empty() {
                return Err(EngineError::InvalidObservation {
                    id: observation.id.clone(),
                    reason: "observation id must not be empty".to_string(),
                });
            }
            if !seen_ids.insert(observation.id.clone()) {
                return Err(EngineError::DuplicateObservation(observation.id.clone()));
            }
            if observation.observation_type != expected_type {
                return Err(EngineError::InvalidObservation {
                    id: observation.id.clone(),
                    reason: format!(
                        "expected {} in this list, got {}",
                        expected_type, observation.observation_type
                    ),
                });
            }
            if !is_valid_fingerprint(&observation.relay_fingerprint) {
                return Err(EngineError::InvalidObservation {
                    id: observation.id.clone(),
                    reason: "relay fingerprint must be 40 hex characters".to_string(),
                });
            }

            match snapshot.relay(&observation.relay_fingerprint) {
                Some(relay) => match observation.observation_type {
                    ObservationType::EntryObserved if !relay.is_guard() => {
                        return Err(EngineError::InvalidObservation {
                            id: observation.id.clone(),
                            reason: format!(
                                "entry observation resolves to relay '{}' without the \
                                 Guard flag",
                                relay.fingerprint
                            ),
                        });
                    }
                    ObservationType::ExitObserved if !relay.is_exit() => {
                        return Err(EngineError::InvalidObservation {
                            id: observation.id.clone(),
                            reason: format!(
                                "exit observation resolves to relay '{}' without exit \
                                 capability",
                                relay.fingerprint
                            ),
                        });
                    }
                    _ => {}
                },
                None if self.config.strict_relay_resolution => {
                    return Err(EngineError::UnknownRelay(
                        observation.relay_fingerprint.clone(),
                    ));
                }
                None => {}
            }
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

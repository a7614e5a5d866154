//! Topology View - read-only path queries
//!
//! All queries are O(1) against the snapshot's fingerprint map and
//! precomputed weight totals; none of them mutate anything.

use serde::{Deserialize, Serialize};

use super::types::{Relay, TopologySnapshot};
use crate::error::{EngineError, Result};

/// Outcome of a path feasibility check, with the violated constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathFeasibility {
    pub feasible: bool,
    pub violations: Vec<String>,
}

/// Borrowing read model over a frozen snapshot.
///
/// Concurrent readers are unrestricted; there is no writer while the
/// engine runs.
#[derive(Debug, Clone, Copy)]
pub struct TopologyView<'a> {
    snapshot: &'a TopologySnapshot,
}

impl<'a> TopologyView<'a> {
    pub fn new(snapshot: &'a TopologySnapshot) -> Self {
        Self { snapshot }
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.snapshot.contains(fingerprint)
    }

    /// Look up a relay, failing with UnknownRelay if absent.
    pub fn relay(&self, fingerprint: &str) -> Result<&'a Relay> {
        self.snapshot
            .relay(fingerprint)
            .ok_or_else(|| EngineError::UnknownRelay(fingerprint.to_string()))
    }

    /// Probability (0..1) that the relay is selected as a guard:
    /// its consensus weight over the guard-capable total. A resolved
    /// relay without guard capability has probability 0.
    pub fn guard_selection_probability(&self, fingerprint: &str) -> Result<f64> {
        let relay = self.relay(fingerprint)?;
        if !relay.is_guard() || self.snapshot.total_guard_weight <= 0.0 {
            return Ok(0.0);
        }
        Ok(relay.consensus_weight / self.snapshot.total_guard_weight)
    }

    /// Check whether a hypothesized (guard, ..., exit) path is feasible:
    /// guard flag on the entry side, exit capability on the exit side,
    /// and no shared /16 subnet.
    pub fn path_feasibility(&self, guard_fp: &str, exit_fp: &str) -> Result<PathFeasibility> {
        let guard = self.relay(guard_fp)?;
        let exit = self.relay(exit_fp)?;

        let mut violations = Vec::new();
        if !guard.is_guard() {
            violations.push("entry relay lacks the Guard flag".to_string());
        }
        if !exit.is_exit() {
            violations.push("exit relay lacks exit capability".to_string());
        }
        if guard.subnet16 == exit.subnet16 {
            violations.push(format!(
                "entry and exit relays share /16 subnet {}",
                guard.subnet16
            ));
        }

        Ok(PathFeasibility {
            feasible: violations.is_empty(),
            violations,
        })
    }

    /// Guard-capable relays, most heavily weighted first.
    pub fn guards(&self) -> Vec<&'a Relay> {
        let mut guards: Vec<&Relay> = self
            .snapshot
            .relays()
            .filter(|r| r.is_guard())
            .collect();
        guards.sort_by(|a, b| {
            b.consensus_weight
                .partial_cmp(&a.consensus_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        guards
    }

    /// Exit-capable relays, most heavily weighted first.
    pub fn exits(&self) -> Vec<&'a Relay> {
        let mut exits: Vec<&Relay> = self.snapshot.relays().filter(|r| r.is_exit()).collect();
        exits.sort_by(|a, b| {
            b.consensus_weight
                .partial_cmp(&a.consensus_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        exits
    }

    /// Guards that could appear on a path ending at the given exit,
    /// after applying the /16 rule.
    pub fn compatible_guards_for_exit(&self, exit_fp: &str) -> Result<Vec<&'a Relay>> {
        let exit = self.relay(exit_fp)?;
        Ok(self
            .guards()
            .into_iter()
            .filter(|guard| guard.subnet16 != exit.subnet16)
            .collect())
    }
}

// ============================================================================
// TESTS
// ============================================================================

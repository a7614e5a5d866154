//! Relay and snapshot types
//!
//! Data structures only - path queries live in `view.rs`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

// ============================================================================
// RELAY FLAGS
// ============================================================================

/// Relay flags as assigned by the directory authorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayFlag {
    Authority,
    BadExit,
    Exit,
    Fast,
    Guard,
    HSDir,
    Running,
    Stable,
    Valid,
    V2Dir,
}

impl RelayFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayFlag::Authority => "Authority",
            RelayFlag::BadExit => "BadExit",
            RelayFlag::Exit => "Exit",
            RelayFlag::Fast => "Fast",
            RelayFlag::Guard => "Guard",
            RelayFlag::HSDir => "HSDir",
            RelayFlag::Running => "Running",
            RelayFlag::Stable => "Stable",
            RelayFlag::Valid => "Valid",
            RelayFlag::V2Dir => "V2Dir",
        }
    }
}

// ============================================================================
// RELAY
// ============================================================================

/// A single relay as seen in one consensus snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relay {
    /// 40-character hex fingerprint, unique within a snapshot
    pub fingerprint: String,
    /// Operator-chosen nickname, if any
    pub nickname: Option<String>,
    /// Flags assigned by the directory authorities
    pub flags: Vec<RelayFlag>,
    /// Relative share of path selection; non-negative
    pub consensus_weight: f64,
    /// /16 subnet the relay's address falls in (e.g. "185.220.0.0/16")
    pub subnet16: String,
    pub as_number: Option<u32>,
    pub country: Option<String>,
}

impl Relay {
    pub fn has_flag(&self, flag: RelayFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Guard-capable: carries the Guard flag.
    pub fn is_guard(&self) -> bool {
        self.has_flag(RelayFlag::Guard)
    }

    /// Exit-capable: carries the Exit flag and is not a BadExit.
    pub fn is_exit(&self) -> bool {
        self.has_flag(RelayFlag::Exit) && !self.has_flag(RelayFlag::BadExit)
    }
}

/// Fingerprints are 40 hex characters (SHA-1 of the relay identity key).
pub fn is_valid_fingerprint(fingerprint: &str) -> bool {
    fingerprint.len() == 40 && fingerprint.chars().all(|c| c.is_ascii_hexdigit())
}

// ============================================================================
// TOPOLOGY SNAPSHOT
// ============================================================================

/// A frozen view of the relay network at one point in time.
///
/// Built once from the fetcher's relay records, then read-only for the
/// lifetime of every correlation run that consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub snapshot_id: String,
    pub captured_at: DateTime<Utc>,

    relays: HashMap<String, Relay>,

    pub total_relays: usize,
    pub guard_relays: usize,
    pub exit_relays: usize,

    /// Sum of consensus weight over guard-capable relays
    pub total_guard_weight: f64,
    /// Sum of consensus weight over exit-capable relays
    pub total_exit_weight: f64,
}

impl TopologySnapshot {
    /// Build a snapshot from fetcher relay records.
    ///
    /// Rejects malformed fingerprints, negative weights, and duplicate
    /// fingerprints; these are input validation failures, not data
    /// outcomes.
    pub fn from_relays(snapshot_id: impl Into<String>, relays: Vec<Relay>) -> Result<Self> {
        let snapshot_id = snapshot_id.into();
        let mut map = HashMap::with_capacity(relays.len());
        let mut guard_relays = 0;
        let mut exit_relays = 0;
        let mut total_guard_weight = 0.0;
        let mut total_exit_weight = 0.0;

        for relay in relays {
            if !is_valid_fingerprint(&relay.fingerprint) {
                return Err(EngineError::InvalidRelay {
                    fingerprint: relay.fingerprint,
                    reason: "fingerprint must be 40 hex characters".to_string(),
                });
            }
            if relay.consensus_weight < 0.0 || !relay.consensus_weight.is_finite() {
                return Err(EngineError::InvalidRelay {
                    fingerprint: relay.fingerprint,
                    reason: format!(
                        "consensus weight must be a non-negative number, got {}",
                        relay.consensus_weight
                    ),
                });
            }
            if map.contains_key(&relay.fingerprint) {
                return Err(EngineError::InvalidRelay {
                    fingerprint: relay.fingerprint,
                    reason: "duplicate fingerprint".to_string(),
                });
            }
            if relay.is_guard() {
                guard_relays += 1;
                total_guard_weight += relay.consensus_weight;
            }
            if relay.is_exit() {
                exit_relays += 1;
                total_exit_weight += relay.consensus_weight;
            }
            map.insert(relay.fingerprint.clone(), relay);
        }

        let total_relays = map.len();
        log::info!(
            "built topology snapshot '{}': {} relays ({} guards, {} exits)",
            snapshot_id,
            total_relays,
            guard_relays,
            exit_relays
        );

        Ok(Self {
            snapshot_id,
            captured_at: Utc::now(),
            relays: map,
            total_relays,
            guard_relays,
            exit_relays,
            total_guard_weight,
            total_exit_weight,
        })
    }

    pub fn relay(&self, fingerprint: &str) -> Option<&Relay> {
        self.relays.get(fingerprint)
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.relays.contains_key(fingerprint)
    }

    pub fn relays(&self) -> impl Iterator<Item = &Relay> {
        self.relays.values()
    }

    pub fn len(&self) -> usize {
        self.relays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relays.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

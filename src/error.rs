//! Error types for the correlation engine.
//!
//! Signal-level outcomes (below-threshold pairs, infeasible paths,
//! unknown relays in lenient mode) are data, not errors - they surface as
//! audit entries on the run report. Only input validation failures,
//! strict-mode resolution failures, internal invariant violations, and
//! cancellation propagate out of the engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("duplicate observation id '{0}'")]
    DuplicateObservation(String),

    #[error("invalid observation '{id}': {reason}")]
    InvalidObservation { id: String, reason: String },

    #[error("invalid relay '{fingerprint}': {reason}")]
    InvalidRelay { fingerprint: String, reason: String },

    #[error("invalid weight profile '{name}': weights sum to {sum:.4}, expected 1.0")]
    InvalidWeightProfile { name: String, sum: f64 },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown relay '{0}'")]
    UnknownRelay(String),

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),

    #[error("correlation run cancelled")]
    Cancelled,
}

/// Coarse error taxonomy, stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InputValidation,
    UnknownRelay,
    InternalInvariant,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputValidation => "input_validation",
            ErrorKind::UnknownRelay => "unknown_relay",
            ErrorKind::InternalInvariant => "internal_invariant",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::DuplicateObservation(_)
            | EngineError::InvalidObservation { .. }
            | EngineError::InvalidRelay { .. }
            | EngineError::InvalidWeightProfile { .. }
            | EngineError::InvalidConfig(_) => ErrorKind::InputValidation,
            EngineError::UnknownRelay(_) => ErrorKind::UnknownRelay,
            EngineError::InternalInvariant(_) => ErrorKind::InternalInvariant,
            EngineError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

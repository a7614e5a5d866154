//! Weight profiles
//!
//! A profile is a named triple of signal weights (time, volume, pattern)
//! summing to 1.0. Four presets cover common investigation shapes; custom
//! profiles carry case metadata that travels into reasoning strings but
//! never into the math.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Tolerance when checking that weights sum to 1.0.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// ============================================================================
// PROFILE KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileKind {
    /// Balanced weights for general investigations
    Standard,
    /// Prioritize temporal correlation
    TimeFocused,
    /// Prioritize data volume matching
    VolumeFocused,
    /// Prioritize behavioral patterns
    PatternFocused,
    /// User-defined weights
    Custom,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Standard => "standard",
            ProfileKind::TimeFocused => "time_focused",
            ProfileKind::VolumeFocused => "volume_focused",
            ProfileKind::PatternFocused => "pattern_focused",
            ProfileKind::Custom => "custom",
        }
    }
}

// ============================================================================
// WEIGHT PROFILE
// ============================================================================

/// How the three signal scores are combined into a base correlation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightProfile {
    pub profile_id: String,
    pub profile_name: String,
    pub kind: ProfileKind,

    /// Temporal proximity weight
    pub weight_time: f64,
    /// Data volume matching weight
    pub weight_volume: f64,
    /// Behavioral pattern weight
    pub weight_pattern: f64,

    /// Associated case/investigation
    pub case_id: Option<String>,
    /// Who created the profile
    pub created_by: Option<String>,
    pub description: Option<String>,
}

static PRESETS: Lazy<HashMap<ProfileKind, WeightProfile>> = Lazy::new(|| {
    let mut presets = HashMap::new();
    presets.insert(
        ProfileKind::Standard,
        WeightProfile {
            profile_id: "standard".to_string(),
            profile_name: "Standard Balanced Profile".to_string(),
            kind: ProfileKind::Standard,
            weight_time: 0.40,
            weight_volume: 0.30,
            weight_pattern: 0.30,
            case_id: None,
            created_by: None,
            description: Some(
                "Balanced weights suitable for most investigations.".to_string(),
            ),
        },
    );
    presets.insert(
        ProfileKind::TimeFocused,
        WeightProfile {
            profile_id: "time-focused".to_string(),
            profile_name: "Time-Focused Profile".to_string(),
            kind: ProfileKind::TimeFocused,
            weight_time: 0.60,
            weight_volume: 0.20,
            weight_pattern: 0.20,
            case_id: None,
            created_by: None,
            description: Some(
                "Prioritizes temporal correlation; use when precise timing is critical."
                    .to_string(),
            ),
        },
    );
    presets.insert(
        ProfileKind::VolumeFocused,
        WeightProfile {
            profile_id: "volume-focused".to_string(),
            profile_name: "Volume-Focused Profile".to_string(),
            kind: ProfileKind::VolumeFocused,
            weight_time: 0.25,
            weight_volume: 0.50,
            weight_pattern: 0.25,
            case_id: None,
            created_by: None,
            description: Some(
                "Prioritizes data volume matching; use for large transfer cases.".to_string(),
            ),
        },
    );
    presets.insert(
        ProfileKind::PatternFocused,
        WeightProfile {
            profile_id: "pattern-focused".to_string(),
            profile_name: "Pattern-Focused Profile".to_string(),
            kind: ProfileKind::PatternFocused,
            weight_time: 0.25,
            weight_volume: 0.25,
            weight_pattern: 0.50,
            case_id: None,
            created_by: None,
            description: Some(
                "Prioritizes behavioral patterns; use for long-term surveillance.".to_string(),
            ),
        },
    );
    presets
});

impl WeightProfile {
    /// Predefined profile for the given kind; `None` for `Custom`.
    pub fn preset(kind: ProfileKind) -> Option<WeightProfile> {
        PRESETS.get(&kind).cloned()
    }

    pub fn standard() -> WeightProfile {
        PRESETS[&ProfileKind::Standard].clone()
    }

    /// Build and validate a custom profile.
    #[allow(clippy::too_many_arguments)]
    pub fn custom(
        profile_id: impl Into<String>,
        profile_name: impl Into<String>,
        weight_time: f64,
        weight_volume: f64,
        weight_pattern: f64,
        case_id: Option<String>,
        created_by: Option<String>,
        description: Option<String>,
    ) -> Result<WeightProfile> {
        let profile = WeightProfile {
            profile_id: profile_id.into(),
            profile_name: profile_name.into(),
            kind: ProfileKind::Custom,
            weight_time,
            weight_volume,
            weight_pattern,
            case_id,
            created_by,
            description,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Check the weight range and sum invariants.
    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("time", self.weight_time),
            ("volume", self.weight_volume),
            ("pattern", self.weight_pattern),
        ] {
            if !(0.0..=1.0).contains(&weight) {
                return Err(EngineError::InvalidConfig(format!(
                    "profile '{}': {} weight must be in [0, 1], got {}",
                    self.profile_name, name, weight
                )));
            }
        }

        let sum = self.weight_time + self.weight_volume + self.weight_pattern;
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::InvalidWeightProfile {
                name: self.profile_name.clone(),
                sum,
            });
        }
        Ok(())
    }

    /// Label used in reasoning strings; custom profiles surface their case id.
    pub fn display_label(&self) -> String {
        match &self.case_id {
            Some(case_id) => format!("{} (case {})", self.profile_name, case_id),
            None => self.profile_name.clone(),
        }
    }
}

impl Default for WeightProfile {
    fn default() -> Self {
        WeightProfile::standard()
    }
}

// ============================================================================
// TESTS
// ============================================================================

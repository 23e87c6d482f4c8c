//! Risk levels and classifier assessments.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Ordered fire-risk scale. Ordering follows declaration order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[strum(to_string = "low")]
    Low,
    #[strum(to_string = "moderate", serialize = "medium")]
    #[serde(alias = "medium")]
    Moderate,
    #[strum(to_string = "high")]
    High,
    #[strum(to_string = "critical", serialize = "extreme")]
    #[serde(alias = "extreme")]
    Critical,
}

impl RiskLevel {
    /// High and critical levels require corroboration and carry an audio cue.
    pub fn is_high_band(self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

/// Classifier output for one reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub level: RiskLevel,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub recommendations: Vec<String>,
}

impl RiskAssessment {
    pub fn new(level: RiskLevel, confidence: f64) -> Self {
        Self {
            level,
            confidence,
            recommendations: Vec::new(),
        }
    }

    pub fn with_recommendations(mut self, recommendations: Vec<String>) -> Self {
        self.recommendations = recommendations;
        self
    }
}

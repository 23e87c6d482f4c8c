//! Alert payload handed to the notification dispatcher.

use crate::risk::{RiskAssessment, RiskLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(Uuid);

impl NotificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub id: NotificationId,
    pub device_id: String,
    pub level: RiskLevel,
    pub confidence: f64,
    pub recommendations: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl AlertNotification {
    pub(crate) fn from_assessment(
        assessment: &RiskAssessment,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            device_id: device_id.to_string(),
            level: assessment.level,
            confidence: assessment.confidence,
            recommendations: assessment.recommendations.clone(),
            created_at: now,
        }
    }

    /// Only high-band alerts are accompanied by the audio cue.
    pub fn wants_cue(&self) -> bool {
        self.level.is_high_band()
    }

    pub fn title(&self) -> String {
        match self.level {
            RiskLevel::Critical => "Critical fire risk".to_string(),
            RiskLevel::High => "High fire risk".to_string(),
            RiskLevel::Moderate => "Moderate fire risk".to_string(),
            RiskLevel::Low => "Low fire risk".to_string(),
        }
    }

    pub fn body(&self) -> String {
        let mut body = format!(
            "Sensor {}: {} risk detected ({:.0}% confidence).",
            self.device_id,
            self.level,
            self.confidence * 100.0
        );
        if let Some(first) = self.recommendations.first() {
            body.push(' ');
            body.push_str(first);
        }
        body
    }
}

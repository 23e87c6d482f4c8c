//! Hysteresis and cooldown gate deciding whether an assessment becomes an alert.
//!
//! The gate is a pure transition over [`AlertGateState`] with `now` injected,
//! so it can be driven without timers or network access:
//!
//! 1. Below the threshold: counter reset, no alert, `Idle`.
//! 2. Within the cooldown of the last alert: suppressed, counter untouched,
//!    `Alerting`.
//! 3. High or critical: counter incremented; alert once it reaches the
//!    required count (counter reset), otherwise `Escalating`.
//! 4. Anything else at or above the threshold: alert immediately, counter
//!    untouched.

use super::notification::AlertNotification;
use crate::risk::{RiskAssessment, RiskLevel};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertGateConfig {
    pub threshold: RiskLevel,
    pub cooldown: Duration,
    pub required_consecutive_high: u32,
}

impl Default for AlertGateConfig {
    fn default() -> Self {
        Self {
            threshold: RiskLevel::Moderate,
            cooldown: Duration::from_secs(60),
            required_consecutive_high: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePhase {
    #[default]
    Idle,
    /// Some, but not yet enough, consecutive high-band reads.
    Escalating,
    /// Alert dispatched; cooldown governs the next one.
    Alerting,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlertGateState {
    last_notification: Option<DateTime<Utc>>,
    consecutive_high: u32,
    phase: GatePhase,
    config: AlertGateConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    BelowThreshold,
    Cooldown { remaining: Duration },
    AwaitingConfirmation { seen: u32, required: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Notify(AlertNotification),
    Suppress(SuppressReason),
}

impl GateDecision {
    pub fn is_notify(&self) -> bool {
        matches!(self, GateDecision::Notify(_))
    }
}

impl AlertGateState {
    pub fn new(config: AlertGateConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &AlertGateConfig {
        &self.config
    }

    /// Replace the configuration; counter and cooldown history are kept.
    pub fn set_config(&mut self, config: AlertGateConfig) {
        self.config = config;
    }

    pub fn last_notification(&self) -> Option<DateTime<Utc>> {
        self.last_notification
    }

    pub fn consecutive_high(&self) -> u32 {
        self.consecutive_high
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    /// Time left before another alert may fire, if a cooldown is running.
    /// A last-notification time in the future counts as a full cooldown.
    fn cooldown_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        let last = self.last_notification?;
        let elapsed = now.signed_duration_since(last);
        match elapsed.to_std() {
            Ok(elapsed) if elapsed >= self.config.cooldown => None,
            Ok(elapsed) => Some(self.config.cooldown - elapsed),
            Err(_) => Some(self.config.cooldown),
        }
    }

    /// Apply one assessment. Never fails.
    ///
    /// The gate records the approval, not the delivery: a `Notify` decision
    /// starts the cooldown and resets the counter even if the dispatcher
    /// later reports a denied permission or a presentation failure.
    pub fn evaluate(
        &mut self,
        assessment: &RiskAssessment,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> GateDecision {
        let level = assessment.level;

        if level < self.config.threshold {
            self.consecutive_high = 0;
            self.phase = GatePhase::Idle;
            return GateDecision::Suppress(SuppressReason::BelowThreshold);
        }

        if let Some(remaining) = self.cooldown_remaining(now) {
            debug!(
                "[Gate] {} {} suppressed, cooldown {:?} remaining",
                device_id, level, remaining
            );
            self.phase = GatePhase::Alerting;
            return GateDecision::Suppress(SuppressReason::Cooldown { remaining });
        }

        if level.is_high_band() {
            self.consecutive_high = self.consecutive_high.saturating_add(1);
            let required = self.config.required_consecutive_high;
            if self.consecutive_high < required {
                debug!(
                    "[Gate] {} {} read {}/{}",
                    device_id, level, self.consecutive_high, required
                );
                self.phase = GatePhase::Escalating;
                return GateDecision::Suppress(SuppressReason::AwaitingConfirmation {
                    seen: self.consecutive_high,
                    required,
                });
            }
            self.consecutive_high = 0;
        }

        self.last_notification = Some(now);
        self.phase = GatePhase::Alerting;
        info!("[Gate] {} {} risk approved for alert", device_id, level);
        GateDecision::Notify(AlertNotification::from_assessment(assessment, device_id, now))
    }
}

//! Host-facing engine snapshot and events.

use crate::alert::{AlertGateState, AlertNotification, GatePhase};
use crate::risk::{RiskAssessment, RiskLevel};
use crate::telemetry::SensorReading;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Latest known state of one engine, for display by the host.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub device_id: String,
    pub ticks: u64,
    pub last_tick_at: Option<DateTime<Utc>>,
    pub last_reading: Option<SensorReading>,
    pub last_assessment: Option<RiskAssessment>,
    pub gate_phase: GatePhase,
    pub consecutive_high: u32,
    pub last_notification: Option<DateTime<Utc>>,
    pub notifications_sent: u64,
    pub last_error: Option<String>,
}

impl EngineStatus {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            ticks: 0,
            last_tick_at: None,
            last_reading: None,
            last_assessment: None,
            gate_phase: GatePhase::Idle,
            consecutive_high: 0,
            last_notification: None,
            notifications_sent: 0,
            last_error: None,
        }
    }

    pub(crate) fn record_gate(&mut self, gate: &AlertGateState) {
        self.gate_phase = gate.phase();
        self.consecutive_high = gate.consecutive_high();
        self.last_notification = gate.last_notification();
    }
}

/// Things the host may want to show the user.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Notified {
        notification: AlertNotification,
        cue_started: bool,
    },
    /// Alert approved but the platform refused notification permission.
    PermissionDenied { device_id: String, level: RiskLevel },
    /// The fallback reading was evaluated. `cause` is `fetch_timeout`,
    /// `no_data` or `validation`.
    FallbackUsed {
        device_id: String,
        cause: &'static str,
    },
    TickFailed {
        device_id: String,
        kind: &'static str,
        message: String,
    },
}

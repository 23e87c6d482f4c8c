//! Alert gating and alert payloads.

pub mod gate;
pub mod notification;

pub use gate::{AlertGateConfig, AlertGateState, GateDecision, GatePhase, SuppressReason};
pub use notification::{AlertNotification, NotificationId};

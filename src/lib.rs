//! Wildfire alert engine library.
//!
//! Polls environmental telemetry, classifies fire risk through an external
//! service, and decides under hysteresis and cooldown rules when to raise a
//! user-facing alert with a timed audio cue.

pub mod alert;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;
pub mod risk;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

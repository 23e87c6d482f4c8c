//! Simulated telemetry for development.
//!
//! Produces ThingSpeak-shaped samples from a bounded random walk with
//! occasional heat/smoke excursions, so the whole pipeline can be exercised
//! without a live sensor feed.

use super::fetcher::{ProviderError, TelemetryProvider};
use super::normalizer::{FieldMap, RawSample};
use async_trait::async_trait;
use chrono::Utc;
use log::info;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy)]
struct SimState {
    temperature: f64,
    humidity: f64,
    smoke: f64,
    /// Remaining ticks of an ongoing excursion
    excursion: u32,
}

pub struct SimulatedTelemetry {
    device_id: String,
    field_map: FieldMap,
    state: Mutex<(SimState, StdRng)>,
}

impl SimulatedTelemetry {
    /// Chance per sample that a fire-like excursion starts.
    const EXCURSION_PROBABILITY: f64 = 0.08;

    pub fn new(device_id: impl Into<String>, field_map: FieldMap) -> Self {
        Self::with_rng(device_id, field_map, StdRng::from_entropy())
    }

    pub fn with_seed(device_id: impl Into<String>, field_map: FieldMap, seed: u64) -> Self {
        Self::with_rng(device_id, field_map, StdRng::seed_from_u64(seed))
    }

    fn with_rng(device_id: impl Into<String>, field_map: FieldMap, rng: StdRng) -> Self {
        Self {
            device_id: device_id.into(),
            field_map,
            state: Mutex::new((
                SimState {
                    temperature: 24.0,
                    humidity: 45.0,
                    smoke: 5.0,
                    excursion: 0,
                },
                rng,
            )),
        }
    }

    fn step(&self) -> SimState {
        let mut guard = self.state.lock();
        let (state, rng) = &mut *guard;

        if state.excursion == 0 && rng.gen_bool(Self::EXCURSION_PROBABILITY) {
            state.excursion = rng.gen_range(2..=5);
            info!("[Sim] {} heat excursion started", self.device_id);
        }

        if state.excursion > 0 {
            state.excursion -= 1;
            state.temperature += rng.gen_range(3.0..8.0);
            state.humidity -= rng.gen_range(3.0..8.0);
            state.smoke += rng.gen_range(50.0..150.0);
        } else {
            // Relax toward ambient
            state.temperature += (24.0 - state.temperature) * 0.3 + rng.gen_range(-0.5..0.5);
            state.humidity += (45.0 - state.humidity) * 0.3 + rng.gen_range(-1.0..1.0);
            state.smoke += (5.0 - state.smoke) * 0.4 + rng.gen_range(-1.0..1.0);
        }

        state.temperature = state.temperature.clamp(-10.0, 70.0);
        state.humidity = state.humidity.clamp(0.0, 100.0);
        state.smoke = state.smoke.max(0.0);
        *state
    }
}

#[async_trait]
impl TelemetryProvider for SimulatedTelemetry {
    async fn latest(&self) -> Result<RawSample, ProviderError> {
        let s = self.step();
        let fmt = |v: f64| Value::String(format!("{:.2}", v));

        let mut fields = Map::new();
        fields.insert(
            self.field_map.timestamp.clone(),
            Value::String(Utc::now().to_rfc3339()),
        );
        fields.insert(self.field_map.temperature.clone(), fmt(s.temperature));
        fields.insert(self.field_map.humidity.clone(), fmt(s.humidity));
        fields.insert(self.field_map.smoke_level.clone(), fmt(s.smoke));

        Ok(RawSample::new(self.device_id.clone(), fields))
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }
}

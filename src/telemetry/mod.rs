//! Telemetry intake: fetching, normalization and deduplication of sensor samples.

pub mod dedup;
pub mod fetcher;
pub mod normalizer;
pub mod reading;
pub mod simulation;

pub use dedup::Deduplicator;
pub use fetcher::{
    FetchOutcome, HttpTelemetryProvider, ProviderError, TelemetryFetcher,
    TelemetryProvider,
};
pub use normalizer::{FieldMap, Normalizer, RawSample};
pub use reading::{DataQuality, SecondaryMeasurements, SensorReading};
pub use simulation::SimulatedTelemetry;

//! Canonical sensor reading produced by the normalizer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provenance of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    /// Parsed from a live provider sample.
    Good,
    /// Substituted safe defaults (timeout or provider had no data).
    Fallback,
}

/// Optional measurements that refine, but never drive, classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecondaryMeasurements {
    /// Air quality index
    pub air_quality: f64,
    /// km/h
    pub wind_speed: f64,
    /// Degrees from north
    pub wind_direction: f64,
    /// hPa
    pub pressure: f64,
    pub uv_index: f64,
    /// Percent volumetric water content
    pub soil_moisture: f64,
    /// mm
    pub rainfall: f64,
}

impl SecondaryMeasurements {
    pub const DEFAULT_AIR_QUALITY: f64 = 50.0;
    pub const DEFAULT_WIND_SPEED: f64 = 0.0;
    pub const DEFAULT_WIND_DIRECTION: f64 = 0.0;
    pub const DEFAULT_PRESSURE: f64 = 1013.25;
    pub const DEFAULT_UV_INDEX: f64 = 0.0;
    pub const DEFAULT_SOIL_MOISTURE: f64 = 30.0;
    pub const DEFAULT_RAINFALL: f64 = 0.0;
}

impl Default for SecondaryMeasurements {
    fn default() -> Self {
        Self {
            air_quality: Self::DEFAULT_AIR_QUALITY,
            wind_speed: Self::DEFAULT_WIND_SPEED,
            wind_direction: Self::DEFAULT_WIND_DIRECTION,
            pressure: Self::DEFAULT_PRESSURE,
            uv_index: Self::DEFAULT_UV_INDEX,
            soil_moisture: Self::DEFAULT_SOIL_MOISTURE,
            rainfall: Self::DEFAULT_RAINFALL,
        }
    }
}

/// A validated point-in-time sample. Fields are private so a reading can
/// only be built with all primary measurements present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    device_id: String,
    temperature: f64,
    humidity: f64,
    smoke_level: f64,
    secondary: SecondaryMeasurements,
    timestamp: DateTime<Utc>,
    quality: DataQuality,
}

impl SensorReading {
    pub(crate) fn new(
        device_id: impl Into<String>,
        temperature: f64,
        humidity: f64,
        smoke_level: f64,
        secondary: SecondaryMeasurements,
        timestamp: DateTime<Utc>,
        quality: DataQuality,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            temperature,
            humidity,
            smoke_level,
            secondary,
            timestamp,
            quality,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// °C
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Relative humidity, percent
    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    /// ppm
    pub fn smoke_level(&self) -> f64 {
        self.smoke_level
    }

    pub fn secondary(&self) -> &SecondaryMeasurements {
        &self.secondary
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn quality(&self) -> DataQuality {
        self.quality
    }

    pub fn is_fallback(&self) -> bool {
        self.quality == DataQuality::Fallback
    }
}

//! Raw provider sample → canonical [`SensorReading`].
//!
//! Primary fields (temperature, humidity, smoke) are required and fail
//! normalization when missing. Secondary fields fall back to fixed defaults
//! (see [`SecondaryMeasurements`]).

use super::reading::{DataQuality, SecondaryMeasurements, SensorReading};
use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const FALLBACK_TEMPERATURE: f64 = 25.0;
pub const FALLBACK_HUMIDITY: f64 = 50.0;
pub const FALLBACK_SMOKE_LEVEL: f64 = 0.0;

/// Provider field names for each canonical measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMap {
    pub timestamp: String,
    pub temperature: String,
    pub humidity: String,
    pub smoke_level: String,
    pub air_quality: String,
    pub wind_speed: String,
    pub wind_direction: String,
    pub pressure: String,
    pub uv_index: String,
    pub soil_moisture: String,
    pub rainfall: String,
}

impl Default for FieldMap {
    /// ThingSpeak channel layout.
    fn default() -> Self {
        Self {
            timestamp: "created_at".into(),
            temperature: "field1".into(),
            humidity: "field2".into(),
            smoke_level: "field3".into(),
            air_quality: "field4".into(),
            wind_speed: "field5".into(),
            wind_direction: "field6".into(),
            pressure: "field7".into(),
            uv_index: "field8".into(),
            soil_moisture: "soil_moisture".into(),
            rainfall: "rainfall".into(),
        }
    }
}

impl FieldMap {
    /// Identity layout used by fallback samples.
    pub fn canonical() -> Self {
        Self {
            timestamp: "timestamp".into(),
            temperature: "temperature".into(),
            humidity: "humidity".into(),
            smoke_level: "smoke_level".into(),
            air_quality: "air_quality".into(),
            wind_speed: "wind_speed".into(),
            wind_direction: "wind_direction".into(),
            pressure: "pressure".into(),
            uv_index: "uv_index".into(),
            soil_moisture: "soil_moisture".into(),
            rainfall: "rainfall".into(),
        }
    }
}

/// Unvalidated sample as returned by a telemetry provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSample {
    device_id: String,
    fields: Map<String, Value>,
    fallback: bool,
}

impl RawSample {
    pub fn new(device_id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            device_id: device_id.into(),
            fields,
            fallback: false,
        }
    }

    /// Safe-looking default sample used when the provider cannot deliver one.
    pub fn fallback(device_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        let defaults = SecondaryMeasurements::default();
        let mut fields = Map::new();
        fields.insert("timestamp".into(), Value::String(at.to_rfc3339()));
        fields.insert("temperature".into(), FALLBACK_TEMPERATURE.into());
        fields.insert("humidity".into(), FALLBACK_HUMIDITY.into());
        fields.insert("smoke_level".into(), FALLBACK_SMOKE_LEVEL.into());
        fields.insert("air_quality".into(), defaults.air_quality.into());
        fields.insert("wind_speed".into(), defaults.wind_speed.into());
        fields.insert("wind_direction".into(), defaults.wind_direction.into());
        fields.insert("pressure".into(), defaults.pressure.into());
        fields.insert("uv_index".into(), defaults.uv_index.into());
        fields.insert("soil_moisture".into(), defaults.soil_moisture.into());
        fields.insert("rainfall".into(), defaults.rainfall.into());

        Self {
            device_id: device_id.into(),
            fields,
            fallback: true,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Accepts JSON numbers and numeric strings; rejects anything non-finite.
fn parse_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    field_map: FieldMap,
}

impl Normalizer {
    pub fn new(field_map: FieldMap) -> Self {
        Self { field_map }
    }

    pub fn field_map(&self) -> &FieldMap {
        &self.field_map
    }

    pub fn normalize(&self, raw: &RawSample) -> Result<SensorReading, ValidationError> {
        let canonical;
        let map = if raw.is_fallback() {
            canonical = FieldMap::canonical();
            &canonical
        } else {
            &self.field_map
        };

        let temperature = parse_number(raw.get(&map.temperature))
            .ok_or(ValidationError::MissingPrimaryField("temperature"))?;
        let humidity = parse_number(raw.get(&map.humidity))
            .ok_or(ValidationError::MissingPrimaryField("humidity"))?;
        let smoke_level = parse_number(raw.get(&map.smoke_level))
            .ok_or(ValidationError::MissingPrimaryField("smoke_level"))?;

        if !(0.0..=100.0).contains(&humidity) {
            return Err(ValidationError::OutOfRange {
                field: "humidity",
                value: humidity,
            });
        }
        if smoke_level < 0.0 {
            return Err(ValidationError::OutOfRange {
                field: "smoke_level",
                value: smoke_level,
            });
        }

        let timestamp = match raw.get(&map.timestamp) {
            Some(Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| ValidationError::InvalidTimestamp(format!("{}: {}", s, e)))?,
            Some(other) => return Err(ValidationError::InvalidTimestamp(other.to_string())),
            None => return Err(ValidationError::InvalidTimestamp("missing".into())),
        };

        let or_default = |key: &str, default: f64| parse_number(raw.get(key)).unwrap_or(default);
        let secondary = SecondaryMeasurements {
            air_quality: or_default(
                &map.air_quality,
                SecondaryMeasurements::DEFAULT_AIR_QUALITY,
            ),
            wind_speed: or_default(&map.wind_speed, SecondaryMeasurements::DEFAULT_WIND_SPEED),
            wind_direction: or_default(
                &map.wind_direction,
                SecondaryMeasurements::DEFAULT_WIND_DIRECTION,
            ),
            pressure: or_default(&map.pressure, SecondaryMeasurements::DEFAULT_PRESSURE),
            uv_index: or_default(&map.uv_index, SecondaryMeasurements::DEFAULT_UV_INDEX),
            soil_moisture: or_default(
                &map.soil_moisture,
                SecondaryMeasurements::DEFAULT_SOIL_MOISTURE,
            ),
            rainfall: or_default(&map.rainfall, SecondaryMeasurements::DEFAULT_RAINFALL),
        };

        let quality = if raw.is_fallback() {
            DataQuality::Fallback
        } else {
            DataQuality::Good
        };

        Ok(SensorReading::new(
            raw.device_id(),
            temperature,
            humidity,
            smoke_level,
            secondary,
            timestamp,
            quality,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn thingspeak(value: Value) -> RawSample {
        let Value::Object(fields) = value else {
            panic!("expected object");
        };
        RawSample::new("station-1", fields)
    }

    #[test]
    fn test_normalize_string_and_number_fields() {
        let raw = thingspeak(json!({
            "created_at": "2024-07-01T12:00:00Z",
            "entry_id": 42,
            "field1": "38.5",
            "field2": 12,
            "field3": " 310.0 ",
            "field4": "85",
            "field5": "27.5",
        }));

        let reading = Normalizer::default().normalize(&raw).unwrap();
        assert_eq!(reading.device_id(), "station-1");
        assert_eq!(reading.temperature(), 38.5);
        assert_eq!(reading.humidity(), 12.0);
        assert_eq!(reading.smoke_level(), 310.0);
        assert_eq!(reading.secondary().air_quality, 85.0);
        assert_eq!(reading.secondary().wind_speed, 27.5);
        assert_eq!(reading.quality(), DataQuality::Good);
        assert_eq!(
            reading.timestamp(),
            Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_secondary_defaults_when_absent_or_garbage() {
        let raw = thingspeak(json!({
            "created_at": "2024-07-01T12:00:00Z",
            "field1": "20", "field2": "40", "field3": "1",
            "field4": "n/a",
            "field7": null,
        }));

        let reading = Normalizer::default().normalize(&raw).unwrap();
        assert_eq!(*reading.secondary(), SecondaryMeasurements::default());
        assert_eq!(reading.secondary().air_quality, 50.0);
    }

    #[test]
    fn test_missing_primary_field_fails() {
        let raw = thingspeak(json!({
            "created_at": "2024-07-01T12:00:00Z",
            "field1": "20", "field2": "40",
        }));
        assert_eq!(
            Normalizer::default().normalize(&raw),
            Err(ValidationError::MissingPrimaryField("smoke_level"))
        );

        let raw = thingspeak(json!({
            "created_at": "2024-07-01T12:00:00Z",
            "field1": "hot", "field2": "40", "field3": "2",
        }));
        assert_eq!(
            Normalizer::default().normalize(&raw),
            Err(ValidationError::MissingPrimaryField("temperature"))
        );
    }

    #[test]
    fn test_non_finite_primary_is_missing() {
        let raw = thingspeak(json!({
            "created_at": "2024-07-01T12:00:00Z",
            "field1": "NaN", "field2": "40", "field3": "2",
        }));
        assert!(matches!(
            Normalizer::default().normalize(&raw),
            Err(ValidationError::MissingPrimaryField("temperature"))
        ));
    }

    #[test]
    fn test_out_of_range_humidity() {
        let raw = thingspeak(json!({
            "created_at": "2024-07-01T12:00:00Z",
            "field1": "20", "field2": "140", "field3": "2",
        }));
        assert!(matches!(
            Normalizer::default().normalize(&raw),
            Err(ValidationError::OutOfRange { field: "humidity", .. })
        ));
    }

    #[test]
    fn test_bad_timestamp() {
        let raw = thingspeak(json!({
            "created_at": "yesterday",
            "field1": "20", "field2": "40", "field3": "2",
        }));
        assert!(matches!(
            Normalizer::default().normalize(&raw),
            Err(ValidationError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_fallback_shape_always_normalizes() {
        let at = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        let custom = FieldMap {
            temperature: "temp_c".into(),
            ..FieldMap::default()
        };

        for normalizer in [Normalizer::default(), Normalizer::new(custom)] {
            let reading = normalizer.normalize(&RawSample::fallback("station-1", at)).unwrap();
            assert!(reading.is_fallback());
            assert_eq!(reading.timestamp(), at);
            assert_eq!(reading.temperature(), FALLBACK_TEMPERATURE);
            assert_eq!(reading.humidity(), FALLBACK_HUMIDITY);
            assert_eq!(reading.smoke_level(), FALLBACK_SMOKE_LEVEL);
        }
    }
}

//! Timestamp-based sample deduplication.

use super::reading::SensorReading;
use chrono::{DateTime, Utc};

/// Rejects readings that are not strictly newer than the last accepted one.
///
/// Only the timestamp is compared: two different readings that share a
/// timestamp are treated as the same sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deduplicator {
    last_timestamp: Option<DateTime<Utc>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_timestamp
    }

    /// Returns `true` and records the timestamp if the reading is new.
    pub fn accept(&mut self, reading: &SensorReading) -> bool {
        let ts = reading.timestamp();
        match self.last_timestamp {
            Some(last) if ts <= last => false,
            _ => {
                self.last_timestamp = Some(ts);
                true
            }
        }
    }
}

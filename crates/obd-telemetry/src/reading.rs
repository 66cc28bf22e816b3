//! Sensor Reading

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One timestamped snapshot of named sensor values.
///
/// Readings are immutable once produced; values are only reachable through
/// accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    timestamp: DateTime<Utc>,
    vehicle_id: Option<String>,
    values: BTreeMap<String, f64>,
}

impl SensorReading {
    /// Create a new reading
    pub fn new(
        timestamp: DateTime<Utc>,
        vehicle_id: Option<String>,
        values: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            timestamp,
            vehicle_id,
            values,
        }
    }

    /// Build a reading from `(name, value)` pairs, stamped with the current time
    pub fn from_pairs<I, S>(vehicle_id: Option<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        let values = pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self::new(Utc::now(), vehicle_id, values)
    }

    /// Value of a named feature, if present
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// When the reading was taken
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Vehicle identifier (VIN), if known
    pub fn vehicle_id(&self) -> Option<&str> {
        self.vehicle_id.as_deref()
    }

    /// All named values
    pub fn values(&self) -> &BTreeMap<String, f64> {
        &self.values
    }

    /// Number of values in the reading
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the reading carries no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

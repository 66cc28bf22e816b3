//! Attestation Record

use chrono::{DateTime, Utc};
use inference_engine::ClassificationResult;
use obd_telemetry::SensorReading;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use token_registry::TokenId;

/// Persisted proof of one window's best classification.
///
/// Field names match the `car_data` table consumed downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttestationRecord {
    /// Timestamp of the source reading
    pub timestamp: DateTime<Utc>,
    /// Winning fault code
    pub fault: String,
    /// Confidence of the winning fault code
    pub confidence: f64,
    /// Raw feature snapshot of the source reading
    pub sensor_data: BTreeMap<String, f64>,
    /// Issued token identifier
    pub unique_id: TokenId,
    /// Vehicle identification number, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
}

impl AttestationRecord {
    /// Build a record from a classification and the reading it came from
    pub fn new(result: &ClassificationResult, reading: &SensorReading, token_id: TokenId) -> Self {
        Self {
            timestamp: reading.timestamp(),
            fault: result.label.clone(),
            confidence: result.confidence,
            sensor_data: reading.values().clone(),
            unique_id: token_id,
            vin: reading.vehicle_id().map(str::to_string),
        }
    }
}

//! Feature Normalization
//!
//! Standardizes readings with the training-time statistics:
//! `(value - mean_i) / scale_i` for each feature `i` in schema order.

use crate::{FeatureError, FeatureSchema, NormalizationParameters};
use obd_telemetry::SensorReading;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Normalized feature vector in schema order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Normalized values
    pub values: Vec<f64>,
    /// Source reading timestamp (Unix ms)
    pub timestamp_ms: i64,
}

impl FeatureVector {
    /// Number of features
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values as single-precision floats for model input
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|&v| v as f32).collect()
    }
}

/// Builds normalized feature vectors from readings.
///
/// Construction performs the startup identity check between the pipeline's
/// feature order and the order the statistics were computed in. The
/// normalizer is immutable afterwards and cheap to clone.
#[derive(Debug, Clone)]
pub struct FeatureNormalizer {
    schema: Arc<FeatureSchema>,
    params: Arc<NormalizationParameters>,
}

impl FeatureNormalizer {
    /// Create a normalizer, refusing statistics stored in a different order
    pub fn new(schema: FeatureSchema, params: NormalizationParameters) -> Result<Self, FeatureError> {
        schema.verify_identity(params.feature_names())?;
        info!("Feature normalizer ready: {} features", schema.len());
        Ok(Self {
            schema: Arc::new(schema),
            params: Arc::new(params),
        })
    }

    /// Map a reading to its normalized feature vector
    pub fn normalize(&self, reading: &SensorReading) -> Result<FeatureVector, FeatureError> {
        let raw = self.extract(reading)?;
        let mean = self.params.mean();
        let scale = self.params.scale();

        let values = raw
            .iter()
            .enumerate()
            .map(|(i, &value)| (value - mean[i]) / scale[i])
            .collect();

        debug!("Normalized reading with {} features", raw.len());

        Ok(FeatureVector {
            values,
            timestamp_ms: reading.timestamp().timestamp_millis(),
        })
    }

    /// Raw values in schema order, without scaling
    pub fn extract(&self, reading: &SensorReading) -> Result<Vec<f64>, FeatureError> {
        self.schema
            .names()
            .iter()
            .map(|name| {
                let value = reading
                    .get(name)
                    .ok_or_else(|| FeatureError::MissingFeature(name.clone()))?;
                if !value.is_finite() {
                    return Err(FeatureError::NonFiniteValue {
                        name: name.clone(),
                        value,
                    });
                }
                Ok(value)
            })
            .collect()
    }

    /// The feature order this normalizer produces
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Number of features per vector
    pub fn dimension(&self) -> usize {
        self.schema.len()
    }
}

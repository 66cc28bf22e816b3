//! Normalization Parameters
//!
//! Per-feature mean and scale computed at training time. Loaded once at
//! startup from a JSON artifact:
//!
//! ```json
//! { "feature_names": ["engine_load", "..."], "mean": [50.1, ...], "scale": [28.7, ...] }
//! ```

use crate::FeatureError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Training-time standardization statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParameters {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl NormalizationParameters {
    /// Create and validate parameters
    pub fn new(
        feature_names: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    ) -> Result<Self, FeatureError> {
        let params = Self {
            feature_names,
            mean,
            scale,
        };
        params.validate()?;
        Ok(params)
    }

    /// Parse parameters from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, FeatureError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a JSON artifact on disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FeatureError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| FeatureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let params = Self::from_json_str(&json)?;
        info!(
            "Loaded normalization parameters for {} features from {}",
            params.len(),
            path.display()
        );
        Ok(params)
    }

    fn validate(&self) -> Result<(), FeatureError> {
        let n = self.feature_names.len();
        if n == 0 {
            return Err(FeatureError::InvalidParameters("no features".to_string()));
        }
        if self.mean.len() != n || self.scale.len() != n {
            return Err(FeatureError::InvalidParameters(format!(
                "{} feature names but {} means and {} scales",
                n,
                self.mean.len(),
                self.scale.len()
            )));
        }
        for (i, name) in self.feature_names.iter().enumerate() {
            if !self.mean[i].is_finite() {
                return Err(FeatureError::InvalidParameters(format!(
                    "mean for {} is not finite",
                    name
                )));
            }
            if !self.scale[i].is_finite() || self.scale[i] == 0.0 {
                return Err(FeatureError::InvalidParameters(format!(
                    "scale for {} must be finite and non-zero, got {}",
                    name, self.scale[i]
                )));
            }
        }
        Ok(())
    }

    /// Feature names the statistics were computed over, in order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Per-feature means
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Per-feature scales
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.feature_names.len()
    }

    /// Always false for validated parameters
    pub fn is_empty(&self) -> bool {
        self.feature_names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_json() {
        let params = NormalizationParameters::from_json_str(
            r#"{"feature_names":["rpm","speed"],"mean":[2300.0,100.0],"scale":[980.0,57.7]}"#,
        )
        .unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(params.mean(), &[2300.0, 100.0]);
    }

    #[test]
    fn test_rejects_zero_scale() {
        let err = NormalizationParameters::new(
            vec!["rpm".to_string()],
            vec![2300.0],
            vec![0.0],
        )
        .unwrap_err();
        assert!(matches!(err, FeatureError::InvalidParameters(_)));
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let err = NormalizationParameters::from_json_str(
            r#"{"feature_names":["rpm","speed"],"mean":[2300.0],"scale":[980.0,57.7]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, FeatureError::InvalidParameters(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"feature_names":["fuel_level"],"mean":[52.5],"scale":[27.4]}}"#
        )
        .unwrap();

        let params = NormalizationParameters::load(file.path()).unwrap();
        assert_eq!(params.feature_names(), &["fuel_level".to_string()]);
    }

    #[test]
    fn test_missing_file() {
        let err = NormalizationParameters::load("/nonexistent/scaler.json").unwrap_err();
        assert!(matches!(err, FeatureError::Io { .. }));
    }
}

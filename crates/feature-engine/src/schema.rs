//! Feature Schema

use crate::FeatureError;
use std::collections::HashSet;

/// Ordered list of feature names the pipeline feeds the classifier.
///
/// Position `i` in every feature vector is the feature named at position `i`
/// here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// Create a schema, rejecting empty lists and duplicate names
    pub fn new<I, S>(names: I) -> Result<Self, FeatureError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(FeatureError::InvalidSchema("feature list is empty".to_string()));
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(FeatureError::InvalidSchema(format!(
                    "duplicate feature name: {}",
                    name
                )));
            }
        }

        Ok(Self { names })
    }

    /// Schema for the 20-signal OBD catalog
    pub fn obd_default() -> Self {
        Self {
            names: obd_telemetry::default_feature_names(),
        }
    }

    /// Feature names in order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of features
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Always false for a constructed schema
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Check that `stored` lists exactly this schema's features in this order
    pub fn verify_identity(&self, stored: &[String]) -> Result<(), FeatureError> {
        if stored.len() != self.names.len() {
            return Err(FeatureError::CountMismatch {
                expected: self.names.len(),
                actual: stored.len(),
            });
        }

        match self
            .names
            .iter()
            .zip(stored)
            .position(|(expected, found)| expected != found)
        {
            Some(position) => Err(FeatureError::OrderMismatch {
                position,
                expected: self.names[position].clone(),
                found: stored[position].clone(),
            }),
            None => Ok(()),
        }
    }
}

//! Label Vocabulary

use crate::InferenceError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Ordered fault codes; classifier output `i` is the probability of label `i`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelVocabulary {
    labels: Vec<String>,
}

impl LabelVocabulary {
    /// Create a vocabulary, rejecting empty lists and duplicate labels
    pub fn new<I, S>(labels: I) -> Result<Self, InferenceError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            return Err(InferenceError::InvalidVocabulary("no labels".to_string()));
        }
        let mut seen = HashSet::with_capacity(labels.len());
        for label in &labels {
            if label.is_empty() {
                return Err(InferenceError::InvalidVocabulary("empty label".to_string()));
            }
            if !seen.insert(label.as_str()) {
                return Err(InferenceError::InvalidVocabulary(format!(
                    "duplicate label: {}",
                    label
                )));
            }
        }
        Ok(Self { labels })
    }

    /// Load a vocabulary from a JSON array of strings
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| InferenceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let vocabulary: Self = serde_json::from_str(&json)?;
        info!("Loaded {} fault labels from {}", vocabulary.len(), path.display());
        Ok(vocabulary)
    }

    /// Label at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Index of `label`
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// All labels in model order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of labels
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false for a constructed vocabulary
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl TryFrom<Vec<String>> for LabelVocabulary {
    type Error = InferenceError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(labels)
    }
}

impl From<LabelVocabulary> for Vec<String> {
    fn from(vocabulary: LabelVocabulary) -> Self {
        vocabulary.labels
    }
}

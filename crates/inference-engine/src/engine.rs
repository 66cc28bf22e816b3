//! Classifier Implementation

use crate::{InferenceError, LabelVocabulary, ProbabilityModel};
use feature_engine::FeatureVector;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Top-1 classification of a single reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Predicted fault code
    pub label: String,
    /// Position of the label in the vocabulary
    pub label_index: usize,
    /// Probability of the predicted label (0.0 to 1.0)
    pub confidence: f64,
    /// Timestamp of the source reading (Unix ms)
    pub timestamp_ms: i64,
}

/// Index and value of the largest probability; ties go to the lowest index
pub fn top1(probabilities: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in probabilities.iter().enumerate() {
        match best {
            Some((_, current)) if p <= current => {}
            _ => best = Some((i, p)),
        }
    }
    best
}

/// Fault classifier: a model artifact paired with its label vocabulary.
///
/// Stateless after construction; clones share the same model.
#[derive(Clone)]
pub struct Classifier {
    model: Arc<dyn ProbabilityModel>,
    vocabulary: Arc<LabelVocabulary>,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("vocabulary", &self.vocabulary)
            .finish_non_exhaustive()
    }
}

impl Classifier {
    /// Pair a model with its vocabulary.
    ///
    /// Fails when the model's input width differs from `feature_count` or its
    /// output width differs from the vocabulary length.
    pub fn new(
        model: Arc<dyn ProbabilityModel>,
        vocabulary: LabelVocabulary,
        feature_count: usize,
    ) -> Result<Self, InferenceError> {
        if model.input_width() != feature_count {
            return Err(InferenceError::InvalidInputShape {
                expected: feature_count,
                actual: model.input_width(),
            });
        }
        if model.output_width() != vocabulary.len() {
            return Err(InferenceError::OutputWidthMismatch {
                outputs: model.output_width(),
                labels: vocabulary.len(),
            });
        }

        info!(
            "Classifier ready: {} features -> {} labels",
            feature_count,
            vocabulary.len()
        );

        Ok(Self {
            model,
            vocabulary: Arc::new(vocabulary),
        })
    }

    /// Probability distribution over the vocabulary
    pub fn classify(&self, features: &FeatureVector) -> Result<Vec<f32>, InferenceError> {
        let probabilities = self.model.infer(&features.to_f32())?;
        if probabilities.len() != self.vocabulary.len() {
            return Err(InferenceError::OutputWidthMismatch {
                outputs: probabilities.len(),
                labels: self.vocabulary.len(),
            });
        }
        if let Some(bad) = probabilities.iter().find(|p| !p.is_finite()) {
            return Err(InferenceError::InferenceFailed(format!(
                "model produced non-finite probability {}",
                bad
            )));
        }
        Ok(probabilities)
    }

    /// Top-1 label and confidence for a feature vector
    pub fn predict(&self, features: &FeatureVector) -> Result<ClassificationResult, InferenceError> {
        let start = Instant::now();
        let probabilities = self.classify(features)?;

        let (index, probability) = top1(&probabilities)
            .ok_or_else(|| InferenceError::InferenceFailed("empty model output".to_string()))?;
        let label = self
            .vocabulary
            .get(index)
            .ok_or_else(|| InferenceError::InferenceFailed(format!("no label at index {}", index)))?;

        let result = ClassificationResult {
            label: label.to_string(),
            label_index: index,
            confidence: f64::from(probability).clamp(0.0, 1.0),
            timestamp_ms: features.timestamp_ms,
        };

        debug!(
            "Prediction: {} (conf={:.2}, latency={}us)",
            result.label,
            result.confidence,
            start.elapsed().as_micros()
        );
        Ok(result)
    }

    /// The label vocabulary
    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LinearSoftmaxModel;
    use proptest::prelude::*;

    /// Fixed-output model for deterministic tests
    struct ConstantModel {
        inputs: usize,
        output: Vec<f32>,
    }

    impl ProbabilityModel for ConstantModel {
        fn input_width(&self) -> usize {
            self.inputs
        }

        fn output_width(&self) -> usize {
            self.output.len()
        }

        fn infer(&self, _features: &[f32]) -> Result<Vec<f32>, InferenceError> {
            Ok(self.output.clone())
        }
    }

    fn vector(values: Vec<f64>) -> FeatureVector {
        FeatureVector {
            values,
            timestamp_ms: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_top1_picks_max() {
        assert_eq!(top1(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(top1(&[]), None);
    }

    #[test]
    fn test_top1_tie_goes_to_lowest_index() {
        assert_eq!(top1(&[0.4, 0.1, 0.4, 0.1]), Some((0, 0.4)));
    }

    #[test]
    fn test_predict_maps_label() {
        let model = Arc::new(ConstantModel {
            inputs: 2,
            output: vec![0.05, 0.91, 0.04],
        });
        let vocab = LabelVocabulary::new(["fuel_low", "rpm_spike", "speed_high"]).unwrap();
        let classifier = Classifier::new(model, vocab, 2).unwrap();

        let result = classifier.predict(&vector(vec![0.0, 0.0])).unwrap();
        assert_eq!(result.label, "rpm_spike");
        assert_eq!(result.label_index, 1);
        assert!((result.confidence - 0.91).abs() < 1e-6);
        assert_eq!(result.timestamp_ms, 1_700_000_000_000);
    }

    #[test]
    fn test_output_width_mismatch_is_rejected() {
        let model = Arc::new(ConstantModel {
            inputs: 2,
            output: vec![0.5, 0.5],
        });
        let vocab = LabelVocabulary::new(["fuel_low", "rpm_spike", "speed_high"]).unwrap();

        assert!(matches!(
            Classifier::new(model, vocab, 2),
            Err(InferenceError::OutputWidthMismatch { outputs: 2, labels: 3 })
        ));
    }

    #[test]
    fn test_input_width_mismatch_is_rejected() {
        let model = Arc::new(ConstantModel {
            inputs: 19,
            output: vec![1.0],
        });
        let vocab = LabelVocabulary::new(["normal"]).unwrap();

        let err = Classifier::new(model, vocab, 20).err().unwrap();
        assert!(err.is_configuration_fault());
    }

    #[test]
    fn test_non_finite_output_is_an_inference_failure() {
        let model = Arc::new(ConstantModel {
            inputs: 1,
            output: vec![f32::NAN, 0.5],
        });
        let vocab = LabelVocabulary::new(["a", "b"]).unwrap();
        let classifier = Classifier::new(model, vocab, 1).unwrap();

        let err = classifier.predict(&vector(vec![0.0])).unwrap_err();
        assert!(!err.is_configuration_fault());
    }

    #[test]
    fn test_linear_model_end_to_end() {
        let model = Arc::new(
            LinearSoftmaxModel::new(vec![vec![4.0, 0.0], vec![0.0, 4.0]], vec![0.0, 0.0]).unwrap(),
        );
        let vocab = LabelVocabulary::new(["coolant_overheat", "fuel_low"]).unwrap();
        let classifier = Classifier::new(model, vocab, 2).unwrap();

        let result = classifier.predict(&vector(vec![0.0, 1.5])).unwrap();
        assert_eq!(result.label, "fuel_low");
        assert!(result.confidence > 0.5 && result.confidence <= 1.0);
    }

    proptest! {
        #[test]
        fn prop_top1_is_first_maximum(probs in prop::collection::vec(0.0f32..1.0, 1..16)) {
            let (index, value) = top1(&probs).unwrap();
            let max = probs.iter().copied().fold(f32::MIN, f32::max);
            prop_assert_eq!(value, max);
            prop_assert_eq!(index, probs.iter().position(|&p| p == max).unwrap());
        }
    }
}

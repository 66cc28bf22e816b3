//! Model Artifacts
//!
//! A model artifact maps one normalized feature vector to a probability
//! distribution over the label vocabulary. Models are loaded once and are
//! read-only afterwards, so they can be shared across tasks without locking.

use crate::InferenceError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tract_onnx::prelude::*;
use tracing::{debug, info};

/// A loaded, immutable classifier model
pub trait ProbabilityModel: Send + Sync {
    /// Number of features the model consumes
    fn input_width(&self) -> usize;

    /// Number of class probabilities the model produces
    fn output_width(&self) -> usize;

    /// Run the model on one feature vector
    fn infer(&self, features: &[f32]) -> Result<Vec<f32>, InferenceError>;
}

type OnnxPlan = TypedRunnableModel<TypedModel>;

/// ONNX model executed with tract
pub struct OnnxModel {
    plan: OnnxPlan,
    input_width: usize,
    output_width: usize,
}

impl OnnxModel {
    /// Load and optimize an ONNX model with a `[1, input_width]` f32 input
    pub fn load(path: impl AsRef<Path>, input_width: usize) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        info!("Loading ONNX model from {} (input width {})", path.display(), input_width);

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, input_width]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| InferenceError::ModelLoadError(format!("{}: {}", path.display(), e)))?;

        // Probe once to learn the output width
        let probe = run_plan(&plan, &vec![0.0; input_width])?;
        info!("ONNX model loaded: {} inputs -> {} classes", input_width, probe.len());

        Ok(Self {
            plan,
            input_width,
            output_width: probe.len(),
        })
    }
}

fn run_plan(plan: &OnnxPlan, features: &[f32]) -> Result<Vec<f32>, InferenceError> {
    let input = tract_ndarray::Array2::from_shape_vec((1, features.len()), features.to_vec())
        .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

    let outputs = plan
        .run(tvec!(Tensor::from(input).into()))
        .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

    let probabilities = outputs[0]
        .to_array_view::<f32>()
        .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

    Ok(probabilities.iter().copied().collect())
}

impl ProbabilityModel for OnnxModel {
    fn input_width(&self) -> usize {
        self.input_width
    }

    fn output_width(&self) -> usize {
        self.output_width
    }

    fn infer(&self, features: &[f32]) -> Result<Vec<f32>, InferenceError> {
        if features.len() != self.input_width {
            return Err(InferenceError::InvalidInputShape {
                expected: self.input_width,
                actual: features.len(),
            });
        }
        run_plan(&self.plan, features)
    }
}

/// Single dense layer followed by softmax.
///
/// JSON artifact shape: `{ "weights": [[f32; inputs]; classes], "bias": [f32; classes] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "LinearSoftmaxArtifact")]
pub struct LinearSoftmaxModel {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

/// Unvalidated artifact contents
#[derive(Deserialize)]
struct LinearSoftmaxArtifact {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl TryFrom<LinearSoftmaxArtifact> for LinearSoftmaxModel {
    type Error = InferenceError;

    fn try_from(artifact: LinearSoftmaxArtifact) -> Result<Self, Self::Error> {
        Self::new(artifact.weights, artifact.bias)
    }
}

impl LinearSoftmaxModel {
    /// Create a model, checking that every row has the same width
    pub fn new(weights: Vec<Vec<f32>>, bias: Vec<f32>) -> Result<Self, InferenceError> {
        let model = Self { weights, bias };
        model.validate()?;
        Ok(model)
    }

    /// Load a model from its JSON artifact
    pub fn load(path: impl AsRef<Path>) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| InferenceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let model: Self = serde_json::from_str(&json)?;
        info!(
            "Linear softmax model loaded from {}: {} inputs -> {} classes",
            path.display(),
            model.input_width(),
            model.output_width()
        );
        Ok(model)
    }

    fn validate(&self) -> Result<(), InferenceError> {
        let width = self.weights.first().map(Vec::len).unwrap_or(0);
        if self.weights.is_empty() || width == 0 {
            return Err(InferenceError::ModelLoadError("empty weight matrix".to_string()));
        }
        if self.weights.iter().any(|row| row.len() != width) {
            return Err(InferenceError::ModelLoadError("ragged weight matrix".to_string()));
        }
        if self.bias.len() != self.weights.len() {
            return Err(InferenceError::ModelLoadError(format!(
                "{} bias terms for {} classes",
                self.bias.len(),
                self.weights.len()
            )));
        }
        Ok(())
    }
}

impl ProbabilityModel for LinearSoftmaxModel {
    fn input_width(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn output_width(&self) -> usize {
        self.weights.len()
    }

    fn infer(&self, features: &[f32]) -> Result<Vec<f32>, InferenceError> {
        if features.len() != self.input_width() {
            return Err(InferenceError::InvalidInputShape {
                expected: self.input_width(),
                actual: features.len(),
            });
        }

        let logits: Vec<f32> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f32>() + b)
            .collect();

        // Shift by the max logit for numerical stability
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
        let total: f32 = exps.iter().sum();

        Ok(exps.into_iter().map(|e| e / total).collect())
    }
}

/// Load a model artifact, choosing the backend by file extension
pub fn load_model(
    path: impl AsRef<Path>,
    input_width: usize,
) -> Result<Arc<dyn ProbabilityModel>, InferenceError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    debug!("Selecting model backend for {}", path.display());
    match extension.as_deref() {
        Some("onnx") => Ok(Arc::new(OnnxModel::load(path, input_width)?)),
        Some("json") => Ok(Arc::new(LinearSoftmaxModel::load(path)?)),
        _ => Err(InferenceError::ModelLoadError(format!(
            "unsupported model artifact: {}",
            path.display()
        ))),
    }
}

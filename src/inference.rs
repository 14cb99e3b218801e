//! Model Runtime - ONNX Runtime Integration
//!
//! Owns the loaded classification pipeline for the process lifetime.
//! The handle is built once at startup and shared read-only; request
//! handlers only ever see it through the [`Scorer`] trait so tests can
//! swap in a deterministic stub.

use std::path::Path;
use std::time::Instant;

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use thiserror::Error;

use crate::features::{FeatureSchema, FeatureVector};

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model not loaded")]
    NotLoaded,

    #[error("model artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("failed to load model: {0}")]
    Load(String),

    #[error("feature vector has {actual} values, schema expects {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("inference failed: {0}")]
    Runtime(String),

    #[error("model produced invalid output: {0}")]
    InvalidOutput(String),
}

/// Model output for a single transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Probability of the fraud class, in [0, 1]
    pub probability: f64,
    /// Class label chosen by the model's own decision threshold, 0 or 1
    pub label: i64,
}

impl Score {
    /// Checks the guarantees callers rely on. Probability and label are
    /// not checked against each other.
    pub fn new(probability: f64, label: i64) -> Result<Self, InferenceError> {
        if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
            return Err(InferenceError::InvalidOutput(format!(
                "probability {} outside [0, 1]",
                probability
            )));
        }
        if label != 0 && label != 1 {
            return Err(InferenceError::InvalidOutput(format!("label {}", label)));
        }
        Ok(Self { probability, label })
    }

    pub fn is_fraud(&self) -> bool {
        self.label == 1
    }
}

// ============================================================================
// SCORER TRAIT
// ============================================================================

/// Single-vector scoring. Implementations must be safe to call from many
/// requests at once and must not mutate model state.
pub trait Scorer: Send + Sync {
    fn score(&self, vector: &FeatureVector) -> Result<Score, InferenceError>;

    /// Column layout the model was trained on
    fn schema(&self) -> &FeatureSchema;

    fn is_loaded(&self) -> bool;
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

/// Classification pipeline exported to ONNX (zipmap disabled: `label` is
/// an int64 tensor, `probabilities` a `[1, 2]` float tensor)
pub struct OnnxScorer {
    session: Mutex<Option<Session>>,
    schema: FeatureSchema,
    model_path: String,
}

impl OnnxScorer {
    /// Load the artifact. Fails if the file is missing or is not a valid
    /// ONNX graph.
    pub fn load(
        model_path: impl AsRef<Path>,
        schema: FeatureSchema,
        threads: usize,
    ) -> Result<Self, InferenceError> {
        let model_path = model_path.as_ref();
        let display_path = model_path.display().to_string();

        if !model_path.exists() {
            return Err(InferenceError::ArtifactNotFound(display_path));
        }

        tracing::info!(path = %display_path, threads, "Loading ONNX model");

        let session = Session::builder()
            .map_err(|e| InferenceError::Load(format!("session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::Load(format!("optimization level: {}", e)))?
            .with_intra_threads(threads.max(1))
            .map_err(|e| InferenceError::Load(format!("intra threads: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| InferenceError::Load(e.to_string()))?;

        for expected in [&schema.probability_output, &schema.label_output] {
            if !session.outputs.iter().any(|o| &o.name == expected) {
                return Err(InferenceError::Load(format!(
                    "model has no output named {:?}",
                    expected
                )));
            }
        }

        tracing::info!(
            path = %display_path,
            schema = %schema.tag(),
            input = %schema.input_name,
            "ONNX model loaded successfully"
        );

        Ok(Self {
            session: Mutex::new(Some(session)),
            schema,
            model_path: display_path,
        })
    }

    /// Release the session. Later `score` calls report `NotLoaded`.
    pub fn unload(&self) {
        if self.session.lock().take().is_some() {
            tracing::info!(path = %self.model_path, "ONNX model unloaded");
        }
    }
}

impl Scorer for OnnxScorer {
    fn score(&self, vector: &FeatureVector) -> Result<Score, InferenceError> {
        let expected = self.schema.columns().len();
        if vector.len() != expected {
            return Err(InferenceError::ShapeMismatch {
                expected,
                actual: vector.len(),
            });
        }

        let start = Instant::now();

        let shape = vec![1_i64, vector.len() as i64];
        let input = Tensor::from_array((shape, vector.as_slice().to_vec()))
            .map_err(|e| InferenceError::Runtime(format!("input tensor: {}", e)))?;

        let mut guard = self.session.lock();
        let session = guard.as_mut().ok_or(InferenceError::NotLoaded)?;

        let outputs = session
            .run(ort::inputs![&self.schema.input_name => input])
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;

        let probabilities = outputs
            .get(&self.schema.probability_output)
            .ok_or_else(|| InferenceError::InvalidOutput("missing probability output".to_string()))?
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::InvalidOutput(format!("probabilities: {}", e)))?
            .1
            .to_vec();

        let labels = outputs
            .get(&self.schema.label_output)
            .ok_or_else(|| InferenceError::InvalidOutput("missing label output".to_string()))?
            .try_extract_tensor::<i64>()
            .map_err(|e| InferenceError::InvalidOutput(format!("label: {}", e)))?
            .1
            .to_vec();

        drop(outputs);
        drop(guard);

        let probability = fraud_probability(&probabilities)?;
        let label = labels
            .first()
            .copied()
            .ok_or_else(|| InferenceError::InvalidOutput("empty label tensor".to_string()))?;

        tracing::debug!(
            probability,
            label,
            elapsed_us = start.elapsed().as_micros() as u64,
            "ONNX inference complete"
        );

        Score::new(probability, label)
    }

    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn is_loaded(&self) -> bool {
        self.session.lock().is_some()
    }
}

/// Fraud-class probability from a `[1, 2]` (per-class) or `[1]` tensor
fn fraud_probability(data: &[f32]) -> Result<f64, InferenceError> {
    match data {
        [_, fraud, ..] => Ok(f64::from(*fraud)),
        [single] => Ok(f64::from(*single)),
        [] => Err(InferenceError::InvalidOutput("empty probability tensor".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_bounds() {
        assert!(Score::new(0.0, 0).is_ok());
        assert!(Score::new(1.0, 1).is_ok());
        assert!(Score::new(1.01, 1).is_err());
        assert!(Score::new(-0.1, 0).is_err());
        assert!(Score::new(f64::NAN, 0).is_err());
        assert!(Score::new(0.4, 2).is_err());
    }

    #[test]
    fn test_label_is_independent_of_probability() {
        // The pipeline's decision threshold is internal; 0.3 can be fraud.
        let score = Score::new(0.3, 1).unwrap();
        assert!(score.is_fraud());

        let score = Score::new(0.7, 0).unwrap();
        assert!(!score.is_fraud());
    }

    #[test]
    fn test_fraud_probability_takes_positive_class() {
        assert_eq!(fraud_probability(&[0.25, 0.75]).unwrap(), 0.75);
        assert_eq!(fraud_probability(&[0.5]).unwrap(), 0.5);
        assert!(fraud_probability(&[]).is_err());
    }

    #[test]
    fn test_load_missing_artifact() {
        let result = OnnxScorer::load(
            "/nonexistent/fraud_detection_pipeline.onnx",
            FeatureSchema::default_layout(),
            1,
        );
        assert!(matches!(result, Err(InferenceError::ArtifactNotFound(_))));
    }
}

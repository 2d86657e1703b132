//! ONNX inference using tract
//!
//! The sales regressor is exported to ONNX by the training pipeline and run
//! here through tract-onnx with a fixed `[1, 12]` f32 input.

use super::Predictor;
use crate::error::{InferenceError, ModelLoadError};
use crate::models::{FeatureRecord, NUM_FEATURES};
use anyhow::Context;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tract_onnx::prelude::*;
use tracing::{debug, warn};

/// File looked up inside a model directory
pub const MODEL_FILE_NAME: &str = "model.onnx";

/// Inference latency above which a warning is logged
const SLOW_INFERENCE: Duration = Duration::from_millis(50);

type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// ONNX-based predictor using tract for lightweight inference
pub struct OnnxPredictor {
    model: TractModel,
    checksum: String,
}

impl OnnxPredictor {
    /// Load a predictor from a model file or an exported model directory
    pub fn from_path(path: &Path, expected_sha256: Option<&str>) -> Result<Self, ModelLoadError> {
        let file = resolve_model_file(path)?;
        let bytes = std::fs::read(&file).map_err(|source| ModelLoadError::Io {
            path: file.clone(),
            source,
        })?;

        let checksum = compute_checksum(&bytes);
        if let Some(expected) = expected_sha256 {
            if !expected.eq_ignore_ascii_case(&checksum) {
                return Err(ModelLoadError::ChecksumMismatch {
                    path: file,
                    expected: expected.to_string(),
                    actual: checksum,
                });
            }
        }

        let mut predictor = Self::new(&bytes)?;
        predictor.checksum = checksum;
        Ok(predictor)
    }

    /// Create a new predictor from model bytes
    pub fn new(model_bytes: &[u8]) -> Result<Self, ModelLoadError> {
        let model = Self::load_model(model_bytes)
            .map_err(|e| ModelLoadError::InvalidModel(format!("{:#}", e)))?;
        Ok(Self {
            model,
            checksum: compute_checksum(model_bytes),
        })
    }

    /// Load and optimize an ONNX model from bytes
    fn load_model(model_bytes: &[u8]) -> anyhow::Result<TractModel> {
        tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .context("Failed to parse ONNX model")?
            .with_input_fact(0, f32::fact([1, NUM_FEATURES]).into())
            .context("Failed to set input shape")?
            .into_optimized()
            .context("Failed to optimize model")?
            .into_runnable()
            .context("Failed to create runnable model")
    }

    /// SHA-256 of the loaded artifact, hex encoded
    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    fn features_to_tensor(features: &FeatureRecord) -> Result<Tensor, InferenceError> {
        let data: Vec<f32> = features.values().iter().map(|v| *v as f32).collect();
        let array = tract_ndarray::Array2::from_shape_vec((1, NUM_FEATURES), data)
            .map_err(|e| InferenceError::InvalidInput(e.to_string()))?;
        Ok(array.into())
    }

    fn first_scalar(output: &Tensor) -> Result<f64, InferenceError> {
        let output = output
            .cast_to::<f64>()
            .map_err(|e| InferenceError::Runtime(format!("{:#}", e)))?;
        let values = output
            .as_slice::<f64>()
            .map_err(|e| InferenceError::Runtime(format!("{:#}", e)))?;
        values.first().copied().ok_or(InferenceError::EmptyOutput)
    }
}

impl Predictor for OnnxPredictor {
    fn predict(&self, features: &FeatureRecord) -> Result<f64, InferenceError> {
        let start = Instant::now();

        let input = Self::features_to_tensor(features)?;
        let result = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Runtime(format!("{:#}", e)))?;
        let output = result.first().ok_or(InferenceError::EmptyOutput)?;
        let value = Self::first_scalar(output)?;

        let elapsed = start.elapsed();
        if elapsed > SLOW_INFERENCE {
            warn!(
                elapsed_ms = elapsed.as_millis(),
                "Inference exceeded {}ms target",
                SLOW_INFERENCE.as_millis()
            );
        } else {
            debug!(elapsed_us = elapsed.as_micros(), "Inference completed");
        }

        Ok(value)
    }
}

/// Map a configured model path to the ONNX file to read.
///
/// Exported model directories carry the graph as `model.onnx`.
pub fn resolve_model_file(path: &Path) -> Result<PathBuf, ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::NotFound {
            path: path.to_path_buf(),
        });
    }
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }

    let file = path.join(MODEL_FILE_NAME);
    if file.is_file() {
        Ok(file)
    } else {
        Err(ModelLoadError::NotFound { path: file })
    }
}

pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_compute_checksum() {
        let checksum = compute_checksum(b"test model weights");
        assert_eq!(checksum.len(), 64);
        assert_eq!(checksum, compute_checksum(b"test model weights"));
        assert_ne!(checksum, compute_checksum(b"other weights"));
    }

    #[test]
    fn test_resolve_plain_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("sales.onnx");
        std::fs::write(&file, b"x").unwrap();
        assert_eq!(resolve_model_file(&file).unwrap(), file);
    }

    #[test]
    fn test_resolve_model_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MODEL_FILE_NAME), b"x").unwrap();
        assert_eq!(
            resolve_model_file(dir.path()).unwrap(),
            dir.path().join(MODEL_FILE_NAME)
        );
    }

    #[test]
    fn test_resolve_missing_path() {
        let dir = TempDir::new().unwrap();
        let err = resolve_model_file(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, ModelLoadError::NotFound { .. }));
    }

    #[test]
    fn test_invalid_bytes_rejected() {
        let err = OnnxPredictor::new(b"not an onnx graph").err().unwrap();
        assert!(matches!(err, ModelLoadError::InvalidModel(_)));
    }

    #[test]
    fn test_checksum_accepts_uppercase_hex() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("model.onnx");
        std::fs::write(&file, b"garbage").unwrap();
        let expected = compute_checksum(b"garbage").to_uppercase();

        // Checksum passes, so the failure comes from parsing instead.
        let err = OnnxPredictor::from_path(&file, Some(&expected)).err().unwrap();
        assert!(matches!(err, ModelLoadError::InvalidModel(_)));
    }
}

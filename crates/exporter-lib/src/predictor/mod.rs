//! Model handle and inference input
//!
//! The model artifact is loaded exactly once at startup. A load failure leaves
//! the handle `Unavailable` for the rest of the process lifetime; there is no
//! retry and no hot reload.

mod features;
mod inference;

pub use features::{
    FeatureSource, SyntheticFeatureGenerator, CPI_RANGE, FUEL_PRICE_RANGE, MONTH_RANGE,
    SALES_LAG_RANGE, STORE_RANGE, TEMPERATURE_RANGE, UNEMPLOYMENT_RANGE, YEARS,
};
pub use inference::{compute_checksum, resolve_model_file, OnnxPredictor, MODEL_FILE_NAME};

use crate::error::InferenceError;
use crate::models::FeatureRecord;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Trait for prediction implementations
pub trait Predictor: Send + Sync {
    /// Predict weekly sales for a single feature record
    fn predict(&self, features: &FeatureRecord) -> Result<f64, InferenceError>;
}

/// Whether a usable model is behind the handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Loaded,
    Unavailable,
}

/// Loaded-once wrapper around the inference artifact
#[derive(Clone)]
pub enum ModelHandle {
    Loaded(Arc<dyn Predictor>),
    Unavailable { reason: String },
}

impl ModelHandle {
    /// Load the ONNX artifact at `path`, optionally checking its SHA-256 first.
    ///
    /// Never fails: a broken artifact yields an `Unavailable` handle.
    pub fn load(path: &Path, expected_sha256: Option<&str>) -> Self {
        match OnnxPredictor::from_path(path, expected_sha256) {
            Ok(predictor) => {
                info!(
                    path = %path.display(),
                    checksum = %predictor.checksum(),
                    "Model loaded successfully"
                );
                Self::Loaded(Arc::new(predictor))
            }
            Err(e) => {
                error!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load model, serving cannot proceed without it"
                );
                Self::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Wrap an already constructed predictor
    pub fn from_predictor(predictor: Arc<dyn Predictor>) -> Self {
        Self::Loaded(predictor)
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn state(&self) -> ModelState {
        match self {
            Self::Loaded(_) => ModelState::Loaded,
            Self::Unavailable { .. } => ModelState::Unavailable,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == ModelState::Loaded
    }

    pub fn predictor(&self) -> Option<&Arc<dyn Predictor>> {
        match self {
            Self::Loaded(p) => Some(p),
            Self::Unavailable { .. } => None,
        }
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded(_) => f.write_str("ModelHandle::Loaded"),
            Self::Unavailable { reason } => f
                .debug_struct("ModelHandle::Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    struct ConstantPredictor(f64);

    impl Predictor for ConstantPredictor {
        fn predict(&self, _features: &FeatureRecord) -> Result<f64, InferenceError> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_missing_artifact_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let handle = ModelHandle::load(&dir.path().join("does-not-exist.onnx"), None);
        assert_eq!(handle.state(), ModelState::Unavailable);
        assert!(handle.predictor().is_none());
    }

    #[test]
    fn test_corrupt_artifact_is_unavailable() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"definitely not protobuf").unwrap();

        let handle = ModelHandle::load(file.path(), None);
        assert!(!handle.is_loaded());
    }

    #[test]
    fn test_model_directory_without_onnx_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let handle = ModelHandle::load(dir.path(), None);
        match handle {
            ModelHandle::Unavailable { reason } => assert!(reason.contains(MODEL_FILE_NAME)),
            ModelHandle::Loaded(_) => panic!("empty model directory must not load"),
        }
    }

    #[test]
    fn test_checksum_mismatch_is_unavailable() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"model bytes").unwrap();

        let handle = ModelHandle::load(file.path(), Some("00ff"));
        match handle {
            ModelHandle::Unavailable { reason } => assert!(reason.contains("checksum mismatch")),
            ModelHandle::Loaded(_) => panic!("checksum mismatch must not load"),
        }
    }

    #[test]
    fn test_from_predictor_is_loaded() {
        let handle = ModelHandle::from_predictor(Arc::new(ConstantPredictor(42.0)));
        assert_eq!(handle.state(), ModelState::Loaded);

        let record = SyntheticFeatureGenerator::new().generate();
        let value = handle.predictor().unwrap().predict(&record).unwrap();
        assert_eq!(value, 42.0);
    }
}

//! Error types for the exporter
//!
//! Startup failures abort serving; inference failures are absorbed by the
//! collection loop and only ever surface as counter increments and log lines.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to produce a usable model from the artifact on disk
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model artifact not found at {path:?}")]
    NotFound { path: PathBuf },

    #[error("failed to read model artifact {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checksum mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("failed to build inference plan: {0}")]
    InvalidModel(String),
}

/// Failure of a single `predict` call
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("model rejected input: {0}")]
    InvalidInput(String),

    #[error("model execution failed: {0}")]
    Runtime(String),

    #[error("model produced no output")]
    EmptyOutput,

    #[error("inference exceeded {timeout_ms}ms deadline")]
    Timeout { timeout_ms: u128 },

    #[error("inference task aborted: {0}")]
    Aborted(String),

    #[error("previous inference still running, skipping cycle")]
    StillRunning,
}

/// Errors that prevent the exporter from serving at all
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("model unavailable, refusing to serve metrics: {reason}")]
    ModelUnavailable { reason: String },

    #[error("failed to bind metrics listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("failed to build collection loop: {0}")]
    Collector(String),
}

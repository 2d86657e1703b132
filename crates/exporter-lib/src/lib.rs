//! Library for the sales model metrics exporter
//!
//! This crate provides the core functionality for:
//! - Loading the trained sales regressor and running inference
//! - Generating synthetic feature records
//! - Periodic inference collection
//! - Prometheus metrics exposition and structured logging

pub mod api;
pub mod collector;
pub mod error;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod service;

pub use error::{InferenceError, ModelLoadError, StartupError};
pub use models::*;
pub use observability::{ExporterMetrics, MetricsSnapshot, StructuredLogger};
pub use predictor::{FeatureSource, ModelHandle, ModelState, Predictor, SyntheticFeatureGenerator};
pub use service::{launch, ExporterService, ServiceSettings};

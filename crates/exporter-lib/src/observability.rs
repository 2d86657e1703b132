//! Observability infrastructure for the exporter
//!
//! Provides:
//! - The Prometheus registry scraped through the metrics endpoint
//! - Structured JSON logging with tracing

use crate::models::{FeatureRecord, FEATURE_NAMES};
use prometheus::{Encoder, Gauge, IntCounter, Opts, Registry, TextEncoder};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{error, info, warn};

/// Predictions strictly above this many sales units count as high-sales
pub const HIGH_SALES_THRESHOLD: f64 = 150_000.0;

/// Prefix applied to every series name
pub const DEFAULT_NAMESPACE: &str = "model";

struct ExporterMetricsInner {
    registry: Registry,
    inference_latency_seconds: Gauge,
    inference_total: IntCounter,
    inference_errors_total: IntCounter,
    high_sales_predictions_total: IntCounter,
    high_sales_threshold: f64,
    /// Held for writing while one cycle's updates are applied, for reading
    /// while the registry is gathered.
    cycle_lock: RwLock<()>,
}

/// Point-in-time copy of every series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub inference_latency_seconds: f64,
    pub inference_total: u64,
    pub inference_errors_total: u64,
    pub high_sales_predictions_total: u64,
}

/// Exporter metrics for Prometheus exposition
///
/// Cheap to clone; clones share the same registry. Counters are 64-bit and
/// cannot wrap within any realistic process lifetime.
#[derive(Clone)]
pub struct ExporterMetrics {
    inner: Arc<ExporterMetricsInner>,
}

impl ExporterMetrics {
    /// Create and register the four exporter series.
    ///
    /// An empty `namespace` leaves the series names unprefixed.
    pub fn new(namespace: &str, high_sales_threshold: f64) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let inference_latency_seconds = Gauge::with_opts(
            Opts::new(
                "inference_latency_seconds",
                "Latency of model inference in seconds",
            )
            .namespace(namespace),
        )?;
        registry.register(Box::new(inference_latency_seconds.clone()))?;

        let inference_total = IntCounter::with_opts(
            Opts::new("inference_total", "Total number of model inferences").namespace(namespace),
        )?;
        registry.register(Box::new(inference_total.clone()))?;

        let inference_errors_total = IntCounter::with_opts(
            Opts::new(
                "inference_errors_total",
                "Total number of model inference errors",
            )
            .namespace(namespace),
        )?;
        registry.register(Box::new(inference_errors_total.clone()))?;

        let high_sales_predictions_total = IntCounter::with_opts(
            Opts::new(
                "high_sales_predictions_total",
                "Total number of predictions exceeding a high sales threshold",
            )
            .namespace(namespace),
        )?;
        registry.register(Box::new(high_sales_predictions_total.clone()))?;

        Ok(Self {
            inner: Arc::new(ExporterMetricsInner {
                registry,
                inference_latency_seconds,
                inference_total,
                inference_errors_total,
                high_sales_predictions_total,
                high_sales_threshold,
                cycle_lock: RwLock::new(()),
            }),
        })
    }

    /// Metrics with the default namespace and threshold
    pub fn with_defaults() -> Result<Self, prometheus::Error> {
        Self::new(DEFAULT_NAMESPACE, HIGH_SALES_THRESHOLD)
    }

    pub fn high_sales_threshold(&self) -> f64 {
        self.inner.high_sales_threshold
    }

    /// Overwrite the last observed inference latency
    pub fn set_latency(&self, seconds: f64) {
        let _guard = self.write_guard();
        self.inner.inference_latency_seconds.set(seconds);
    }

    pub fn inc_inference(&self) {
        let _guard = self.write_guard();
        self.inner.inference_total.inc();
    }

    pub fn inc_error(&self) {
        let _guard = self.write_guard();
        self.inner.inference_errors_total.inc();
    }

    pub fn inc_high_sales(&self) {
        let _guard = self.write_guard();
        self.inner.high_sales_predictions_total.inc();
    }

    /// Apply a successful cycle's updates as one unit.
    ///
    /// Returns true when the prediction counted as high-sales.
    pub fn record_success(&self, latency_seconds: f64, prediction: f64) -> bool {
        let is_high = prediction > self.inner.high_sales_threshold;

        let _guard = self.write_guard();
        self.inner.inference_latency_seconds.set(latency_seconds);
        self.inner.inference_total.inc();
        if is_high {
            self.inner.high_sales_predictions_total.inc();
        }
        is_high
    }

    /// Record a failed or skipped cycle
    pub fn record_failure(&self) {
        self.inc_error();
    }

    /// Consistent copy of the current values
    pub fn snapshot(&self) -> MetricsSnapshot {
        let _guard = self.read_guard();
        MetricsSnapshot {
            inference_latency_seconds: self.inner.inference_latency_seconds.get(),
            inference_total: self.inner.inference_total.get(),
            inference_errors_total: self.inner.inference_errors_total.get(),
            high_sales_predictions_total: self.inner.high_sales_predictions_total.get(),
        }
    }

    /// Render the registry in the Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let families = {
            let _guard = self.read_guard();
            self.inner.registry.gather()
        };

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    fn write_guard(&self) -> std::sync::RwLockWriteGuard<'_, ()> {
        self.inner
            .cycle_lock
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn read_guard(&self) -> std::sync::RwLockReadGuard<'_, ()> {
        self.inner
            .cycle_lock
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Structured logger for exporter events
///
/// Provides consistent JSON-formatted logging for inference cycles and
/// lifecycle transitions.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log exporter startup
    pub fn log_startup(&self, version: &str, model_path: &str, port: u16) {
        info!(
            event = "exporter_started",
            instance = %self.instance,
            exporter_version = %version,
            model_path = %model_path,
            port = port,
            "Prometheus exporter started, collecting metrics"
        );
    }

    /// Log the refusal to start without a model
    pub fn log_not_started(&self, reason: &str) {
        error!(
            event = "exporter_not_started",
            instance = %self.instance,
            reason = %reason,
            "Model not loaded, Prometheus exporter will not start"
        );
    }

    /// Log a successful inference
    pub fn log_inference(&self, latency_seconds: f64, predicted_sales: f64) {
        info!(
            event = "inference_completed",
            instance = %self.instance,
            latency_seconds = latency_seconds,
            predicted_sales = predicted_sales,
            "Inference successful"
        );
    }

    /// Log a prediction above the high-sales threshold
    pub fn log_high_sales(&self, predicted_sales: f64, threshold: f64) {
        info!(
            event = "high_sales_prediction",
            instance = %self.instance,
            predicted_sales = predicted_sales,
            threshold = threshold,
            "Predicted sales exceeded high sales threshold"
        );
    }

    /// Log a failed inference together with the input that caused it
    pub fn log_inference_failure(&self, error: &str, record: &FeatureRecord) {
        let input = serde_json::to_string(record).unwrap_or_else(|_| format!("{:?}", record));
        error!(
            event = "inference_failed",
            instance = %self.instance,
            error = %error,
            input = %input,
            columns = %FEATURE_NAMES.join(","),
            "Error during inference"
        );
    }

    /// Log a cycle skipped while a timed-out inference is still running
    pub fn log_inference_skipped(&self, error: &str) {
        warn!(
            event = "inference_skipped",
            instance = %self.instance,
            error = %error,
            "Previous inference has not returned, skipping cycle"
        );
    }

    /// Log a cycle skipped because no model is loaded
    pub fn log_model_unavailable(&self, reason: &str) {
        warn!(
            event = "model_unavailable",
            instance = %self.instance,
            reason = %reason,
            "Model not loaded, skipping metric collection"
        );
    }

    /// Log exporter shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "exporter_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Prometheus exporter shutting down"
        );
    }
}

//! Inference collection loop
//!
//! Drives one generate → predict → record cycle per tick. Ticks are measured
//! start to start, and a cycle always finishes before the next tick is taken,
//! so cycles never overlap. A `predict` call abandoned by the inference timeout
//! is kept as the in-flight call; until it returns, later cycles fail fast
//! instead of starting a second one.

use crate::error::InferenceError;
use crate::models::FeatureRecord;
use crate::observability::{ExporterMetrics, StructuredLogger};
use crate::predictor::{FeatureSource, ModelHandle, Predictor, SyntheticFeatureGenerator};
use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Result of one `predict` call on the blocking pool, with its duration
type InferenceRun = (Result<f64, InferenceError>, Duration);

/// Default time between cycle starts
pub const DEFAULT_COLLECTION_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for the collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Time between the starts of consecutive cycles (default: 5 seconds)
    pub interval: Duration,
    /// Deadline for a single `predict` call. `None` waits indefinitely.
    pub inference_timeout: Option<Duration>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_COLLECTION_INTERVAL,
            inference_timeout: None,
        }
    }
}

/// What a single cycle did
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Success {
        prediction: f64,
        latency: Duration,
        high_sales: bool,
    },
    Failed {
        error: String,
    },
    ModelUnavailable,
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Success { .. })
    }
}

/// Periodic inference loop feeding the metrics registry
pub struct CollectionLoop {
    model: ModelHandle,
    source: Arc<dyn FeatureSource>,
    metrics: ExporterMetrics,
    logger: StructuredLogger,
    config: CollectionConfig,
    cycles_completed: u64,
    in_flight: Option<JoinHandle<InferenceRun>>,
}

impl CollectionLoop {
    pub fn new(
        model: ModelHandle,
        source: Arc<dyn FeatureSource>,
        metrics: ExporterMetrics,
        logger: StructuredLogger,
        config: CollectionConfig,
    ) -> Self {
        Self {
            model,
            source,
            metrics,
            logger,
            config,
            cycles_completed: 0,
            in_flight: None,
        }
    }

    /// Run cycles until shutdown is signalled
    pub async fn run(mut self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            inference_timeout = ?self.config.inference_timeout,
            "Starting inference collection loop"
        );

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.run_cycle().await;
                    debug!(
                        cycle = self.cycles_completed,
                        success = outcome.is_success(),
                        "Collection cycle complete"
                    );
                }
                _ = shutdown.recv() => {
                    info!(
                        cycles = self.cycles_completed,
                        "Shutting down inference collection loop"
                    );
                    break;
                }
            }
        }
    }

    /// Execute exactly one cycle. Never fails; failures land in the metrics.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.cycles_completed += 1;

        let predictor = match &self.model {
            ModelHandle::Loaded(p) => Arc::clone(p),
            ModelHandle::Unavailable { reason } => {
                self.logger.log_model_unavailable(reason);
                self.metrics.record_failure();
                return CycleOutcome::ModelUnavailable;
            }
        };

        if let Some(pending) = self.in_flight.take() {
            if pending.is_finished() {
                debug!("Timed-out inference returned, resuming predictions");
            } else {
                self.in_flight = Some(pending);
                let error = InferenceError::StillRunning.to_string();
                self.metrics.record_failure();
                self.logger.log_inference_skipped(&error);
                return CycleOutcome::Failed { error };
            }
        }

        let mut record = self.source.generate();
        record.recompute_interaction();

        match self.invoke(predictor, record.clone()).await {
            Ok((prediction, latency)) => {
                let latency_secs = latency.as_secs_f64();
                let high_sales = self.metrics.record_success(latency_secs, prediction);

                self.logger.log_inference(latency_secs, prediction);
                if high_sales {
                    self.logger
                        .log_high_sales(prediction, self.metrics.high_sales_threshold());
                }

                CycleOutcome::Success {
                    prediction,
                    latency,
                    high_sales,
                }
            }
            Err(e) => {
                self.metrics.record_failure();
                self.logger.log_inference_failure(&e.to_string(), &record);
                CycleOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Run `predict` on the blocking pool and time it
    async fn invoke(
        &mut self,
        predictor: Arc<dyn Predictor>,
        record: FeatureRecord,
    ) -> Result<(f64, Duration), InferenceError> {
        let mut task = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let result = predictor.predict(&record);
            (result, start.elapsed())
        });

        let joined = match self.config.inference_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    // The blocking call cannot be cancelled; hold it until it returns.
                    self.in_flight = Some(task);
                    return Err(InferenceError::Timeout {
                        timeout_ms: timeout.as_millis(),
                    })
                }
            },
            None => task.await,
        };

        let (result, elapsed) = joined.map_err(|e| InferenceError::Aborted(e.to_string()))?;
        result.map(|prediction| (prediction, elapsed))
    }

    /// Whether a timed-out `predict` call has yet to return
    pub fn inference_in_flight(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|pending| !pending.is_finished())
    }

    /// Number of cycles run so far, successful or not
    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    pub fn metrics(&self) -> &ExporterMetrics {
        &self.metrics
    }
}

/// Builder for creating the collection loop
pub struct CollectionLoopBuilder {
    model: Option<ModelHandle>,
    source: Option<Arc<dyn FeatureSource>>,
    metrics: Option<ExporterMetrics>,
    logger: Option<StructuredLogger>,
    config: CollectionConfig,
}

impl CollectionLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            model: None,
            source: None,
            metrics: None,
            logger: None,
            config: CollectionConfig::default(),
        }
    }

    pub fn model(mut self, model: ModelHandle) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the feature source (defaults to the synthetic generator)
    pub fn source(mut self, source: Arc<dyn FeatureSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn metrics(mut self, metrics: ExporterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Set the interval between cycle starts
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn inference_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.inference_timeout = timeout;
        self
    }

    pub fn config(mut self, config: CollectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the collection loop
    pub fn build(self) -> Result<CollectionLoop> {
        let model = self
            .model
            .ok_or_else(|| anyhow::anyhow!("Model handle is required"))?;
        let metrics = self
            .metrics
            .ok_or_else(|| anyhow::anyhow!("Metrics registry is required"))?;
        let source = self
            .source
            .unwrap_or_else(|| Arc::new(SyntheticFeatureGenerator::new()));
        let logger = self
            .logger
            .unwrap_or_else(|| StructuredLogger::new("collector"));

        Ok(CollectionLoop::new(model, source, metrics, logger, self.config))
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPredictor;

    impl Predictor for FixedPredictor {
        fn predict(&self, _features: &FeatureRecord) -> Result<f64, InferenceError> {
            Ok(1.0)
        }
    }

    #[test]
    fn test_collection_config_default() {
        let config = CollectionConfig::default();
        assert_eq!(config.interval, Duration::from_secs(5));
        assert!(config.inference_timeout.is_none());
    }

    #[test]
    fn test_collection_loop_builder() {
        let result = CollectionLoopBuilder::new()
            .model(ModelHandle::from_predictor(Arc::new(FixedPredictor)))
            .metrics(ExporterMetrics::with_defaults().unwrap())
            .interval(Duration::from_secs(1))
            .build();

        let collection_loop = result.unwrap();
        assert_eq!(collection_loop.config.interval, Duration::from_secs(1));
        assert_eq!(collection_loop.cycles_completed(), 0);
    }

    #[test]
    fn test_collection_loop_builder_missing_model() {
        let result = CollectionLoopBuilder::new()
            .metrics(ExporterMetrics::with_defaults().unwrap())
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_collection_loop_builder_missing_metrics() {
        let result = CollectionLoopBuilder::new()
            .model(ModelHandle::unavailable("no model"))
            .build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cycle_with_fixed_predictor() {
        let mut collection_loop = CollectionLoopBuilder::new()
            .model(ModelHandle::from_predictor(Arc::new(FixedPredictor)))
            .metrics(ExporterMetrics::with_defaults().unwrap())
            .build()
            .unwrap();

        let outcome = collection_loop.run_cycle().await;
        assert!(outcome.is_success());
        assert_eq!(collection_loop.cycles_completed(), 1);
        assert_eq!(collection_loop.metrics().snapshot().inference_total, 1);
    }
}

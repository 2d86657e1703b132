//! Two-phase exporter startup
//!
//! Phase one loads the model into a [`ModelHandle`]. Phase two, [`launch`],
//! branches on that handle: a loaded model starts the collection loop and the
//! metrics endpoint, an unavailable one is refused before any listener is bound.

use crate::api::{self, AppState};
use crate::collector::{CollectionConfig, CollectionLoopBuilder};
use crate::error::StartupError;
use crate::observability::{
    ExporterMetrics, StructuredLogger, DEFAULT_NAMESPACE, HIGH_SALES_THRESHOLD,
};
use crate::predictor::{FeatureSource, ModelHandle};
use anyhow::Context;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Port used by the reference deployment
pub const DEFAULT_METRICS_PORT: u16 = 8000;

/// Settings for a running exporter
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub listen_addr: SocketAddr,
    pub namespace: String,
    pub high_sales_threshold: f64,
    pub collection: CollectionConfig,
    pub instance: String,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_METRICS_PORT)),
            namespace: DEFAULT_NAMESPACE.to_string(),
            high_sales_threshold: HIGH_SALES_THRESHOLD,
            collection: CollectionConfig::default(),
            instance: "sales-model-exporter".to_string(),
        }
    }
}

/// Handle to the running loop and endpoint
pub struct ExporterService {
    local_addr: SocketAddr,
    metrics: ExporterMetrics,
    shutdown_tx: broadcast::Sender<()>,
    collector: JoinHandle<()>,
    server: JoinHandle<anyhow::Result<()>>,
}

impl ExporterService {
    /// Address the metrics endpoint is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics(&self) -> &ExporterMetrics {
        &self.metrics
    }

    /// Stop the loop, drain the server, and wait for both
    pub async fn shutdown(self) -> anyhow::Result<()> {
        // Both receivers may already be gone if a task exited early.
        let _ = self.shutdown_tx.send(());

        self.collector.await.context("Collection loop task failed")?;
        self.server.await.context("Metrics server task failed")??;
        Ok(())
    }
}

/// Start serving if, and only if, the model loaded.
pub async fn launch(
    model: ModelHandle,
    source: Arc<dyn FeatureSource>,
    settings: ServiceSettings,
) -> Result<ExporterService, StartupError> {
    let logger = StructuredLogger::new(settings.instance.clone());

    if let ModelHandle::Unavailable { reason } = &model {
        logger.log_not_started(reason);
        return Err(StartupError::ModelUnavailable {
            reason: reason.clone(),
        });
    }

    let metrics = ExporterMetrics::new(&settings.namespace, settings.high_sales_threshold)?;
    let listener = api::bind(settings.listen_addr).await?;
    let local_addr = listener.local_addr().map_err(|source| StartupError::Bind {
        addr: settings.listen_addr.to_string(),
        source,
    })?;

    let (shutdown_tx, _) = broadcast::channel(1);

    let collection_loop = CollectionLoopBuilder::new()
        .model(model)
        .source(source)
        .metrics(metrics.clone())
        .logger(logger)
        .config(settings.collection)
        .build()
        .map_err(|e| StartupError::Collector(e.to_string()))?;
    let collector = tokio::spawn(collection_loop.run(shutdown_tx.subscribe()));

    let state = Arc::new(AppState::new(metrics.clone()));
    let mut server_shutdown = shutdown_tx.subscribe();
    let server = tokio::spawn(api::serve(listener, state, async move {
        let _ = server_shutdown.recv().await;
    }));

    Ok(ExporterService {
        local_addr,
        metrics,
        shutdown_tx,
        collector,
        server,
    })
}

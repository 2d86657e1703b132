//! Exporter configuration

use anyhow::{Context, Result};
use exporter_lib::collector::CollectionConfig;
use exporter_lib::observability::{DEFAULT_NAMESPACE, HIGH_SALES_THRESHOLD};
use exporter_lib::service::{ServiceSettings, DEFAULT_METRICS_PORT};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Exporter configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExporterConfig {
    /// Instance label attached to structured log events
    #[serde(default = "default_instance")]
    pub instance: String,

    /// Model artifact: an ONNX file or an exported model directory
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Expected SHA-256 of the model file, hex encoded
    #[serde(default)]
    pub model_sha256: Option<String>,

    /// Address the metrics endpoint binds to
    #[serde(default = "default_metrics_host")]
    pub metrics_host: IpAddr,

    /// Port for the metrics endpoint
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Prefix for every exported series
    #[serde(default = "default_metrics_namespace")]
    pub metrics_namespace: String,

    /// Seconds between inference cycle starts
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,

    /// Optional deadline for a single inference, unset by default
    #[serde(default)]
    pub inference_timeout_ms: Option<u64>,

    /// Predicted sales above this value count as high-sales
    #[serde(default = "default_high_sales_threshold")]
    pub high_sales_threshold: f64,
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "sales-model-exporter".to_string())
}

fn default_model_path() -> PathBuf {
    PathBuf::from("mlruns_downloaded/walmart_sales_dt_model")
}

fn default_metrics_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_metrics_port() -> u16 {
    DEFAULT_METRICS_PORT
}

fn default_metrics_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_collection_interval() -> u64 {
    5
}

fn default_high_sales_threshold() -> f64 {
    HIGH_SALES_THRESHOLD
}

impl ExporterConfig {
    /// Load configuration from an optional file, then the environment.
    ///
    /// Environment variables use the `EXPORTER_` prefix, e.g.
    /// `EXPORTER_MODEL_PATH` or `EXPORTER_METRICS_PORT`.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = match file {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("exporter").required(false)),
        };

        let config = builder
            .add_source(config::Environment::with_prefix("EXPORTER").try_parsing(true))
            .build()
            .context("Failed to read exporter configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Invalid exporter configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.collection_interval_secs == 0 {
            anyhow::bail!("collection_interval_secs must be greater than zero");
        }
        if !self.high_sales_threshold.is_finite() {
            anyhow::bail!("high_sales_threshold must be a finite number");
        }
        Ok(())
    }

    /// Runtime settings for the exporter service
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            listen_addr: SocketAddr::new(self.metrics_host, self.metrics_port),
            namespace: self.metrics_namespace.clone(),
            high_sales_threshold: self.high_sales_threshold,
            collection: CollectionConfig {
                interval: Duration::from_secs(self.collection_interval_secs),
                inference_timeout: self.inference_timeout_ms.map(Duration::from_millis),
            },
            instance: self.instance.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "# empty").unwrap();

        let config = ExporterConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.metrics_port, 8000);
        assert_eq!(config.collection_interval_secs, 5);
        assert_eq!(config.metrics_namespace, "model");
        assert_eq!(config.high_sales_threshold, 150_000.0);
        assert!(config.inference_timeout_ms.is_none());
        assert!(config.model_sha256.is_none());
        assert_eq!(
            config.model_path,
            PathBuf::from("mlruns_downloaded/walmart_sales_dt_model")
        );
    }

    #[test]
    fn test_file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "model_path = \"/models/sales.onnx\"\nmetrics_port = 9100\ninference_timeout_ms = 250"
        )
        .unwrap();

        let config = ExporterConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.model_path, PathBuf::from("/models/sales.onnx"));

        let settings = config.service_settings();
        assert_eq!(settings.listen_addr.port(), 9100);
        assert_eq!(
            settings.collection.inference_timeout,
            Some(Duration::from_millis(250))
        );
        assert_eq!(settings.collection.interval, Duration::from_secs(5));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "collection_interval_secs = 0").unwrap();

        assert!(ExporterConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(ExporterConfig::load(Some(&dir.path().join("absent.toml"))).is_err());
    }
}

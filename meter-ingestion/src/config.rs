use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::transform::{reconcile::DEFAULT_LARGE_DELTA_THRESHOLD, sensor_data::DEFAULT_DEVICE_METER_ID};

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// One JSON file per aggregate under `data_dir`.
    Json,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub kind: StorageKind,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_large_delta_threshold")]
    pub large_delta_threshold: f64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            large_delta_threshold: default_large_delta_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    #[serde(default = "default_device_meter_id")]
    pub device_meter_id: String,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            device_meter_id: default_device_meter_id(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    pub metrics: Option<MetricsConfig>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_body_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_max_connections() -> u32 {
    5
}

fn default_batch_size() -> usize {
    100
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_large_delta_threshold() -> f64 {
    DEFAULT_LARGE_DELTA_THRESHOLD
}

fn default_device_meter_id() -> String {
    DEFAULT_DEVICE_METER_ID.to_string()
}

fn config_path() -> String {
    std::env::var("INGESTION_CONFIG").unwrap_or_else(|_| "ingestion-config.toml".to_string())
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config {path}: {e}"))?;
        Self::from_toml(&contents)
    }

    /// Like [`AppConfig::load`], but a missing config file yields `None`.
    pub fn load_optional() -> anyhow::Result<Option<Self>> {
        Self::load_optional_from(Path::new(&config_path()))
    }

    pub fn load_optional_from(path: &Path) -> anyhow::Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::anyhow!("failed to read config {}: {e}", path.display())),
        }
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        if cfg.storage.kind == StorageKind::Postgres && cfg.storage.uri.is_none() {
            anyhow::bail!("storage.uri is required when storage.kind = \"postgres\"");
        }
        Ok(cfg)
    }
}

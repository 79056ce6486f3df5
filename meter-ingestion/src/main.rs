use anyhow::Result;
use meter_ingestion::{
    config::{AppConfig, StorageKind},
    http::{self, AppState},
    metrics_server, observability,
    query::EnergyDataService,
    sinks::{self, JsonFileStore},
    transform::{Reconciler, SensorDataAssembler},
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let store = sinks::open_store(&cfg.storage).await?;

    // series snapshots sit next to the aggregates of the JSON store
    let snapshots = match cfg.storage.kind {
        StorageKind::Json => Some(JsonFileStore::new(&cfg.storage.data_dir)),
        StorageKind::Postgres => None,
    };

    let state = AppState {
        service: EnergyDataService::new(store),
        snapshots,
        reconciler: Reconciler::new(cfg.reconcile.large_delta_threshold),
        assembler: Arc::new(SensorDataAssembler::new(cfg.sensor.device_meter_id.clone())),
    };

    let app = http::router(state, cfg.http.max_body_bytes);
    http::serve(&cfg.http.bind_addr, app).await
}

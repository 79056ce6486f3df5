use anyhow::{bail, Result};
use meter_ingestion::{
    config::AppConfig,
    observability,
    pipeline::Pipeline,
    sinks::{self, StoreSink},
    sources::{xml_file::list_xml_files, XmlFileSource},
    transform,
};
use meter_client::domain::EnergyData;
use std::{env, path::PathBuf, sync::Arc, time::Duration};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        bail!("usage: ingest_xml <xml_file_or_directory>...");
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    for arg in &args {
        let path = PathBuf::from(arg);
        if path.is_dir() {
            paths.extend(list_xml_files(&path).await?);
        } else {
            paths.push(path);
        }
    }
    tracing::info!(files = paths.len(), "ingesting XML exports");

    // INGESTION_CONFIG can point at an ingestion-specific file
    let cfg = AppConfig::load()?;
    let store = sinks::open_store(&cfg.storage).await?;

    let sink = StoreSink::new(
        store,
        cfg.sink.batch_size,
        cfg.sink.max_retries,
        Duration::from_millis(cfg.sink.retry_backoff_ms),
    );

    let pipeline: Pipeline<_, EnergyData, _> = Pipeline {
        source: XmlFileSource::new(paths),
        transforms: vec![Arc::new(transform::EnergyDataValidation)],
        sink,
    };

    pipeline.run().await?;

    Ok(())
}

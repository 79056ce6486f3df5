use anyhow::{bail, Result};
use meter_ingestion::{
    config::{AppConfig, ReconcileConfig},
    export, observability,
    sources::xml_file::list_xml_files,
    transform::{InputFile, Reconciler},
};
use std::{env, path::PathBuf};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let mut csv = false;
    let mut paths: Vec<PathBuf> = Vec::new();
    for arg in env::args().skip(1) {
        if arg == "--csv" {
            csv = true;
            continue;
        }
        let path = PathBuf::from(arg);
        if path.is_dir() {
            paths.extend(list_xml_files(&path).await?);
        } else {
            paths.push(path);
        }
    }
    if paths.is_empty() {
        bail!("usage: reconcile_xml [--csv] <xml_file_or_directory>...");
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        match tokio::fs::read(path).await {
            Ok(bytes) => files.push(InputFile::new(path.display().to_string(), bytes)),
            Err(e) => tracing::error!(path = %path.display(), error = %e, "failed to read file, skipping"),
        }
    }

    let reconcile_cfg = match AppConfig::load_optional()? {
        Some(cfg) => cfg.reconcile,
        None => {
            tracing::info!("no config file found, using default reconcile settings");
            ReconcileConfig::default()
        }
    };
    let reconciler = Reconciler::new(reconcile_cfg.large_delta_threshold);
    let series = tokio::task::spawn_blocking(move || reconciler.reconcile(&files)).await?;

    if csv {
        print!("{}", export::csv_by_series(&series)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&export::mapped_data(&series))?);
    }

    Ok(())
}

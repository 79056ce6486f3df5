use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use futures::StreamExt;
use meter_client::domain::{timestamp::format_compact, EnergyData, TimeSeries};
use tokio_stream::wrappers::ReadDirStream;

use super::EnergyDataStore;
use crate::pipeline::PipelineError;

const ENERGY_DATA_DIR: &str = "energy-data";
const SERIES_DIR: &str = "series";

/// Flat-file store: one pretty-printed JSON document per aggregate under
/// `<data_dir>/energy-data/<meterId>_<yyyyMMdd_HHmmss>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    data_dir: PathBuf,
}

fn store_err(context: &str, path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Store(format!("{context} {}: {e}", path.display()))
}

/// Meter ids end up in file names; anything but ASCII alphanumerics, `-` and
/// `_` becomes `_`.
fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn energy_data_dir(&self) -> PathBuf {
        self.data_dir.join(ENERGY_DATA_DIR)
    }

    pub fn energy_data_path(&self, data: &EnergyData) -> PathBuf {
        self.energy_data_dir()
            .join(format!("{}_{}.json", file_safe(&data.meter_id), format_compact(data.ts)))
    }

    /// Write one snapshot file per reconciled meter series, named after the
    /// meter and the batch it came from.
    pub async fn save_series(
        &self,
        series: &BTreeMap<String, TimeSeries>,
        batch_id: &str,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let dir = self.data_dir.join(SERIES_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| store_err("failed to create", &dir, e))?;

        let mut written = Vec::with_capacity(series.len());
        for (meter_id, meter_series) in series {
            let path = dir.join(format!("{}_{}.json", file_safe(meter_id), file_safe(batch_id)));
            let json = serde_json::to_vec_pretty(meter_series)
                .map_err(|e| store_err("failed to encode", &path, e))?;
            tokio::fs::write(&path, json)
                .await
                .map_err(|e| store_err("failed to write", &path, e))?;
            written.push(path);
        }

        tracing::info!(meters = written.len(), batch_id, "saved series snapshots");
        Ok(written)
    }

    async fn read_all(&self) -> Result<Vec<EnergyData>, PipelineError> {
        let dir = self.energy_data_dir();
        let entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(store_err("failed to read", &dir, e)),
        };

        let mut out = Vec::new();
        let mut stream = ReadDirStream::new(entries);
        while let Some(entry) = stream.next().await {
            let path = entry.map_err(|e| store_err("failed to list", &dir, e))?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| store_err("failed to read", &path, e))?;
            match serde_json::from_slice::<EnergyData>(&bytes) {
                Ok(data) => out.push(data),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable energy data file"),
            }
        }

        out.sort_by(|a, b| a.meter_id.cmp(&b.meter_id).then(a.ts.cmp(&b.ts)));
        Ok(out)
    }
}

#[async_trait::async_trait]
impl EnergyDataStore for JsonFileStore {
    async fn save(&self, batch: &[EnergyData]) -> Result<usize, PipelineError> {
        let dir = self.energy_data_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| store_err("failed to create", &dir, e))?;

        for data in batch {
            let path = self.energy_data_path(data);
            let json = serde_json::to_vec_pretty(data).map_err(|e| store_err("failed to encode", &path, e))?;
            tokio::fs::write(&path, json)
                .await
                .map_err(|e| store_err("failed to write", &path, e))?;
            tracing::debug!(path = %path.display(), meter_id = %data.meter_id, "saved energy data");
        }

        tracing::info!(aggregates = batch.len(), dir = %dir.display(), "saved energy data to local storage");
        Ok(batch.len())
    }

    async fn all(&self) -> Result<Vec<EnergyData>, PipelineError> {
        self.read_all().await
    }

    async fn by_meter(&self, meter_id: &str) -> Result<Vec<EnergyData>, PipelineError> {
        let mut all = self.read_all().await?;
        all.retain(|d| d.meter_id == meter_id);
        Ok(all)
    }
}

use std::path::{Path, PathBuf};

use futures::StreamExt;
use meter_client::domain::EnergyData;
use tokio_stream::wrappers::ReadDirStream;

use super::parse_energy_data;
use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// Reads XML export files in the given order and emits one envelope per
/// parsed aggregate.
///
/// A file that cannot be read or parsed yields a single error item; the
/// remaining files are still processed.
pub struct XmlFileSource {
    paths: Vec<PathBuf>,
}

impl XmlFileSource {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait::async_trait]
impl Source<EnergyData> for XmlFileSource {
    async fn stream(&self) -> EnvelopeStream<EnergyData> {
        let paths = self.paths.clone();
        let s = async_stream::stream! {
            for path in paths {
                let origin = path.display().to_string();
                let bytes = match tokio::fs::read(&path).await {
                    Ok(b) => b,
                    Err(e) => {
                        metrics::counter!("xml_files_skipped_total", "reason" => "io").increment(1);
                        yield Err(PipelineError::Source(format!("failed to read {origin}: {e}")));
                        continue;
                    }
                };

                match parse_energy_data(&bytes) {
                    Ok(aggregates) => {
                        tracing::info!(file = %origin, aggregates = aggregates.len(), "parsed XML file");
                        for data in aggregates {
                            yield Ok(Envelope::new(data, origin.clone()));
                        }
                    }
                    Err(source) => {
                        metrics::counter!("xml_files_skipped_total", "reason" => source.kind()).increment(1);
                        yield Err(PipelineError::Parse { origin: origin.clone(), source });
                    }
                }
            }
        };

        Box::pin(s)
    }
}

/// Every `*.xml` file directly inside a directory, in file-name order.
pub struct XmlDirectorySource {
    dir: PathBuf,
}

impl XmlDirectorySource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn list_files(&self) -> Result<Vec<PathBuf>, PipelineError> {
        list_xml_files(&self.dir).await
    }
}

pub async fn list_xml_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::Source(format!("failed to read directory {}: {e}", dir.display())))?;

    let mut stream = ReadDirStream::new(entries);
    let mut files = Vec::new();
    while let Some(entry) = stream.next().await {
        let entry = entry.map_err(|e| PipelineError::Source(format!("failed to read directory entry: {e}")))?;
        let path = entry.path();
        let is_xml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if is_xml {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

#[async_trait::async_trait]
impl Source<EnergyData> for XmlDirectorySource {
    async fn stream(&self) -> EnvelopeStream<EnergyData> {
        match self.list_files().await {
            Ok(files) => {
                tracing::info!(dir = %self.dir.display(), files = files.len(), "scanning XML directory");
                XmlFileSource::new(files).stream().await
            }
            Err(e) => Box::pin(futures::stream::iter(vec![Err(e)])),
        }
    }
}

pub mod json_file;
pub mod postgres;

use std::{sync::Arc, time::Duration};

use futures::StreamExt;
use meter_client::domain::{EnergyData, Measurement, ReadingType};
use time::PrimitiveDateTime;

use crate::{
    config::{StorageConfig, StorageKind},
    pipeline::{Envelope, PipelineError, Sink},
};

pub use json_file::JsonFileStore;
pub use postgres::PostgresStore;

/// Where parsed aggregates are kept.
///
/// Saving an aggregate replaces any stored aggregate with the same meter id
/// and timestamp.
#[async_trait::async_trait]
pub trait EnergyDataStore: Send + Sync {
    async fn save(&self, batch: &[EnergyData]) -> Result<usize, PipelineError>;

    async fn all(&self) -> Result<Vec<EnergyData>, PipelineError>;

    async fn by_meter(&self, meter_id: &str) -> Result<Vec<EnergyData>, PipelineError>;

    /// Measurements of one meter and type, optionally within an inclusive
    /// range, ordered by timestamp.
    async fn measurements_by_type(
        &self,
        meter_id: &str,
        kind: ReadingType,
        range: Option<(PrimitiveDateTime, PrimitiveDateTime)>,
    ) -> Result<Vec<Measurement>, PipelineError> {
        let mut out: Vec<Measurement> = self
            .by_meter(meter_id)
            .await?
            .into_iter()
            .flat_map(|data| data.measurements)
            .filter(|m| m.kind == kind)
            .filter(|m| range.map_or(true, |(start, end)| m.ts >= start && m.ts <= end))
            .collect();
        out.sort_by_key(|m| m.ts);
        Ok(out)
    }
}

#[async_trait::async_trait]
impl<T: EnergyDataStore + ?Sized> EnergyDataStore for Arc<T> {
    async fn save(&self, batch: &[EnergyData]) -> Result<usize, PipelineError> {
        (**self).save(batch).await
    }

    async fn all(&self) -> Result<Vec<EnergyData>, PipelineError> {
        (**self).all().await
    }

    async fn by_meter(&self, meter_id: &str) -> Result<Vec<EnergyData>, PipelineError> {
        (**self).by_meter(meter_id).await
    }

    async fn measurements_by_type(
        &self,
        meter_id: &str,
        kind: ReadingType,
        range: Option<(PrimitiveDateTime, PrimitiveDateTime)>,
    ) -> Result<Vec<Measurement>, PipelineError> {
        (**self).measurements_by_type(meter_id, kind, range).await
    }
}

/// Open the store selected by `[storage]`.
pub async fn open_store(cfg: &StorageConfig) -> anyhow::Result<Arc<dyn EnergyDataStore>> {
    match cfg.kind {
        StorageKind::Json => {
            tracing::info!(data_dir = %cfg.data_dir.display(), "using JSON file store");
            Ok(Arc::new(JsonFileStore::new(&cfg.data_dir)))
        }
        StorageKind::Postgres => {
            let uri = cfg
                .uri
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("storage.uri is required for postgres"))?;
            Ok(Arc::new(PostgresStore::connect(uri, cfg.max_connections).await?))
        }
    }
}

/// Pipeline sink writing aggregates to a store in batches, retrying failed
/// flushes with linear backoff.
pub struct StoreSink<S> {
    store: S,
    batch_size: usize,
    max_retries: u32,
    retry_backoff: Duration,
}

impl<S: EnergyDataStore> StoreSink<S> {
    pub fn new(store: S, batch_size: usize, max_retries: u32, retry_backoff: Duration) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            max_retries,
            retry_backoff,
        }
    }

    async fn flush_batch(&self, batch: &[Envelope<EnergyData>]) -> Result<(), PipelineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let payload: Vec<EnergyData> = batch.iter().map(|env| env.payload.clone()).collect();
        let mut attempt: u32 = 0;
        loop {
            match self.store.save(&payload).await {
                Ok(stored) => {
                    metrics::counter!("energy_data_stored_total").increment(stored as u64);

                    if let Some(min_received) = batch.iter().map(|e| e.received_at).min() {
                        if let Ok(dur) = std::time::SystemTime::now().duration_since(min_received) {
                            metrics::histogram!("ingest_end_to_end_latency_seconds").record(dur.as_secs_f64());
                        }
                    }

                    return Ok(());
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(error = %e, attempt, "store flush failed, retrying with backoff");
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "store flush failed, giving up");
                    metrics::counter!("store_sink_errors_total").increment(1);
                    return Err(PipelineError::Sink(e.to_string()));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: EnergyDataStore> Sink<EnergyData> for StoreSink<S> {
    async fn run<I>(&self, mut input: I) -> Result<(), PipelineError>
    where
        I: futures::Stream<Item = Result<Envelope<EnergyData>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut buffer: Vec<Envelope<EnergyData>> = Vec::with_capacity(self.batch_size);

        while let Some(item) = input.next().await {
            let env = match item {
                Ok(env) => env,
                Err(e) => {
                    tracing::error!(error = %e, "skipping item rejected upstream");
                    continue;
                }
            };

            buffer.push(env);
            if buffer.len() >= self.batch_size {
                self.flush_batch(&buffer).await?;
                buffer.clear();
            }
        }

        self.flush_batch(&buffer).await
    }
}


#[cfg(test)]
mod tests {
    use super::{memory::MemoryStore, *};
    use time::macros::datetime;

    fn aggregate(meter: &str, ts: PrimitiveDateTime, values: &[(ReadingType, f64, PrimitiveDateTime)]) -> EnergyData {
        let mut data = EnergyData::new(meter, ts);
        for (kind, value, mts) in values {
            data.add_measurement(Measurement {
                kind: *kind,
                identifier: "1".to_string(),
                value: *value,
                ts: *mts,
                unit: "KWH".to_string(),
            });
        }
        data
    }

    #[tokio::test]
    async fn sink_batches_and_retries() {
        let store = Arc::new(MemoryStore::default());
        *store.fail_first.lock().unwrap() = 1;
        let sink = StoreSink::new(store.clone(), 2, 3, Duration::from_millis(1));

        let items: Vec<Result<Envelope<EnergyData>, PipelineError>> = vec![
            Ok(Envelope::new(aggregate("a", datetime!(2024-01-01 00:00:00), &[]), "f")),
            Err(PipelineError::Transform("rejected".to_string())),
            Ok(Envelope::new(aggregate("b", datetime!(2024-01-01 00:00:00), &[]), "f")),
            Ok(Envelope::new(aggregate("c", datetime!(2024-01-01 00:00:00), &[]), "f")),
        ];
        sink.run(futures::stream::iter(items)).await.unwrap();

        assert_eq!(store.data.lock().unwrap().len(), 3);
        // one failed attempt, its retry, then the trailing batch
        assert_eq!(*store.save_calls.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn sink_gives_up_after_max_retries() {
        let store = Arc::new(MemoryStore::default());
        *store.fail_first.lock().unwrap() = 5;
        let sink = StoreSink::new(store.clone(), 10, 1, Duration::from_millis(1));

        let items = vec![Ok(Envelope::new(aggregate("a", datetime!(2024-01-01 00:00:00), &[]), "f"))];
        let res = sink.run(futures::stream::iter(items)).await;

        assert!(matches!(res, Err(PipelineError::Sink(_))));
        assert_eq!(*store.save_calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn default_type_query_filters_and_orders() {
        let store = MemoryStore::default();
        let t1 = datetime!(2024-01-01 00:00:00);
        let t2 = datetime!(2024-01-02 00:00:00);
        let t3 = datetime!(2024-01-03 00:00:00);
        store
            .save(&[
                aggregate("m", t3, &[(ReadingType::Consumption, 3.0, t3), (ReadingType::Production, 9.0, t3)]),
                aggregate("m", t1, &[(ReadingType::Consumption, 1.0, t1)]),
                aggregate("m", t2, &[(ReadingType::Consumption, 2.0, t2)]),
            ])
            .await
            .unwrap();

        let all: Vec<f64> = store
            .measurements_by_type("m", ReadingType::Consumption, None)
            .await
            .unwrap()
            .iter()
            .map(|m| m.value)
            .collect();
        assert_eq!(all, vec![1.0, 2.0, 3.0]);

        let ranged = store
            .measurements_by_type("m", ReadingType::Consumption, Some((t2, t3)))
            .await
            .unwrap();
        assert_eq!(ranged.len(), 2);
    }
}

//! Read and write operations over stored aggregates, shared by the HTTP
//! routes and the binaries.

use std::sync::Arc;

use meter_client::domain::{EnergyData, Measurement, Reading, ReadingType};
use time::PrimitiveDateTime;

use crate::{pipeline::PipelineError, sinks::EnergyDataStore, transform::MeterBreakdown};

#[derive(Clone)]
pub struct EnergyDataService {
    store: Arc<dyn EnergyDataStore>,
}

impl EnergyDataService {
    pub fn new(store: Arc<dyn EnergyDataStore>) -> Self {
        Self { store }
    }

    pub async fn save(&self, batch: &[EnergyData]) -> Result<usize, PipelineError> {
        let stored = self.store.save(batch).await?;
        metrics::counter!("energy_data_stored_total").increment(stored as u64);
        Ok(stored)
    }

    pub async fn all(&self) -> Result<Vec<EnergyData>, PipelineError> {
        self.store.all().await
    }

    pub async fn by_meter(&self, meter_id: &str) -> Result<Vec<EnergyData>, PipelineError> {
        self.store.by_meter(meter_id).await
    }

    /// Every stored aggregate, or only those of `meter_id` when given and
    /// non-empty.
    pub async fn all_or_by_meter(&self, meter_id: Option<&str>) -> Result<Vec<EnergyData>, PipelineError> {
        match meter_id.filter(|id| !id.is_empty()) {
            Some(id) => self.by_meter(id).await,
            None => self.all().await,
        }
    }

    /// All measurements of one meter, flattened out of their aggregates.
    pub async fn measurements(&self, meter_id: &str) -> Result<Vec<Measurement>, PipelineError> {
        Ok(self
            .by_meter(meter_id)
            .await?
            .into_iter()
            .flat_map(|data| data.measurements)
            .collect())
    }

    pub async fn measurements_by_type(
        &self,
        meter_id: &str,
        kind: ReadingType,
    ) -> Result<Vec<Measurement>, PipelineError> {
        self.store.measurements_by_type(meter_id, kind, None).await
    }

    /// Measurements of one type with `start <= ts <= end`.
    pub async fn measurements_in_range(
        &self,
        meter_id: &str,
        kind: ReadingType,
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Result<Vec<Measurement>, PipelineError> {
        self.store
            .measurements_by_type(meter_id, kind, Some((start, end)))
            .await
    }

    /// Stored measurements of one meter grouped into production, consumption
    /// and their net values.
    pub async fn grouped(&self, meter_id: &str) -> Result<MeterBreakdown, PipelineError> {
        let mut readings: Vec<Reading> = Vec::new();
        for kind in [ReadingType::Production, ReadingType::Consumption] {
            readings.extend(self.measurements_by_type(meter_id, kind).await?.iter().map(Reading::from));
        }
        Ok(MeterBreakdown::from_readings(readings))
    }
}

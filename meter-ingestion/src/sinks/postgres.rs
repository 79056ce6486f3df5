use meter_client::{
    db::energy_data_queries,
    domain::{EnergyData, Measurement, ReadingType},
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use time::PrimitiveDateTime;

use super::EnergyDataStore;
use crate::pipeline::PipelineError;

/// Relational store over the `energy_data` / `measurement` tables.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

fn store_err(e: anyhow::Error) -> PipelineError {
    PipelineError::Store(format!("{e:#}"))
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and create the tables if they are missing.
    pub async fn connect(uri: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(uri)
            .await?;
        energy_data_queries::ensure_schema(&pool).await?;
        tracing::info!(max_connections, "connected to postgres store");
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl EnergyDataStore for PostgresStore {
    async fn save(&self, batch: &[EnergyData]) -> Result<usize, PipelineError> {
        energy_data_queries::insert_energy_data(&self.pool, batch)
            .await
            .map_err(store_err)
    }

    async fn all(&self) -> Result<Vec<EnergyData>, PipelineError> {
        energy_data_queries::all_energy_data(&self.pool)
            .await
            .map_err(store_err)
    }

    async fn by_meter(&self, meter_id: &str) -> Result<Vec<EnergyData>, PipelineError> {
        energy_data_queries::energy_data_by_meter(&self.pool, meter_id)
            .await
            .map_err(store_err)
    }

    async fn measurements_by_type(
        &self,
        meter_id: &str,
        kind: ReadingType,
        range: Option<(PrimitiveDateTime, PrimitiveDateTime)>,
    ) -> Result<Vec<Measurement>, PipelineError> {
        energy_data_queries::measurements_by_meter_and_type(&self.pool, meter_id, kind, range)
            .await
            .map_err(store_err)
    }
}

use anyhow::Result;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::domain::{EnergyData, Measurement, ReadingType};

const CREATE_ENERGY_DATA: &str = r#"
    CREATE TABLE IF NOT EXISTS energy_data (
        id        BIGSERIAL PRIMARY KEY,
        meter_id  TEXT      NOT NULL,
        ts        TIMESTAMP NOT NULL
    )
"#;

const CREATE_MEASUREMENT: &str = r#"
    CREATE TABLE IF NOT EXISTS measurement (
        id             BIGSERIAL        PRIMARY KEY,
        energy_data_id BIGINT           NOT NULL REFERENCES energy_data (id) ON DELETE CASCADE,
        type           TEXT             NOT NULL,
        identifier     TEXT             NOT NULL,
        value          DOUBLE PRECISION NOT NULL,
        ts             TIMESTAMP        NOT NULL,
        unit           TEXT             NOT NULL
    )
"#;

const CREATE_ENERGY_DATA_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS energy_data_meter_ts_idx ON energy_data (meter_id, ts)";

/// One measurement joined with its owning aggregate.
#[derive(Debug, Clone, sqlx::FromRow)]
struct MeasurementRow {
    energy_data_id: i64,
    meter_id: String,
    energy_data_ts: PrimitiveDateTime,
    kind: String,
    identifier: String,
    value: f64,
    ts: PrimitiveDateTime,
    unit: String,
}

impl MeasurementRow {
    fn measurement(&self) -> Result<Measurement> {
        Ok(Measurement {
            kind: self.kind.parse::<ReadingType>()?,
            identifier: self.identifier.clone(),
            value: self.value,
            ts: self.ts,
            unit: self.unit.clone(),
        })
    }
}

const SELECT_JOINED: &str = r#"
    SELECT
        e.id         AS energy_data_id,
        e.meter_id   AS meter_id,
        e.ts         AS energy_data_ts,
        m.type       AS kind,
        m.identifier AS identifier,
        m.value      AS value,
        m.ts         AS ts,
        m.unit       AS unit
    FROM energy_data e
    JOIN measurement m ON m.energy_data_id = e.id
"#;

/// Create the `energy_data` and `measurement` tables if they are missing.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for stmt in [CREATE_ENERGY_DATA, CREATE_MEASUREMENT, CREATE_ENERGY_DATA_INDEX] {
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}

/// Store a batch of aggregates in one transaction.
///
/// An aggregate already stored for the same meter and timestamp is deleted
/// first, so re-uploading an export replaces its previous rows.
pub async fn insert_energy_data(pool: &PgPool, batch: &[EnergyData]) -> Result<usize> {
    let mut tx = pool.begin().await?;

    for data in batch {
        sqlx::query("DELETE FROM energy_data WHERE meter_id = $1 AND ts = $2")
            .bind(&data.meter_id)
            .bind(data.ts)
            .execute(&mut *tx)
            .await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO energy_data (meter_id, ts) VALUES ($1, $2) RETURNING id",
        )
        .bind(&data.meter_id)
        .bind(data.ts)
        .fetch_one(&mut *tx)
        .await?;

        if data.measurements.is_empty() {
            continue;
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO measurement (energy_data_id, type, identifier, value, ts, unit) ",
        );
        builder.push_values(&data.measurements, |mut b, m| {
            b.push_bind(id)
                .push_bind(m.kind.as_str())
                .push_bind(&m.identifier)
                .push_bind(m.value)
                .push_bind(m.ts)
                .push_bind(&m.unit);
        });
        builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;
    Ok(batch.len())
}

/// Every stored aggregate, in insertion order.
pub async fn all_energy_data(pool: &PgPool) -> Result<Vec<EnergyData>> {
    let sql = format!("{SELECT_JOINED} ORDER BY e.id, m.id");
    let rows = sqlx::query_as::<_, MeasurementRow>(&sql)
        .fetch_all(pool)
        .await?;
    group_rows(rows)
}

/// Aggregates of a single meter, in insertion order.
pub async fn energy_data_by_meter(pool: &PgPool, meter_id: &str) -> Result<Vec<EnergyData>> {
    let sql = format!("{SELECT_JOINED} WHERE e.meter_id = $1 ORDER BY e.id, m.id");
    let rows = sqlx::query_as::<_, MeasurementRow>(&sql)
        .bind(meter_id)
        .fetch_all(pool)
        .await?;
    group_rows(rows)
}

/// Measurements of one meter and type, optionally limited to an inclusive
/// timestamp range, ordered by timestamp.
pub async fn measurements_by_meter_and_type(
    pool: &PgPool,
    meter_id: &str,
    kind: ReadingType,
    range: Option<(PrimitiveDateTime, PrimitiveDateTime)>,
) -> Result<Vec<Measurement>> {
    let mut builder = QueryBuilder::<Postgres>::new(SELECT_JOINED);
    builder.push(" WHERE e.meter_id = ").push_bind(meter_id);
    builder.push(" AND m.type = ").push_bind(kind.as_str());
    if let Some((start, end)) = range {
        builder.push(" AND m.ts BETWEEN ").push_bind(start);
        builder.push(" AND ").push_bind(end);
    }
    builder.push(" ORDER BY m.ts, m.id");

    let rows = builder
        .build_query_as::<MeasurementRow>()
        .fetch_all(pool)
        .await?;

    rows.iter().map(MeasurementRow::measurement).collect()
}

fn group_rows(rows: Vec<MeasurementRow>) -> Result<Vec<EnergyData>> {
    let mut out: Vec<EnergyData> = Vec::new();
    let mut current_id: Option<i64> = None;

    for row in rows {
        let measurement = row.measurement()?;
        match out.last_mut() {
            Some(last) if current_id == Some(row.energy_data_id) => last.add_measurement(measurement),
            _ => {
                let mut data = EnergyData::new(row.meter_id, row.energy_data_ts);
                data.add_measurement(measurement);
                out.push(data);
                current_id = Some(row.energy_data_id);
            }
        }
    }

    Ok(out)
}

//! Absolute meter values per sensor, combined from billing snapshots and
//! interval volumes.
//!
//! Billing files of a batch are applied first and provide absolute register
//! values. Interval files are applied second: their volumes are accumulated
//! on top of the last known absolute value, and an existing absolute value
//! at an observation's timestamp wins over the accumulated one and becomes
//! the new running total.

use std::collections::BTreeMap;

use meter_client::domain::{timestamp::epoch_seconds_utc, ReadingType, SensorData, SensorDataPoint};
use roxmltree::Document;
use time::{PrimitiveDateTime, Time};

use super::InputFile;
use crate::sources::{
    document::{detect_format, parse_document, XmlFormat},
    esl::{read_periods, TariffComponents},
    obis::{sensor_id_for, TariffRegister, CONSUMPTION_SENSOR_ID, PRODUCTION_SENSOR_ID},
    sdat::{document_meter_id, read_blocks, SdatBlock},
};

pub const DEFAULT_DEVICE_METER_ID: &str = "38157930";

type ValueTable = BTreeMap<PrimitiveDateTime, f64>;

pub struct SensorDataAssembler {
    device_meter_id: String,
}

impl Default for SensorDataAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_METER_ID)
    }
}

impl SensorDataAssembler {
    pub fn new(device_meter_id: impl Into<String>) -> Self {
        Self {
            device_meter_id: device_meter_id.into(),
        }
    }

    /// Build the sensor view of a batch, sorted by sensor id. Sensors without
    /// any value are left out.
    pub fn assemble(&self, files: &[InputFile]) -> Vec<SensorData> {
        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            let parsed = parse_document(&file.bytes).and_then(|doc| {
                let format = detect_format(&doc)?;
                Ok((format, doc))
            });
            match parsed {
                Ok((format, doc)) => documents.push((file.name.as_str(), format, doc)),
                Err(e) => {
                    tracing::error!(file = %file.name, error = %e, "skipping file for sensor data");
                    metrics::counter!("xml_files_skipped_total", "reason" => e.kind()).increment(1);
                }
            }
        }

        let mut tables: BTreeMap<String, ValueTable> = BTreeMap::new();
        for id in [CONSUMPTION_SENSOR_ID, PRODUCTION_SENSOR_ID, self.device_meter_id.as_str()] {
            tables.entry(id.to_string()).or_default();
        }

        for (name, _, doc) in documents.iter().filter(|(_, f, _)| *f == XmlFormat::Esl) {
            tracing::info!(file = %name, "applying billing snapshots");
            self.apply_esl(doc, &mut tables);
        }
        for (name, _, doc) in documents.iter().filter(|(_, f, _)| *f == XmlFormat::Sdat) {
            tracing::info!(file = %name, "applying interval volumes");
            apply_sdat(doc, &mut tables);
        }

        tables
            .into_iter()
            .filter_map(|(sensor_id, values)| {
                if values.is_empty() {
                    tracing::warn!(sensor_id = %sensor_id, "no data points for sensor");
                    return None;
                }
                tracing::info!(sensor_id = %sensor_id, points = values.len(), "assembled sensor data");
                Some(to_sensor_data(sensor_id, &values))
            })
            .collect()
    }

    fn apply_esl(&self, doc: &Document, tables: &mut BTreeMap<String, ValueTable>) {
        let mut consumption = TariffComponents::default();
        let mut production = TariffComponents::default();

        for period in read_periods(doc) {
            let is_device = period.meter_id == self.device_meter_id;
            for row in &period.rows {
                if let Some(register) = TariffRegister::from_obis(&row.obis) {
                    let components = match register.kind {
                        ReadingType::Consumption => &mut consumption,
                        ReadingType::Production => &mut production,
                    };
                    components.record(register.tariff, row.ts, row.value);
                }
                if is_device {
                    tables
                        .entry(self.device_meter_id.clone())
                        .or_default()
                        .insert(row.ts, row.value);
                }
            }
        }

        for (sensor_id, components) in [
            (CONSUMPTION_SENSOR_ID, consumption),
            (PRODUCTION_SENSOR_ID, production),
        ] {
            let table = tables.entry(sensor_id.to_string()).or_default();
            for (ts, value) in components.combined() {
                table.insert(ts, value);
            }
        }
    }
}

/// Interval volumes of one document. Without a sensor named by the document
/// id, the first block with a metering point fixes the sensor for itself and
/// every later block.
fn apply_sdat(doc: &Document, tables: &mut BTreeMap<String, ValueTable>) {
    let mut sensor = document_meter_id(doc)
        .filter(|id| id == CONSUMPTION_SENSOR_ID || id == PRODUCTION_SENSOR_ID);
    if sensor.is_none() {
        tracing::debug!("document id names no sensor, resolving from metering point");
    }

    for block in read_blocks(doc) {
        if sensor.is_none() && block.has_metering_point {
            sensor = Some(sensor_id_for(block.kind).to_string());
        }
        let Some(sensor_id) = &sensor else {
            tracing::warn!(start = %block.start, "cannot determine sensor for block, skipping");
            continue;
        };
        accumulate_block(&block, tables.entry(sensor_id.clone()).or_default());
    }
}

/// Running total before a block starts: the latest value at or before that
/// day's midnight, else the earliest value later on the same day, else zero.
pub fn base_value(table: &ValueTable, block_start: PrimitiveDateTime) -> f64 {
    let day_start = block_start.replace_time(Time::MIDNIGHT);

    if let Some((_, value)) = table.range(..=day_start).next_back() {
        return *value;
    }
    match table.range(day_start..).next() {
        Some((ts, value)) if ts.date() == day_start.date() => *value,
        _ => 0.0,
    }
}

fn accumulate_block(block: &SdatBlock, table: &mut ValueTable) {
    let mut running = base_value(table, block.start);

    let by_sequence: BTreeMap<i64, (PrimitiveDateTime, f64)> = block
        .observations
        .iter()
        .map(|obs| (obs.sequence, (obs.ts, obs.volume)))
        .collect();

    for (ts, volume) in by_sequence.into_values() {
        running += volume;
        match table.get(&ts) {
            Some(existing) => running = *existing,
            None => {
                table.insert(ts, running);
            }
        }
    }
}

fn to_sensor_data(sensor_id: String, values: &ValueTable) -> SensorData {
    SensorData {
        sensor_id,
        data: values
            .iter()
            .map(|(ts, value)| SensorDataPoint {
                ts: epoch_seconds_utc(*ts).to_string(),
                value: *value,
            })
            .collect(),
    }
}

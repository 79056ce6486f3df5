use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use super::{timestamp::local_timestamp, Reading, ReadingType};

/// A persisted reading as it was found in the export.
///
/// `identifier` is the OBIS code for billing-register rows and the
/// observation sequence number for interval rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    #[serde(rename = "type")]
    pub kind: ReadingType,
    pub identifier: String,
    pub value: f64,
    #[serde(with = "local_timestamp", rename = "timestamp")]
    pub ts: PrimitiveDateTime,
    pub unit: String,
}

/// Unit of persistence: the measurements of one meter for one export period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyData {
    pub meter_id: String,
    #[serde(with = "local_timestamp", rename = "timestamp")]
    pub ts: PrimitiveDateTime,
    pub measurements: Vec<Measurement>,
}

impl EnergyData {
    pub fn new(meter_id: impl Into<String>, ts: PrimitiveDateTime) -> Self {
        Self {
            meter_id: meter_id.into(),
            ts,
            measurements: Vec::new(),
        }
    }

    pub fn add_measurement(&mut self, measurement: Measurement) {
        self.measurements.push(measurement);
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

impl From<&Measurement> for Reading {
    fn from(m: &Measurement) -> Self {
        Reading::new(m.ts, m.value, m.unit.clone(), m.kind)
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use super::{Reading, ReadingType};

/// Readings of a single meter, ordered by timestamp.
///
/// The timestamp is the only key: inserting a reading at a timestamp that is
/// already present replaces the stored reading, whatever its type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "TimeSeriesRepr", from = "TimeSeriesRepr")]
pub struct TimeSeries {
    meter_id: String,
    readings: BTreeMap<PrimitiveDateTime, Reading>,
}

impl TimeSeries {
    pub fn new(meter_id: impl Into<String>) -> Self {
        Self {
            meter_id: meter_id.into(),
            readings: BTreeMap::new(),
        }
    }

    pub fn meter_id(&self) -> &str {
        &self.meter_id
    }

    /// Insert a reading, returning the one it replaced.
    pub fn insert(&mut self, reading: Reading) -> Option<Reading> {
        self.readings.insert(reading.ts, reading)
    }

    /// Insert every reading of `other` in timestamp order.
    pub fn merge(&mut self, other: TimeSeries) -> usize {
        let before = self.readings.len();
        for (_, reading) in other.readings {
            self.insert(reading);
        }
        self.readings.len() - before
    }

    pub fn get(&self, ts: PrimitiveDateTime) -> Option<&Reading> {
        self.readings.get(&ts)
    }

    pub fn get_mut(&mut self, ts: PrimitiveDateTime) -> Option<&mut Reading> {
        self.readings.get_mut(&ts)
    }

    /// Latest reading whose timestamp is at or before `ts`.
    pub fn latest_at_or_before(&self, ts: PrimitiveDateTime) -> Option<&Reading> {
        self.readings.range(..=ts).next_back().map(|(_, r)| r)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.readings.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Reading> {
        self.readings.values_mut()
    }

    /// Readings of one type, ascending by timestamp.
    pub fn of_type(&self, kind: ReadingType) -> impl Iterator<Item = &Reading> {
        self.readings.values().filter(move |r| r.kind == Some(kind))
    }

    pub fn into_readings(self) -> Vec<Reading> {
        self.readings.into_values().collect()
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TimeSeriesRepr {
    meter_id: String,
    readings: Vec<Reading>,
}

impl From<TimeSeries> for TimeSeriesRepr {
    fn from(series: TimeSeries) -> Self {
        Self {
            meter_id: series.meter_id,
            readings: series.readings.into_values().collect(),
        }
    }
}

impl From<TimeSeriesRepr> for TimeSeries {
    fn from(repr: TimeSeriesRepr) -> Self {
        let mut series = TimeSeries::new(repr.meter_id);
        for reading in repr.readings {
            series.insert(reading);
        }
        series
    }
}

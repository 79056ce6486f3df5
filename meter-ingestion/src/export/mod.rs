//! Export views over stored aggregates and reconciled batches.

use std::collections::BTreeMap;

use meter_client::domain::{timestamp::format_local, EnergyData, Reading, TimeSeries};
use serde::Serialize;
use time::PrimitiveDateTime;

use crate::transform::MeterBreakdown;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuePoint {
    pub ts: String,
    pub value: f64,
}

impl ValuePoint {
    fn new(ts: PrimitiveDateTime, value: f64) -> Self {
        Self {
            ts: format_local(ts),
            value,
        }
    }
}

impl From<&Reading> for ValuePoint {
    fn from(r: &Reading) -> Self {
        Self::new(r.ts, r.absolute_value)
    }
}

/// `{sensorId, data: [{ts, value}]}` for one meter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterExport {
    pub sensor_id: String,
    pub data: Vec<ValuePoint>,
}

/// Production, consumption and net values; empty groups are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedValues {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub production: Vec<ValuePoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub consumption: Vec<ValuePoint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub net: Vec<ValuePoint>,
}

fn points(readings: &[Reading]) -> Vec<ValuePoint> {
    readings.iter().map(ValuePoint::from).collect()
}

impl From<&MeterBreakdown> for GroupedValues {
    fn from(b: &MeterBreakdown) -> Self {
        Self {
            production: points(&b.production),
            consumption: points(&b.consumption),
            net: points(&b.net),
        }
    }
}

/// Measurement timestamps and values per meter, meters ascending and values
/// in timestamp order.
fn points_by_meter(data: &[EnergyData]) -> BTreeMap<&str, Vec<(PrimitiveDateTime, f64)>> {
    let mut grouped: BTreeMap<&str, Vec<(PrimitiveDateTime, f64)>> = BTreeMap::new();
    for aggregate in data {
        grouped
            .entry(aggregate.meter_id.as_str())
            .or_default()
            .extend(aggregate.measurements.iter().map(|m| (m.ts, m.value)));
    }
    for points in grouped.values_mut() {
        points.sort_by_key(|(ts, _)| *ts);
    }
    grouped
}

pub fn json_by_meter(data: &[EnergyData]) -> Vec<MeterExport> {
    points_by_meter(data)
        .into_iter()
        .map(|(meter_id, points)| MeterExport {
            sensor_id: meter_id.to_string(),
            data: points.into_iter().map(|(ts, v)| ValuePoint::new(ts, v)).collect(),
        })
        .collect()
}

fn write_csv<I>(groups: I) -> Result<String, csv::Error>
where
    I: IntoIterator<Item = Vec<(PrimitiveDateTime, f64)>>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["timestamp", "value"])?;

    for points in groups {
        for (ts, value) in points {
            writer.write_record([format_local(ts), value.to_string()])?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// `timestamp,value` rows, grouped by meter.
pub fn csv_by_meter(data: &[EnergyData]) -> Result<String, csv::Error> {
    write_csv(points_by_meter(data).into_values())
}

/// Absolute values of a reconciled batch as `timestamp,value` rows, one
/// group per meter.
pub fn csv_by_series(series: &BTreeMap<String, TimeSeries>) -> Result<String, csv::Error> {
    write_csv(
        series
            .values()
            .map(|s| s.iter().map(|r| (r.ts, r.absolute_value)).collect()),
    )
}

/// Absolute values of a reconciled batch, grouped per meter.
pub fn mapped_data(series: &BTreeMap<String, TimeSeries>) -> BTreeMap<String, GroupedValues> {
    series
        .iter()
        .map(|(meter_id, s)| (meter_id.clone(), GroupedValues::from(&MeterBreakdown::from_series(s))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_client::domain::{Measurement, ReadingType};
    use time::macros::datetime;

    fn aggregate(meter: &str, points: &[(PrimitiveDateTime, f64)]) -> EnergyData {
        let mut data = EnergyData::new(meter, points[0].0);
        for (ts, value) in points {
            data.add_measurement(Measurement {
                kind: ReadingType::Consumption,
                identifier: "1".to_string(),
                value: *value,
                ts: *ts,
                unit: "KWH".to_string(),
            });
        }
        data
    }

    #[test]
    fn csv_groups_meters_and_orders_by_timestamp() {
        let data = vec![
            aggregate("b", &[(datetime!(2024-01-01 00:15:00), 2.0)]),
            aggregate("a", &[(datetime!(2024-01-01 00:15:00), 1.5), (datetime!(2024-01-01 00:00:00), 1.0)]),
            aggregate("b", &[(datetime!(2024-01-01 00:00:00), 0.5)]),
        ];

        let csv = csv_by_meter(&data).unwrap();
        assert_eq!(
            csv,
            "timestamp,value\n\
             2024-01-01T00:00:00,1\n\
             2024-01-01T00:15:00,1.5\n\
             2024-01-01T00:00:00,0.5\n\
             2024-01-01T00:15:00,2\n"
        );
    }

    #[test]
    fn json_uses_sensor_id_and_data_points() {
        let data = vec![aggregate("ID742", &[(datetime!(2019-03-14 00:00:00), 150.0)])];
        let json = serde_json::to_value(json_by_meter(&data)).unwrap();

        assert_eq!(json[0]["sensorId"], "ID742");
        assert_eq!(json[0]["data"][0]["ts"], "2019-03-14T00:00:00");
        assert_eq!(json[0]["data"][0]["value"], 150.0);
    }

    #[test]
    fn grouped_values_omit_empty_groups() {
        let mut series = TimeSeries::new("ID735");
        series.insert(Reading::new(datetime!(2019-03-14 00:00:00), 40.0, "KWH", ReadingType::Production));
        let batch = BTreeMap::from([("ID735".to_string(), series)]);

        let json = serde_json::to_value(mapped_data(&batch)).unwrap();
        assert_eq!(json["ID735"]["production"][0]["value"], 40.0);
        assert!(json["ID735"].get("consumption").is_none());
        assert!(json["ID735"].get("net").is_none());
    }

    #[test]
    fn series_csv_lists_absolute_values_per_meter() {
        let mut series = BTreeMap::new();
        let mut s = TimeSeries::new("ID742");
        s.insert(Reading::new(datetime!(2019-03-14 00:00:00), 156.0, "KWH", ReadingType::Consumption));
        s.insert(Reading::new(datetime!(2019-03-13 00:00:00), 150.0, "KWH", ReadingType::Consumption));
        series.insert("ID742".to_string(), s);

        let csv = csv_by_series(&series).unwrap();
        assert_eq!(
            csv,
            "timestamp,value\n2019-03-13T00:00:00,150\n2019-03-14T00:00:00,156\n"
        );
    }
}

//! Billing-register exports (`ESLBillingData`).
//!
//! Structure walked:
//!
//! ```text
//! ESLBillingData
//!   Meter factoryNo="..."
//!     TimePeriod end="..."
//!       ValueRow obis="1-1:1.8.1" value="..." valueTimeStamp="..."?
//! ```
//!
//! `valueTimeStamp` overrides the period's `end` for its own row. Values are
//! always kWh.

use std::collections::BTreeMap;

use meter_client::domain::{EnergyData, Measurement, Reading, ReadingType, TimeSeries};
use roxmltree::{Document, Node};
use time::PrimitiveDateTime;

use super::{
    document::{descendants_named, parse_decimal, parse_timestamp},
    obis::{determine_type, sensor_id_for, Tariff, TariffRegister},
};
use crate::error::{IngestError, Result};

pub const ESL_UNIT: &str = "KWH";

/// A `ValueRow` whose value and timestamp parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct EslRow {
    pub obis: String,
    pub value: f64,
    pub ts: PrimitiveDateTime,
}

/// The rows of one `TimePeriod` of one meter.
#[derive(Debug, Clone, PartialEq)]
pub struct EslPeriod {
    pub meter_id: String,
    pub end: PrimitiveDateTime,
    pub rows: Vec<EslRow>,
}

fn record_skip(err: &IngestError) {
    metrics::counter!("xml_skipped_total", "dialect" => "esl", "reason" => err.kind()).increment(1);
}

/// Walk every meter and time period of the document.
///
/// A row with a malformed value or timestamp is dropped on its own; a period
/// whose `end` does not parse is dropped as a whole.
pub fn read_periods(doc: &Document) -> Vec<EslPeriod> {
    let mut periods = Vec::new();

    for meter in descendants_named(doc.root_element(), "Meter") {
        let Some(meter_id) = meter.attribute("factoryNo").filter(|id| !id.trim().is_empty()) else {
            let err = IngestError::StructuralGap { element: "Meter@factoryNo" };
            tracing::warn!(error = %err, "skipping meter without factory number");
            record_skip(&err);
            continue;
        };
        let meter_id = meter_id.trim();
        tracing::debug!(meter_id, "processing ESL meter");

        for period in descendants_named(meter, "TimePeriod") {
            let end_raw = period.attribute("end").unwrap_or_default();
            let end = match parse_timestamp("TimePeriod end", end_raw) {
                Ok(ts) => ts,
                Err(e) => {
                    tracing::warn!(meter_id, error = %e, "skipping time period");
                    record_skip(&e);
                    continue;
                }
            };

            let rows = read_rows(period, end, meter_id);
            periods.push(EslPeriod {
                meter_id: meter_id.to_string(),
                end,
                rows,
            });
        }
    }

    periods
}

fn read_rows(period: Node, end: PrimitiveDateTime, meter_id: &str) -> Vec<EslRow> {
    let mut rows = Vec::new();

    for row in descendants_named(period, "ValueRow") {
        let obis = row.attribute("obis").unwrap_or_default();
        match read_row(row, end) {
            Ok(parsed) => {
                tracing::debug!(meter_id, obis, value = parsed.value, ts = %parsed.ts, "ESL value row");
                rows.push(parsed);
            }
            Err(e) => {
                tracing::warn!(meter_id, obis, error = %e, "skipping value row");
                record_skip(&e);
            }
        }
    }

    rows
}

fn read_row(row: Node, end: PrimitiveDateTime) -> Result<EslRow> {
    let obis = row.attribute("obis").unwrap_or_default().to_string();
    let value = parse_decimal("ValueRow value", row.attribute("value").unwrap_or_default())?;
    let ts = match row.attribute("valueTimeStamp") {
        Some(raw) => parse_timestamp("ValueRow valueTimeStamp", raw)?,
        None => end,
    };
    Ok(EslRow { obis, value, ts })
}

/// One aggregate per time period that kept at least one row, holding the raw
/// OBIS rows as measurements.
pub fn extract_energy_data(doc: &Document) -> Vec<EnergyData> {
    let mut out = Vec::new();

    for period in read_periods(doc) {
        if period.rows.is_empty() {
            tracing::warn!(
                meter_id = %period.meter_id,
                end = %period.end,
                "no valid measurements in time period"
            );
            continue;
        }

        let mut data = EnergyData::new(&period.meter_id, period.end);
        for row in period.rows {
            data.add_measurement(Measurement {
                kind: determine_type(&row.obis),
                identifier: row.obis,
                value: row.value,
                ts: row.ts,
                unit: ESL_UNIT.to_string(),
            });
        }
        out.push(data);
    }

    tracing::info!(aggregates = out.len(), "parsed ESL document");
    out
}

/// Per-meter series of one document.
///
/// Tariff registers are summed into the synthetic `ID742` (consumption) and
/// `ID735` (production) series; every other row goes to the series of its
/// own meter.
pub fn extract_series(doc: &Document) -> BTreeMap<String, TimeSeries> {
    let mut out: BTreeMap<String, TimeSeries> = BTreeMap::new();
    let mut tariffs = TariffAccumulator::default();

    for period in read_periods(doc) {
        for row in period.rows {
            match TariffRegister::from_obis(&row.obis) {
                Some(register) => tariffs.record(&period.meter_id, register, row.ts, row.value),
                None => {
                    let kind = determine_type(&row.obis);
                    out.entry(period.meter_id.clone())
                        .or_insert_with(|| TimeSeries::new(&period.meter_id))
                        .insert(Reading::new(row.ts, row.value, ESL_UNIT, kind));
                }
            }
        }
    }

    tariffs.combine_into(&mut out);
    out
}

#[derive(Debug, Default)]
pub(crate) struct TariffComponents {
    pub(crate) high: BTreeMap<PrimitiveDateTime, f64>,
    pub(crate) low: BTreeMap<PrimitiveDateTime, f64>,
}

impl TariffComponents {
    pub(crate) fn record(&mut self, tariff: Tariff, ts: PrimitiveDateTime, value: f64) {
        match tariff {
            Tariff::High => self.high.insert(ts, value),
            Tariff::Low => self.low.insert(ts, value),
        };
    }

    pub(crate) fn combined(&self) -> Vec<(PrimitiveDateTime, f64)> {
        combine_tariffs(&self.high, &self.low)
    }
}

/// Tariff component values of one document, per reading type and source meter.
#[derive(Debug, Default)]
struct TariffAccumulator {
    components: BTreeMap<(ReadingType, String), TariffComponents>,
}

impl TariffAccumulator {
    fn record(&mut self, meter_id: &str, register: TariffRegister, ts: PrimitiveDateTime, value: f64) {
        self.components
            .entry((register.kind, meter_id.to_string()))
            .or_default()
            .record(register.tariff, ts, value);
    }

    fn combine_into(self, out: &mut BTreeMap<String, TimeSeries>) {
        for ((kind, source_meter), components) in self.components {
            let target = sensor_id_for(kind);
            let series = out
                .entry(target.to_string())
                .or_insert_with(|| TimeSeries::new(target));

            let combined = components.combined();
            tracing::debug!(
                source_meter = %source_meter,
                target,
                readings = combined.len(),
                "combined tariff registers"
            );
            for (ts, value) in combined {
                series.insert(Reading::new(ts, value, ESL_UNIT, kind));
            }
        }
    }
}

/// Sum high and low tariff values per timestamp.
///
/// Every high-tariff timestamp yields `high + low` (a missing low value counts
/// as zero); timestamps that only have a low-tariff value yield that value
/// alone.
pub fn combine_tariffs(
    high: &BTreeMap<PrimitiveDateTime, f64>,
    low: &BTreeMap<PrimitiveDateTime, f64>,
) -> Vec<(PrimitiveDateTime, f64)> {
    let mut out: Vec<(PrimitiveDateTime, f64)> = high
        .iter()
        .map(|(ts, h)| (*ts, h + low.get(ts).copied().unwrap_or(0.0)))
        .collect();

    out.extend(
        low.iter()
            .filter(|(ts, _)| !high.contains_key(*ts))
            .map(|(ts, l)| (*ts, *l)),
    );

    out
}

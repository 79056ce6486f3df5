//! Interval-metering exports (`ValidatedMeteredData`).
//!
//! Each `MeteringData` block carries a start time, a resolution in minutes and
//! a list of observations numbered from 1; observation `n` applies to
//! `start + (n - 1) * resolution`.

use std::collections::BTreeMap;

use meter_client::domain::{EnergyData, Measurement, Reading, ReadingType, TimeSeries};
use roxmltree::{Document, Node};
use time::{Duration, PrimitiveDateTime};

use super::document::{
    descendant_text, descendants_named, first_descendant, parse_decimal, parse_integer,
    parse_timestamp,
};
use crate::error::{IngestError, Result};

const METER_ID_MARKER: &str = "_ID";

#[derive(Debug, Clone, PartialEq)]
pub struct SdatObservation {
    pub sequence: i64,
    pub ts: PrimitiveDateTime,
    pub volume: f64,
}

/// One `MeteringData` block with the observations that parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct SdatBlock {
    /// `None` when neither the document id nor a metering point names the meter.
    pub meter_id: Option<String>,
    pub kind: ReadingType,
    /// Whether a production or consumption metering point was present; when
    /// it is not, `kind` is the consumption default.
    pub has_metering_point: bool,
    pub unit: String,
    pub start: PrimitiveDateTime,
    pub end: Option<PrimitiveDateTime>,
    pub resolution_minutes: i64,
    pub observations: Vec<SdatObservation>,
}

fn record_skip(err: &IngestError) {
    metrics::counter!("xml_skipped_total", "dialect" => "sdat", "reason" => err.kind()).increment(1);
}

/// Meter id carried by the document header, e.g. `eslevu180263_BR2294_ID735`
/// yields `ID735`.
pub fn document_meter_id(doc: &Document) -> Option<String> {
    let full = descendant_text(doc.root_element(), "DocumentID");
    meter_id_from_document_id(full.trim())
}

pub fn meter_id_from_document_id(document_id: &str) -> Option<String> {
    document_id
        .rfind(METER_ID_MARKER)
        .map(|idx| document_id[idx + 1..].to_string())
}

/// Walk every `MeteringData` block of the document.
///
/// A block without `Interval` or `Resolution`, or whose start time or
/// resolution does not parse, is dropped. Observations with a missing
/// position or an unparseable sequence or volume are dropped on their own.
pub fn read_blocks(doc: &Document) -> Vec<SdatBlock> {
    let document_id = document_meter_id(doc);
    if let Some(id) = &document_id {
        tracing::debug!(meter_id = %id, "meter id taken from DocumentID");
    }

    let mut blocks = Vec::new();
    for (index, block) in descendants_named(doc.root_element(), "MeteringData").enumerate() {
        match read_block(block, document_id.as_deref()) {
            Ok(parsed) => blocks.push(parsed),
            Err(e) => {
                tracing::warn!(block = index, error = %e, "skipping metering data block");
                record_skip(&e);
            }
        }
    }
    blocks
}

fn read_block(block: Node, document_id: Option<&str>) -> Result<SdatBlock> {
    let production_point = first_descendant(block, "ProductionMeteringPoint");
    let consumption_point = first_descendant(block, "ConsumptionMeteringPoint");

    // A block naming neither metering point is treated as consumption.
    let kind = if production_point.is_some() {
        ReadingType::Production
    } else {
        ReadingType::Consumption
    };

    let meter_id = match document_id {
        Some(id) => Some(id.to_string()),
        None => production_point
            .or(consumption_point)
            .map(|point| descendant_text(point, "VSENationalID").trim().to_string())
            .filter(|id| !id.is_empty()),
    };

    let interval =
        first_descendant(block, "Interval").ok_or(IngestError::StructuralGap { element: "Interval" })?;
    let start = parse_timestamp("StartDateTime", &descendant_text(interval, "StartDateTime"))?;
    let end = parse_timestamp("EndDateTime", &descendant_text(interval, "EndDateTime")).ok();

    let unit = first_descendant(block, "Product")
        .map(|product| descendant_text(product, "MeasureUnit").trim().to_string())
        .unwrap_or_default();

    let resolution =
        first_descendant(block, "Resolution").ok_or(IngestError::StructuralGap { element: "Resolution" })?;
    let resolution_minutes = parse_integer("Resolution", &descendant_text(resolution, "Resolution"))?;

    tracing::debug!(
        meter_id = ?meter_id,
        %kind,
        %start,
        resolution_minutes,
        unit = %unit,
        "reading SDAT block"
    );

    let mut observations = Vec::new();
    for observation in descendants_named(block, "Observation") {
        match read_observation(observation, start, resolution_minutes) {
            Ok(parsed) => observations.push(parsed),
            Err(e) => {
                tracing::warn!(error = %e, "skipping observation");
                record_skip(&e);
            }
        }
    }

    Ok(SdatBlock {
        meter_id,
        kind,
        has_metering_point: production_point.is_some() || consumption_point.is_some(),
        unit,
        start,
        end,
        resolution_minutes,
        observations,
    })
}

fn read_observation(
    observation: Node,
    start: PrimitiveDateTime,
    resolution_minutes: i64,
) -> Result<SdatObservation> {
    let position = first_descendant(observation, "Position")
        .ok_or(IngestError::StructuralGap { element: "Position" })?;
    let raw_sequence = descendant_text(position, "Sequence");
    let sequence = parse_integer("Sequence", &raw_sequence)?;
    let volume = parse_decimal("Volume", &descendant_text(observation, "Volume"))?;
    let ts = observation_timestamp(start, resolution_minutes, sequence)
        .ok_or_else(|| IngestError::malformed("Sequence", &raw_sequence, "timestamp out of range"))?;

    Ok(SdatObservation { sequence, ts, volume })
}

/// `start + (sequence - 1) * resolution` minutes; `None` on overflow.
pub fn observation_timestamp(
    start: PrimitiveDateTime,
    resolution_minutes: i64,
    sequence: i64,
) -> Option<PrimitiveDateTime> {
    let minutes = sequence.checked_sub(1)?.checked_mul(resolution_minutes)?;
    start.checked_add(Duration::minutes(minutes))
}

fn warn_anonymous(block: &SdatBlock) {
    let err = IngestError::StructuralGap { element: "VSENationalID" };
    tracing::warn!(start = %block.start, error = %err, "skipping block without meter id");
    record_skip(&err);
}

/// One aggregate per block that kept at least one observation. The aggregate
/// timestamp is the interval end, or its start when the end is missing.
pub fn extract_energy_data(doc: &Document) -> Vec<EnergyData> {
    let mut out = Vec::new();

    for block in read_blocks(doc) {
        let Some(meter_id) = block.meter_id.as_deref() else {
            warn_anonymous(&block);
            continue;
        };
        if block.observations.is_empty() {
            tracing::warn!(meter_id, start = %block.start, "no valid observations in interval");
            continue;
        }

        let mut data = EnergyData::new(meter_id, block.end.unwrap_or(block.start));
        for obs in &block.observations {
            data.add_measurement(Measurement {
                kind: block.kind,
                identifier: obs.sequence.to_string(),
                value: obs.volume,
                ts: obs.ts,
                unit: block.unit.clone(),
            });
        }
        out.push(data);
    }

    tracing::info!(aggregates = out.len(), "parsed SDAT document");
    out
}

/// Per-meter series of one document.
pub fn extract_series(doc: &Document) -> BTreeMap<String, TimeSeries> {
    let mut out: BTreeMap<String, TimeSeries> = BTreeMap::new();

    for block in read_blocks(doc) {
        let Some(meter_id) = block.meter_id.as_deref() else {
            warn_anonymous(&block);
            continue;
        };
        if block.observations.is_empty() {
            continue;
        }

        let series = out
            .entry(meter_id.to_string())
            .or_insert_with(|| TimeSeries::new(meter_id));
        for obs in &block.observations {
            series.insert(Reading::new(obs.ts, obs.volume, block.unit.as_str(), block.kind));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{document::parse_document, fixtures};
    use time::macros::datetime;

    #[test]
    fn sequence_maps_to_start_plus_resolution_steps() {
        let start = datetime!(2023-01-01 00:00:00);
        assert_eq!(observation_timestamp(start, 15, 5), Some(datetime!(2023-01-01 01:00:00)));
        assert_eq!(observation_timestamp(start, 15, 1), Some(start));
        assert_eq!(observation_timestamp(start, 60, 25), Some(datetime!(2023-01-02 00:00:00)));
        assert_eq!(observation_timestamp(start, i64::MAX, 3), None);
    }

    #[test]
    fn document_id_suffix_becomes_meter_id() {
        assert_eq!(
            meter_id_from_document_id("eslevu180263_BR2294_ID735").as_deref(),
            Some("ID735")
        );
        assert_eq!(meter_id_from_document_id("a_ID1_ID742").as_deref(), Some("ID742"));
        assert_eq!(meter_id_from_document_id("eslevu180263_BR2294"), None);
    }

    #[test]
    fn reads_production_block_with_document_meter_id() {
        let doc = parse_document(fixtures::SDAT_PRODUCTION.as_bytes()).unwrap();
        let blocks = read_blocks(&doc);

        assert_eq!(blocks.len(), 1);
        let block = &blocks[0];
        assert_eq!(block.meter_id.as_deref(), Some("ID735"));
        assert_eq!(block.kind, ReadingType::Production);
        assert_eq!(block.unit, "KWH");
        assert_eq!(block.resolution_minutes, 15);
        assert_eq!(block.observations.len(), 3);
        assert_eq!(block.observations[2].ts, datetime!(2019-03-13 23:30:00));
    }

    #[test]
    fn falls_back_to_national_id_and_skips_bad_observations() {
        let doc = parse_document(fixtures::SDAT_NATIONAL_ID.as_bytes()).unwrap();
        let series = extract_series(&doc);

        let meter = series.get("CH1018601234500000000000000011642").expect("national id series");
        let values: Vec<f64> = meter.iter().map(|r| r.absolute_value).collect();
        // sequence "x" and volume "n/a" are dropped, the rest stays
        assert_eq!(values, vec![0.5, 0.75]);
        assert!(meter.iter().all(|r| r.kind == Some(ReadingType::Consumption)));
    }

    #[test]
    fn blocks_missing_interval_or_resolution_are_skipped() {
        let doc = parse_document(fixtures::SDAT_STRUCTURAL_GAPS.as_bytes()).unwrap();
        let blocks = read_blocks(&doc);

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].observations.len(), 1);
    }

    #[test]
    fn block_without_metering_point_defaults_to_consumption() {
        let doc = parse_document(fixtures::SDAT_NO_METERING_POINT.as_bytes()).unwrap();
        let blocks = read_blocks(&doc);

        assert_eq!(blocks[0].kind, ReadingType::Consumption);
        assert!(!blocks[0].has_metering_point);
        assert_eq!(blocks[0].meter_id.as_deref(), Some("ID742"));
    }

    #[test]
    fn energy_data_uses_interval_end_and_sequence_identifiers() {
        let doc = parse_document(fixtures::SDAT_PRODUCTION.as_bytes()).unwrap();
        let data = extract_energy_data(&doc);

        assert_eq!(data.len(), 1);
        assert_eq!(data[0].meter_id, "ID735");
        assert_eq!(data[0].ts, datetime!(2019-03-14 23:00:00));
        let identifiers: Vec<&str> = data[0].measurements.iter().map(|m| m.identifier.as_str()).collect();
        assert_eq!(identifiers, vec!["1", "2", "3"]);
    }
}

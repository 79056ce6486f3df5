//! Cross-file merge and delta computation.
//!
//! A batch is merged file by file into one series per meter, later files
//! overwriting earlier ones at identical timestamps. Once merged, each meter's
//! readings are split by type and every reading gets the difference to the
//! previous reading of the same type as its relative value.

use std::collections::BTreeMap;

use meter_client::domain::{ReadingType, TimeSeries};
use time::PrimitiveDateTime;

use super::InputFile;
use crate::{
    error::{IngestError, Result},
    sources::parse_time_series,
};

pub const DEFAULT_LARGE_DELTA_THRESHOLD: f64 = 1000.0;

/// Why a delta was flagged. Flagged values are kept as computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspiciousDelta {
    NegativeConsumption,
    PositiveProduction,
    Large,
}

impl SuspiciousDelta {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NegativeConsumption => "negative_consumption",
            Self::PositiveProduction => "positive_production",
            Self::Large => "large",
        }
    }
}

/// Sanity checks for one delta of the given type.
pub fn classify_delta(kind: ReadingType, delta: f64, large_threshold: f64) -> Vec<SuspiciousDelta> {
    let mut flags = Vec::new();
    match kind {
        ReadingType::Consumption if delta < 0.0 => flags.push(SuspiciousDelta::NegativeConsumption),
        ReadingType::Production if delta > 0.0 => flags.push(SuspiciousDelta::PositiveProduction),
        _ => {}
    }
    if delta.abs() > large_threshold {
        flags.push(SuspiciousDelta::Large);
    }
    flags
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    large_delta_threshold: f64,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_LARGE_DELTA_THRESHOLD)
    }
}

impl Reconciler {
    pub fn new(large_delta_threshold: f64) -> Self {
        Self { large_delta_threshold }
    }

    /// Merge and finalize a batch.
    pub fn reconcile(&self, files: &[InputFile]) -> BTreeMap<String, TimeSeries> {
        let mut series = self.merge_batch(files);
        self.compute_relative_values(&mut series);
        series
    }

    /// Merge every file of the batch in order. Files that fail to parse are
    /// logged and skipped; they never fail the batch.
    pub fn merge_batch(&self, files: &[InputFile]) -> BTreeMap<String, TimeSeries> {
        let mut merged: BTreeMap<String, TimeSeries> = BTreeMap::new();
        let mut skipped = 0usize;

        for file in files {
            let parsed = match parse_time_series(&file.bytes) {
                Ok(parsed) => parsed,
                Err(e) => {
                    skipped += 1;
                    tracing::error!(
                        file = %file.name,
                        fingerprint = %file.fingerprint(),
                        error = %e,
                        "skipping file"
                    );
                    metrics::counter!("xml_files_skipped_total", "reason" => e.kind()).increment(1);
                    continue;
                }
            };

            for (meter_id, incoming) in parsed {
                let readings = incoming.len();
                let added = merged
                    .entry(meter_id.clone())
                    .or_insert_with(|| TimeSeries::new(meter_id.as_str()))
                    .merge(incoming);
                tracing::debug!(
                    file = %file.name,
                    meter_id = %meter_id,
                    readings,
                    replaced = readings - added,
                    "merged meter series"
                );
            }
        }

        tracing::info!(
            files = files.len(),
            skipped,
            meters = merged.len(),
            "merged batch"
        );
        merged
    }

    /// Fill in relative values for every meter.
    ///
    /// Deltas of one meter are computed first and only applied when all of
    /// them are finite; a meter that fails keeps its relative values and the
    /// next meter is processed.
    pub fn compute_relative_values(&self, series: &mut BTreeMap<String, TimeSeries>) {
        for (meter_id, meter_series) in series.iter_mut() {
            match self.relative_values(meter_series) {
                Ok(deltas) => {
                    for (ts, delta) in deltas {
                        if let Some(reading) = meter_series.get_mut(ts) {
                            reading.relative_value = delta;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(meter_id = %meter_id, error = %e, "skipping delta computation for meter");
                    metrics::counter!("reconcile_meter_failures_total").increment(1);
                }
            }
        }
    }

    /// Relative value for every reading of the series, per type.
    pub fn relative_values(&self, series: &TimeSeries) -> Result<Vec<(PrimitiveDateTime, f64)>> {
        let mut out = Vec::with_capacity(series.len());

        for kind in [ReadingType::Production, ReadingType::Consumption] {
            let mut previous: Option<f64> = None;
            for reading in series.of_type(kind) {
                let delta = match previous {
                    None => 0.0,
                    Some(prev) => reading.absolute_value - prev,
                };
                if !delta.is_finite() {
                    return Err(IngestError::NonFiniteDelta {
                        meter_id: series.meter_id().to_string(),
                        ts: reading.ts.to_string(),
                    });
                }

                if previous.is_some() {
                    self.report_suspicious(series.meter_id(), kind, reading.ts, delta);
                }
                out.push((reading.ts, delta));
                previous = Some(reading.absolute_value);
            }
        }

        Ok(out)
    }

    fn report_suspicious(&self, meter_id: &str, kind: ReadingType, ts: PrimitiveDateTime, delta: f64) {
        for flag in classify_delta(kind, delta, self.large_delta_threshold) {
            tracing::warn!(
                meter_id,
                %kind,
                %ts,
                delta,
                check = flag.as_str(),
                "suspicious relative value"
            );
            metrics::counter!("suspicious_deltas_total", "kind" => flag.as_str()).increment(1);
        }
    }
}

pub mod document;
pub mod esl;
pub mod obis;
pub mod sdat;
pub mod xml_file;

#[cfg(test)]
pub(crate) mod fixtures;

use std::collections::BTreeMap;

use meter_client::domain::{EnergyData, TimeSeries};

pub use document::{detect_format, parse_document, XmlFormat};
pub use xml_file::{XmlDirectorySource, XmlFileSource};

use crate::error::Result;

/// Detect the dialect of one document and extract its persistence aggregates.
///
/// Only unreadable bytes and an unknown root element are errors; bad rows,
/// periods and blocks are dropped with a warning.
pub fn parse_energy_data(bytes: &[u8]) -> Result<Vec<EnergyData>> {
    let doc = parse_document(bytes)?;
    let format = detect_format(&doc)?;
    tracing::debug!(format = format.as_str(), "detected XML format");

    Ok(match format {
        XmlFormat::Esl => esl::extract_energy_data(&doc),
        XmlFormat::Sdat => sdat::extract_energy_data(&doc),
    })
}

/// Detect the dialect of one document and extract per-meter series.
/// Relative values are left at zero.
pub fn parse_time_series(bytes: &[u8]) -> Result<BTreeMap<String, TimeSeries>> {
    let doc = parse_document(bytes)?;
    let format = detect_format(&doc)?;
    tracing::debug!(format = format.as_str(), "detected XML format");

    Ok(match format {
        XmlFormat::Esl => esl::extract_series(&doc),
        XmlFormat::Sdat => sdat::extract_series(&doc),
    })
}

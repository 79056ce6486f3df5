//! Failures of the XML normalization engine.
//!
//! Only [`IngestError::Encoding`], [`IngestError::Xml`] and
//! [`IngestError::FormatUnrecognized`] ever reach the caller of a parse
//! function. The other variants describe rows, observations and blocks that
//! were dropped while the surrounding document kept being processed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("input is not valid UTF-8: {0}")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("malformed XML document: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error(
        "unknown XML format: {root}. Expected 'ESLBillingData' (ESL format) or 'ValidatedMeteredData' (SDAT format)"
    )]
    FormatUnrecognized { root: String },

    #[error("malformed {field} '{value}': {reason}")]
    MalformedValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("missing <{element}> element")]
    StructuralGap { element: &'static str },

    #[error("non-finite relative value for meter {meter_id} at {ts}")]
    NonFiniteDelta { meter_id: String, ts: String },
}

impl IngestError {
    pub(crate) fn malformed(field: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::MalformedValue {
            field,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Encoding(_) => "encoding",
            Self::Xml(_) => "xml",
            Self::FormatUnrecognized { .. } => "format_unrecognized",
            Self::MalformedValue { .. } => "malformed_value",
            Self::StructuralGap { .. } => "structural_gap",
            Self::NonFiniteDelta { .. } => "non_finite_delta",
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::PrimitiveDateTime;

use super::timestamp::local_timestamp;

/// Direction of energy flow a register or interval value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadingType {
    /// Einspeisung: energy fed into the grid.
    Production,
    /// Bezug: energy drawn from the grid.
    Consumption,
}

impl ReadingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "PRODUCTION",
            Self::Consumption => "CONSUMPTION",
        }
    }
}

impl fmt::Display for ReadingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown reading type '{0}', expected PRODUCTION or CONSUMPTION")]
pub struct UnknownReadingType(pub String);

impl FromStr for ReadingType {
    type Err = UnknownReadingType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRODUCTION" => Ok(Self::Production),
            "CONSUMPTION" => Ok(Self::Consumption),
            _ => Err(UnknownReadingType(s.to_string())),
        }
    }
}

/// One observed value of a meter.
///
/// `relative_value` is the delta to the previous reading of the same type on
/// the same meter; it stays `0.0` until the reconciler fills it in, and for
/// the first reading of each type. `kind == None` marks a derived net reading,
/// which is never stored in a [`TimeSeries`](super::TimeSeries).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    #[serde(with = "local_timestamp", rename = "timestamp")]
    pub ts: PrimitiveDateTime,
    pub absolute_value: f64,
    pub relative_value: f64,
    pub unit: String,
    #[serde(rename = "type")]
    pub kind: Option<ReadingType>,
}

impl Reading {
    pub fn new(
        ts: PrimitiveDateTime,
        absolute_value: f64,
        unit: impl Into<String>,
        kind: ReadingType,
    ) -> Self {
        Self {
            ts,
            absolute_value,
            relative_value: 0.0,
            unit: unit.into(),
            kind: Some(kind),
        }
    }

    pub fn is_net(&self) -> bool {
        self.kind.is_none()
    }
}

//! Wall-clock timestamps as they appear in meter exports.
//!
//! Exports carry local date-times, sometimes with a UTC offset attached. The
//! offset is dropped on parse: two readings are the same instant for the
//! series if their wall-clock date and time match.

use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};

time::serde::format_description!(
    pub local_timestamp,
    PrimitiveDateTime,
    "[year]-[month]-[day]T[hour]:[minute]:[second]"
);

/// Parse an ISO-8601 date-time, with or without offset or fractional seconds.
pub fn parse_local(s: &str) -> Result<PrimitiveDateTime, time::error::Parse> {
    let s = s.trim();
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(PrimitiveDateTime::new(dt.date(), dt.time()));
    }

    PrimitiveDateTime::parse(
        s,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"),
    )
    .or_else(|_| PrimitiveDateTime::parse(s, format_description!("[year]-[month]-[day]T[hour]:[minute]")))
}

/// `2019-03-14T00:15:00`
pub fn format_local(ts: PrimitiveDateTime) -> String {
    ts.format(format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| ts.to_string())
}

/// `20190314_001500`, used in storage file names.
pub fn format_compact(ts: PrimitiveDateTime) -> String {
    ts.format(format_description!("[year][month][day]_[hour][minute][second]"))
        .unwrap_or_else(|_| ts.to_string())
}

/// Seconds since the Unix epoch, reading the wall-clock time as UTC.
pub fn epoch_seconds_utc(ts: PrimitiveDateTime) -> i64 {
    ts.assume_utc().unix_timestamp()
}

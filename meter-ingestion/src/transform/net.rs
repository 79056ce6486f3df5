use std::collections::BTreeMap;

use meter_client::domain::{Reading, ReadingType, TimeSeries};
use serde::Serialize;
use time::PrimitiveDateTime;

/// Net readings (production minus consumption) at every timestamp that has
/// both a production and a consumption reading.
///
/// The unit comes from the production reading and the result has no type.
pub fn net_readings<'a, P, C>(production: P, consumption: C) -> Vec<Reading>
where
    P: IntoIterator<Item = &'a Reading>,
    C: IntoIterator<Item = &'a Reading>,
{
    let production = first_per_timestamp(production);
    let consumption = first_per_timestamp(consumption);

    production
        .into_iter()
        .filter_map(|(ts, prod)| {
            consumption.get(&ts).map(|cons| Reading {
                ts,
                absolute_value: prod.absolute_value - cons.absolute_value,
                relative_value: prod.relative_value - cons.relative_value,
                unit: prod.unit.clone(),
                kind: None,
            })
        })
        .collect()
}

/// Keyed by timestamp; the first reading at a timestamp is kept.
fn first_per_timestamp<'a, I>(readings: I) -> BTreeMap<PrimitiveDateTime, &'a Reading>
where
    I: IntoIterator<Item = &'a Reading>,
{
    let mut by_ts = BTreeMap::new();
    for r in readings {
        by_ts.entry(r.ts).or_insert(r);
    }
    by_ts
}

/// Readings of one meter split into production, consumption and net.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeterBreakdown {
    pub production: Vec<Reading>,
    pub consumption: Vec<Reading>,
    pub net: Vec<Reading>,
}

impl MeterBreakdown {
    pub fn from_readings(readings: Vec<Reading>) -> Self {
        let (production, consumption): (Vec<Reading>, Vec<Reading>) = readings
            .into_iter()
            .filter(|r| !r.is_net())
            .partition(|r| r.kind == Some(ReadingType::Production));
        let net = net_readings(&production, &consumption);

        Self {
            production,
            consumption,
            net,
        }
    }

    pub fn from_series(series: &TimeSeries) -> Self {
        Self::from_readings(series.iter().cloned().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.production.is_empty() && self.consumption.is_empty() && self.net.is_empty()
    }
}

//! OBIS code classification for billing-register rows.
//!
//! OBIS codes have the shape `A-B:C.D.E`. The four tariff registers below are
//! a fixed contract with the export producer; other codes are classified by
//! prefix.

use meter_client::domain::ReadingType;

/// Bezug Hochtarif
pub const CONSUMPTION_HIGH_TARIFF: &str = "1-1:1.8.1";
/// Bezug Niedertarif
pub const CONSUMPTION_LOW_TARIFF: &str = "1-1:1.8.2";
/// Einspeisung Hochtarif
pub const PRODUCTION_HIGH_TARIFF: &str = "1-1:2.8.1";
/// Einspeisung Niedertarif
pub const PRODUCTION_LOW_TARIFF: &str = "1-1:2.8.2";

/// Synthetic meter the combined consumption tariffs are reported under.
pub const CONSUMPTION_SENSOR_ID: &str = "ID742";
/// Synthetic meter the combined production tariffs are reported under.
pub const PRODUCTION_SENSOR_ID: &str = "ID735";

const CONSUMPTION_PREFIX: &str = "1-1:1";
const PRODUCTION_PREFIX: &str = "1-1:2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tariff {
    High,
    Low,
}

/// A register that is one tariff component of a combined quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TariffRegister {
    pub kind: ReadingType,
    pub tariff: Tariff,
}

impl TariffRegister {
    pub fn from_obis(obis: &str) -> Option<Self> {
        let (kind, tariff) = match obis {
            CONSUMPTION_HIGH_TARIFF => (ReadingType::Consumption, Tariff::High),
            CONSUMPTION_LOW_TARIFF => (ReadingType::Consumption, Tariff::Low),
            PRODUCTION_HIGH_TARIFF => (ReadingType::Production, Tariff::High),
            PRODUCTION_LOW_TARIFF => (ReadingType::Production, Tariff::Low),
            _ => return None,
        };
        Some(Self { kind, tariff })
    }
}

/// Synthetic meter id for the combined tariffs of one reading type.
pub fn sensor_id_for(kind: ReadingType) -> &'static str {
    match kind {
        ReadingType::Consumption => CONSUMPTION_SENSOR_ID,
        ReadingType::Production => PRODUCTION_SENSOR_ID,
    }
}

/// Classify an OBIS code as production or consumption.
///
/// Tariff registers match exactly; other codes fall back to the `1-1:1` /
/// `1-1:2` prefixes, and anything unrecognised counts as consumption.
pub fn determine_type(obis: &str) -> ReadingType {
    if let Some(register) = TariffRegister::from_obis(obis) {
        return register.kind;
    }

    if obis.starts_with(CONSUMPTION_PREFIX) {
        ReadingType::Consumption
    } else if obis.starts_with(PRODUCTION_PREFIX) {
        ReadingType::Production
    } else {
        tracing::warn!(obis, "unknown OBIS code pattern, defaulting to consumption");
        ReadingType::Consumption
    }
}

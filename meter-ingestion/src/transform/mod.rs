pub mod net;
pub mod reconcile;
pub mod sensor_data;

use meter_client::domain::EnergyData;
use time::{macros::datetime, PrimitiveDateTime};

use crate::pipeline::{Envelope, PipelineError, Transform};

pub use net::{net_readings, MeterBreakdown};
pub use reconcile::Reconciler;
pub use sensor_data::SensorDataAssembler;

/// One uploaded or on-disk document of a batch.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Short content hash used to tell uploads apart in logs and file names.
    pub fn fingerprint(&self) -> String {
        let hash = blake3::hash(&self.bytes);
        hash.to_hex().as_str()[..16].to_string()
    }
}

/// Content hash over every file of a batch, in order.
pub fn batch_fingerprint(files: &[InputFile]) -> String {
    let mut hasher = blake3::Hasher::new();
    for file in files {
        hasher.update(&(file.bytes.len() as u64).to_le_bytes());
        hasher.update(&file.bytes);
    }
    hasher.finalize().to_hex().as_str()[..16].to_string()
}

const MIN_TS: PrimitiveDateTime = datetime!(2000-01-01 00:00:00);
const MAX_TS: PrimitiveDateTime = datetime!(2100-01-01 00:00:00);

/// Pure validation of an `EnergyData` aggregate before it is stored.
///
/// Rules:
/// - at least one measurement and a non-empty meter id.
/// - the aggregate and every measurement timestamp lie within
///   [2000-01-01, 2100-01-01].
pub fn validate_energy_data(env: Envelope<EnergyData>) -> Result<Envelope<EnergyData>, PipelineError> {
    let data = &env.payload;

    if data.meter_id.trim().is_empty() {
        return Err(PipelineError::Transform("meter id must not be empty".to_string()));
    }
    if data.is_empty() {
        return Err(PipelineError::Transform(format!(
            "aggregate for meter {} has no measurements",
            data.meter_id
        )));
    }

    let in_window = |ts: PrimitiveDateTime| (MIN_TS..=MAX_TS).contains(&ts);
    if !in_window(data.ts) || data.measurements.iter().any(|m| !in_window(m.ts)) {
        return Err(PipelineError::Transform("timestamp out of allowed range".to_string()));
    }

    Ok(env)
}

#[derive(Clone, Default)]
pub struct EnergyDataValidation;

#[async_trait::async_trait]
impl Transform<EnergyData, EnergyData> for EnergyDataValidation {
    async fn apply(&self, input: Envelope<EnergyData>) -> Result<Envelope<EnergyData>, PipelineError> {
        validate_energy_data(input).inspect_err(|_| {
            metrics::counter!("validation_energy_data_rejected_total").increment(1);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meter_client::domain::{Measurement, ReadingType};

    fn aggregate(ts: PrimitiveDateTime) -> Envelope<EnergyData> {
        let mut data = EnergyData::new("38157930", ts);
        data.add_measurement(Measurement {
            kind: ReadingType::Consumption,
            identifier: "1-1:1.8.1".to_string(),
            value: 1.0,
            ts,
            unit: "KWH".to_string(),
        });
        Envelope::new(data, "test.xml")
    }

    #[test]
    fn accepts_valid_aggregate() {
        assert!(validate_energy_data(aggregate(datetime!(2019-03-14 00:00:00))).is_ok());
    }

    #[test]
    fn rejects_empty_aggregate() {
        let env = Envelope::new(EnergyData::new("38157930", datetime!(2019-03-14 00:00:00)), "test.xml");
        assert!(matches!(validate_energy_data(env), Err(PipelineError::Transform(_))));
    }

    #[test]
    fn rejects_out_of_range_timestamp() {
        let res = validate_energy_data(aggregate(datetime!(1800-01-01 00:00:00)));
        assert!(matches!(res, Err(PipelineError::Transform(_))));
    }

    #[test]
    fn fingerprint_is_stable_and_content_based() {
        let a = InputFile::new("a.xml", b"<x/>".to_vec());
        let b = InputFile::new("b.xml", b"<x/>".to_vec());
        let c = InputFile::new("a.xml", b"<y/>".to_vec());

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 16);

        assert_ne!(batch_fingerprint(&[a.clone(), c.clone()]), batch_fingerprint(&[c, a]));
    }
}

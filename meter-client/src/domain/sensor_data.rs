use serde::{Deserialize, Serialize};

/// Absolute meter values of one sensor, keyed by UTC epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorData {
    pub sensor_id: String,
    pub data: Vec<SensorDataPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorDataPoint {
    /// Seconds since the Unix epoch, as a decimal string.
    pub ts: String,
    pub value: f64,
}

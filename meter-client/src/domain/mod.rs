pub mod energy_data;
pub mod reading;
pub mod sensor_data;
pub mod time_series;
pub mod timestamp;

pub use energy_data::{EnergyData, Measurement};
pub use reading::{Reading, ReadingType, UnknownReadingType};
pub use sensor_data::{SensorData, SensorDataPoint};
pub use time_series::TimeSeries;

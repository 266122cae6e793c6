// Sensor module
// IMU sample sources, time source and battery gauge for the sampling loop

pub mod clock;
pub mod replay;
pub mod synthetic;

pub use clock::{Clock, SystemClock};
pub use replay::ReplaySensor;
pub use synthetic::{SyntheticConfig, SyntheticSensor};

use thiserror::Error;

use crate::motion::types::Sample;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("Sensor fault: {0}")]
    Fault(String),

    #[error("Sample stream ended")]
    EndOfStream,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid sample on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// A source of IMU samples
///
/// `read_sample` is bounded: it returns the next reading or an error, it
/// never waits for the sensor indefinitely.
pub trait SensorSource: Send {
    fn read_sample(&mut self) -> Result<Sample, SensorError>;

    /// Reset the sensor bus after a stall
    fn reinitialize(&mut self) -> Result<(), SensorError>;
}

/// Battery voltage reporting
pub trait BatteryGauge: Send {
    fn voltage(&mut self) -> f32;
}

/// Gauge that always reports the same voltage (host builds have no battery)
pub struct FixedBattery(pub f32);

impl BatteryGauge for FixedBattery {
    fn voltage(&mut self) -> f32 {
        self.0
    }
}

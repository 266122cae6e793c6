// Synthetic sensor
// Deterministic at-rest readings with scheduled strikes, for host runs without hardware

use crate::motion::types::Sample;
use crate::motion::vector::Vec3;
use crate::sensor::{SensorError, SensorSource};

/// Shape of the generated signal
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Spacing between generated samples
    pub sample_interval_ms: u64,

    /// Static acceleration the stick sees at rest
    pub gravity: Vec3,

    /// Time between strikes, 0 disables strikes
    pub strike_period_ms: u64,

    /// Motion magnitude (m/s²) on the strike sample
    pub strike_peak: f32,

    /// Unit direction of strike motion in the sensor frame
    pub strike_direction: Vec3,

    /// Fraction of the peak seen on the sample after a strike (bounce)
    pub ring_ratio: f32,

    /// Start a zero-reading stall every this many samples, 0 disables
    pub stall_every: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        SyntheticConfig {
            sample_interval_ms: 10,
            gravity: Vec3::new(0.0, 0.0, 9.8),
            strike_period_ms: 1000,
            strike_peak: 19.0,
            strike_direction: Vec3::new(0.0, 0.0, 1.0),
            ring_ratio: 0.9,
            stall_every: 0,
        }
    }
}

/// Generates a repeatable drumming pattern
///
/// A stall makes the sensor return all-zero readings until `reinitialize`
/// is called, which mimics a hung I2C bus.
pub struct SyntheticSensor {
    config: SyntheticConfig,
    tick: u64,
    stalled: bool,
    reinit_count: u32,
}

impl SyntheticSensor {
    pub fn new(config: SyntheticConfig) -> Self {
        SyntheticSensor {
            config,
            tick: 0,
            stalled: false,
            reinit_count: 0,
        }
    }

    pub fn reinit_count(&self) -> u32 {
        self.reinit_count
    }

    fn strike_motion(&self, t_ms: u64) -> Vec3 {
        let period = self.config.strike_period_ms;
        if period == 0 || t_ms == 0 {
            return Vec3::ZERO;
        }

        let phase = t_ms % period;
        let direction = self.config.strike_direction.normalize();
        if phase == 0 {
            direction * self.config.strike_peak
        } else if phase == self.config.sample_interval_ms {
            direction * (self.config.strike_peak * self.config.ring_ratio)
        } else {
            Vec3::ZERO
        }
    }
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

impl SensorSource for SyntheticSensor {
    fn read_sample(&mut self) -> Result<Sample, SensorError> {
        let t_ms = self.tick * self.config.sample_interval_ms;
        self.tick += 1;

        if self.config.stall_every > 0 && self.tick % self.config.stall_every == 0 {
            self.stalled = true;
        }
        if self.stalled {
            return Ok(Sample::new(Vec3::ZERO, Vec3::ZERO, t_ms));
        }

        let accel = self.config.gravity + self.strike_motion(t_ms);
        // Small constant rotation so a healthy reading is never all-zero
        let gyro = Vec3::new(0.1, -0.1, 0.05);
        Ok(Sample::new(accel, gyro, t_ms))
    }

    fn reinitialize(&mut self) -> Result<(), SensorError> {
        self.stalled = false;
        self.reinit_count += 1;
        log::debug!("Synthetic sensor reinitialized ({} total)", self.reinit_count);
        Ok(())
    }
}

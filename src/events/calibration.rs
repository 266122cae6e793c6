// Gravity calibration
// Averages a window of at-rest readings to re-establish the gravity baseline

use serde::Serialize;
use thiserror::Error;

use crate::motion::gravity::GravityTracker;
use crate::motion::health::SampleHealthMonitor;
use crate::motion::vector::Vec3;
use crate::sensor::{Clock, SensorError, SensorSource};

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error("Calibration interrupted after {collected} samples: {reason}")]
    Interrupted { collected: usize, reason: String },

    #[error("Calibration window is empty")]
    NoSamples,
}

/// Outcome of a completed calibration
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationReport {
    /// New gravity estimate (per-axis mean)
    pub baseline: Vec3,

    /// Number of samples averaged
    pub samples: usize,

    /// Largest deviation of a sample magnitude from the mean magnitude
    pub spread: f32,

    /// False when the device visibly moved during the window.
    /// The baseline is still applied; this only flags it.
    pub steady: bool,
}

/// Blocking at-rest calibration
///
/// The new baseline is computed off to the side and only swapped into the
/// gravity tracker once the whole window has been read. A failed run leaves
/// the previous estimate untouched and can simply be retried.
pub struct CalibrationRoutine {
    samples: usize,
    sample_interval_ms: u64,
    max_spread: f32,
}

impl CalibrationRoutine {
    pub fn new(samples: usize, sample_interval_ms: u64, max_spread: f32) -> Self {
        CalibrationRoutine {
            samples,
            sample_interval_ms,
            max_spread,
        }
    }

    pub fn window_samples(&self) -> usize {
        self.samples
    }

    pub fn calibrate(
        &self,
        sensor: &mut dyn SensorSource,
        clock: &dyn Clock,
        gravity: &mut GravityTracker,
    ) -> Result<CalibrationReport, CalibrationError> {
        if self.samples == 0 {
            return Err(CalibrationError::NoSamples);
        }

        let mut sum = Vec3::ZERO;
        let mut magnitudes = Vec::with_capacity(self.samples);

        for i in 0..self.samples {
            if i > 0 {
                clock.sleep_ms(self.sample_interval_ms);
            }

            let sample = sensor.read_sample().map_err(|e| interrupted(i, &e))?;
            if SampleHealthMonitor::is_degenerate(&sample) {
                return Err(CalibrationError::Interrupted {
                    collected: i,
                    reason: "sensor returned an all-zero reading".to_string(),
                });
            }

            sum = sum + sample.acceleration;
            magnitudes.push(sample.acceleration.magnitude());
        }

        let count = self.samples as f32;
        let baseline = sum * (1.0 / count);
        let mean_magnitude = magnitudes.iter().sum::<f32>() / count;
        let spread = magnitudes
            .iter()
            .map(|m| (m - mean_magnitude).abs())
            .fold(0.0f32, f32::max);
        let steady = spread <= self.max_spread;

        if !steady {
            log::warn!(
                "Device moved during calibration (spread {:.2} m/s² > {:.2}); baseline may be skewed",
                spread,
                self.max_spread
            );
        }

        gravity.reset_to(baseline);

        log::info!(
            "Calibrated gravity to ({:.3}, {:.3}, {:.3}) |g|={:.3} over {} samples",
            baseline.x,
            baseline.y,
            baseline.z,
            baseline.magnitude(),
            self.samples
        );

        Ok(CalibrationReport {
            baseline,
            samples: self.samples,
            spread,
            steady,
        })
    }
}

fn interrupted(collected: usize, error: &SensorError) -> CalibrationError {
    CalibrationError::Interrupted {
        collected,
        reason: error.to_string(),
    }
}

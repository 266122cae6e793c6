// Replay sensor
// Feeds recorded samples from a JSON-lines file back through the pipeline

use std::collections::VecDeque;
use std::path::Path;

use crate::motion::types::Sample;
use crate::sensor::{SensorError, SensorSource};

/// Sensor backed by a finite list of recorded samples
///
/// File format is one sample per line:
/// `{"accel":[x,y,z],"gyro":[x,y,z],"timestamp_ms":n}`
pub struct ReplaySensor {
    samples: VecDeque<Sample>,
    reinit_count: u32,
}

impl ReplaySensor {
    pub fn from_samples(samples: Vec<Sample>) -> Self {
        ReplaySensor {
            samples: samples.into(),
            reinit_count: 0,
        }
    }

    /// Load a JSON-lines recording. Blank lines are skipped.
    pub fn from_path(path: &Path) -> Result<Self, SensorError> {
        let contents = std::fs::read_to_string(path)?;
        let mut samples = Vec::new();

        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }

            let sample: Sample = serde_json::from_str(line).map_err(|source| {
                SensorError::Parse {
                    line: idx + 1,
                    source,
                }
            })?;
            samples.push(sample);
        }

        log::info!("Loaded {} samples from {}", samples.len(), path.display());
        Ok(Self::from_samples(samples))
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }

    pub fn reinit_count(&self) -> u32 {
        self.reinit_count
    }
}

impl SensorSource for ReplaySensor {
    fn read_sample(&mut self) -> Result<Sample, SensorError> {
        self.samples.pop_front().ok_or(SensorError::EndOfStream)
    }

    fn reinitialize(&mut self) -> Result<(), SensorError> {
        // A recording cannot be un-stuck; zero rows simply play through
        self.reinit_count += 1;
        Ok(())
    }
}

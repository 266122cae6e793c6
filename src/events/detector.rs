// Impact detection
// Debounced threshold crossing on gravity-free motion magnitude

use serde::{Deserialize, Serialize};

use crate::motion::types::{Direction, ImpactEvent};
use crate::motion::vector::Vec3;

/// How the reported "velocity" is derived from the impact magnitude
///
/// Both are single-step approximations (magnitude × dt), not a physical
/// integral of acceleration over the strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityModel {
    /// dt is the nominal sampling interval (wire-compatible with existing consumers)
    FixedInterval,
    /// dt is the measured gap since the previous sample
    MeasuredInterval,
}

/// Tunables for the impact detector
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Motion magnitude (m/s²) that must be strictly exceeded
    pub threshold: f32,

    /// Minimum gap between accepted impacts, suppresses mechanical ringing
    /// after one physical strike. Keep it short enough for fast double hits.
    pub cooldown_ms: u64,

    /// Nominal sampling interval
    pub sample_interval_ms: u64,

    /// Static calibration offset subtracted from the magnitude
    pub magnitude_offset: f32,

    pub velocity_model: VelocityModel,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            threshold: 15.0,
            cooldown_ms: 50,
            sample_interval_ms: 10,
            magnitude_offset: 0.0,
            velocity_model: VelocityModel::FixedInterval,
        }
    }
}

/// A qualifying impact before direction classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    pub magnitude: f32,
    pub velocity: f32,
    pub timestamp_ms: u64,
    pub sequence_id: u32,
}

impl Impact {
    /// Attach the strike direction, producing the immutable event
    pub fn classified(self, direction: Direction) -> ImpactEvent {
        ImpactEvent {
            velocity: self.velocity,
            magnitude: self.magnitude,
            timestamp_ms: self.timestamp_ms,
            sequence_id: self.sequence_id,
            direction,
        }
    }
}

/// Threshold + cooldown impact detector
pub struct ImpactDetector {
    config: DetectorConfig,
    last_event_ms: Option<u64>,
    last_sample_ms: Option<u64>,
    sequence: u32,
}

impl ImpactDetector {
    pub fn new(config: DetectorConfig) -> Self {
        ImpactDetector {
            config,
            last_event_ms: None,
            last_sample_ms: None,
            sequence: 0,
        }
    }

    /// Evaluate one tick's motion vector.
    /// Fires iff magnitude > threshold and more than `cooldown_ms` has passed
    /// since the previous accepted impact.
    pub fn evaluate(&mut self, motion: Vec3, now_ms: u64) -> Option<Impact> {
        let previous_sample = self.last_sample_ms.replace(now_ms);

        let magnitude = (motion.magnitude() - self.config.magnitude_offset).max(0.0);
        if magnitude <= self.config.threshold {
            return None;
        }

        if let Some(last) = self.last_event_ms {
            if now_ms.saturating_sub(last) <= self.config.cooldown_ms {
                return None;
            }
        }

        self.last_event_ms = Some(now_ms);
        self.sequence = self.sequence.wrapping_add(1);

        let dt_ms = match (self.config.velocity_model, previous_sample) {
            (VelocityModel::MeasuredInterval, Some(prev)) if now_ms > prev => now_ms - prev,
            _ => self.config.sample_interval_ms,
        };

        Some(Impact {
            magnitude,
            velocity: magnitude * (dt_ms as f32 / 1000.0),
            timestamp_ms: now_ms,
            sequence_id: self.sequence,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.config.threshold
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.config.threshold = threshold;
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.config.cooldown_ms
    }

    /// Number of impacts accepted since boot or the last reset
    pub fn total_hits(&self) -> u32 {
        self.sequence
    }

    /// Zero the hit counter. Threshold and cooldown history are kept.
    pub fn reset_sequence(&mut self) {
        self.sequence = 0;
    }
}

impl Default for ImpactDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

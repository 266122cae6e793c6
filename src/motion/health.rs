// Sensor sample health
// Detects stalled sensor output and paces bus re-initialization

use crate::motion::types::Sample;

/// Detects degenerate sensor output
pub struct SampleHealthMonitor;

impl SampleHealthMonitor {
    /// True only when every acceleration and gyro axis reads exactly zero.
    /// A real device at rest still reads ~1g, so all-zero means a stalled bus.
    pub fn is_degenerate(sample: &Sample) -> bool {
        sample.acceleration.is_exact_zero() && sample.angular_velocity.is_exact_zero()
    }
}

/// What the sampling loop should do after a degenerate reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultAction {
    /// Drop this tick and keep going
    Skip,
    /// Drop this tick and reinitialize the sensor bus
    Reinitialize,
}

/// Recovery state for a stuck sensor
///
/// After `reset_after` consecutive degenerate samples a bus reset is requested.
/// When a reset fails the sensor is blocked and retried every `retry_ms`
/// instead of being hammered on every tick.
#[derive(Debug, Clone)]
pub struct FaultRecovery {
    reset_after: u32,
    retry_ms: u64,
    consecutive: u32,
    failed_attempts: u32,
    blocked_until: Option<u64>,
}

impl FaultRecovery {
    pub fn new(reset_after: u32, retry_ms: u64) -> Self {
        FaultRecovery {
            reset_after: reset_after.max(1),
            retry_ms,
            consecutive: 0,
            failed_attempts: 0,
            blocked_until: None,
        }
    }

    pub fn on_degenerate(&mut self) -> FaultAction {
        self.consecutive += 1;
        if self.consecutive >= self.reset_after {
            self.consecutive = 0;
            FaultAction::Reinitialize
        } else {
            FaultAction::Skip
        }
    }

    pub fn on_healthy(&mut self) {
        self.consecutive = 0;
    }

    /// Record the outcome of a reinitialization attempt
    pub fn record_reinit(&mut self, succeeded: bool, now_ms: u64) {
        if succeeded {
            self.failed_attempts = 0;
            self.blocked_until = None;
        } else {
            self.failed_attempts += 1;
            self.blocked_until = Some(now_ms + self.retry_ms);
        }
    }

    /// Sensor is waiting for a retry after a failed reset
    pub fn is_blocked(&self) -> bool {
        self.blocked_until.is_some()
    }

    /// Blocked and the retry deadline has passed
    pub fn retry_due(&self, now_ms: u64) -> bool {
        matches!(self.blocked_until, Some(until) if now_ms >= until)
    }

    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }
}

// Gravity tracking
// Exponentially smoothed estimate of the static gravity component

use crate::motion::vector::Vec3;

/// Standard gravity, used only when no calibration has ever succeeded
pub const STANDARD_GRAVITY: f32 = 9.81;

/// Smoothing factor applied per tick: g' = alpha * g + (1 - alpha) * a_raw
pub const DEFAULT_GRAVITY_ALPHA: f32 = 0.98;

/// Slowly adapting gravity estimate
///
/// Tracks orientation drift while rejecting transient impacts. The estimate is
/// only ever replaced wholesale by calibration; otherwise it moves by smoothing.
#[derive(Debug, Clone)]
pub struct GravityTracker {
    alpha: f32,
    estimate: Vec3,
}

impl GravityTracker {
    pub fn new(alpha: f32) -> Self {
        GravityTracker {
            alpha,
            estimate: Vec3::new(0.0, 0.0, STANDARD_GRAVITY),
        }
    }

    /// Fold one raw acceleration reading into the estimate (per axis)
    pub fn update(&mut self, raw_accel: Vec3) -> Vec3 {
        self.estimate = self.estimate * self.alpha + raw_accel * (1.0 - self.alpha);
        self.estimate
    }

    pub fn estimate(&self) -> Vec3 {
        self.estimate
    }

    /// Replace the estimate (calibration only)
    pub fn reset_to(&mut self, baseline: Vec3) {
        self.estimate = baseline;
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl Default for GravityTracker {
    fn default() -> Self {
        Self::new(DEFAULT_GRAVITY_ALPHA)
    }
}

// Motion module
// Vector math, sensor samples, gravity tracking and sample health

pub mod gravity;
pub mod health;
pub mod types;
pub mod vector;

pub use gravity::{GravityTracker, DEFAULT_GRAVITY_ALPHA, STANDARD_GRAVITY};
pub use health::{FaultAction, FaultRecovery, SampleHealthMonitor};
pub use types::{Direction, ImpactEvent, Sample};
pub use vector::{Axis, Vec3};

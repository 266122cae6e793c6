// Motion data types
// Sensor samples, strike directions and impact events

use serde::{Deserialize, Serialize};

use crate::motion::vector::Vec3;

/// One reading from the IMU, produced once per sampling tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Raw acceleration including gravity (m/s²)
    #[serde(rename = "accel", with = "vec3_array")]
    pub acceleration: Vec3,

    /// Angular velocity (deg/s)
    #[serde(rename = "gyro", with = "vec3_array")]
    pub angular_velocity: Vec3,

    /// Sensor timestamp in milliseconds
    pub timestamp_ms: u64,
}

impl Sample {
    pub fn new(acceleration: Vec3, angular_velocity: Vec3, timestamp_ms: u64) -> Self {
        Sample {
            acceleration,
            angular_velocity,
            timestamp_ms,
        }
    }

    /// Sample with acceleration only (gyro reads zero)
    pub fn accel_only(acceleration: Vec3, timestamp_ms: u64) -> Self {
        Sample::new(acceleration, Vec3::ZERO, timestamp_ms)
    }
}

/// Strike direction relative to gravity
/// DOWN means the stick travelled along gravity, i.e. onto a surface below it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Down,
    Up,
    LateralPosX,
    LateralNegX,
    LateralPosY,
    LateralNegY,
    LateralPosZ,
    LateralNegZ,
    /// Neither vertical nor clearly lateral
    Diagonal,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Up => "up",
            Direction::LateralPosX => "lateral_pos_x",
            Direction::LateralNegX => "lateral_neg_x",
            Direction::LateralPosY => "lateral_pos_y",
            Direction::LateralNegY => "lateral_neg_y",
            Direction::LateralPosZ => "lateral_pos_z",
            Direction::LateralNegZ => "lateral_neg_z",
            Direction::Diagonal => "diagonal",
        }
    }

    pub fn is_lateral(&self) -> bool {
        !matches!(self, Direction::Down | Direction::Up | Direction::Diagonal)
    }
}

/// A qualifying, classified impact. Immutable once emitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactEvent {
    /// Single-step velocity proxy (see `VelocityModel`), not a true integral
    pub velocity: f32,

    /// Motion magnitude (m/s²) after gravity removal
    pub magnitude: f32,

    pub timestamp_ms: u64,

    /// Hit counter value assigned to this impact
    pub sequence_id: u32,

    pub direction: Direction,
}

mod vec3_array {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::motion::vector::Vec3;

    pub fn serialize<S: Serializer>(v: &Vec3, serializer: S) -> Result<S::Ok, S::Error> {
        v.to_array().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec3, D::Error> {
        let arr = <[f32; 3]>::deserialize(deserializer)?;
        Ok(Vec3::from(arr))
    }
}

// Strike direction classifier
// Splits impacts into down / up / lateral / diagonal relative to gravity

use serde::{Deserialize, Serialize};

use crate::motion::types::Direction;
use crate::motion::vector::{Axis, Vec3};

/// Cut-points for the direction split
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// |cos| between motion and gravity above which a strike is vertical
    pub vertical_alignment: f32,

    /// Minimum normalized horizontal component for a lateral class
    pub lateral_min: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            vertical_alignment: 0.7,
            lateral_min: 0.3,
        }
    }
}

/// Which classified directions reach the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionGate {
    /// Only strikes onto a surface below the stick
    DownOnly,
    /// Everything the classifier produces
    All,
}

impl DirectionGate {
    pub fn allows(&self, direction: Direction) -> bool {
        match self {
            DirectionGate::DownOnly => direction == Direction::Down,
            DirectionGate::All => true,
        }
    }
}

/// Classification with the intermediate geometry, for logging
#[derive(Debug, Clone, Copy)]
pub struct StrikeClassification {
    pub direction: Direction,

    /// Dot product of normalized motion and gravity [-1, 1]
    pub alignment: f32,

    /// Magnitude of the motion component perpendicular to gravity
    pub horizontal: f32,
}

pub struct StrikeClassifier {
    config: ClassifierConfig,
}

impl StrikeClassifier {
    pub fn new() -> Self {
        StrikeClassifier {
            config: ClassifierConfig::default(),
        }
    }

    pub fn with_config(config: ClassifierConfig) -> Self {
        StrikeClassifier { config }
    }

    pub fn classify(&self, motion: Vec3, gravity: Vec3) -> Direction {
        self.classify_detailed(motion, gravity).direction
    }

    pub fn classify_detailed(&self, motion: Vec3, gravity: Vec3) -> StrikeClassification {
        let m = motion.normalize();
        let g = gravity.normalize();
        let alignment = m.dot(&g);

        if alignment > self.config.vertical_alignment {
            return StrikeClassification {
                direction: Direction::Down,
                alignment,
                horizontal: 0.0,
            };
        }
        if alignment < -self.config.vertical_alignment {
            return StrikeClassification {
                direction: Direction::Up,
                alignment,
                horizontal: 0.0,
            };
        }

        // Project onto the plane perpendicular to gravity
        let horizontal = m - g * alignment;
        let horizontal_mag = horizontal.magnitude();

        let direction = if horizontal_mag > self.config.lateral_min {
            lateral_direction(horizontal)
        } else {
            Direction::Diagonal
        };

        StrikeClassification {
            direction,
            alignment,
            horizontal: horizontal_mag,
        }
    }
}

impl Default for StrikeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn lateral_direction(horizontal: Vec3) -> Direction {
    let axis = horizontal.dominant_axis();
    let positive = horizontal.component(axis) >= 0.0;
    match (axis, positive) {
        (Axis::X, true) => Direction::LateralPosX,
        (Axis::X, false) => Direction::LateralNegX,
        (Axis::Y, true) => Direction::LateralPosY,
        (Axis::Y, false) => Direction::LateralNegY,
        (Axis::Z, true) => Direction::LateralPosZ,
        (Axis::Z, false) => Direction::LateralNegZ,
    }
}

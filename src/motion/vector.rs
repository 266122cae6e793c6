// Minimal 3D vector math
// Magnitude, normalization and dot product for accelerometer readings

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Vectors shorter than this are left un-normalized instead of dividing by ~0
pub const NORMALIZE_EPSILON: f32 = 0.001;

/// Cartesian axis of the sensor frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// 3-component vector in the sensor frame (m/s² for acceleration, deg/s for rotation)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Vec3 { x, y, z }
    }

    /// Euclidean norm
    pub fn magnitude(&self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn dot(&self, other: &Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Unit vector in the same direction.
    /// Vectors with magnitude below NORMALIZE_EPSILON are returned unchanged.
    pub fn normalize(&self) -> Vec3 {
        let mag = self.magnitude();
        if mag < NORMALIZE_EPSILON {
            *self
        } else {
            *self * (1.0 / mag)
        }
    }

    /// True when every component is exactly zero
    pub fn is_exact_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    pub fn component(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Axis with the largest absolute component (ties resolve X, then Y, then Z)
    pub fn dominant_axis(&self) -> Axis {
        let (ax, ay, az) = (self.x.abs(), self.y.abs(), self.z.abs());
        if ax >= ay && ax >= az {
            Axis::X
        } else if ay >= az {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    pub fn to_array(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Vec3::new(v[0], v[1], v[2])
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magnitude() {
        assert!((Vec3::new(3.0, 4.0, 0.0).magnitude() - 5.0).abs() < 1e-6);
        assert_eq!(Vec3::ZERO.magnitude(), 0.0);
    }

    #[test]
    fn test_normalize_unit_length() {
        let n = Vec3::new(0.0, 0.0, 9.8).normalize();
        assert!((n.magnitude() - 1.0).abs() < 1e-6);
        assert!((n.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_near_zero_is_unchanged() {
        let tiny = Vec3::new(0.0002, 0.0, 0.0);
        assert_eq!(tiny.normalize(), tiny);
        assert_eq!(Vec3::ZERO.normalize(), Vec3::ZERO);
    }

    #[test]
    fn test_dot_and_ops() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(-1.0, 0.5, 2.0);
        assert!((a.dot(&b) - 6.0).abs() < 1e-6);
        assert_eq!(a - a, Vec3::ZERO);
        assert_eq!(a + b, Vec3::new(0.0, 2.5, 5.0));
        assert_eq!(a * 2.0, Vec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_dominant_axis() {
        assert_eq!(Vec3::new(-5.0, 1.0, 2.0).dominant_axis(), Axis::X);
        assert_eq!(Vec3::new(0.1, -3.0, 2.0).dominant_axis(), Axis::Y);
        assert_eq!(Vec3::new(0.1, 0.2, 0.3).dominant_axis(), Axis::Z);
    }
}

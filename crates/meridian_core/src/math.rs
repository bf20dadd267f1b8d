//! Mathematical types shared by the world and the visibility code.

use std::ops::{Add, Sub};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// 3D vector - position, displacement, velocity.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f64,
    /// Y component (height)
    pub y: f64,
    /// Z component
    pub z: f64,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Orientation in degrees.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Look {
    /// Rotation around the vertical axis.
    pub yaw: f32,
    /// Rotation up/down, positive looks down.
    pub pitch: f32,
}

impl Look {
    /// Creates a new look direction.
    #[must_use]
    pub const fn new(yaw: f32, pitch: f32) -> Self {
        Self { yaw, pitch }
    }
}

/// Axis-aligned bounding volume.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a box from two corners, in any order.
    #[must_use]
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: Vec3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Vec3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Box of the given `width` (x and z) and `height` standing on `feet`.
    #[must_use]
    pub fn standing_at(feet: Vec3, width: f64, height: f64) -> Self {
        let half = width / 2.0;
        Self {
            min: Vec3::new(feet.x - half, feet.y, feet.z - half),
            max: Vec3::new(feet.x + half, feet.y + height, feet.z + half),
        }
    }

    /// Returns true if `point` is inside (inclusive).
    #[must_use]
    pub fn contains(&self, point: Vec3) -> bool {
        (self.min.x..=self.max.x).contains(&point.x)
            && (self.min.y..=self.max.y).contains(&point.y)
            && (self.min.z..=self.max.z).contains(&point.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_arithmetic() {
        let a = Vec3::new(1.0, 2.0, 2.0);
        assert!((a.length() - 3.0).abs() < 1e-12);
        assert_eq!(a - a, Vec3::ZERO);
        assert_eq!(a + Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0));
        assert!(((a - Vec3::ZERO).length() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_bounding_box_standing() {
        let bounds = BoundingBox::standing_at(Vec3::new(0.0, 10.0, 0.0), 0.6, 1.8);
        assert!(bounds.contains(Vec3::new(0.29, 11.0, -0.29)));
        assert!(!bounds.contains(Vec3::new(0.0, 9.9, 0.0)));
        assert_eq!(BoundingBox::new(bounds.max, bounds.min), bounds);
    }
}

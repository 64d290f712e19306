//! 3D Vector
//!
//! Corridor-space vector used for the player pose and entity placement.
//!
//! Axis convention:
//! - `x`: lateral offset from the corridor centre line (left negative)
//! - `y`: height above the corridor floor
//! - `z`: travel axis, increasing in the running direction

use std::fmt;
use std::ops::{Add, Neg, Sub};
use serde::{Serialize, Deserialize};

/// 3D vector with `f32` components.
#[derive(Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// Lateral component
    pub x: f32,
    /// Vertical component
    pub y: f32,
    /// Travel-axis component
    pub z: f32,
}

impl Vec3 {
    /// Zero vector
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    /// Create a new vector.
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Per-axis absolute difference to another point.
    #[inline]
    pub fn abs_diff(self, other: Self) -> Self {
        Self {
            x: (self.x - other.x).abs(),
            y: (self.y - other.y).abs(),
            z: (self.z - other.z).abs(),
        }
    }

    /// True when every component of `self` is strictly below `bounds`.
    ///
    /// This is the axis-aligned proximity test used for obstacles and
    /// collectibles.
    #[inline]
    pub fn within(self, bounds: Self) -> bool {
        self.x < bounds.x && self.y < bounds.y && self.z < bounds.z
    }

    /// Check that all components are finite.
    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Debug for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec3({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abs_diff_is_symmetric() {
        let a = Vec3::new(1.0, 2.0, 10.0);
        let b = Vec3::new(-1.0, 2.5, 8.0);

        assert_eq!(a.abs_diff(b), b.abs_diff(a));
        assert_eq!(a.abs_diff(b), Vec3::new(2.0, 0.5, 2.0));
    }

    #[test]
    fn test_within_is_strict() {
        let bounds = Vec3::new(1.2, 1.2, 1.5);

        assert!(Vec3::new(1.0, 0.0, 1.4).within(bounds));
        assert!(!Vec3::new(1.2, 0.0, 0.0).within(bounds));
        assert!(!Vec3::new(0.0, 0.0, 1.5).within(bounds));
    }

    #[test]
    fn test_ops() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        assert_eq!(a + a, Vec3::new(2.0, 4.0, 6.0));
        assert_eq!(a - a, Vec3::ZERO);
        assert_eq!(-a, Vec3::new(-1.0, -2.0, -3.0));
    }
}

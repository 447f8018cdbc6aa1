//! Geometry primitives: [`Int3`] and [`Bounds`].
//!
//! World positions are fixed-point integers: [`INT_PRECISION`] units make up
//! one world unit, so a grid with one-unit cells places its nodes 1000 apart.

use std::fmt;
use std::ops::{Add, Mul, Sub};

/// Number of integer units per world unit.
pub const INT_PRECISION: i32 = 1000;

// ---------------------------------------------------------------------------
// Int3
// ---------------------------------------------------------------------------

/// A 3D integer position. Y is up; grids lie in the XZ plane.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Int3 {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Int3 {
    /// Origin (0, 0, 0).
    pub const ZERO: Self = Self { x: 0, y: 0, z: 0 };

    /// Create a new position.
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Position of whole world units, scaled by [`INT_PRECISION`].
    #[inline]
    pub const fn from_world(x: i32, y: i32, z: i32) -> Self {
        Self::new(x * INT_PRECISION, y * INT_PRECISION, z * INT_PRECISION)
    }

    /// Squared length, computed in 64 bits so it cannot overflow.
    #[inline]
    pub fn sqr_magnitude(self) -> i64 {
        let (x, y, z) = (self.x as i64, self.y as i64, self.z as i64);
        x * x + y * y + z * z
    }

    /// Euclidean length, rounded to the nearest integer unit.
    #[inline]
    pub fn magnitude(self) -> u32 {
        (self.sqr_magnitude() as f64).sqrt().round() as u32
    }

    /// Euclidean length, rounded up. Edge costs use this so a path never
    /// costs less than the straight line between its ends.
    #[inline]
    pub fn ceil_magnitude(self) -> u32 {
        (self.sqr_magnitude() as f64).sqrt().ceil() as u32
    }

    /// Absolute per-axis differences between two positions.
    #[inline]
    pub fn abs_delta(self, other: Int3) -> (u32, u32, u32) {
        (
            self.x.abs_diff(other.x),
            self.y.abs_diff(other.y),
            self.z.abs_diff(other.z),
        )
    }
}

impl fmt::Display for Int3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl Add for Int3 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Int3 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<i32> for Int3 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: i32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// An axis-aligned box with inclusive `min` and `max` corners.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bounds {
    pub min: Int3,
    pub max: Int3,
}

impl Bounds {
    /// Create bounds from two corners, canonicalized so that `min` ≤ `max`
    /// on each axis.
    #[inline]
    pub fn new(a: Int3, b: Int3) -> Self {
        Self {
            min: Int3::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z)),
            max: Int3::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z)),
        }
    }

    /// Bounds spanning `center ± extents` on every axis.
    #[inline]
    pub fn from_center(center: Int3, extents: Int3) -> Self {
        Self::new(center - extents, center + extents)
    }

    /// Whether `p` lies inside the box (all faces inclusive).
    #[inline]
    pub fn contains(self, p: Int3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// Whether the box contains `p` when the Y axis is ignored.
    #[inline]
    pub fn contains_xz(self, p: Int3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.z >= self.min.z && p.z <= self.max.z
    }
}

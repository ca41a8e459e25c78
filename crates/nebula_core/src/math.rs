//! 2D math used by prediction and reconciliation.
//!
//! Angles are in degrees and normalised to the half-open range (-180, 180],
//! matching what the server reports for rotations.

use serde::{Deserialize, Serialize};

/// 2D vector - positions, headings, displacements.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
}

impl Vec2 {
    /// Creates a new Vec2
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Dot product
    #[inline]
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Length squared (avoids sqrt)
    #[inline]
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length
    #[inline]
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Distance to another point
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Unit vector in the same direction, or zero for a (near) zero vector.
    #[must_use]
    pub fn normalize_or_zero(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            Self::ZERO
        } else {
            self * (1.0 / len)
        }
    }

    /// Moves `t` of the way from `self` towards `target`.
    #[inline]
    #[must_use]
    pub fn lerp(self, target: Self, t: f32) -> Self {
        self + (target - self) * t
    }

    /// Returns true if both components are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Axis-aligned world rectangle.
///
/// Entities are kept inside the bounds inset by half their size. Positions are
/// clamped, never rejected.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldBounds {
    /// Left edge.
    pub min_x: f32,
    /// Top edge.
    pub min_y: f32,
    /// Right edge.
    pub max_x: f32,
    /// Bottom edge.
    pub max_y: f32,
}

impl WorldBounds {
    /// Creates bounds from two corners, in any order.
    #[must_use]
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    /// Width of the rectangle.
    #[inline]
    #[must_use]
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    /// Height of the rectangle.
    #[inline]
    #[must_use]
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// Centre point.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }

    /// Shrinks every edge by `margin`.
    ///
    /// An axis narrower than twice the margin collapses onto its centre line.
    #[must_use]
    pub fn inset(&self, margin: f32) -> Self {
        let margin = margin.max(0.0);
        let center = self.center();
        let (min_x, max_x) = if self.width() >= 2.0 * margin {
            (self.min_x + margin, self.max_x - margin)
        } else {
            (center.x, center.x)
        };
        let (min_y, max_y) = if self.height() >= 2.0 * margin {
            (self.min_y + margin, self.max_y - margin)
        } else {
            (center.y, center.y)
        };
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Clamps a point into the rectangle.
    #[must_use]
    pub fn clamp(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x.clamp(self.min_x, self.max_x),
            point.y.clamp(self.min_y, self.max_y),
        )
    }

    /// Returns true if the point lies inside or on the edge.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min_x && point.x <= self.max_x && point.y >= self.min_y && point.y <= self.max_y
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            min_x: -5000.0,
            min_y: -5000.0,
            max_x: 5000.0,
            max_y: 5000.0,
        }
    }
}

/// Normalises an angle in degrees to (-180, 180].
#[must_use]
pub fn normalize_degrees(angle: f32) -> f32 {
    let mut a = angle % 360.0;
    if a <= -180.0 {
        a += 360.0;
    } else if a > 180.0 {
        a -= 360.0;
    }
    a
}

/// Angle of a heading vector in degrees, measured from +X towards +Y.
///
/// A zero heading has no direction and maps to 0.
#[must_use]
pub fn heading_degrees(heading: Vec2) -> f32 {
    if heading.length_squared() <= f32::EPSILON {
        return 0.0;
    }
    normalize_degrees(heading.y.atan2(heading.x).to_degrees())
}

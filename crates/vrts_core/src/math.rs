//! Math utilities for the simulation core.
//!
//! All combat geometry lives here: the 2D vector type, angle normalization,
//! the frame-rate-independent decay helper used by turret drag and air
//! friction, and the parametric intersection solvers used by the damage
//! system (line-circle, line-line, line-rectangle).
//!
//! Determinism note: the simulation is single-threaded and uses no system
//! randomness, so the same binary fed the same seed and `dt_ms` sequence
//! reproduces bit-identical results. Iteration order is always sorted
//! entity ids; nothing here depends on pointer identity or hash order.

use serde::{Deserialize, Serialize};

/// Epsilon below which a line-line denominator is treated as parallel.
pub const PARALLEL_EPSILON: f32 = 1e-6;

/// 2D vector in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
}

impl Vec2 {
    /// Zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new vector.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Unit vector for an angle in radians.
    #[must_use]
    pub fn from_angle(angle: f32) -> Self {
        Self {
            x: angle.cos(),
            y: angle.sin(),
        }
    }

    /// Squared length.
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Length.
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Squared distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    /// Distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Dot product.
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Angle of this vector in radians (`atan2`).
    #[must_use]
    pub fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Normalized copy, or zero if the vector is degenerate.
    #[must_use]
    pub fn normalize_or_zero(self) -> Self {
        let len = self.length();
        if len <= f32::EPSILON {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }

    /// Scale to the given length, or zero if degenerate.
    #[must_use]
    pub fn with_length(self, len: f32) -> Self {
        let n = self.normalize_or_zero();
        Self::new(n.x * len, n.y * len)
    }

    /// Whether both components are finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Linear interpolation along the segment `self -> other`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

/// Normalize an angle into `[-PI, PI]`.
#[must_use]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % std::f32::consts::TAU;
    if a > std::f32::consts::PI {
        a -= std::f32::consts::TAU;
    } else if a < -std::f32::consts::PI {
        a += std::f32::consts::TAU;
    }
    a
}

/// Frame-rate-independent multiplicative decay factor.
///
/// Returns `(1 - rate)^(dt_seconds * 60)`, i.e. the per-frame decay `rate`
/// expressed at a 60 Hz reference rate, rescaled so the same net damping
/// happens per unit of simulated time at any tick rate.
#[must_use]
pub fn frame_decay(rate: f32, dt_seconds: f32) -> f32 {
    (1.0 - rate).max(0.0).powf(dt_seconds * 60.0)
}

/// Smallest parametric `t` in `[0, 1]` where the segment `a -> b` enters the
/// circle at `center` with radius `r`, or `None` if it never does.
///
/// A segment starting inside the circle reports `t = 0`.
#[must_use]
pub fn line_circle_t(a: Vec2, b: Vec2, center: Vec2, r: f32) -> Option<f32> {
    let d = b - a;
    let f = a - center;

    if f.length_squared() <= r * r {
        return Some(0.0);
    }

    let aa = d.length_squared();
    if aa <= f32::EPSILON {
        return None;
    }

    let bb = 2.0 * f.dot(d);
    let cc = f.length_squared() - r * r;
    let disc = bb * bb - 4.0 * aa * cc;
    if disc < 0.0 {
        return None;
    }

    let sqrt_disc = disc.sqrt();
    let t1 = (-bb - sqrt_disc) / (2.0 * aa);
    let t2 = (-bb + sqrt_disc) / (2.0 * aa);

    if (0.0..=1.0).contains(&t1) {
        Some(t1)
    } else if (0.0..=1.0).contains(&t2) {
        Some(t2)
    } else {
        None
    }
}

/// Parametric `t` along `p1 -> p2` where it crosses the segment `p3 -> p4`.
///
/// Standard cross-ratio solution; near-parallel denominators below
/// [`PARALLEL_EPSILON`] are rejected.
#[must_use]
pub fn line_line_t(p1: Vec2, p2: Vec2, p3: Vec2, p4: Vec2) -> Option<f32> {
    let denom = (p4.y - p3.y) * (p2.x - p1.x) - (p4.x - p3.x) * (p2.y - p1.y);
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }

    let ua = ((p4.x - p3.x) * (p1.y - p3.y) - (p4.y - p3.y) * (p1.x - p3.x)) / denom;
    let ub = ((p2.x - p1.x) * (p1.y - p3.y) - (p2.y - p1.y) * (p1.x - p3.x)) / denom;

    if (0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub) {
        Some(ua)
    } else {
        None
    }
}

/// Smallest parametric `t` in `[0, 1]` where the segment `a -> b` enters the
/// axis-aligned rectangle centered at `center` with the given half extents.
///
/// A segment starting inside the rectangle reports `t = 0`. Edges are tested
/// individually via [`line_line_t`].
#[must_use]
pub fn line_rect_t(a: Vec2, b: Vec2, center: Vec2, half_w: f32, half_h: f32) -> Option<f32> {
    let min = Vec2::new(center.x - half_w, center.y - half_h);
    let max = Vec2::new(center.x + half_w, center.y + half_h);

    if a.x >= min.x && a.x <= max.x && a.y >= min.y && a.y <= max.y {
        return Some(0.0);
    }

    let corners = [
        Vec2::new(min.x, min.y),
        Vec2::new(max.x, min.y),
        Vec2::new(max.x, max.y),
        Vec2::new(min.x, max.y),
    ];

    let mut best: Option<f32> = None;
    for i in 0..4 {
        let c1 = corners[i];
        let c2 = corners[(i + 1) % 4];
        if let Some(t) = line_line_t(a, b, c1, c2) {
            best = Some(match best {
                Some(prev) if prev <= t => prev,
                _ => t,
            });
        }
    }
    best
}

/// Nearest point on an axis-aligned rectangle to `p`.
#[must_use]
pub fn nearest_point_on_rect(p: Vec2, center: Vec2, half_w: f32, half_h: f32) -> Vec2 {
    Vec2::new(
        p.x.clamp(center.x - half_w, center.x + half_w),
        p.y.clamp(center.y - half_h, center.y + half_h),
    )
}

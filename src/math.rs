//! 2D Geometry Kernel
//!
//! Rotations, transforms, sweeps, and axis-aligned bounding boxes built on
//! [`glam::Vec2`]. Everything the stepper needs to place shapes in the world
//! and interpolate body motion across a time step.
//!
//! # Features
//!
//! - **Rot**: rotation stored as a unit vector (cos θ, sin θ), no repeated trig
//! - **Transform**: rotation + translation, with inverse-composition helpers
//! - **Sweep**: two positions bracketing a step, for TOI interpolation
//! - **Aabb**: 2D bounds with union, fattening, and displacement expansion

pub use glam::Vec2;

/// 2D cross product of two vectors (returns the scalar z-component).
#[inline]
#[must_use]
pub fn cross(a: Vec2, b: Vec2) -> f32 {
    a.perp_dot(b)
}

/// Cross product of a scalar (z-axis) with a vector: `s × v = s * (-v.y, v.x)`.
#[inline]
#[must_use]
pub fn cross_sv(s: f32, v: Vec2) -> Vec2 {
    s * v.perp()
}

/// Cross product of a vector with a scalar (z-axis): `v × s = (s * v.y, -s * v.x)`.
#[inline]
#[must_use]
pub fn cross_vs(v: Vec2, s: f32) -> Vec2 {
    Vec2::new(s * v.y, -s * v.x)
}

// ============================================================================
// Rot: rotation as a unit vector
// ============================================================================

/// A rotation stored as the unit vector (cos θ, sin θ).
///
/// Storing the evaluated sine/cosine pair avoids re-running trigonometry at
/// every transform application; only [`Rot::new`] pays for `sin_cos`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rot {
    /// Cosine of the rotation angle
    pub c: f32,
    /// Sine of the rotation angle
    pub s: f32,
}

impl Rot {
    /// The identity rotation (angle zero).
    pub const IDENTITY: Self = Self { c: 1.0, s: 0.0 };

    /// Create a rotation from an angle in radians.
    #[inline]
    #[must_use]
    pub fn new(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self { c, s }
    }

    /// The rotation angle in radians, in (−π, π].
    #[inline]
    #[must_use]
    pub fn angle(self) -> f32 {
        self.s.atan2(self.c)
    }

    /// The rotated x-axis: the direction this rotation maps (1, 0) to.
    #[inline]
    #[must_use]
    pub fn x_axis(self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    /// The rotated y-axis: the direction this rotation maps (0, 1) to.
    #[inline]
    #[must_use]
    pub fn y_axis(self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Compose two rotations: `self * rhs`.
    #[inline]
    #[must_use]
    pub fn mul(self, rhs: Self) -> Self {
        Self {
            c: self.c * rhs.c - self.s * rhs.s,
            s: self.s * rhs.c + self.c * rhs.s,
        }
    }

    /// Compose the inverse of `self` with `rhs`: `self⁻¹ * rhs`.
    #[inline]
    #[must_use]
    pub fn inv_mul(self, rhs: Self) -> Self {
        Self {
            c: self.c * rhs.c + self.s * rhs.s,
            s: self.c * rhs.s - self.s * rhs.c,
        }
    }

    /// Rotate a vector.
    #[inline]
    #[must_use]
    pub fn rotate(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse-rotate a vector.
    #[inline]
    #[must_use]
    pub fn inv_rotate(self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }
}

impl Default for Rot {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

// ============================================================================
// Transform
// ============================================================================

/// A rigid placement: rotation followed by translation.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Transform {
    /// Translation
    pub p: Vec2,
    /// Rotation
    pub q: Rot,
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        p: Vec2::ZERO,
        q: Rot::IDENTITY,
    };

    /// Create a transform from a translation and an angle in radians.
    #[inline]
    #[must_use]
    pub fn new(p: Vec2, angle: f32) -> Self {
        Self { p, q: Rot::new(angle) }
    }

    /// Map a point from local space to world space.
    #[inline]
    #[must_use]
    pub fn transform_point(self, v: Vec2) -> Vec2 {
        self.q.rotate(v) + self.p
    }

    /// Map a point from world space to local space.
    #[inline]
    #[must_use]
    pub fn inv_transform_point(self, v: Vec2) -> Vec2 {
        self.q.inv_rotate(v - self.p)
    }

    /// `self⁻¹ * rhs`: the transform taking `rhs`-local coordinates into
    /// `self`-local coordinates.
    #[inline]
    #[must_use]
    pub fn inv_mul(self, rhs: Self) -> Self {
        Self {
            p: self.q.inv_rotate(rhs.p - self.p),
            q: self.q.inv_mul(rhs.q),
        }
    }

    /// Whether both components are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.p.is_finite() && self.q.c.is_finite() && self.q.s.is_finite()
    }
}

// ============================================================================
// Position & Velocity
// ============================================================================

/// Linear location plus angular orientation, the solver's positional state.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Position {
    /// Location of the center of mass
    pub linear: Vec2,
    /// Orientation angle in radians (not normalized)
    pub angular: f32,
}

impl Position {
    /// Create a position.
    #[inline]
    #[must_use]
    pub const fn new(linear: Vec2, angular: f32) -> Self {
        Self { linear, angular }
    }

    /// Whether both components are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.linear.is_finite() && self.angular.is_finite()
    }
}

/// Linear plus angular velocity.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Velocity {
    /// Linear velocity of the center of mass (m/s)
    pub linear: Vec2,
    /// Angular velocity (rad/s)
    pub angular: f32,
}

impl Velocity {
    /// The zero velocity.
    pub const ZERO: Self = Self {
        linear: Vec2::ZERO,
        angular: 0.0,
    };

    /// Whether both components are finite.
    #[inline]
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.linear.is_finite() && self.angular.is_finite()
    }
}

/// Build the body transform placing `local_center` at `pos.linear` with the
/// orientation `pos.angular`.
#[inline]
#[must_use]
pub fn transform_for(pos: Position, local_center: Vec2) -> Transform {
    let q = Rot::new(pos.angular);
    Transform {
        p: pos.linear - q.rotate(local_center),
        q,
    }
}

// ============================================================================
// Sweep
// ============================================================================

/// The motion of a body's center of mass over one step.
///
/// Positions are of the center of mass; `local_center` locates that center in
/// body-local coordinates. `alpha0` is the fraction of the step already
/// consumed by TOI sub-stepping: `pos0` is the state at `alpha0`, `pos1` the
/// state at the end of the step.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Sweep {
    /// Center of mass in body-local coordinates
    pub local_center: Vec2,
    /// Position at time `alpha0`
    pub pos0: Position,
    /// Position at the end of the step
    pub pos1: Position,
    /// Fraction of the step already consumed, in [0, 1)
    pub alpha0: f32,
}

impl Sweep {
    /// A sweep at rest at the given position.
    #[inline]
    #[must_use]
    pub fn new(pos: Position, local_center: Vec2) -> Self {
        Self {
            local_center,
            pos0: pos,
            pos1: pos,
            alpha0: 0.0,
        }
    }

    /// Interpolate the position at `beta` ∈ [0, 1] between `pos0` and `pos1`.
    #[inline]
    #[must_use]
    pub fn position_at(&self, beta: f32) -> Position {
        Position {
            linear: self.pos0.linear.lerp(self.pos1.linear, beta),
            angular: self.pos0.angular + beta * (self.pos1.angular - self.pos0.angular),
        }
    }

    /// The body transform at interpolation fraction `beta` ∈ [0, 1].
    #[inline]
    #[must_use]
    pub fn transform_at(&self, beta: f32) -> Transform {
        transform_for(self.position_at(beta), self.local_center)
    }

    /// The body transform at `alpha0` (start of the remaining interval).
    #[inline]
    #[must_use]
    pub fn transform0(&self) -> Transform {
        transform_for(self.pos0, self.local_center)
    }

    /// Advance `pos0` to the absolute step fraction `alpha` ∈ [alpha0, 1).
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.pos0 = self.position_at(beta);
        self.alpha0 = alpha;
    }

    /// Reduce both angles into the same 2π window.
    ///
    /// Large accumulated angles degrade the precision of the TOI root finder;
    /// normalizing before each TOI query keeps the interpolated rotations
    /// well-conditioned.
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * core::f32::consts::PI;
        let d = two_pi * (self.pos0.angular / two_pi).floor();
        self.pos0.angular -= d;
        self.pos1.angular -= d;
    }
}

// ============================================================================
// Aabb
// ============================================================================

/// A 2D axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Aabb {
    /// Lower corner
    pub min: Vec2,
    /// Upper corner
    pub max: Vec2,
}

impl Aabb {
    /// Create an AABB from its corners.
    #[inline]
    #[must_use]
    pub const fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// The smallest AABB containing both points.
    #[inline]
    #[must_use]
    pub fn from_points(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Center point.
    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec2 {
        0.5 * (self.min + self.max)
    }

    /// Half-widths along each axis.
    #[inline]
    #[must_use]
    pub fn extents(&self) -> Vec2 {
        0.5 * (self.max - self.min)
    }

    /// Perimeter, the 2D surface-area analogue used by the tree heuristic.
    #[inline]
    #[must_use]
    pub fn perimeter(&self) -> f32 {
        let d = self.max - self.min;
        2.0 * (d.x + d.y)
    }

    /// The union of two AABBs.
    #[inline]
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Whether this AABB fully contains `other`.
    #[inline]
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    /// Whether two AABBs overlap.
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.min.y <= other.max.y
            && other.min.x <= self.max.x
            && other.min.y <= self.max.y
    }

    /// Grow the box by `margin` in every direction.
    #[inline]
    #[must_use]
    pub fn fattened(&self, margin: f32) -> Self {
        let m = Vec2::splat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Grow the box in the direction of a displacement, so a leaf moving that
    /// far next step still fits without a tree reinsertion.
    #[inline]
    #[must_use]
    pub fn displaced(&self, d: Vec2) -> Self {
        let mut out = *self;
        if d.x < 0.0 {
            out.min.x += d.x;
        } else {
            out.max.x += d.x;
        }
        if d.y < 0.0 {
            out.min.y += d.y;
        } else {
            out.max.y += d.y;
        }
        out
    }

    /// Shift the whole box by `-offset` (origin relocation).
    #[inline]
    pub fn shift_origin(&mut self, offset: Vec2) {
        self.min -= offset;
        self.max -= offset;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn test_rot_roundtrip() {
        let q = Rot::new(1.25);
        assert!((q.angle() - 1.25).abs() < EPS);
        let v = Vec2::new(3.0, -2.0);
        let back = q.inv_rotate(q.rotate(v));
        assert!((back - v).length() < EPS, "rotate/inv_rotate should cancel");
    }

    #[test]
    fn test_rot_compose() {
        let a = Rot::new(0.3);
        let b = Rot::new(0.9);
        let ab = a.mul(b);
        assert!((ab.angle() - 1.2).abs() < EPS);
        let id = a.inv_mul(a);
        assert!(id.angle().abs() < EPS);
    }

    #[test]
    fn test_transform_roundtrip() {
        let xf = Transform::new(Vec2::new(5.0, -1.0), 0.7);
        let p = Vec2::new(-2.0, 4.0);
        let back = xf.inv_transform_point(xf.transform_point(p));
        assert!((back - p).length() < EPS);
    }

    #[test]
    fn test_transform_inv_mul() {
        let a = Transform::new(Vec2::new(1.0, 2.0), 0.5);
        let b = Transform::new(Vec2::new(-3.0, 0.5), -0.25);
        let rel = a.inv_mul(b);
        let p = Vec2::new(0.25, 0.75);
        // a ∘ rel should act like b
        let via_rel = a.transform_point(rel.transform_point(p));
        let direct = b.transform_point(p);
        assert!((via_rel - direct).length() < 1e-5);
    }

    #[test]
    fn test_sweep_interpolation() {
        let mut sweep = Sweep::new(Position::new(Vec2::ZERO, 0.0), Vec2::ZERO);
        sweep.pos1 = Position::new(Vec2::new(10.0, 0.0), 1.0);

        let mid = sweep.position_at(0.5);
        assert!((mid.linear.x - 5.0).abs() < EPS);
        assert!((mid.angular - 0.5).abs() < EPS);
    }

    #[test]
    fn test_sweep_advance() {
        let mut sweep = Sweep::new(Position::new(Vec2::ZERO, 0.0), Vec2::ZERO);
        sweep.pos1 = Position::new(Vec2::new(8.0, 0.0), 0.0);

        sweep.advance(0.25);
        assert!((sweep.alpha0 - 0.25).abs() < EPS);
        assert!((sweep.pos0.linear.x - 2.0).abs() < EPS);

        // A later advance interprets alpha relative to the whole step.
        sweep.advance(0.5);
        assert!((sweep.pos0.linear.x - 4.0).abs() < EPS);
    }

    #[test]
    fn test_sweep_normalize() {
        let pi = core::f32::consts::PI;
        let mut sweep = Sweep::new(Position::new(Vec2::ZERO, 10.0 * pi), Vec2::ZERO);
        sweep.pos1.angular = 10.5 * pi;
        sweep.normalize();
        assert!(sweep.pos0.angular >= 0.0 && sweep.pos0.angular < 2.0 * pi);
        // The relative angle must be preserved.
        assert!((sweep.pos1.angular - sweep.pos0.angular - 0.5 * pi).abs() < 1e-4);
    }

    #[test]
    fn test_transform_for_offsets_center() {
        let pos = Position::new(Vec2::new(4.0, 4.0), 0.0);
        let xf = transform_for(pos, Vec2::new(1.0, 0.0));
        assert!((xf.p - Vec2::new(3.0, 4.0)).length() < EPS);
        // The local center must land on the sweep position.
        assert!((xf.transform_point(Vec2::new(1.0, 0.0)) - pos.linear).length() < EPS);
    }

    #[test]
    fn test_aabb_union_contains() {
        let a = Aabb::new(Vec2::ZERO, Vec2::ONE);
        let b = Aabb::new(Vec2::new(2.0, 2.0), Vec2::new(3.0, 3.0));
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert!(!a.overlaps(&b));
        assert!(u.overlaps(&a));
    }

    #[test]
    fn test_aabb_displaced() {
        let a = Aabb::new(Vec2::ZERO, Vec2::ONE);
        let d = a.displaced(Vec2::new(2.0, -3.0));
        assert!((d.max.x - 3.0).abs() < EPS);
        assert!((d.min.y + 3.0).abs() < EPS);
        assert!(d.min.x.abs() < EPS);
    }

    #[test]
    fn test_cross_helpers() {
        let v = Vec2::new(2.0, 0.0);
        let w = Vec2::new(0.0, 3.0);
        assert!((cross(v, w) - 6.0).abs() < EPS);
        assert!((cross_sv(1.0, v) - Vec2::new(0.0, 2.0)).length() < EPS);
        assert!((cross_vs(v, 1.0) - Vec2::new(0.0, -2.0)).length() < EPS);
    }
}

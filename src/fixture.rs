//! Fixtures
//!
//! A fixture binds a shape to a body with material properties and a collision
//! filter, and owns the broad-phase proxies standing for its shape children.

use crate::body::BodyId;
use crate::filter::Filter;
use crate::shapes::Shape;

/// Stable identifier of a fixture within its world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixtureId(pub u32);

/// Construction parameters for a fixture.
#[derive(Clone, Copy, Debug)]
pub struct FixtureDef {
    /// Mass density (kg/m²)
    pub density: f32,
    /// Coulomb friction coefficient
    pub friction: f32,
    /// Restitution (bounciness)
    pub restitution: f32,
    /// Whether the fixture senses overlap without collision response
    pub is_sensor: bool,
    /// Collision filter
    pub filter: Filter,
}

impl Default for FixtureDef {
    fn default() -> Self {
        Self {
            density: 0.0,
            friction: 0.2,
            restitution: 0.0,
            is_sensor: false,
            filter: Filter::DEFAULT,
        }
    }
}

impl FixtureDef {
    /// A solid fixture with the given density.
    #[must_use]
    pub fn with_density(density: f32) -> Self {
        Self {
            density,
            ..Default::default()
        }
    }
}

/// A (shape, body, material, filter, proxy-list) tuple.
#[derive(Clone, Debug)]
pub struct Fixture {
    pub(crate) body: BodyId,
    pub(crate) shape: Shape,
    pub(crate) density: f32,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    /// Tree node ids, one per shape child. Empty while the owning body is
    /// disabled.
    pub(crate) proxies: Vec<u32>,
}

impl Fixture {
    pub(crate) fn new(body: BodyId, shape: Shape, def: &FixtureDef) -> Self {
        Self {
            body,
            shape,
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxies: Vec::new(),
        }
    }

    /// The owning body.
    #[inline]
    #[must_use]
    pub fn body(&self) -> BodyId {
        self.body
    }

    /// The collision shape.
    #[inline]
    #[must_use]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Mass density (kg/m²).
    #[inline]
    #[must_use]
    pub fn density(&self) -> f32 {
        self.density
    }

    /// Friction coefficient.
    #[inline]
    #[must_use]
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Restitution coefficient.
    #[inline]
    #[must_use]
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Whether this fixture is a sensor.
    #[inline]
    #[must_use]
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// The collision filter.
    #[inline]
    #[must_use]
    pub fn filter(&self) -> Filter {
        self.filter
    }

    /// Broad-phase proxy ids, one per shape child.
    #[inline]
    #[must_use]
    pub fn proxies(&self) -> &[u32] {
        &self.proxies
    }
}

/// Geometric mean of two friction coefficients, so one slippery surface
/// dominates the pairing.
#[inline]
#[must_use]
pub fn mix_friction(a: f32, b: f32) -> f32 {
    (a * b).sqrt()
}

/// Restitution of a pairing: the bouncier surface wins.
#[inline]
#[must_use]
pub fn mix_restitution(a: f32, b: f32) -> f32 {
    a.max(b)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::CircleShape;

    #[test]
    fn test_fixture_defaults() {
        let f = Fixture::new(
            BodyId(0),
            Shape::Circle(CircleShape::new(1.0)),
            &FixtureDef::default(),
        );
        assert_eq!(f.density(), 0.0);
        assert!(!f.is_sensor());
        assert!(f.proxies().is_empty(), "Proxies appear when the world registers them");
    }

    #[test]
    fn test_mix_friction() {
        assert_eq!(mix_friction(0.0, 1.0), 0.0, "Frictionless surface wins");
        assert!((mix_friction(0.5, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_mix_restitution() {
        assert_eq!(mix_restitution(0.2, 0.8), 0.8, "Bouncier surface wins");
    }
}

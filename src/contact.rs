//! Contacts
//!
//! A contact pairs two fixture children whose broad-phase proxies overlap,
//! caches their manifold, and carries the flags the stepper steers by
//! (enabled, touching, sensor, impenetrable, island, needs-update,
//! needs-filtering) plus the per-step TOI state.

use crate::body::BodyId;
use crate::broad_phase::ContactKey;
use crate::fixture::FixtureId;
use crate::manifold::Manifold;

/// Stable identifier of a contact within its world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactId(pub u32);

/// A contact between two fixture children.
#[derive(Clone, Debug)]
pub struct Contact {
    pub(crate) key: ContactKey,
    pub(crate) fixture_a: FixtureId,
    pub(crate) child_a: u32,
    pub(crate) body_a: BodyId,
    pub(crate) fixture_b: FixtureId,
    pub(crate) child_b: u32,
    pub(crate) body_b: BodyId,

    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    /// Conveyor-belt style surface speed along the tangent.
    pub(crate) tangent_speed: f32,

    pub(crate) manifold: Manifold,

    pub(crate) enabled: bool,
    pub(crate) touching: bool,
    pub(crate) is_sensor: bool,
    /// At least one body must not be tunneled through (bullet or non-dynamic).
    pub(crate) impenetrable: bool,
    /// At least one body was awake when the contact was created.
    pub(crate) active: bool,
    /// Transient flag used by the island builder.
    pub(crate) islanded: bool,
    /// The narrow phase must recompute the manifold.
    pub(crate) needs_update: bool,
    /// The filter/joint state must be re-checked before the next solve.
    pub(crate) needs_filtering: bool,

    /// Cached time of impact, valid until consumed or invalidated.
    pub(crate) toi: Option<f32>,
    /// TOI sub-steps taken for this contact in the current step.
    pub(crate) toi_count: u32,
}

impl Contact {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        key: ContactKey,
        fixture_a: FixtureId,
        child_a: u32,
        body_a: BodyId,
        fixture_b: FixtureId,
        child_b: u32,
        body_b: BodyId,
        friction: f32,
        restitution: f32,
    ) -> Self {
        Self {
            key,
            fixture_a,
            child_a,
            body_a,
            fixture_b,
            child_b,
            body_b,
            friction,
            restitution,
            tangent_speed: 0.0,
            manifold: Manifold::default(),
            enabled: true,
            touching: false,
            is_sensor: false,
            impenetrable: false,
            active: false,
            islanded: false,
            needs_update: true,
            needs_filtering: false,
            toi: None,
            toi_count: 0,
        }
    }

    /// Fixture A.
    #[inline]
    #[must_use]
    pub fn fixture_a(&self) -> FixtureId {
        self.fixture_a
    }

    /// Fixture B.
    #[inline]
    #[must_use]
    pub fn fixture_b(&self) -> FixtureId {
        self.fixture_b
    }

    /// Shape child index on fixture A.
    #[inline]
    #[must_use]
    pub fn child_a(&self) -> u32 {
        self.child_a
    }

    /// Shape child index on fixture B.
    #[inline]
    #[must_use]
    pub fn child_b(&self) -> u32 {
        self.child_b
    }

    /// Body owning fixture A.
    #[inline]
    #[must_use]
    pub fn body_a(&self) -> BodyId {
        self.body_a
    }

    /// Body owning fixture B.
    #[inline]
    #[must_use]
    pub fn body_b(&self) -> BodyId {
        self.body_b
    }

    /// The cached manifold.
    #[inline]
    #[must_use]
    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    /// Whether the shapes were touching after the last narrow-phase update.
    #[inline]
    #[must_use]
    pub fn is_touching(&self) -> bool {
        self.touching
    }

    /// Whether the solver processes this contact.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether either fixture is a sensor.
    #[inline]
    #[must_use]
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// Friction for this pairing.
    #[inline]
    #[must_use]
    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// Restitution for this pairing.
    #[inline]
    #[must_use]
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    /// Cached TOI, if valid.
    #[inline]
    #[must_use]
    pub fn toi(&self) -> Option<f32> {
        self.toi
    }

    /// The other body of the pair.
    #[inline]
    #[must_use]
    pub fn other_body(&self, body: BodyId) -> BodyId {
        if self.body_a == body {
            self.body_b
        } else {
            self.body_a
        }
    }

    /// Mark for narrow-phase recomputation.
    #[inline]
    pub(crate) fn flag_for_update(&mut self) {
        self.needs_update = true;
    }

    /// Mark for filter re-evaluation.
    #[inline]
    pub(crate) fn flag_for_filtering(&mut self) {
        self.needs_filtering = true;
    }
}

/// Carry accumulated impulses from `old` into `new`.
///
/// Points are matched by contact-feature id first; any point without a
/// feature match inherits from the nearest old point by squared local
/// distance. Missed matches cost solver convergence (squishier stacking),
/// not correctness.
pub(crate) fn carry_impulses(old: &Manifold, new: &mut Manifold) {
    let old_points = old.points();
    if old_points.is_empty() {
        return;
    }

    let mut matched = [false; crate::config::MAX_MANIFOLD_POINTS];
    for (i, np) in new.points_mut().iter_mut().enumerate() {
        for op in old_points {
            if op.feature == np.feature {
                np.normal_impulse = op.normal_impulse;
                np.tangent_impulse = op.tangent_impulse;
                matched[i] = true;
                break;
            }
        }
    }

    for (i, np) in new.points_mut().iter_mut().enumerate() {
        if matched[i] {
            continue;
        }
        let mut least = f32::INFINITY;
        for op in old_points {
            let d = (op.local_point - np.local_point).length_squared();
            if d < least {
                least = d;
                np.normal_impulse = op.normal_impulse;
                np.tangent_impulse = op.tangent_impulse;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::{ContactFeature, FeatureKind, ManifoldPoint};
    use crate::math::Vec2;

    fn point(x: f32, feature_index: u8, normal_impulse: f32) -> ManifoldPoint {
        ManifoldPoint {
            local_point: Vec2::new(x, 0.0),
            normal_impulse,
            tangent_impulse: normal_impulse * 0.5,
            feature: ContactFeature::new(
                feature_index,
                FeatureKind::Face,
                feature_index,
                FeatureKind::Vertex,
            ),
        }
    }

    #[test]
    fn test_carry_by_feature_match() {
        let mut old = Manifold::default();
        old.push(point(0.0, 0, 2.0));
        old.push(point(1.0, 1, 4.0));

        let mut new = Manifold::default();
        new.push(point(5.0, 1, 0.0)); // moved, but same feature id
        carry_impulses(&old, &mut new);

        assert_eq!(new.points()[0].normal_impulse, 4.0, "Feature id match wins over distance");
    }

    #[test]
    fn test_carry_by_nearest_fallback() {
        let mut old = Manifold::default();
        old.push(point(0.0, 0, 2.0));
        old.push(point(1.0, 1, 4.0));

        let mut new = Manifold::default();
        // Unknown feature id, closer to the second old point.
        new.push(ManifoldPoint {
            local_point: Vec2::new(0.9, 0.0),
            feature: ContactFeature::new(7, FeatureKind::Vertex, 7, FeatureKind::Vertex),
            ..Default::default()
        });
        carry_impulses(&old, &mut new);

        assert_eq!(new.points()[0].normal_impulse, 4.0);
        assert_eq!(new.points()[0].tangent_impulse, 2.0);
    }

    #[test]
    fn test_carry_from_empty_old_is_noop() {
        let old = Manifold::default();
        let mut new = Manifold::default();
        new.push(point(0.0, 0, 0.0));
        carry_impulses(&old, &mut new);
        assert_eq!(new.points()[0].normal_impulse, 0.0);
    }

    #[test]
    fn test_other_body() {
        let c = Contact::new(
            ContactKey::new(0, 1),
            FixtureId(0),
            0,
            BodyId(10),
            FixtureId(1),
            0,
            BodyId(20),
            0.2,
            0.0,
        );
        assert_eq!(c.other_body(BodyId(10)), BodyId(20));
        assert_eq!(c.other_body(BodyId(20)), BodyId(10));
    }

    #[test]
    fn test_new_contact_needs_update() {
        let c = Contact::new(
            ContactKey::new(0, 1),
            FixtureId(0),
            0,
            BodyId(0),
            FixtureId(1),
            0,
            BodyId(1),
            0.2,
            0.0,
        );
        assert!(c.needs_update, "Fresh contacts must run narrow phase");
        assert!(!c.is_touching());
        assert!(c.toi().is_none());
    }
}

//! Rigid Bodies
//!
//! Kinematic state, mass properties, behavior flags, and the adjacency lists
//! (fixtures, contacts, joints) that make a body a node of the constraint
//! graph. Bodies are owned by the world and addressed by [`BodyId`].

use crate::broad_phase::ContactKey;
use crate::contact::ContactId;
use crate::fixture::FixtureId;
use crate::joint::JointId;
use crate::math::{transform_for, Position, Sweep, Transform, Vec2, Velocity};

/// Stable identifier of a body within its world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

/// How a body participates in simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BodyType {
    /// Never moves; zero velocity, infinite mass.
    Static,
    /// Moved by user-set velocity; infinite mass, unaffected by forces.
    Kinematic,
    /// Fully simulated: finite mass, forces, contacts, joints.
    #[default]
    Dynamic,
}

impl BodyType {
    /// Whether bodies of this type may have a velocity (kinematic or dynamic).
    #[inline]
    #[must_use]
    pub fn is_speedable(self) -> bool {
        !matches!(self, BodyType::Static)
    }

    /// Whether bodies of this type respond to forces (dynamic only).
    #[inline]
    #[must_use]
    pub fn is_accelerable(self) -> bool {
        matches!(self, BodyType::Dynamic)
    }
}

/// Construction parameters for a body.
#[derive(Clone, Copy, Debug)]
pub struct BodyDef {
    /// Body type
    pub body_type: BodyType,
    /// World position of the body origin
    pub position: Vec2,
    /// World angle in radians
    pub angle: f32,
    /// Initial linear velocity
    pub linear_velocity: Vec2,
    /// Initial angular velocity
    pub angular_velocity: f32,
    /// Linear velocity damping rate (1/s)
    pub linear_damping: f32,
    /// Angular velocity damping rate (1/s)
    pub angular_damping: f32,
    /// Multiplier on world gravity
    pub gravity_scale: f32,
    /// Whether this body may be put to sleep
    pub allow_sleep: bool,
    /// Whether this body starts awake
    pub awake: bool,
    /// Whether rotation is locked
    pub fixed_rotation: bool,
    /// Whether this body gets continuous collision against other dynamics
    pub bullet: bool,
    /// Whether this body starts enabled
    pub enabled: bool,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            gravity_scale: 1.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            enabled: true,
        }
    }
}

impl BodyDef {
    /// A dynamic body at `position`.
    #[must_use]
    pub fn dynamic_at(position: Vec2) -> Self {
        Self {
            body_type: BodyType::Dynamic,
            position,
            ..Default::default()
        }
    }

    /// A static body at `position`.
    #[must_use]
    pub fn static_at(position: Vec2) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

/// A rigid body.
///
/// All mutation goes through the world, which enforces the lock invariant and
/// keeps broad-phase and contact state in sync.
#[derive(Clone, Debug)]
pub struct Body {
    pub(crate) body_type: BodyType,
    pub(crate) transform: Transform,
    pub(crate) sweep: Sweep,
    pub(crate) velocity: Velocity,
    /// User-set linear acceleration (dynamic bodies only); gravity is applied
    /// on top of this by the stepper.
    pub(crate) linear_acceleration: Vec2,
    /// User-set angular acceleration (dynamic bodies only).
    pub(crate) angular_acceleration: f32,
    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) gravity_scale: f32,
    pub(crate) inv_mass: f32,
    pub(crate) inv_inertia: f32,

    pub(crate) awake: bool,
    pub(crate) enabled: bool,
    pub(crate) bullet: bool,
    pub(crate) fixed_rotation: bool,
    pub(crate) sleep_allowed: bool,
    pub(crate) mass_dirty: bool,
    /// Transient flag used by the island builder.
    pub(crate) islanded: bool,

    /// Seconds this body has been below the sleep tolerances.
    pub(crate) under_active_time: f32,

    pub(crate) fixtures: Vec<FixtureId>,
    pub(crate) contacts: Vec<(ContactKey, ContactId)>,
    pub(crate) joints: Vec<(Option<BodyId>, JointId)>,
}

impl Body {
    /// Build a body from a definition. Velocity and awake state are dropped
    /// for types that cannot carry them.
    #[must_use]
    pub(crate) fn new(def: &BodyDef) -> Self {
        let speedable = def.body_type.is_speedable();
        let transform = Transform::new(def.position, def.angle);
        Self {
            body_type: def.body_type,
            transform,
            sweep: Sweep::new(Position::new(def.position, def.angle), Vec2::ZERO),
            velocity: if speedable {
                Velocity {
                    linear: def.linear_velocity,
                    angular: def.angular_velocity,
                }
            } else {
                Velocity::ZERO
            },
            linear_acceleration: Vec2::ZERO,
            angular_acceleration: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            inv_mass: if def.body_type.is_accelerable() { 1.0 } else { 0.0 },
            inv_inertia: 0.0,
            awake: speedable && def.awake,
            enabled: def.enabled,
            bullet: def.bullet,
            fixed_rotation: def.fixed_rotation,
            sleep_allowed: def.allow_sleep,
            mass_dirty: false,
            islanded: false,
            under_active_time: 0.0,
            fixtures: Vec::new(),
            contacts: Vec::new(),
            joints: Vec::new(),
        }
    }

    // =========== Read access ===========

    /// Body type.
    #[inline]
    #[must_use]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Current transform (origin placement).
    #[inline]
    #[must_use]
    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Body-origin world position.
    #[inline]
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.transform.p
    }

    /// World angle in radians (unnormalized).
    #[inline]
    #[must_use]
    pub fn angle(&self) -> f32 {
        self.sweep.pos1.angular
    }

    /// World position of the center of mass.
    #[inline]
    #[must_use]
    pub fn world_center(&self) -> Vec2 {
        self.sweep.pos1.linear
    }

    /// Center of mass in body-local coordinates.
    #[inline]
    #[must_use]
    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    /// Current velocity.
    #[inline]
    #[must_use]
    pub fn velocity(&self) -> Velocity {
        self.velocity
    }

    /// User-set linear acceleration.
    #[inline]
    #[must_use]
    pub fn linear_acceleration(&self) -> Vec2 {
        self.linear_acceleration
    }

    /// Inverse mass (0 for non-dynamic bodies).
    #[inline]
    #[must_use]
    pub fn inv_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Inverse rotational inertia about the center of mass.
    #[inline]
    #[must_use]
    pub fn inv_inertia(&self) -> f32 {
        self.inv_inertia
    }

    /// Mass in kg (0 means infinite: static or kinematic).
    #[inline]
    #[must_use]
    pub fn mass(&self) -> f32 {
        if self.inv_mass != 0.0 {
            1.0 / self.inv_mass
        } else {
            0.0
        }
    }

    /// Whether this body is awake.
    #[inline]
    #[must_use]
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Whether this body is enabled.
    #[inline]
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether this body is continuous-collision flagged.
    #[inline]
    #[must_use]
    pub fn is_bullet(&self) -> bool {
        self.bullet
    }

    /// Whether rotation is locked.
    #[inline]
    #[must_use]
    pub fn is_fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    /// Whether sleeping is permitted.
    #[inline]
    #[must_use]
    pub fn is_sleep_allowed(&self) -> bool {
        self.sleep_allowed
    }

    /// Whether this body may move (kinematic or dynamic).
    #[inline]
    #[must_use]
    pub fn is_speedable(&self) -> bool {
        self.body_type.is_speedable()
    }

    /// Whether this body responds to forces (dynamic).
    #[inline]
    #[must_use]
    pub fn is_accelerable(&self) -> bool {
        self.body_type.is_accelerable()
    }

    /// Whether contacts of this body must be handled continuously: bullets
    /// and non-dynamic bodies cannot be allowed to tunnel.
    #[inline]
    #[must_use]
    pub fn is_impenetrable(&self) -> bool {
        self.bullet || !self.body_type.is_accelerable()
    }

    /// Seconds spent below the sleep tolerances.
    #[inline]
    #[must_use]
    pub fn under_active_time(&self) -> f32 {
        self.under_active_time
    }

    /// Whether fixture changes have outdated the stored mass data.
    #[inline]
    #[must_use]
    pub fn is_mass_dirty(&self) -> bool {
        self.mass_dirty
    }

    /// Attached fixtures.
    #[inline]
    #[must_use]
    pub fn fixtures(&self) -> &[FixtureId] {
        &self.fixtures
    }

    /// Attached contacts as (broad-phase key, contact id) pairs.
    #[inline]
    #[must_use]
    pub fn contacts(&self) -> &[(ContactKey, ContactId)] {
        &self.contacts
    }

    /// Attached joints as (other body, joint id) pairs.
    #[inline]
    #[must_use]
    pub fn joints(&self) -> &[(Option<BodyId>, JointId)] {
        &self.joints
    }

    // =========== Mutation (crate-internal; the world is the gatekeeper) ===========

    /// Wake the body and restart its under-active clock.
    pub(crate) fn set_awake(&mut self) {
        if self.body_type.is_speedable() {
            self.awake = true;
            self.under_active_time = 0.0;
        }
    }

    /// Wake without resetting the under-active clock (island traversal).
    pub(crate) fn set_awake_flag(&mut self) {
        if self.body_type.is_speedable() {
            self.awake = true;
        }
    }

    /// Put the body to sleep: clears velocity and the under-active clock.
    pub(crate) fn unset_awake(&mut self) {
        self.awake = false;
        self.under_active_time = 0.0;
        self.velocity = Velocity::ZERO;
    }

    /// Recompute the transform from `sweep.pos1`.
    pub(crate) fn synchronize_transform(&mut self) {
        self.transform = transform_for(self.sweep.pos1, self.sweep.local_center);
    }

    /// Advance the sweep to step fraction `alpha` and collapse the interval
    /// there (used when stepping a body up to its time of impact).
    pub(crate) fn advance(&mut self, alpha: f32) {
        self.sweep.advance(alpha);
        self.sweep.pos1 = self.sweep.pos0;
        self.synchronize_transform();
    }

    /// Restore a sweep snapshot taken before a speculative advance.
    pub(crate) fn restore(&mut self, sweep: Sweep) {
        self.sweep = sweep;
        self.synchronize_transform();
    }

    /// Place the body so its origin is at `transform`, resetting the sweep.
    pub(crate) fn set_placement(&mut self, transform: Transform) {
        self.transform = transform;
        let center = transform.transform_point(self.sweep.local_center);
        let angle = transform.q.angle();
        self.sweep = Sweep::new(Position::new(center, angle), self.sweep.local_center);
    }

    /// Find and remove a contact from the adjacency list.
    pub(crate) fn erase_contact(&mut self, id: ContactId) {
        self.contacts.retain(|&(_, c)| c != id);
    }

    /// Whether the adjacency list already holds a contact with this key.
    pub(crate) fn has_contact_key(&self, key: ContactKey) -> bool {
        self.contacts.iter().any(|&(k, _)| k == key)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_body_has_no_velocity() {
        let def = BodyDef {
            body_type: BodyType::Static,
            linear_velocity: Vec2::new(5.0, 0.0),
            ..Default::default()
        };
        let body = Body::new(&def);
        assert_eq!(body.velocity().linear, Vec2::ZERO, "Static bodies drop initial velocity");
        assert!(!body.is_awake(), "Static bodies are never awake");
        assert_eq!(body.inv_mass(), 0.0);
    }

    #[test]
    fn test_dynamic_body_defaults() {
        let body = Body::new(&BodyDef::dynamic_at(Vec2::new(1.0, 2.0)));
        assert!(body.is_awake());
        assert!(body.is_speedable());
        assert!(body.is_accelerable());
        assert_eq!(body.inv_mass(), 1.0, "Unit mass until fixtures contribute");
        assert_eq!(body.position(), Vec2::new(1.0, 2.0));
    }

    #[test]
    fn test_kinematic_is_speedable_not_accelerable() {
        let def = BodyDef {
            body_type: BodyType::Kinematic,
            linear_velocity: Vec2::new(1.0, 0.0),
            ..Default::default()
        };
        let body = Body::new(&def);
        assert!(body.is_speedable());
        assert!(!body.is_accelerable());
        assert_eq!(body.velocity().linear, Vec2::new(1.0, 0.0));
        assert!(body.is_impenetrable(), "Non-dynamic bodies are impenetrable");
    }

    #[test]
    fn test_bullet_is_impenetrable() {
        let def = BodyDef {
            body_type: BodyType::Dynamic,
            bullet: true,
            ..Default::default()
        };
        assert!(Body::new(&def).is_impenetrable());
        assert!(!Body::new(&BodyDef::dynamic_at(Vec2::ZERO)).is_impenetrable());
    }

    #[test]
    fn test_sleep_clears_velocity() {
        let mut body = Body::new(&BodyDef {
            body_type: BodyType::Dynamic,
            linear_velocity: Vec2::new(3.0, 0.0),
            ..Default::default()
        });
        body.unset_awake();
        assert!(!body.is_awake());
        assert_eq!(body.velocity(), Velocity::ZERO);
    }

    #[test]
    fn test_advance_collapses_sweep() {
        let mut body = Body::new(&BodyDef::dynamic_at(Vec2::ZERO));
        body.sweep.pos1 = Position::new(Vec2::new(10.0, 0.0), 0.0);
        body.advance(0.5);
        assert!((body.sweep.pos0.linear.x - 5.0).abs() < 1e-5);
        assert_eq!(body.sweep.pos0.linear, body.sweep.pos1.linear);
        assert!((body.transform.p.x - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_transform_matches_sweep_after_sync() {
        let mut body = Body::new(&BodyDef::dynamic_at(Vec2::ZERO));
        body.sweep.local_center = Vec2::new(1.0, 0.0);
        body.sweep.pos1 = Position::new(Vec2::new(4.0, 4.0), 0.0);
        body.synchronize_transform();
        // The local center must land on the sweep position.
        assert!(
            (body.transform.transform_point(Vec2::new(1.0, 0.0)) - Vec2::new(4.0, 4.0)).length()
                < 1e-5
        );
    }

    #[test]
    fn test_contact_adjacency() {
        let mut body = Body::new(&BodyDef::dynamic_at(Vec2::ZERO));
        let key = ContactKey::new(0, 1);
        body.contacts.push((key, ContactId(7)));
        assert!(body.has_contact_key(key));
        body.erase_contact(ContactId(7));
        assert!(!body.has_contact_key(key));
    }
}

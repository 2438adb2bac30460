//! The World
//!
//! The world owns every body, fixture, contact, joint, and the broad-phase
//! tree, and advances them through [`World::step`]: proxy maintenance,
//! contact discovery and destruction, narrow-phase updates, the regular
//! island solve, the continuous (TOI) solve, and sleeping.
//!
//! The world is locked for the duration of a step; every mutating call checks
//! the lock first and fails with [`PhysicsError::WrongState`] while it is
//! held. Listener callbacks run synchronously from within the step and
//! receive identifiers (plus read-only data the contract names), never the
//! world itself.

use crate::body::{Body, BodyDef, BodyId, BodyType};
use crate::broad_phase::{BroadPhase, ContactKey};
use crate::config::{StepConf, MAX_BODIES, MAX_CONTACTS, MAX_FIXTURES, MAX_JOINTS, MAX_MANIFOLD_POINTS};
use crate::contact::{carry_impulses, Contact, ContactId};
use crate::contact_solver::{
    position_constraint, solve_position_constraints, solve_velocity_constraints, store_impulses,
    velocity_constraint, warm_start, PositionConstraint, PositionSolverConf, VelocityConstraint,
};
use crate::distance::{distance, DistanceInput, SimplexCache};
use crate::dynamic_tree::LeafData;
use crate::error::PhysicsError;
use crate::filter::Filter;
use crate::fixture::{mix_friction, mix_restitution, Fixture, FixtureDef, FixtureId};
use crate::island::{integrate_positions, BodyConstraint, Island};
use crate::joint::{Joint, JointData, JointDef, JointId};
use crate::joint_extra::GearJoint;
use crate::manifold::{collide_shapes, needs_swap, Manifold};
use crate::math::{Aabb, Sweep, Transform, Vec2, Velocity};
use crate::shapes::{MassData, RayCastInput, Shape};
use crate::stats::{IslandStats, RegStepStats, StepStats, ToiStepStats};
use crate::toi::{time_of_impact, ToiConf, ToiInput, ToiState};

/// Per-contact impulses reported to the post-solve listener.
#[derive(Clone, Copy, Debug, Default)]
pub struct ContactImpulses {
    /// Accumulated normal impulses, one per manifold point.
    pub normal: [f32; MAX_MANIFOLD_POINTS],
    /// Accumulated tangent impulses, one per manifold point.
    pub tangent: [f32; MAX_MANIFOLD_POINTS],
    /// Number of valid entries.
    pub count: usize,
}

/// World construction parameters.
#[derive(Clone, Copy, Debug)]
pub struct WorldConf {
    /// Gravity applied to dynamic bodies, scaled per body.
    pub gravity: Vec2,
}

impl Default for WorldConf {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -9.81),
        }
    }
}

impl WorldConf {
    /// A world with the given gravity.
    #[must_use]
    pub fn with_gravity(gravity: Vec2) -> Self {
        Self { gravity }
    }
}

type Listener = Box<dyn FnMut(ContactId)>;
type PreSolveListener = Box<dyn FnMut(ContactId, &Manifold)>;
type PostSolveListener = Box<dyn FnMut(ContactId, &ContactImpulses, u32)>;

/// The physics world. See the module docs for the step pipeline.
pub struct World {
    gravity: Vec2,

    bodies: crate::slots::SlotAllocator<Body>,
    fixtures: crate::slots::SlotAllocator<Fixture>,
    joints: crate::slots::SlotAllocator<Joint>,
    contacts: crate::slots::SlotAllocator<Contact>,

    /// Bodies and joints in creation order, for deterministic iteration.
    body_list: Vec<BodyId>,
    joint_list: Vec<JointId>,
    /// World contact list mirroring the bodies' adjacency lists.
    contact_list: Vec<(ContactKey, ContactId)>,

    broad_phase: BroadPhase,

    /// Fixtures whose proxies must be created or destroyed next step.
    fixtures_for_proxies: Vec<FixtureId>,
    /// Bodies whose proxies must be re-synchronized next step.
    bodies_for_proxies: Vec<BodyId>,

    locked: bool,
    step_complete: bool,
    sub_stepping: bool,
    new_fixtures: bool,
    inv_dt0: f32,

    island: Island,
    body_constraints: Vec<BodyConstraint>,

    begin_contact: Option<Listener>,
    end_contact: Option<Listener>,
    pre_solve: Option<PreSolveListener>,
    post_solve: Option<PostSolveListener>,
    fixture_destruction: Option<Box<dyn FnMut(FixtureId)>>,
    joint_destruction: Option<Box<dyn FnMut(JointId)>>,
}

impl World {
    /// Create an empty world.
    #[must_use]
    pub fn new(conf: WorldConf) -> Self {
        Self {
            gravity: conf.gravity,
            bodies: crate::slots::SlotAllocator::with_capacity(64),
            fixtures: crate::slots::SlotAllocator::with_capacity(64),
            joints: crate::slots::SlotAllocator::new(),
            contacts: crate::slots::SlotAllocator::with_capacity(64),
            body_list: Vec::with_capacity(64),
            joint_list: Vec::new(),
            contact_list: Vec::with_capacity(64),
            broad_phase: BroadPhase::new(crate::config::StepConf::default().aabb_extension),
            fixtures_for_proxies: Vec::new(),
            bodies_for_proxies: Vec::new(),
            locked: false,
            step_complete: true,
            sub_stepping: false,
            new_fixtures: false,
            inv_dt0: 0.0,
            island: Island::default(),
            body_constraints: Vec::new(),
            begin_contact: None,
            end_contact: None,
            pre_solve: None,
            post_solve: None,
            fixture_destruction: None,
            joint_destruction: None,
        }
    }

    fn check_unlocked(&self, operation: &'static str) -> Result<(), PhysicsError> {
        if self.locked {
            Err(PhysicsError::WrongState { operation })
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // Listeners
    // ========================================================================

    /// Called when a contact starts touching.
    pub fn on_begin_contact(&mut self, f: impl FnMut(ContactId) + 'static) {
        self.begin_contact = Some(Box::new(f));
    }

    /// Called when a contact stops touching (including at destruction).
    pub fn on_end_contact(&mut self, f: impl FnMut(ContactId) + 'static) {
        self.end_contact = Some(Box::new(f));
    }

    /// Called for touching non-sensor contacts after each narrow-phase
    /// update, with the pre-update manifold.
    pub fn on_pre_solve(&mut self, f: impl FnMut(ContactId, &Manifold) + 'static) {
        self.pre_solve = Some(Box::new(f));
    }

    /// Called after each island solve with the contact's impulses and the
    /// position iteration count used.
    pub fn on_post_solve(&mut self, f: impl FnMut(ContactId, &ContactImpulses, u32) + 'static) {
        self.post_solve = Some(Box::new(f));
    }

    /// Called when a fixture is destroyed implicitly (body destruction or
    /// world clear).
    pub fn on_fixture_destruction(&mut self, f: impl FnMut(FixtureId) + 'static) {
        self.fixture_destruction = Some(Box::new(f));
    }

    /// Called when a joint is destroyed implicitly (body destruction or
    /// world clear).
    pub fn on_joint_destruction(&mut self, f: impl FnMut(JointId) + 'static) {
        self.joint_destruction = Some(Box::new(f));
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Whether the world is mid-step.
    #[inline]
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// World gravity.
    #[inline]
    #[must_use]
    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    /// Set world gravity and wake every dynamic body.
    pub fn set_gravity(&mut self, gravity: Vec2) -> Result<(), PhysicsError> {
        self.check_unlocked("set_gravity")?;
        if !gravity.is_finite() {
            return Err(PhysicsError::InvalidArgument {
                reason: "gravity must be finite",
            });
        }
        if self.gravity != gravity {
            self.gravity = gravity;
            for (_, body) in self.bodies.iter_mut() {
                body.set_awake();
            }
        }
        Ok(())
    }

    /// Whether the TOI loop handles one event per step and then returns.
    pub fn set_sub_stepping(&mut self, flag: bool) {
        self.sub_stepping = flag;
    }

    /// The inverse of the previous step's dt (0 before the first step).
    /// Useful for computing the `dt_ratio` of a variable-rate step.
    #[inline]
    #[must_use]
    pub fn inv_delta_time(&self) -> f32 {
        self.inv_dt0
    }

    /// Destroy every entity and reset the world to its initial state.
    /// Destruction listeners fire for each joint and fixture.
    pub fn clear(&mut self) -> Result<(), PhysicsError> {
        self.check_unlocked("clear")?;

        for id in core::mem::take(&mut self.joint_list) {
            if let Some(cb) = self.joint_destruction.as_mut() {
                cb(id);
            }
            self.joints.free(id.0);
        }
        for &id in &core::mem::take(&mut self.body_list) {
            let fixtures = self.bodies[id.0].fixtures.clone();
            for fid in fixtures {
                if let Some(cb) = self.fixture_destruction.as_mut() {
                    cb(fid);
                }
                self.fixtures.free(fid.0);
            }
            self.bodies.free(id.0);
        }
        self.contact_list.clear();
        self.contacts.clear();
        self.fixtures_for_proxies.clear();
        self.bodies_for_proxies.clear();
        self.broad_phase = BroadPhase::new(StepConf::default().aabb_extension);
        self.new_fixtures = false;
        self.step_complete = true;
        self.inv_dt0 = 0.0;
        Ok(())
    }

    /// Shift the world origin: every position becomes `position - offset`.
    /// Useful to recenter far-from-origin simulations before float precision
    /// degrades.
    pub fn shift_origin(&mut self, offset: Vec2) -> Result<(), PhysicsError> {
        self.check_unlocked("shift_origin")?;
        if !offset.is_finite() {
            return Err(PhysicsError::InvalidArgument {
                reason: "origin offset must be finite",
            });
        }

        for &id in &self.body_list {
            let body = &mut self.bodies[id.0];
            body.transform.p -= offset;
            body.sweep.pos0.linear -= offset;
            body.sweep.pos1.linear -= offset;
        }
        for (_, contact) in self.contacts.iter_mut() {
            contact.flag_for_update();
        }
        for &id in &self.joint_list {
            self.joints[id.0].shift_origin(offset);
        }
        self.broad_phase.tree.shift_origin(offset);
        Ok(())
    }

    // ========================================================================
    // Bodies
    // ========================================================================

    /// Create a body.
    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyId, PhysicsError> {
        self.check_unlocked("create_body")?;
        if !def.position.is_finite() || !def.angle.is_finite() {
            return Err(PhysicsError::InvalidArgument {
                reason: "body position/angle must be finite",
            });
        }
        if !def.linear_velocity.is_finite() || !def.angular_velocity.is_finite() {
            return Err(PhysicsError::InvalidArgument {
                reason: "body velocity must be finite",
            });
        }
        if self.bodies.len() >= MAX_BODIES {
            return Err(PhysicsError::LengthError {
                resource: "bodies",
                limit: MAX_BODIES,
            });
        }

        let id = BodyId(self.bodies.allocate(Body::new(def)));
        self.body_list.push(id);
        Ok(id)
    }

    /// Destroy a body, cascading to its joints, contacts, and fixtures.
    pub fn destroy_body(&mut self, id: BodyId) -> Result<(), PhysicsError> {
        self.check_unlocked("destroy_body")?;
        if !self.bodies.contains(id.0) {
            return Err(PhysicsError::InvalidArgument {
                reason: "unknown body id",
            });
        }

        // Joints first (they reference the body pair).
        let joints: Vec<JointId> = self.bodies[id.0].joints.iter().map(|&(_, j)| j).collect();
        for jid in joints {
            if self.joints.contains(jid.0) {
                if let Some(cb) = self.joint_destruction.as_mut() {
                    cb(jid);
                }
                self.remove_joint_internal(jid);
            }
        }

        // Contacts.
        let contacts: Vec<ContactId> =
            self.bodies[id.0].contacts.iter().map(|&(_, c)| c).collect();
        for cid in contacts {
            self.destroy_contact(cid, Some(id));
        }
        self.bodies[id.0].contacts.clear();

        // Fixtures and their proxies.
        let fixtures = self.bodies[id.0].fixtures.clone();
        for fid in fixtures {
            if let Some(cb) = self.fixture_destruction.as_mut() {
                cb(fid);
            }
            self.destroy_fixture_proxies(fid);
            self.fixtures_for_proxies.retain(|&f| f != fid);
            self.fixtures.free(fid.0);
        }

        self.bodies_for_proxies.retain(|&b| b != id);
        self.body_list.retain(|&b| b != id);
        self.bodies.free(id.0);
        Ok(())
    }

    /// Borrow a body.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id.0)
    }

    /// Bodies in creation order.
    #[must_use]
    pub fn body_ids(&self) -> &[BodyId] {
        &self.body_list
    }

    /// Change a body's type: clears its contacts, resets mass, and requests
    /// proxy resynchronization.
    pub fn set_body_type(&mut self, id: BodyId, body_type: BodyType) -> Result<(), PhysicsError> {
        if self.bodies[id.0].body_type == body_type {
            return Ok(());
        }
        self.check_unlocked("set_body_type")?;

        {
            let body = &mut self.bodies[id.0];
            body.body_type = body_type;
            if !body_type.is_speedable() {
                body.velocity = Velocity::ZERO;
                body.awake = false;
                body.sweep.pos0 = body.sweep.pos1;
            }
            if !body_type.is_accelerable() {
                body.linear_acceleration = Vec2::ZERO;
                body.angular_acceleration = 0.0;
            }
        }
        self.reset_mass_data(id)?;

        let contacts: Vec<ContactId> =
            self.bodies[id.0].contacts.iter().map(|&(_, c)| c).collect();
        for cid in contacts {
            self.destroy_contact(cid, Some(id));
        }
        self.bodies[id.0].contacts.clear();

        if body_type == BodyType::Static {
            self.bodies_for_proxies.push(id);
        } else {
            self.bodies[id.0].set_awake();
            let fixtures = self.bodies[id.0].fixtures.clone();
            for fid in fixtures {
                for &proxy in self.fixtures[fid.0].proxies.clone().iter() {
                    self.broad_phase.touch_proxy(proxy);
                }
            }
        }
        Ok(())
    }

    /// Enable or disable a body. Disabling destroys its proxies (and,
    /// transitively, its contacts) at the start of the next step.
    pub fn set_enabled(&mut self, id: BodyId, flag: bool) -> Result<(), PhysicsError> {
        if self.bodies[id.0].enabled == flag {
            return Ok(());
        }
        self.check_unlocked("set_enabled")?;
        self.bodies[id.0].enabled = flag;
        let fixtures = self.bodies[id.0].fixtures.clone();
        self.fixtures_for_proxies.extend(fixtures);
        Ok(())
    }

    /// Place a body, resetting its sweep and flagging its contacts.
    pub fn set_transform(&mut self, id: BodyId, position: Vec2, angle: f32) -> Result<(), PhysicsError> {
        self.check_unlocked("set_transform")?;
        if !position.is_finite() || !angle.is_finite() {
            return Err(PhysicsError::InvalidArgument {
                reason: "transform must be finite",
            });
        }

        let xf = Transform::new(position, angle);
        let body = &mut self.bodies[id.0];
        if body.transform == xf {
            return Ok(());
        }
        body.set_placement(xf);
        let contact_ids: Vec<ContactId> = body.contacts.iter().map(|&(_, c)| c).collect();
        for cid in contact_ids {
            self.contacts[cid.0].flag_for_update();
        }
        self.bodies_for_proxies.push(id);
        Ok(())
    }

    /// Set a body's velocity. Ignored for bodies that cannot move; wakes the
    /// body when the velocity is nonzero.
    pub fn set_velocity(&mut self, id: BodyId, velocity: Velocity) -> Result<(), PhysicsError> {
        self.check_unlocked("set_velocity")?;
        if !velocity.is_finite() {
            return Err(PhysicsError::InvalidArgument {
                reason: "velocity must be finite",
            });
        }
        let body = &mut self.bodies[id.0];
        if body.is_speedable() {
            if velocity.linear != Vec2::ZERO || velocity.angular != 0.0 {
                body.set_awake();
            }
            body.velocity = velocity;
        }
        Ok(())
    }

    /// Set a body's linear and angular acceleration. Non-zero values are
    /// ignored for bodies that cannot accelerate.
    pub fn set_acceleration(&mut self, id: BodyId, linear: Vec2, angular: f32) -> Result<(), PhysicsError> {
        self.check_unlocked("set_acceleration")?;
        if !linear.is_finite() || !angular.is_finite() {
            return Err(PhysicsError::InvalidArgument {
                reason: "acceleration must be finite",
            });
        }
        let body = &mut self.bodies[id.0];
        if !body.is_accelerable() {
            return Ok(());
        }
        if body.linear_acceleration != linear || body.angular_acceleration != angular {
            body.linear_acceleration = linear;
            body.angular_acceleration = angular;
            body.set_awake();
        }
        Ok(())
    }

    /// Wake a body or put it to sleep.
    pub fn set_awake(&mut self, id: BodyId, flag: bool) -> Result<(), PhysicsError> {
        self.check_unlocked("set_awake")?;
        let body = &mut self.bodies[id.0];
        if flag {
            body.set_awake();
        } else {
            body.unset_awake();
        }
        Ok(())
    }

    /// Toggle continuous collision for a body.
    pub fn set_bullet(&mut self, id: BodyId, flag: bool) -> Result<(), PhysicsError> {
        self.check_unlocked("set_bullet")?;
        self.bodies[id.0].bullet = flag;
        Ok(())
    }

    /// Lock or unlock a body's rotation; resets mass data.
    pub fn set_fixed_rotation(&mut self, id: BodyId, flag: bool) -> Result<(), PhysicsError> {
        self.check_unlocked("set_fixed_rotation")?;
        if self.bodies[id.0].fixed_rotation == flag {
            return Ok(());
        }
        self.bodies[id.0].fixed_rotation = flag;
        self.bodies[id.0].velocity.angular = 0.0;
        self.reset_mass_data(id)
    }

    /// Compute a body's mass data from its fixtures.
    #[must_use]
    pub fn compute_mass_data(&self, id: BodyId) -> MassData {
        let mut mass = 0.0;
        let mut center = Vec2::ZERO;
        let mut inertia = 0.0;
        for &fid in &self.bodies[id.0].fixtures {
            let fixture = &self.fixtures[fid.0];
            if fixture.density > 0.0 {
                let md = fixture.shape.mass_data(fixture.density);
                mass += md.mass;
                center += md.mass * md.center;
                inertia += md.inertia;
            }
        }
        if mass > 0.0 {
            center /= mass;
        }
        MassData {
            mass,
            center,
            inertia,
        }
    }

    /// Override a body's mass data.
    pub fn set_mass_data(&mut self, id: BodyId, mass_data: &MassData) -> Result<(), PhysicsError> {
        self.check_unlocked("set_mass_data")?;
        let body = &mut self.bodies[id.0];

        if !body.is_accelerable() {
            body.inv_mass = 0.0;
            body.inv_inertia = 0.0;
            let pos = crate::math::Position::new(body.position(), body.sweep.pos1.angular);
            body.sweep = Sweep::new(pos, Vec2::ZERO);
            body.synchronize_transform();
            body.mass_dirty = false;
            return Ok(());
        }

        let mass = if mass_data.mass > 0.0 { mass_data.mass } else { 1.0 };
        body.inv_mass = 1.0 / mass;

        if mass_data.inertia > 0.0 && !body.fixed_rotation {
            let inertia = mass_data.inertia - mass * mass_data.center.length_squared();
            debug_assert!(inertia > 0.0);
            body.inv_inertia = 1.0 / inertia;
        } else {
            body.inv_inertia = 0.0;
        }

        // Move the center of mass and fold the shift into the velocity.
        let old_center = body.world_center();
        let angle = body.sweep.pos1.angular;
        let new_center = body.transform.transform_point(mass_data.center);
        body.sweep = Sweep::new(
            crate::math::Position::new(new_center, angle),
            mass_data.center,
        );
        body.velocity.linear += crate::math::cross_sv(body.velocity.angular, new_center - old_center);
        body.mass_dirty = false;
        Ok(())
    }

    /// Recompute a body's mass data from its fixtures.
    pub fn reset_mass_data(&mut self, id: BodyId) -> Result<(), PhysicsError> {
        let mass_data = self.compute_mass_data(id);
        self.set_mass_data(id, &mass_data)
    }

    // ========================================================================
    // Fixtures
    // ========================================================================

    /// Attach a shape to a body.
    pub fn create_fixture(
        &mut self,
        body: BodyId,
        shape: Shape,
        def: &FixtureDef,
    ) -> Result<FixtureId, PhysicsError> {
        self.check_unlocked("create_fixture")?;
        if !self.bodies.contains(body.0) {
            return Err(PhysicsError::InvalidArgument {
                reason: "unknown body id",
            });
        }
        if !(def.density >= 0.0) || !def.friction.is_finite() || !def.restitution.is_finite() {
            return Err(PhysicsError::InvalidArgument {
                reason: "fixture material must be finite with non-negative density",
            });
        }
        for child in 0..shape.child_count() {
            let vr = shape.vertex_radius(child);
            if !(vr > 0.0) || !vr.is_finite() {
                return Err(PhysicsError::InvalidArgument {
                    reason: "shape vertex radius out of range",
                });
            }
        }
        if self.fixtures.len() >= MAX_FIXTURES {
            return Err(PhysicsError::LengthError {
                resource: "fixtures",
                limit: MAX_FIXTURES,
            });
        }

        let id = FixtureId(self.fixtures.allocate(Fixture::new(body, shape, def)));
        self.bodies[body.0].fixtures.push(id);

        if self.bodies[body.0].enabled {
            self.fixtures_for_proxies.push(id);
        }

        if def.density > 0.0 {
            self.bodies[body.0].mass_dirty = true;
            self.reset_mass_data(body)?;
        }

        // New contacts for this fixture are found at the start of the next
        // step.
        self.new_fixtures = true;
        Ok(id)
    }

    /// Detach and destroy a fixture: destroys its proxies, its contacts, and
    /// dirties the body's mass.
    pub fn destroy_fixture(&mut self, id: FixtureId) -> Result<(), PhysicsError> {
        self.check_unlocked("destroy_fixture")?;
        if !self.fixtures.contains(id.0) {
            return Err(PhysicsError::InvalidArgument {
                reason: "unknown fixture id",
            });
        }
        let body = self.fixtures[id.0].body;

        let contacts: Vec<ContactId> = self.bodies[body.0]
            .contacts
            .iter()
            .filter(|&&(_, cid)| {
                let c = &self.contacts[cid.0];
                c.fixture_a == id || c.fixture_b == id
            })
            .map(|&(_, c)| c)
            .collect();
        for cid in contacts {
            self.destroy_contact(cid, None);
        }

        self.fixtures_for_proxies.retain(|&f| f != id);
        self.destroy_fixture_proxies(id);

        self.bodies[body.0].fixtures.retain(|&f| f != id);
        self.fixtures.free(id.0);

        self.bodies[body.0].mass_dirty = true;
        self.reset_mass_data(body)
    }

    /// Borrow a fixture.
    #[must_use]
    pub fn fixture(&self, id: FixtureId) -> Option<&Fixture> {
        self.fixtures.get(id.0)
    }

    /// Toggle a fixture's sensor state: wakes the body and flags its contacts
    /// for update.
    pub fn set_sensor(&mut self, id: FixtureId, flag: bool) -> Result<(), PhysicsError> {
        self.check_unlocked("set_sensor")?;
        if self.fixtures[id.0].is_sensor == flag {
            return Ok(());
        }
        self.fixtures[id.0].is_sensor = flag;
        let body = self.fixtures[id.0].body;
        self.bodies[body.0].set_awake();
        let contact_ids: Vec<ContactId> =
            self.bodies[body.0].contacts.iter().map(|&(_, c)| c).collect();
        for cid in contact_ids {
            let c = &mut self.contacts[cid.0];
            c.flag_for_update();
            c.is_sensor = {
                let fa = &self.fixtures[c.fixture_a.0];
                // Both fixtures still exist while their contact does.
                fa.is_sensor || self.fixtures[c.fixture_b.0].is_sensor
            };
        }
        Ok(())
    }

    /// Replace a fixture's collision filter and flag its contacts for
    /// re-filtering.
    pub fn set_filter(&mut self, id: FixtureId, filter: Filter) -> Result<(), PhysicsError> {
        self.check_unlocked("set_filter")?;
        self.fixtures[id.0].filter = filter;
        self.refilter_fixture(id);
        Ok(())
    }

    /// Set a fixture's friction coefficient (affects new contact solves).
    pub fn set_friction(&mut self, id: FixtureId, friction: f32) -> Result<(), PhysicsError> {
        self.check_unlocked("set_friction")?;
        if !(friction >= 0.0) {
            return Err(PhysicsError::InvalidArgument {
                reason: "friction must be non-negative",
            });
        }
        self.fixtures[id.0].friction = friction;
        Ok(())
    }

    /// Set a fixture's restitution coefficient.
    pub fn set_restitution(&mut self, id: FixtureId, restitution: f32) -> Result<(), PhysicsError> {
        self.check_unlocked("set_restitution")?;
        if !restitution.is_finite() {
            return Err(PhysicsError::InvalidArgument {
                reason: "restitution must be finite",
            });
        }
        self.fixtures[id.0].restitution = restitution;
        Ok(())
    }

    /// Set a fixture's density and recompute the body's mass.
    pub fn set_density(&mut self, id: FixtureId, density: f32) -> Result<(), PhysicsError> {
        self.check_unlocked("set_density")?;
        if !(density >= 0.0) || !density.is_finite() {
            return Err(PhysicsError::InvalidArgument {
                reason: "density must be finite and non-negative",
            });
        }
        self.fixtures[id.0].density = density;
        let body = self.fixtures[id.0].body;
        self.reset_mass_data(body)
    }

    fn refilter_fixture(&mut self, id: FixtureId) {
        let body = self.fixtures[id.0].body;
        let contact_ids: Vec<ContactId> = self.bodies[body.0]
            .contacts
            .iter()
            .map(|&(_, c)| c)
            .collect();
        for cid in contact_ids {
            let c = &mut self.contacts[cid.0];
            if c.fixture_a == id || c.fixture_b == id {
                c.flag_for_filtering();
            }
        }
        for &proxy in self.fixtures[id.0].proxies.clone().iter() {
            self.broad_phase.touch_proxy(proxy);
        }
    }

    fn destroy_fixture_proxies(&mut self, id: FixtureId) {
        let proxies = core::mem::take(&mut self.fixtures[id.0].proxies);
        for proxy in proxies {
            self.broad_phase.destroy_proxy(proxy);
        }
    }

    // ========================================================================
    // Joints
    // ========================================================================

    /// Create a joint. When collide-connected is off, any existing contact
    /// between the pair is flagged for re-filtering (and destroyed next
    /// step).
    pub fn create_joint(&mut self, def: &JointDef) -> Result<JointId, PhysicsError> {
        self.check_unlocked("create_joint")?;
        if self.joints.len() >= MAX_JOINTS {
            return Err(PhysicsError::LengthError {
                resource: "joints",
                limit: MAX_JOINTS,
            });
        }

        let joint = match def {
            JointDef::Gear(gear_def) => {
                let j1 = self
                    .joints
                    .get(gear_def.joint_1.0)
                    .ok_or(PhysicsError::InvalidArgument {
                        reason: "gear references an unknown joint",
                    })?;
                let j2 = self
                    .joints
                    .get(gear_def.joint_2.0)
                    .ok_or(PhysicsError::InvalidArgument {
                        reason: "gear references an unknown joint",
                    })?;
                let body_a = j1.body_b().ok_or(PhysicsError::InvalidArgument {
                    reason: "gear base joint has no second body",
                })?;
                let body_b = j2.body_b().ok_or(PhysicsError::InvalidArgument {
                    reason: "gear base joint has no second body",
                })?;
                let xf = |id: BodyId| self.bodies[id.0].transform;
                let gear = GearJoint::from_parts(
                    gear_def,
                    j1,
                    j2,
                    xf(body_a),
                    xf(body_b),
                    xf(j1.body_a()),
                    xf(j2.body_a()),
                )
                .ok_or(PhysicsError::InvalidArgument {
                    reason: "gear base joints must be revolute or prismatic",
                })?;
                Joint {
                    body_a,
                    body_b: Some(body_b),
                    collide_connected: true,
                    islanded: false,
                    data: JointData::Gear(gear),
                }
            }
            other => Joint::new(other).expect("non-gear defs always build"),
        };

        let body_a = joint.body_a;
        let body_b = joint.body_b;
        if !self.bodies.contains(body_a.0) || body_b.is_some_and(|b| !self.bodies.contains(b.0)) {
            return Err(PhysicsError::InvalidArgument {
                reason: "joint references an unknown body",
            });
        }
        if body_b == Some(body_a) {
            return Err(PhysicsError::InvalidArgument {
                reason: "joint endpoints must be distinct bodies",
            });
        }
        let collide_connected = joint.collide_connected;

        let id = JointId(self.joints.allocate(joint));
        self.joint_list.push(id);

        self.bodies[body_a.0].joints.push((body_b, id));
        self.bodies[body_a.0].set_awake();
        if let Some(b) = body_b {
            self.bodies[b.0].joints.push((Some(body_a), id));
            self.bodies[b.0].set_awake();

            if !collide_connected {
                self.flag_contacts_for_filtering(body_a, b);
            }
        }
        Ok(id)
    }

    /// Destroy a joint. Contacts between its bodies are re-filtered so they
    /// may start colliding again.
    pub fn destroy_joint(&mut self, id: JointId) -> Result<(), PhysicsError> {
        self.check_unlocked("destroy_joint")?;
        if !self.joints.contains(id.0) {
            return Err(PhysicsError::InvalidArgument {
                reason: "unknown joint id",
            });
        }
        if self.gear_references(id) {
            return Err(PhysicsError::InvalidArgument {
                reason: "joint is referenced by a gear joint",
            });
        }
        self.remove_joint_internal(id);
        Ok(())
    }

    /// Replace a joint's definition. The kind and body pair must match.
    pub fn set_joint(&mut self, id: JointId, def: &JointDef) -> Result<(), PhysicsError> {
        self.check_unlocked("set_joint")?;
        let new_joint = Joint::new(def).ok_or(PhysicsError::InvalidArgument {
            reason: "gear joints cannot be redefined",
        })?;
        let old = self.joints.get(id.0).ok_or(PhysicsError::InvalidArgument {
            reason: "unknown joint id",
        })?;
        if old.kind() != new_joint.kind()
            || old.body_a != new_joint.body_a
            || old.body_b != new_joint.body_b
        {
            return Err(PhysicsError::InvalidArgument {
                reason: "set_joint must preserve kind and bodies",
            });
        }
        let body_a = old.body_a;
        let body_b = old.body_b;
        self.joints[id.0] = new_joint;
        self.bodies[body_a.0].set_awake();
        if let Some(b) = body_b {
            self.bodies[b.0].set_awake();
        }
        Ok(())
    }

    /// Borrow a joint.
    #[must_use]
    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id.0)
    }

    /// Joints in creation order.
    #[must_use]
    pub fn joint_ids(&self) -> &[JointId] {
        &self.joint_list
    }

    /// The (force, torque) a joint applied during the last step.
    #[must_use]
    pub fn joint_reaction(&self, id: JointId, inv_dt: f32) -> Option<(Vec2, f32)> {
        self.joints.get(id.0).map(|j| j.reaction(inv_dt))
    }

    fn gear_references(&self, id: JointId) -> bool {
        self.joints.iter().any(|(_, joint)| {
            matches!(&joint.data, JointData::Gear(g) if g.joint_1 == id || g.joint_2 == id)
        })
    }

    fn remove_joint_internal(&mut self, id: JointId) {
        let (body_a, body_b) = {
            let joint = &self.joints[id.0];
            (joint.body_a, joint.body_b)
        };

        if self.bodies.contains(body_a.0) {
            self.bodies[body_a.0].joints.retain(|&(_, j)| j != id);
            self.bodies[body_a.0].set_awake();
        }
        if let Some(b) = body_b {
            if self.bodies.contains(b.0) {
                self.bodies[b.0].joints.retain(|&(_, j)| j != id);
                self.bodies[b.0].set_awake();
                if self.bodies.contains(body_a.0) {
                    self.flag_contacts_for_filtering(body_a, b);
                }
            }
        }

        self.joint_list.retain(|&j| j != id);
        self.joints.free(id.0);
    }

    fn flag_contacts_for_filtering(&mut self, body_a: BodyId, body_b: BodyId) {
        let contact_ids: Vec<ContactId> = self.bodies[body_b.0]
            .contacts
            .iter()
            .map(|&(_, c)| c)
            .collect();
        for cid in contact_ids {
            let c = &mut self.contacts[cid.0];
            if c.other_body(body_b) == body_a {
                c.flag_for_filtering();
            }
        }
    }

    /// Whether joints allow the pair to collide (a non-collide-connected
    /// joint between the bodies forbids contact creation).
    fn should_collide_joints(&self, body_a: BodyId, body_b: BodyId) -> bool {
        self.bodies[body_a.0]
            .joints
            .iter()
            .all(|&(other, jid)| {
                other != Some(body_b) || self.joints[jid.0].collide_connected
            })
    }

    // ========================================================================
    // Contacts
    // ========================================================================

    /// Borrow a contact.
    #[must_use]
    pub fn contact(&self, id: ContactId) -> Option<&Contact> {
        self.contacts.get(id.0)
    }

    /// The world contact list as (key, id) pairs.
    #[must_use]
    pub fn contact_list(&self) -> &[(ContactKey, ContactId)] {
        &self.contact_list
    }

    /// Destroy one contact. `from` suppresses adjacency-list editing for a
    /// body that is iterating its own list.
    fn destroy_contact(&mut self, id: ContactId, from: Option<BodyId>) {
        let (touching, body_a, body_b, had_points, sensor) = {
            let c = &self.contacts[id.0];
            (
                c.touching,
                c.body_a,
                c.body_b,
                c.manifold.point_count() > 0,
                c.is_sensor,
            )
        };

        if touching {
            if let Some(cb) = self.end_contact.as_mut() {
                cb(id);
            }
        }

        if Some(body_a) != from {
            self.bodies[body_a.0].erase_contact(id);
        }
        if Some(body_b) != from {
            self.bodies[body_b.0].erase_contact(id);
        }

        if had_points && !sensor {
            // This contact may have been holding the bodies up; they need a
            // chance to move again.
            self.bodies[body_a.0].set_awake();
            self.bodies[body_b.0].set_awake();
        }

        self.contact_list.retain(|&(_, c)| c != id);
        self.contacts.free(id.0);
    }

    /// Destroy contacts whose proxies no longer overlap or whose filter state
    /// now forbids collision. Returns the number destroyed.
    fn destroy_contacts(&mut self) -> u32 {
        let mut destroyed = 0;
        let snapshot: Vec<(ContactKey, ContactId)> = self.contact_list.clone();
        for (key, id) in snapshot {
            if !self.contacts.contains(id.0) {
                continue;
            }

            if !self
                .broad_phase
                .tree
                .overlaps(ContactKey::min(&key), ContactKey::max(&key))
            {
                self.destroy_contact(id, None);
                destroyed += 1;
                continue;
            }

            if self.contacts[id.0].needs_filtering {
                let (body_a, body_b, fixture_a, fixture_b) = {
                    let c = &self.contacts[id.0];
                    (c.body_a, c.body_b, c.fixture_a, c.fixture_b)
                };
                let filter_ok = Filter::can_collide(
                    &self.fixtures[fixture_a.0].filter,
                    &self.fixtures[fixture_b.0].filter,
                );
                if !self.should_collide_joints(body_a, body_b) || !filter_ok {
                    self.destroy_contact(id, None);
                    destroyed += 1;
                    continue;
                }
                self.contacts[id.0].needs_filtering = false;
            }
        }
        destroyed
    }

    /// Sweep the broad-phase move buffer into new contacts. Returns the
    /// number created.
    fn find_new_contacts(&mut self) -> u32 {
        let keys = self.broad_phase.update_pairs();
        let mut added = 0;
        for key in keys {
            if self.add_contact(key) {
                added += 1;
            }
        }
        added
    }

    fn add_contact(&mut self, key: ContactKey) -> bool {
        let leaf_min = self.broad_phase.tree.leaf_data(ContactKey::min(&key));
        let leaf_max = self.broad_phase.tree.leaf_data(ContactKey::max(&key));
        debug_assert!(leaf_min.body != leaf_max.body);

        // Canonical ordering so the narrow phase sees its expected pairing.
        let (leaf_a, leaf_b) = {
            let shape_min = &self.fixtures[leaf_min.fixture.0].shape;
            let shape_max = &self.fixtures[leaf_max.fixture.0].shape;
            if needs_swap(shape_min, shape_max) {
                (leaf_max, leaf_min)
            } else {
                (leaf_min, leaf_max)
            }
        };

        let body_a = leaf_a.body;
        let body_b = leaf_b.body;
        if !self.should_collide_joints(body_a, body_b) {
            return false;
        }
        {
            let fa = &self.fixtures[leaf_a.fixture.0];
            let fb = &self.fixtures[leaf_b.fixture.0];
            if !Filter::can_collide(&fa.filter, &fb.filter) {
                return false;
            }
        }

        // Already have this pairing? Search the shorter adjacency list.
        {
            let ca = &self.bodies[body_a.0].contacts;
            let cb = &self.bodies[body_b.0].contacts;
            let shorter = if ca.len() < cb.len() { ca } else { cb };
            if shorter.iter().any(|&(k, _)| k == key) {
                return false;
            }
        }

        if self.contacts.len() >= MAX_CONTACTS {
            return false;
        }

        let (friction, restitution) = {
            let fa = &self.fixtures[leaf_a.fixture.0];
            let fb = &self.fixtures[leaf_b.fixture.0];
            (
                mix_friction(fa.friction, fb.friction),
                mix_restitution(fa.restitution, fb.restitution),
            )
        };

        let mut contact = Contact::new(
            key,
            leaf_a.fixture,
            leaf_a.child,
            body_a,
            leaf_b.fixture,
            leaf_b.child,
            body_b,
            friction,
            restitution,
        );
        contact.impenetrable = self.bodies[body_a.0].is_impenetrable()
            || self.bodies[body_b.0].is_impenetrable();
        contact.active =
            self.bodies[body_a.0].is_awake() || self.bodies[body_b.0].is_awake();
        contact.is_sensor = self.fixtures[leaf_a.fixture.0].is_sensor
            || self.fixtures[leaf_b.fixture.0].is_sensor;
        let sensor = contact.is_sensor;

        let id = ContactId(self.contacts.allocate(contact));
        self.contact_list.push((key, id));
        self.bodies[body_a.0].contacts.push((key, id));
        self.bodies[body_b.0].contacts.push((key, id));

        if !sensor {
            self.bodies[body_a.0].set_awake_flag();
            self.bodies[body_b.0].set_awake_flag();
        }
        true
    }

    /// Narrow-phase update of one contact: recompute the manifold (or the
    /// overlap state for sensors), carry impulses, and fire listeners.
    fn update_contact(&mut self, id: ContactId, conf: &StepConf) {
        let (fixture_a, child_a, body_a, fixture_b, child_b, body_b, sensor, old_touching) = {
            let c = &self.contacts[id.0];
            (
                c.fixture_a,
                c.child_a,
                c.body_a,
                c.fixture_b,
                c.child_b,
                c.body_b,
                c.is_sensor,
                c.touching,
            )
        };

        let xf_a = self.bodies[body_a.0].transform;
        let xf_b = self.bodies[body_b.0].transform;
        let old_manifold = self.contacts[id.0].manifold;

        let new_touching;
        if sensor {
            let proxy_a = self.fixtures[fixture_a.0].shape.child(child_a as usize);
            let proxy_b = self.fixtures[fixture_b.0].shape.child(child_b as usize);
            let mut cache = SimplexCache::default();
            let out = distance(
                &mut cache,
                &DistanceInput {
                    proxy_a: &proxy_a,
                    proxy_b: &proxy_b,
                    transform_a: xf_a,
                    transform_b: xf_b,
                    use_radii: true,
                },
                conf.max_distance_iters,
            );
            new_touching = out.distance <= 0.0 + 10.0 * f32::EPSILON;
            // Sensors never carry manifold points.
            self.contacts[id.0].manifold = Manifold::default();
        } else {
            let mut new_manifold = {
                let shape_a = &self.fixtures[fixture_a.0].shape;
                let shape_b = &self.fixtures[fixture_b.0].shape;
                collide_shapes(
                    shape_a,
                    xf_a,
                    child_a as usize,
                    shape_b,
                    xf_b,
                    child_b as usize,
                )
            };
            new_touching = new_manifold.point_count() > 0;
            carry_impulses(&old_manifold, &mut new_manifold);
            self.contacts[id.0].manifold = new_manifold;
        }

        let c = &mut self.contacts[id.0];
        c.needs_update = false;
        c.touching = new_touching;

        if !old_touching && new_touching {
            if let Some(cb) = self.begin_contact.as_mut() {
                cb(id);
            }
        } else if old_touching && !new_touching {
            if let Some(cb) = self.end_contact.as_mut() {
                cb(id);
            }
        }

        if !sensor && new_touching {
            if let Some(cb) = self.pre_solve.as_mut() {
                cb(id, &old_manifold);
            }
        }
    }

    /// Update awake contacts' narrow phase. Returns (ignored, updated,
    /// skipped).
    fn update_contacts(&mut self, conf: &StepConf) -> (u32, u32, u32) {
        let mut ignored = 0;
        let mut updated = 0;
        let mut skipped = 0;

        let snapshot: Vec<ContactId> = self.contact_list.iter().map(|&(_, c)| c).collect();
        for id in snapshot {
            let (awake_a, awake_b) = {
                let c = &self.contacts[id.0];
                (
                    self.bodies[c.body_a.0].is_awake(),
                    self.bodies[c.body_b.0].is_awake(),
                )
            };
            self.contacts[id.0].active = awake_a || awake_b;
            if !awake_a && !awake_b {
                ignored += 1;
                continue;
            }

            self.contacts[id.0].enabled = true;
            if self.contacts[id.0].needs_update {
                self.update_contact(id, conf);
                updated += 1;
            } else {
                skipped += 1;
            }
        }
        (ignored, updated, skipped)
    }

    // ========================================================================
    // Proxies
    // ========================================================================

    /// Create or destroy proxies for fixtures flagged since the last step.
    fn create_and_destroy_proxies(&mut self) {
        let queue = core::mem::take(&mut self.fixtures_for_proxies);
        for id in queue {
            if !self.fixtures.contains(id.0) {
                continue;
            }
            let body = self.fixtures[id.0].body;
            let enabled = self.bodies[body.0].enabled;

            if self.fixtures[id.0].proxies.is_empty() {
                if enabled {
                    let xf = self.bodies[body.0].transform;
                    let child_count = self.fixtures[id.0].shape.child_count();
                    let mut proxies = Vec::with_capacity(child_count);
                    for child in 0..child_count {
                        let aabb = self.fixtures[id.0].shape.compute_aabb(xf, child);
                        let proxy = self.broad_phase.create_proxy(
                            aabb,
                            LeafData {
                                body,
                                fixture: id,
                                child: child as u32,
                            },
                        );
                        proxies.push(proxy);
                    }
                    self.fixtures[id.0].proxies = proxies;
                }
            } else if !enabled {
                self.destroy_fixture_proxies(id);
                let contacts: Vec<ContactId> = self.bodies[body.0]
                    .contacts
                    .iter()
                    .filter(|&&(_, cid)| {
                        let c = &self.contacts[cid.0];
                        c.fixture_a == id || c.fixture_b == id
                    })
                    .map(|&(_, c)| c)
                    .collect();
                for cid in contacts {
                    self.destroy_contact(cid, None);
                }
            }
        }
    }

    /// Synchronize one body's proxies against its swept transforms. Returns
    /// the number of proxies moved.
    fn synchronize_body(
        &mut self,
        id: BodyId,
        xf1: Transform,
        xf2: Transform,
        multiplier: f32,
        _extension: f32,
    ) -> u32 {
        let mut moved = 0;
        let displacement = multiplier * (xf2.p - xf1.p);
        let fixtures = self.bodies[id.0].fixtures.clone();
        for fid in fixtures {
            let proxies = self.fixtures[fid.0].proxies.clone();
            for (child, proxy) in proxies.into_iter().enumerate() {
                let aabb = self.fixtures[fid.0]
                    .shape
                    .compute_swept_aabb(xf1, xf2, child);
                if self.broad_phase.update_proxy(proxy, aabb, displacement) {
                    moved += 1;
                }
            }
        }
        moved
    }

    /// Synchronize proxies for bodies flagged since the last step.
    fn synchronize_proxies(&mut self, conf: &StepConf) -> u32 {
        let mut moved = 0;
        let queue = core::mem::take(&mut self.bodies_for_proxies);
        for id in queue {
            if !self.bodies.contains(id.0) {
                continue;
            }
            let xf = self.bodies[id.0].transform;
            moved += self.synchronize_body(id, xf, xf, conf.displace_multiplier, conf.aabb_extension);
        }
        moved
    }

    // ========================================================================
    // Step
    // ========================================================================

    /// Advance the world by `conf.dt`.
    ///
    /// With `dt == 0` only bookkeeping runs (proxy maintenance, contact
    /// discovery/destruction); positions and velocities are untouched.
    pub fn step(&mut self, conf: &StepConf) -> StepStats {
        assert!(!self.locked, "step is not reentrant");
        let mut stats = StepStats::default();

        self.locked = true;
        self.broad_phase.tree.margin = conf.aabb_extension;

        self.create_and_destroy_proxies();
        stats.pre.proxies_moved = self.synchronize_proxies(conf);
        stats.pre.contacts_destroyed = self.destroy_contacts();

        if self.new_fixtures {
            self.new_fixtures = false;
            stats.pre.contacts_added = self.find_new_contacts();
        }

        if conf.dt != 0.0 {
            self.inv_dt0 = 1.0 / conf.dt;

            let (ignored, updated, skipped) = self.update_contacts(conf);
            stats.pre.contacts_ignored = ignored;
            stats.pre.contacts_updated = updated;
            stats.pre.contacts_skipped = skipped;

            if self.step_complete {
                stats.reg = self.solve_reg(conf);
            }

            if conf.do_toi {
                stats.toi = self.solve_toi(conf);
            }
        }

        self.locked = false;
        stats
    }

    // ========================================================================
    // Regular solve
    // ========================================================================

    fn solve_reg(&mut self, conf: &StepConf) -> RegStepStats {
        let mut stats = RegStepStats::default();

        for (_, body) in self.bodies.iter_mut() {
            body.islanded = false;
        }
        for (_, contact) in self.contacts.iter_mut() {
            contact.islanded = false;
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.islanded = false;
        }

        // Build and solve islands from every not-yet-islanded awake seed.
        let seeds: Vec<BodyId> = self.body_list.clone();
        let mut island = core::mem::take(&mut self.island);
        for seed in seeds {
            if self.bodies[seed.0].islanded
                || !self.bodies[seed.0].is_awake()
                || !self.bodies[seed.0].is_enabled()
            {
                continue;
            }
            debug_assert!(self.bodies[seed.0].is_speedable());

            stats.islands_found += 1;
            island.clear();
            self.build_island(&mut island, seed);

            // Static bodies may participate in several islands per step.
            for &id in &island.bodies {
                if !self.bodies[id.0].is_speedable() {
                    self.bodies[id.0].islanded = false;
                }
            }

            let results = self.solve_reg_island(conf, &island);
            stats.absorb(&results);
        }
        self.island = island;

        // Re-synchronize the proxies of everything that may have moved.
        for &id in &self.body_list.clone() {
            if !self.bodies[id.0].islanded || !self.bodies[id.0].is_speedable() {
                continue;
            }
            let xf1 = self.bodies[id.0].sweep.transform0();
            let xf2 = self.bodies[id.0].transform;
            stats.proxies_moved +=
                self.synchronize_body(id, xf1, xf2, conf.displace_multiplier, conf.aabb_extension);
        }

        stats.contacts_added = self.find_new_contacts();
        stats
    }

    /// Depth-first traversal of the contact graph from a seed body.
    fn build_island(&mut self, island: &mut Island, seed: BodyId) {
        let mut stack = vec![seed];
        self.bodies[seed.0].islanded = true;

        while let Some(body_id) = stack.pop() {
            island.bodies.push(body_id);

            // Static bodies anchor islands but never extend them.
            if !self.bodies[body_id.0].is_speedable() {
                continue;
            }
            self.bodies[body_id.0].set_awake_flag();

            let contacts: Vec<(ContactKey, ContactId)> = self.bodies[body_id.0].contacts.clone();
            for (_, cid) in contacts {
                if self.contacts[cid.0].islanded {
                    continue;
                }
                let c = &self.contacts[cid.0];
                if !c.enabled || !c.touching || c.is_sensor {
                    continue;
                }
                let other = c.other_body(body_id);
                self.contacts[cid.0].islanded = true;
                island.contacts.push(cid);
                if !self.bodies[other.0].islanded {
                    self.bodies[other.0].islanded = true;
                    stack.push(other);
                }
            }

            let joints: Vec<(Option<BodyId>, JointId)> = self.bodies[body_id.0].joints.clone();
            for (other, jid) in joints {
                if self.joints[jid.0].islanded {
                    continue;
                }
                if let Some(other) = other {
                    if !self.bodies[other.0].is_enabled() {
                        continue;
                    }
                    self.joints[jid.0].islanded = true;
                    island.joints.push(jid);
                    if !self.bodies[other.0].islanded {
                        self.bodies[other.0].islanded = true;
                        stack.push(other);
                    }
                } else {
                    self.joints[jid.0].islanded = true;
                    island.joints.push(jid);
                }
            }
        }
    }

    /// Snapshot the island's bodies into constraint records, folding in
    /// gravity and damping for accelerable awake bodies.
    fn snapshot_bodies(&mut self, island_bodies: &[BodyId], h: f32) {
        self.body_constraints
            .resize(self.bodies.slot_count(), BodyConstraint::default());
        for &id in island_bodies {
            let body = &self.bodies[id.0];
            let mut velocity = body.velocity;
            if h != 0.0 && body.is_accelerable() && body.is_awake() {
                let linear_acc = self.gravity * body.gravity_scale + body.linear_acceleration;
                velocity.linear += h * linear_acc;
                velocity.angular += h * body.angular_acceleration;
                velocity.linear /= 1.0 + h * body.linear_damping;
                velocity.angular /= 1.0 + h * body.angular_damping;
            }
            self.body_constraints[id.0 as usize] = BodyConstraint {
                position: body.sweep.pos1,
                velocity,
                inv_mass: body.inv_mass,
                inv_inertia: body.inv_inertia,
                local_center: body.sweep.local_center,
            };
        }
    }

    fn build_contact_constraints(
        &self,
        contacts: &[ContactId],
        conf: &StepConf,
        bodies: &[BodyConstraint],
        warm_start_scale: f32,
    ) -> (Vec<PositionConstraint>, Vec<VelocityConstraint>) {
        let mut pos = Vec::with_capacity(contacts.len());
        let mut vel = Vec::with_capacity(contacts.len());
        for &cid in contacts {
            let c = &self.contacts[cid.0];
            let radius_a = self.fixtures[c.fixture_a.0]
                .shape
                .vertex_radius(c.child_a as usize);
            let radius_b = self.fixtures[c.fixture_b.0]
                .shape
                .vertex_radius(c.child_b as usize);
            pos.push(position_constraint(
                cid, &c.manifold, c.body_a, radius_a, c.body_b, radius_b,
            ));
            vel.push(velocity_constraint(
                cid,
                &c.manifold,
                c.body_a,
                radius_a,
                c.body_b,
                radius_b,
                c.friction,
                c.restitution,
                c.tangent_speed,
                bodies,
                conf.velocity_threshold,
                warm_start_scale,
            ));
        }
        (pos, vel)
    }

    /// Copy island results back into the bodies; flag contacts of bodies
    /// whose transform actually changed.
    fn write_back_island(&mut self, island_bodies: &[BodyId]) {
        for &id in island_bodies {
            let bc = self.body_constraints[id.0 as usize];
            let body = &mut self.bodies[id.0];
            body.velocity = bc.velocity;
            body.sweep.pos1 = bc.position;
            let old_xf = body.transform;
            body.synchronize_transform();
            if body.transform != old_xf {
                let contact_ids: Vec<ContactId> =
                    body.contacts.iter().map(|&(_, c)| c).collect();
                for cid in contact_ids {
                    self.contacts[cid.0].flag_for_update();
                }
            }
        }
    }

    fn report_post_solve(
        &mut self,
        contacts: &[ContactId],
        constraints: &[VelocityConstraint],
        iterations: u32,
    ) {
        if self.post_solve.is_none() {
            return;
        }
        for (i, &cid) in contacts.iter().enumerate() {
            let vc = &constraints[i];
            let mut impulses = ContactImpulses {
                count: vc.point_count,
                ..Default::default()
            };
            for p in 0..vc.point_count {
                impulses.normal[p] = vc.points[p].normal_impulse;
                impulses.tangent[p] = vc.points[p].tangent_impulse;
            }
            if let Some(cb) = self.post_solve.as_mut() {
                cb(cid, &impulses, iterations);
            }
        }
    }

    fn solve_reg_island(&mut self, conf: &StepConf, island: &Island) -> IslandStats {
        let mut results = IslandStats::default();
        let h = conf.dt;

        // Open a fresh sweep interval for this step.
        for &id in &island.bodies {
            let body = &mut self.bodies[id.0];
            body.sweep.pos0 = body.sweep.pos1;
            body.sweep.alpha0 = 0.0;
        }

        self.snapshot_bodies(&island.bodies, h);
        // The constraint buffer moves out for the solve so joints (stored on
        // self) can mutate it without aliasing.
        let mut constraints = core::mem::take(&mut self.body_constraints);
        let warm_scale = if conf.do_warm_start { conf.dt_ratio } else { 0.0 };
        let (pos_constraints, mut vel_constraints) =
            self.build_contact_constraints(&island.contacts, conf, &constraints, warm_scale);

        if conf.do_warm_start {
            warm_start(&mut vel_constraints, &mut constraints);
        }

        for &jid in &island.joints {
            self.joints[jid.0].init_velocity(&mut constraints, conf);
        }

        results.velocity_iterations = conf.reg_velocity_iterations;
        for i in 0..conf.reg_velocity_iterations {
            let mut joints_okay = true;
            for &jid in &island.joints {
                joints_okay &= self.joints[jid.0].solve_velocity(&mut constraints, conf);
            }

            let inc = solve_velocity_constraints(&mut vel_constraints, &mut constraints);
            results.max_inc_impulse = results.max_inc_impulse.max(inc);

            if joints_okay && inc <= conf.reg_min_momentum {
                results.velocity_iterations = i + 1;
                break;
            }
        }

        integrate_positions(
            &island.bodies,
            &mut constraints,
            h,
            conf.max_translation,
            conf.max_rotation,
        );

        let ps_conf = PositionSolverConf {
            resolution_rate: conf.reg_resolution_rate(),
            linear_slop: conf.linear_slop,
            max_correction: conf.max_linear_correction,
        };
        results.position_iterations = conf.reg_position_iterations;
        for i in 0..conf.reg_position_iterations {
            let min_separation =
                solve_position_constraints(&pos_constraints, &mut constraints, &ps_conf);
            results.min_separation = results.min_separation.min(min_separation);
            let contacts_okay = min_separation >= conf.reg_min_separation;

            let mut joints_okay = true;
            for &jid in &island.joints {
                joints_okay &= self.joints[jid.0].solve_position(&mut constraints, conf);
            }

            if contacts_okay && joints_okay {
                results.position_iterations = i + 1;
                results.solved = true;
                break;
            }
        }

        self.body_constraints = constraints;

        // Impulses back into the manifolds for next-step warm starting.
        for (i, &cid) in island.contacts.iter().enumerate() {
            store_impulses(&vel_constraints[i], &mut self.contacts[cid.0].manifold);
        }

        self.write_back_island(&island.bodies);
        self.report_post_solve(
            &island.contacts,
            &vel_constraints,
            if results.solved {
                results.position_iterations
            } else {
                u32::MAX
            },
        );

        // Sleeping: the whole island sleeps when everything in it has been
        // still long enough and the solve converged.
        let mut min_under_active = f32::INFINITY;
        for &id in &island.bodies {
            let body = &mut self.bodies[id.0];
            if !body.is_speedable() {
                continue;
            }
            let under_active = body.sleep_allowed
                && body.velocity.angular.abs() <= conf.angular_sleep_tolerance
                && body.velocity.linear.length_squared()
                    <= conf.linear_sleep_tolerance * conf.linear_sleep_tolerance;
            body.under_active_time = if under_active {
                body.under_active_time + h
            } else {
                0.0
            };
            min_under_active = min_under_active.min(body.under_active_time);
        }
        if min_under_active >= conf.min_still_time && results.solved {
            for &id in &island.bodies {
                let body = &mut self.bodies[id.0];
                if body.is_speedable() && body.is_awake() {
                    body.unset_awake();
                    results.bodies_slept += 1;
                }
            }
        }

        results
    }

    // ========================================================================
    // TOI solve
    // ========================================================================

    fn solve_toi(&mut self, conf: &StepConf) -> ToiStepStats {
        let mut stats = ToiStepStats::default();

        if self.step_complete {
            for (_, body) in self.bodies.iter_mut() {
                body.islanded = false;
                body.sweep.alpha0 = 0.0;
            }
            for (_, contact) in self.contacts.iter_mut() {
                contact.islanded = false;
                contact.toi = None;
                contact.toi_count = 0;
            }
        }

        // Find TOI events and solve them, soonest first.
        loop {
            let update = self.update_contact_tois(conf);
            stats.contacts_at_max_sub_steps += update.at_max_sub_steps;
            stats.contacts_updated_toi += update.updated;
            stats.max_distance_iterations = stats.max_distance_iterations.max(update.max_dist_iters);
            stats.max_toi_iterations = stats.max_toi_iterations.max(update.max_toi_iters);
            stats.max_root_iterations = stats.max_root_iterations.max(update.max_root_iters);

            let Some((next, _, count)) = self.soonest_contact() else {
                // No more TOI events within this step. Done.
                self.step_complete = true;
                break;
            };
            stats.contacts_found += count;

            if !self.contacts[next.0].islanded {
                let results = self.solve_toi_contact(next, conf);
                stats.min_separation = stats.min_separation.min(results.min_separation);
                stats.max_inc_impulse = stats.max_inc_impulse.max(results.max_inc_impulse);
                stats.islands_solved += u32::from(results.solved);
                stats.sum_position_iterations += results.position_iterations;
                stats.sum_velocity_iterations += results.velocity_iterations;
                if results.position_iterations > 0 || results.velocity_iterations > 0 {
                    stats.islands_found += 1;
                }
                stats.contacts_updated_touching += results.contacts_updated;
                stats.contacts_skipped_touching += results.contacts_skipped;
            }

            // Reset island flags and re-synchronize moved bodies' proxies.
            for &id in &self.body_list.clone() {
                if !self.bodies[id.0].islanded {
                    continue;
                }
                self.bodies[id.0].islanded = false;
                if !self.bodies[id.0].is_accelerable() {
                    continue;
                }
                let xf1 = self.bodies[id.0].sweep.transform0();
                let xf2 = self.bodies[id.0].transform;
                stats.proxies_moved += self.synchronize_body(
                    id,
                    xf1,
                    xf2,
                    conf.displace_multiplier,
                    conf.aabb_extension,
                );
                let contact_ids: Vec<ContactId> = self.bodies[id.0]
                    .contacts
                    .iter()
                    .map(|&(_, c)| c)
                    .collect();
                for cid in contact_ids {
                    let c = &mut self.contacts[cid.0];
                    c.toi = None;
                    c.islanded = false;
                }
            }

            stats.contacts_added += self.find_new_contacts();

            if self.sub_stepping {
                self.step_complete = false;
                break;
            }
        }
        stats
    }

    fn update_contact_tois(&mut self, conf: &StepConf) -> ToiUpdateData {
        let mut data = ToiUpdateData::default();

        let snapshot: Vec<ContactId> = self.contact_list.iter().map(|&(_, c)| c).collect();
        for cid in snapshot {
            let c = &self.contacts[cid.0];
            if c.toi.is_some() {
                continue;
            }
            if !c.enabled || c.is_sensor || !c.active || !c.impenetrable {
                continue;
            }
            if c.toi_count >= conf.max_sub_steps {
                data.at_max_sub_steps += 1;
                continue;
            }

            let (body_a, body_b, fixture_a, child_a, fixture_b, child_b) =
                (c.body_a, c.body_b, c.fixture_a, c.child_a, c.fixture_b, c.child_b);

            // Put both sweeps onto the same interval; no unresolved impact
            // can predate the later of the two alpha0 values.
            let alpha0 = self.bodies[body_a.0]
                .sweep
                .alpha0
                .max(self.bodies[body_b.0].sweep.alpha0);
            debug_assert!(alpha0 < 1.0);
            self.bodies[body_a.0].sweep.advance(alpha0);
            self.bodies[body_b.0].sweep.advance(alpha0);
            self.bodies[body_a.0].sweep.normalize();
            self.bodies[body_b.0].sweep.normalize();

            let proxy_a = self.fixtures[fixture_a.0].shape.child(child_a as usize);
            let proxy_b = self.fixtures[fixture_b.0].shape.child(child_b as usize);
            let output = time_of_impact(
                &ToiInput {
                    proxy_a: &proxy_a,
                    sweep_a: self.bodies[body_a.0].sweep,
                    proxy_b: &proxy_b,
                    sweep_b: self.bodies[body_b.0].sweep,
                    t_max: 1.0,
                },
                &ToiConf {
                    linear_slop: conf.linear_slop,
                    max_toi_iters: conf.max_toi_iters,
                    max_root_iters: conf.max_root_iters,
                    max_distance_iters: conf.max_distance_iters,
                },
            );

            // A broken TOI counts as no impact for this contact.
            let toi = if output.state == ToiState::Touching {
                (alpha0 + (1.0 - alpha0) * output.t).min(1.0)
            } else {
                1.0
            };
            self.contacts[cid.0].toi = Some(toi);

            data.max_dist_iters = data.max_dist_iters.max(output.stats.max_dist_iters);
            data.max_toi_iters = data.max_toi_iters.max(output.stats.toi_iters);
            data.max_root_iters = data.max_root_iters.max(output.stats.max_root_iters);
            data.updated += 1;
        }
        data
    }

    /// The contact with the smallest cached TOI below 1, with the count of
    /// ties at that minimum.
    fn soonest_contact(&self) -> Option<(ContactId, f32, u32)> {
        let mut min_toi = 1.0 - f32::EPSILON;
        let mut found = None;
        let mut count = 0;
        for &(_, cid) in &self.contact_list {
            if let Some(toi) = self.contacts[cid.0].toi {
                if toi < min_toi {
                    min_toi = toi;
                    found = Some(cid);
                    count = 1;
                } else if found.is_some() && toi == min_toi {
                    count += 1;
                }
            }
        }
        found.map(|cid| (cid, min_toi, count))
    }

    fn solve_toi_contact(&mut self, contact_id: ContactId, conf: &StepConf) -> IslandStats {
        let mut contacts_updated = 0;
        let mut contacts_skipped = 0;

        let (toi, body_a, body_b) = {
            let c = &self.contacts[contact_id.0];
            (c.toi.unwrap_or(1.0), c.body_a, c.body_b)
        };

        // Advance the bodies to the impact time and confirm the contact.
        {
            let backup_a = self.bodies[body_a.0].sweep;
            let backup_b = self.bodies[body_b.0].sweep;

            self.bodies[body_a.0].advance(toi);
            self.flag_body_contacts(body_a);
            self.bodies[body_b.0].advance(toi);
            self.flag_body_contacts(body_b);

            self.contacts[contact_id.0].enabled = true;
            if self.contacts[contact_id.0].needs_update {
                self.update_contact(contact_id, conf);
                contacts_updated += 1;
            } else {
                contacts_skipped += 1;
            }
            self.contacts[contact_id.0].toi = None;
            self.contacts[contact_id.0].toi_count += 1;

            if !self.contacts[contact_id.0].enabled || !self.contacts[contact_id.0].touching {
                // The advance didn't produce an impact after all. Put the
                // bodies back and move on.
                self.contacts[contact_id.0].enabled = false;
                self.bodies[body_a.0].restore(backup_a);
                self.bodies[body_b.0].restore(backup_b);
                return IslandStats {
                    contacts_updated,
                    contacts_skipped,
                    ..Default::default()
                };
            }
        }

        self.bodies[body_a.0].set_awake_flag();
        self.bodies[body_b.0].set_awake_flag();

        // Seed the TOI island with the two impact bodies.
        let mut island = core::mem::take(&mut self.island);
        island.clear();
        self.bodies[body_a.0].islanded = true;
        self.bodies[body_b.0].islanded = true;
        self.contacts[contact_id.0].islanded = true;
        island.bodies.push(body_a);
        island.bodies.push(body_b);
        island.contacts.push(contact_id);

        for id in [body_a, body_b] {
            if self.bodies[id.0].is_accelerable() {
                let out = self.process_toi_contacts(id, &mut island, toi, conf);
                contacts_updated += out.0;
                contacts_skipped += out.1;
            }
        }

        for &id in &island.bodies {
            if !self.bodies[id.0].is_speedable() {
                self.bodies[id.0].islanded = false;
            }
        }

        // Solve the sub-step over the remainder of the step.
        let mut sub_conf = *conf;
        sub_conf.dt = (1.0 - toi) * conf.dt;
        let mut results = self.solve_toi_island(&island, &sub_conf);
        self.island = island;
        results.contacts_updated += contacts_updated;
        results.contacts_skipped += contacts_skipped;
        results
    }

    fn flag_body_contacts(&mut self, id: BodyId) {
        let contact_ids: Vec<ContactId> =
            self.bodies[id.0].contacts.iter().map(|&(_, c)| c).collect();
        for cid in contact_ids {
            self.contacts[cid.0].flag_for_update();
        }
    }

    /// Grow a TOI island along one impact body's other contacts, advancing
    /// and validating the other endpoints on the way.
    fn process_toi_contacts(
        &mut self,
        id: BodyId,
        island: &mut Island,
        toi: f32,
        conf: &StepConf,
    ) -> (u32, u32) {
        let mut updated = 0;
        let mut skipped = 0;
        let body_impenetrable = self.bodies[id.0].is_impenetrable();

        let contacts: Vec<ContactId> =
            self.bodies[id.0].contacts.iter().map(|&(_, c)| c).collect();
        for cid in contacts {
            if self.contacts[cid.0].islanded || self.contacts[cid.0].is_sensor {
                continue;
            }
            let other = self.contacts[cid.0].other_body(id);
            if !body_impenetrable && !self.bodies[other.0].is_impenetrable() {
                continue;
            }

            let other_islanded = self.bodies[other.0].islanded;
            let backup = self.bodies[other.0].sweep;
            if !other_islanded {
                self.bodies[other.0].advance(toi);
                self.flag_body_contacts(other);
            }

            self.contacts[cid.0].enabled = true;
            if self.contacts[cid.0].needs_update {
                self.update_contact(cid, conf);
                updated += 1;
            } else {
                skipped += 1;
            }

            if !self.contacts[cid.0].enabled || !self.contacts[cid.0].touching {
                self.bodies[other.0].restore(backup);
                continue;
            }

            self.contacts[cid.0].islanded = true;
            island.contacts.push(cid);
            if !other_islanded {
                if self.bodies[other.0].is_speedable() {
                    self.bodies[other.0].set_awake_flag();
                }
                self.bodies[other.0].islanded = true;
                island.bodies.push(other);
            }
        }
        (updated, skipped)
    }

    /// Sub-stepped Gauss-Seidel solve of a TOI island.
    fn solve_toi_island(&mut self, island: &Island, conf: &StepConf) -> IslandStats {
        let mut results = IslandStats::default();

        // The regular phase already integrated velocities; snapshot as-is.
        self.snapshot_bodies(&island.bodies, 0.0);

        let (pos_constraints, _) =
            self.build_contact_constraints(&island.contacts, conf, &self.body_constraints, 0.0);

        // Pull the bodies apart first, to the tighter TOI tolerance.
        let ps_conf = PositionSolverConf {
            resolution_rate: conf.toi_resolution_rate(),
            linear_slop: conf.linear_slop,
            max_correction: conf.max_linear_correction,
        };
        results.position_iterations = conf.toi_position_iterations;
        for i in 0..conf.toi_position_iterations {
            let min_separation =
                solve_position_constraints(&pos_constraints, &mut self.body_constraints, &ps_conf);
            results.min_separation = results.min_separation.min(min_separation);
            if min_separation >= conf.toi_min_separation {
                results.position_iterations = i + 1;
                results.solved = true;
                break;
            }
        }

        // Commit the corrected state as the new sweep start.
        for &id in &island.bodies {
            let bc = self.body_constraints[id.0 as usize];
            let body = &mut self.bodies[id.0];
            body.sweep.pos0 = bc.position;
        }

        // Velocity constraints are rebuilt at the corrected positions; TOI
        // solves neither warm start nor store impulses (they can be huge).
        let (_, mut vel_constraints) =
            self.build_contact_constraints(&island.contacts, conf, &self.body_constraints, 0.0);
        results.velocity_iterations = conf.toi_velocity_iterations;
        for i in 0..conf.toi_velocity_iterations {
            let inc = solve_velocity_constraints(&mut vel_constraints, &mut self.body_constraints);
            results.max_inc_impulse = results.max_inc_impulse.max(inc);
            if inc <= conf.toi_min_momentum {
                results.velocity_iterations = i + 1;
                break;
            }
        }

        integrate_positions(
            &island.bodies,
            &mut self.body_constraints,
            conf.dt,
            conf.max_translation,
            conf.max_rotation,
        );

        self.write_back_island(&island.bodies);
        self.report_post_solve(
            &island.contacts,
            &vel_constraints,
            results.position_iterations,
        );

        results
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Visit every fixture whose fat proxy AABB overlaps `aabb`. The visitor
    /// returns false to stop.
    pub fn query_aabb(&self, aabb: &Aabb, mut visitor: impl FnMut(FixtureId) -> bool) {
        self.broad_phase.tree.query(aabb, |proxy| {
            let data = self.broad_phase.tree.leaf_data(proxy);
            visitor(data.fixture)
        });
    }

    /// Cast a segment through the world. For each fixture hit, the visitor
    /// receives (fixture, point, normal, fraction) and returns a new clipping
    /// fraction: 0 terminates, the incoming fraction continues, anything
    /// in between clips the remaining segment.
    pub fn ray_cast(
        &self,
        p1: Vec2,
        p2: Vec2,
        mut visitor: impl FnMut(FixtureId, Vec2, Vec2, f32) -> f32,
    ) {
        let input = RayCastInput {
            p1,
            p2,
            max_fraction: 1.0,
        };
        self.broad_phase.tree.ray_cast(&input, |sub_input, proxy| {
            let data = self.broad_phase.tree.leaf_data(proxy);
            let fixture = &self.fixtures[data.fixture.0];
            let xf = self.bodies[data.body.0].transform;
            match fixture
                .shape
                .ray_cast(sub_input, xf, data.child as usize)
            {
                Some(hit) => {
                    let point = sub_input.p1 + hit.fraction * (sub_input.p2 - sub_input.p1);
                    visitor(data.fixture, point, hit.normal, hit.fraction)
                }
                None => sub_input.max_fraction,
            }
        });
    }

    /// The fat broad-phase AABB stored for one shape child of a fixture.
    /// `None` while the fixture has no proxies (body disabled, or no step
    /// has run since creation).
    #[must_use]
    pub fn fixture_aabb(&self, id: FixtureId, child: usize) -> Option<Aabb> {
        let fixture = self.fixtures.get(id.0)?;
        let proxy = *fixture.proxies.get(child)?;
        Some(self.broad_phase.tree.get_aabb(proxy))
    }

    /// Internal access for the query helpers.
    pub(crate) fn query_parts(
        &self,
    ) -> (
        &crate::dynamic_tree::DynamicTree,
        &crate::slots::SlotAllocator<Fixture>,
        &crate::slots::SlotAllocator<Body>,
    ) {
        (&self.broad_phase.tree, &self.fixtures, &self.bodies)
    }
}

#[derive(Default)]
struct ToiUpdateData {
    updated: u32,
    at_max_sub_steps: u32,
    max_dist_iters: u32,
    max_toi_iters: u32,
    max_root_iters: u32,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::CircleShape;

    fn disk_world() -> (World, BodyId, FixtureId) {
        let mut world = World::new(WorldConf::with_gravity(Vec2::ZERO));
        let body = world
            .create_body(&BodyDef::dynamic_at(Vec2::ZERO))
            .expect("create body");
        let fixture = world
            .create_fixture(
                body,
                Shape::Circle(CircleShape::new(0.5)),
                &FixtureDef::with_density(1.0),
            )
            .expect("create fixture");
        (world, body, fixture)
    }

    #[test]
    fn test_create_body_assigns_stable_ids() {
        let mut world = World::new(WorldConf::default());
        let a = world.create_body(&BodyDef::default()).unwrap();
        let b = world.create_body(&BodyDef::default()).unwrap();
        assert_ne!(a, b);
        world.destroy_body(a).unwrap();
        assert!(world.body(a).is_none());
        assert!(world.body(b).is_some());
    }

    #[test]
    fn test_nan_position_rejected() {
        let mut world = World::new(WorldConf::default());
        let def = BodyDef {
            position: Vec2::new(f32::NAN, 0.0),
            ..Default::default()
        };
        assert!(matches!(
            world.create_body(&def),
            Err(PhysicsError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_fixture_updates_mass() {
        let (world, body, _) = disk_world();
        let b = world.body(body).unwrap();
        let expect = core::f32::consts::PI * 0.25;
        assert!((b.mass() - expect).abs() < 1e-4, "Disk mass = ρπr²");
    }

    #[test]
    fn test_step_creates_contact_for_overlap() {
        let (mut world, _, _) = disk_world();
        let other = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(0.5, 0.0)))
            .unwrap();
        world
            .create_fixture(
                other,
                Shape::Circle(CircleShape::new(0.5)),
                &FixtureDef::with_density(1.0),
            )
            .unwrap();

        world.step(&StepConf::default());
        assert_eq!(world.contact_list().len(), 1);
        let (_, cid) = world.contact_list()[0];
        assert!(world.contact(cid).unwrap().is_touching());
    }

    #[test]
    fn test_zero_dt_step_is_bookkeeping_only() {
        let (mut world, body, _) = disk_world();
        world
            .set_velocity(
                body,
                Velocity {
                    linear: Vec2::new(3.0, 0.0),
                    angular: 0.0,
                },
            )
            .unwrap();
        let before = world.body(body).unwrap().position();
        let conf = StepConf::default().with_dt(0.0, 0.0);
        world.step(&conf);
        world.step(&conf);
        assert_eq!(world.body(body).unwrap().position(), before);
        assert_eq!(world.body(body).unwrap().velocity().linear, Vec2::new(3.0, 0.0));
    }

    #[test]
    fn test_gravity_pulls_dynamic_bodies() {
        let mut world = World::new(WorldConf::with_gravity(Vec2::new(0.0, -10.0)));
        let body = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(0.0, 10.0)))
            .unwrap();
        world
            .create_fixture(
                body,
                Shape::Circle(CircleShape::new(0.5)),
                &FixtureDef::with_density(1.0),
            )
            .unwrap();

        let conf = StepConf::default();
        for _ in 0..60 {
            world.step(&conf);
        }
        assert!(
            world.body(body).unwrap().position().y < 5.0,
            "Body should have fallen, y = {}",
            world.body(body).unwrap().position().y
        );
    }

    #[test]
    fn test_static_bodies_do_not_fall() {
        let mut world = World::new(WorldConf::with_gravity(Vec2::new(0.0, -10.0)));
        let body = world.create_body(&BodyDef::static_at(Vec2::ZERO)).unwrap();
        world
            .create_fixture(
                body,
                Shape::Circle(CircleShape::new(0.5)),
                &FixtureDef::default(),
            )
            .unwrap();
        for _ in 0..10 {
            world.step(&StepConf::default());
        }
        assert_eq!(world.body(body).unwrap().position(), Vec2::ZERO);
    }

    #[test]
    fn test_joint_disables_pair_collision() {
        let (mut world, a, _) = disk_world();
        let b = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(0.5, 0.0)))
            .unwrap();
        world
            .create_fixture(
                b,
                Shape::Circle(CircleShape::new(0.5)),
                &FixtureDef::with_density(1.0),
            )
            .unwrap();

        world
            .create_joint(&JointDef::Distance(crate::joint::DistanceJointDef::new(
                a, b, 0.5,
            )))
            .unwrap();

        world.step(&StepConf::default());
        assert_eq!(
            world.contact_list().len(),
            0,
            "Non-collide-connected joint forbids the contact"
        );
    }

    #[test]
    fn test_destroying_joint_restores_collision() {
        let (mut world, a, _) = disk_world();
        let b = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(0.5, 0.0)))
            .unwrap();
        world
            .create_fixture(
                b,
                Shape::Circle(CircleShape::new(0.5)),
                &FixtureDef::with_density(1.0),
            )
            .unwrap();
        let joint = world
            .create_joint(&JointDef::Distance(crate::joint::DistanceJointDef::new(
                a, b, 0.5,
            )))
            .unwrap();
        world.step(&StepConf::default());
        assert_eq!(world.contact_list().len(), 0);

        world.destroy_joint(joint).unwrap();
        world.step(&StepConf::default());
        assert_eq!(world.contact_list().len(), 1, "Contact returns after joint removal");
    }

    #[test]
    fn test_ray_cast_hits_fixture() {
        let (mut world, _, fixture) = disk_world();
        world.step(&StepConf::default().with_dt(0.0, 0.0)); // create proxies

        let mut hits = Vec::new();
        world.ray_cast(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0), |f, point, _n, fraction| {
            hits.push((f, point, fraction));
            1.0
        });
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, fixture);
        assert!((hits[0].1.x + 0.5).abs() < 1e-3, "Hit on the left rim");
    }

    #[test]
    fn test_query_aabb() {
        let (mut world, _, fixture) = disk_world();
        world.step(&StepConf::default().with_dt(0.0, 0.0));

        let mut found = Vec::new();
        world.query_aabb(
            &Aabb::new(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0)),
            |f| {
                found.push(f);
                true
            },
        );
        assert_eq!(found, vec![fixture]);

        found.clear();
        world.query_aabb(
            &Aabb::new(Vec2::new(50.0, 50.0), Vec2::new(51.0, 51.0)),
            |f| {
                found.push(f);
                true
            },
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_mutations_rejected_while_locked() {
        let (mut world, body, fixture) = disk_world();
        world.locked = true;

        assert!(matches!(
            world.create_body(&BodyDef::default()),
            Err(PhysicsError::WrongState { .. })
        ));
        assert!(matches!(
            world.destroy_body(body),
            Err(PhysicsError::WrongState { .. })
        ));
        assert!(matches!(
            world.set_transform(body, Vec2::ZERO, 0.0),
            Err(PhysicsError::WrongState { .. })
        ));
        assert!(matches!(
            world.set_velocity(body, Velocity::ZERO),
            Err(PhysicsError::WrongState { .. })
        ));
        assert!(matches!(
            world.destroy_fixture(fixture),
            Err(PhysicsError::WrongState { .. })
        ));
        assert!(matches!(
            world.create_joint(&JointDef::Distance(crate::joint::DistanceJointDef::new(
                body, body, 1.0
            ))),
            Err(PhysicsError::WrongState { .. })
        ));
        assert!(matches!(
            world.shift_origin(Vec2::ONE),
            Err(PhysicsError::WrongState { .. })
        ));
        assert!(matches!(
            world.clear(),
            Err(PhysicsError::WrongState { .. })
        ));

        world.locked = false;
        assert!(world.create_body(&BodyDef::default()).is_ok());
    }

    #[test]
    fn test_clear_world() {
        let (mut world, _, _) = disk_world();
        world.step(&StepConf::default());
        world.clear().unwrap();
        assert!(world.body_ids().is_empty());
        assert!(world.contact_list().is_empty());
    }
}

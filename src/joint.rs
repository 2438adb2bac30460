//! Joint System
//!
//! Joints constrain pairs of bodies. Every kind implements the same solver
//! contract (init-velocity, solve-velocity, solve-position, reaction,
//! shift-origin) dispatched over a closed tagged variant rather than open
//! inheritance.
//!
//! # Joint Kinds (this module)
//!
//! - **Revolute**: pin two bodies at a point, optional motor and angle limits
//! - **Prismatic**: slide along one axis, optional motor and translation limits
//! - **Distance**: hold two anchors at a fixed distance, optionally springy
//! - **Rope**: cap the distance between two anchors (pull only)
//! - **Weld**: lock relative position and angle, optionally springy
//! - **Friction**: resist relative motion with force/torque caps
//! - **Motor**: drive a body toward an offset from another
//! - **Target**: soft-drag a single body toward a world point
//!
//! Pulley, gear, and wheel joints live in [`crate::joint_extra`].

use glam::Mat2;

use crate::body::BodyId;
use crate::config::StepConf;
use crate::island::BodyConstraint;
use crate::joint_extra::{GearJoint, PulleyJoint, WheelJoint};
use crate::math::{cross, cross_sv, Rot, Vec2};

/// Stable identifier of a joint within its world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(pub u32);

/// Joint-limit activity, queryable after a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LimitState {
    /// Limits disabled or not reached
    #[default]
    Inactive,
    /// Pressed against the lower limit
    AtLower,
    /// Pressed against the upper limit
    AtUpper,
    /// Lower and upper limits coincide
    Equal,
}

/// Incremental impulses below this magnitude count as "within tolerance" for
/// the velocity-solve early exit.
pub(crate) const VELOCITY_TOLERANCE: f32 = 1e-5;

// ============================================================================
// Definitions
// ============================================================================

/// Construction parameters, one variant per joint kind.
#[derive(Clone, Debug)]
pub enum JointDef {
    /// See [`RevoluteJointDef`]
    Revolute(RevoluteJointDef),
    /// See [`PrismaticJointDef`]
    Prismatic(PrismaticJointDef),
    /// See [`DistanceJointDef`]
    Distance(DistanceJointDef),
    /// See [`RopeJointDef`]
    Rope(RopeJointDef),
    /// See [`WeldJointDef`]
    Weld(WeldJointDef),
    /// See [`FrictionJointDef`]
    Friction(FrictionJointDef),
    /// See [`MotorJointDef`]
    Motor(MotorJointDef),
    /// See [`TargetJointDef`]
    Target(TargetJointDef),
    /// See [`crate::joint_extra::PulleyJointDef`]
    Pulley(crate::joint_extra::PulleyJointDef),
    /// See [`crate::joint_extra::GearJointDef`]
    Gear(crate::joint_extra::GearJointDef),
    /// See [`crate::joint_extra::WheelJointDef`]
    Wheel(crate::joint_extra::WheelJointDef),
}

/// Pin two bodies together at a point.
#[derive(Clone, Copy, Debug)]
pub struct RevoluteJointDef {
    /// First body
    pub body_a: BodyId,
    /// Second body
    pub body_b: BodyId,
    /// Whether the bodies may still collide with each other
    pub collide_connected: bool,
    /// Anchor in body A local coordinates
    pub local_anchor_a: Vec2,
    /// Anchor in body B local coordinates
    pub local_anchor_b: Vec2,
    /// Rest angle of B relative to A
    pub reference_angle: f32,
    /// Whether angle limits apply
    pub enable_limit: bool,
    /// Lower angle limit (radians)
    pub lower_angle: f32,
    /// Upper angle limit (radians)
    pub upper_angle: f32,
    /// Whether the motor applies
    pub enable_motor: bool,
    /// Motor target angular speed (rad/s)
    pub motor_speed: f32,
    /// Motor torque cap (N·m)
    pub max_motor_torque: f32,
}

impl RevoluteJointDef {
    /// A limitless, motorless pin between two bodies.
    #[must_use]
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            reference_angle: 0.0,
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
        }
    }
}

/// Slide one body along an axis of another.
#[derive(Clone, Copy, Debug)]
pub struct PrismaticJointDef {
    /// First body
    pub body_a: BodyId,
    /// Second body
    pub body_b: BodyId,
    /// Whether the bodies may still collide with each other
    pub collide_connected: bool,
    /// Anchor in body A local coordinates
    pub local_anchor_a: Vec2,
    /// Anchor in body B local coordinates
    pub local_anchor_b: Vec2,
    /// Slide axis in body A local coordinates (unit)
    pub local_axis_a: Vec2,
    /// Rest angle of B relative to A
    pub reference_angle: f32,
    /// Whether translation limits apply
    pub enable_limit: bool,
    /// Lower translation limit (m)
    pub lower_translation: f32,
    /// Upper translation limit (m)
    pub upper_translation: f32,
    /// Whether the motor applies
    pub enable_motor: bool,
    /// Motor target speed along the axis (m/s)
    pub motor_speed: f32,
    /// Motor force cap (N)
    pub max_motor_force: f32,
}

impl PrismaticJointDef {
    /// A limitless, motorless slider along `axis` (body A local, unit).
    #[must_use]
    pub fn new(body_a: BodyId, body_b: BodyId, axis: Vec2) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            local_axis_a: axis,
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_force: 0.0,
        }
    }
}

/// Keep two anchors a fixed distance apart.
#[derive(Clone, Copy, Debug)]
pub struct DistanceJointDef {
    /// First body
    pub body_a: BodyId,
    /// Second body
    pub body_b: BodyId,
    /// Whether the bodies may still collide with each other
    pub collide_connected: bool,
    /// Anchor in body A local coordinates
    pub local_anchor_a: Vec2,
    /// Anchor in body B local coordinates
    pub local_anchor_b: Vec2,
    /// Rest length (m)
    pub length: f32,
    /// Spring frequency (Hz); 0 makes the joint rigid
    pub frequency: f32,
    /// Spring damping ratio
    pub damping_ratio: f32,
}

impl DistanceJointDef {
    /// A rigid distance joint.
    #[must_use]
    pub fn new(body_a: BodyId, body_b: BodyId, length: f32) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            length,
            frequency: 0.0,
            damping_ratio: 0.0,
        }
    }
}

/// Cap the distance between two anchors; exerts no push.
#[derive(Clone, Copy, Debug)]
pub struct RopeJointDef {
    /// First body
    pub body_a: BodyId,
    /// Second body
    pub body_b: BodyId,
    /// Whether the bodies may still collide with each other
    pub collide_connected: bool,
    /// Anchor in body A local coordinates
    pub local_anchor_a: Vec2,
    /// Anchor in body B local coordinates
    pub local_anchor_b: Vec2,
    /// Maximum separation (m)
    pub max_length: f32,
}

/// Lock relative position and orientation.
#[derive(Clone, Copy, Debug)]
pub struct WeldJointDef {
    /// First body
    pub body_a: BodyId,
    /// Second body
    pub body_b: BodyId,
    /// Whether the bodies may still collide with each other
    pub collide_connected: bool,
    /// Anchor in body A local coordinates
    pub local_anchor_a: Vec2,
    /// Anchor in body B local coordinates
    pub local_anchor_b: Vec2,
    /// Rest angle of B relative to A
    pub reference_angle: f32,
    /// Angular spring frequency (Hz); 0 is fully rigid
    pub frequency: f32,
    /// Angular spring damping ratio
    pub damping_ratio: f32,
}

/// Resist relative motion with capped force and torque.
#[derive(Clone, Copy, Debug)]
pub struct FrictionJointDef {
    /// First body
    pub body_a: BodyId,
    /// Second body
    pub body_b: BodyId,
    /// Whether the bodies may still collide with each other
    pub collide_connected: bool,
    /// Anchor in body A local coordinates
    pub local_anchor_a: Vec2,
    /// Anchor in body B local coordinates
    pub local_anchor_b: Vec2,
    /// Linear friction force cap (N)
    pub max_force: f32,
    /// Angular friction torque cap (N·m)
    pub max_torque: f32,
}

/// Drive body B toward a pose offset from body A.
#[derive(Clone, Copy, Debug)]
pub struct MotorJointDef {
    /// First body
    pub body_a: BodyId,
    /// Second body
    pub body_b: BodyId,
    /// Whether the bodies may still collide with each other
    pub collide_connected: bool,
    /// Target position of B in A's frame
    pub linear_offset: Vec2,
    /// Target angle of B relative to A
    pub angular_offset: f32,
    /// Force cap (N)
    pub max_force: f32,
    /// Torque cap (N·m)
    pub max_torque: f32,
    /// How much positional error feeds back per step, in [0, 1]
    pub correction_factor: f32,
}

/// Soft-drag one body toward a world-space target point.
#[derive(Clone, Copy, Debug)]
pub struct TargetJointDef {
    /// The dragged body
    pub body: BodyId,
    /// Anchor in body-local coordinates
    pub local_anchor: Vec2,
    /// World-space target
    pub target: Vec2,
    /// Force cap (N)
    pub max_force: f32,
    /// Spring frequency (Hz)
    pub frequency: f32,
    /// Spring damping ratio
    pub damping_ratio: f32,
}

// ============================================================================
// Joint
// ============================================================================

/// Kind tag, for introspection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JointKind {
    /// Revolute joint
    Revolute,
    /// Prismatic joint
    Prismatic,
    /// Distance joint
    Distance,
    /// Rope joint
    Rope,
    /// Weld joint
    Weld,
    /// Friction joint
    Friction,
    /// Motor joint
    Motor,
    /// Target joint
    Target,
    /// Pulley joint
    Pulley,
    /// Gear joint
    Gear,
    /// Wheel joint
    Wheel,
}

#[derive(Clone, Debug)]
pub(crate) enum JointData {
    Revolute(RevoluteJoint),
    Prismatic(PrismaticJoint),
    Distance(DistanceJoint),
    Rope(RopeJoint),
    Weld(WeldJoint),
    Friction(FrictionJoint),
    Motor(MotorJoint),
    Target(TargetJoint),
    Pulley(PulleyJoint),
    Gear(GearJoint),
    Wheel(WheelJoint),
}

/// A joint instance: the body pair, the collide-connected flag, and the
/// kind-specific solver state.
#[derive(Clone, Debug)]
pub struct Joint {
    pub(crate) body_a: BodyId,
    /// None for single-body kinds (target).
    pub(crate) body_b: Option<BodyId>,
    pub(crate) collide_connected: bool,
    pub(crate) islanded: bool,
    pub(crate) data: JointData,
}

impl Joint {
    /// Build a joint from its definition.
    ///
    /// Gear joints cannot be built here; the world resolves their referenced
    /// joints first (see [`GearJoint::from_parts`]).
    #[must_use]
    pub(crate) fn new(def: &JointDef) -> Option<Self> {
        let (body_a, body_b, collide_connected, data) = match def {
            JointDef::Revolute(d) => (
                d.body_a,
                Some(d.body_b),
                d.collide_connected,
                JointData::Revolute(RevoluteJoint::new(*d)),
            ),
            JointDef::Prismatic(d) => (
                d.body_a,
                Some(d.body_b),
                d.collide_connected,
                JointData::Prismatic(PrismaticJoint::new(*d)),
            ),
            JointDef::Distance(d) => (
                d.body_a,
                Some(d.body_b),
                d.collide_connected,
                JointData::Distance(DistanceJoint::new(*d)),
            ),
            JointDef::Rope(d) => (
                d.body_a,
                Some(d.body_b),
                d.collide_connected,
                JointData::Rope(RopeJoint::new(*d)),
            ),
            JointDef::Weld(d) => (
                d.body_a,
                Some(d.body_b),
                d.collide_connected,
                JointData::Weld(WeldJoint::new(*d)),
            ),
            JointDef::Friction(d) => (
                d.body_a,
                Some(d.body_b),
                d.collide_connected,
                JointData::Friction(FrictionJoint::new(*d)),
            ),
            JointDef::Motor(d) => (
                d.body_a,
                Some(d.body_b),
                d.collide_connected,
                JointData::Motor(MotorJoint::new(*d)),
            ),
            JointDef::Target(d) => (
                d.body,
                None,
                true,
                JointData::Target(TargetJoint::new(*d)),
            ),
            JointDef::Pulley(d) => (
                d.body_a,
                Some(d.body_b),
                true,
                JointData::Pulley(PulleyJoint::new(*d)),
            ),
            JointDef::Wheel(d) => (
                d.body_a,
                Some(d.body_b),
                d.collide_connected,
                JointData::Wheel(WheelJoint::new(*d)),
            ),
            JointDef::Gear(_) => return None,
        };
        Some(Self {
            body_a,
            body_b,
            collide_connected,
            islanded: false,
            data,
        })
    }

    /// First body.
    #[inline]
    #[must_use]
    pub fn body_a(&self) -> BodyId {
        self.body_a
    }

    /// Second body, absent for single-body kinds.
    #[inline]
    #[must_use]
    pub fn body_b(&self) -> Option<BodyId> {
        self.body_b
    }

    /// Whether the connected bodies may still collide with each other.
    #[inline]
    #[must_use]
    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    /// Kind tag.
    #[must_use]
    pub fn kind(&self) -> JointKind {
        match &self.data {
            JointData::Revolute(_) => JointKind::Revolute,
            JointData::Prismatic(_) => JointKind::Prismatic,
            JointData::Distance(_) => JointKind::Distance,
            JointData::Rope(_) => JointKind::Rope,
            JointData::Weld(_) => JointKind::Weld,
            JointData::Friction(_) => JointKind::Friction,
            JointData::Motor(_) => JointKind::Motor,
            JointData::Target(_) => JointKind::Target,
            JointData::Pulley(_) => JointKind::Pulley,
            JointData::Gear(_) => JointKind::Gear,
            JointData::Wheel(_) => JointKind::Wheel,
        }
    }

    /// Limit activity, for kinds with limits (revolute, prismatic).
    #[must_use]
    pub fn limit_state(&self) -> Option<LimitState> {
        match &self.data {
            JointData::Revolute(j) => Some(j.limit_state),
            JointData::Prismatic(j) => Some(j.limit_state),
            _ => None,
        }
    }

    /// Cache Jacobians and effective masses; apply warm-start impulses scaled
    /// by `conf.dt_ratio` (or zero them when warm starting is off).
    pub(crate) fn init_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) {
        match &mut self.data {
            JointData::Revolute(j) => j.init_velocity(bodies, conf),
            JointData::Prismatic(j) => j.init_velocity(bodies, conf),
            JointData::Distance(j) => j.init_velocity(bodies, conf),
            JointData::Rope(j) => j.init_velocity(bodies, conf),
            JointData::Weld(j) => j.init_velocity(bodies, conf),
            JointData::Friction(j) => j.init_velocity(bodies, conf),
            JointData::Motor(j) => j.init_velocity(bodies, conf),
            JointData::Target(j) => j.init_velocity(bodies, conf),
            JointData::Pulley(j) => j.init_velocity(bodies, conf),
            JointData::Gear(j) => j.init_velocity(bodies, conf),
            JointData::Wheel(j) => j.init_velocity(bodies, conf),
        }
    }

    /// One velocity iteration; true when the increment was within tolerance.
    pub(crate) fn solve_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        match &mut self.data {
            JointData::Revolute(j) => j.solve_velocity(bodies, conf),
            JointData::Prismatic(j) => j.solve_velocity(bodies, conf),
            JointData::Distance(j) => j.solve_velocity(bodies, conf),
            JointData::Rope(j) => j.solve_velocity(bodies, conf),
            JointData::Weld(j) => j.solve_velocity(bodies, conf),
            JointData::Friction(j) => j.solve_velocity(bodies, conf),
            JointData::Motor(j) => j.solve_velocity(bodies, conf),
            JointData::Target(j) => j.solve_velocity(bodies, conf),
            JointData::Pulley(j) => j.solve_velocity(bodies, conf),
            JointData::Gear(j) => j.solve_velocity(bodies, conf),
            JointData::Wheel(j) => j.solve_velocity(bodies, conf),
        }
    }

    /// One position iteration; true when the errors are within tolerance.
    pub(crate) fn solve_position(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        match &mut self.data {
            JointData::Revolute(j) => j.solve_position(bodies, conf),
            JointData::Prismatic(j) => j.solve_position(bodies, conf),
            JointData::Distance(j) => j.solve_position(bodies, conf),
            JointData::Rope(j) => j.solve_position(bodies, conf),
            JointData::Weld(j) => j.solve_position(bodies, conf),
            JointData::Friction(_) | JointData::Motor(_) | JointData::Target(_) => true,
            JointData::Pulley(j) => j.solve_position(bodies, conf),
            JointData::Gear(j) => j.solve_position(bodies, conf),
            JointData::Wheel(j) => j.solve_position(bodies, conf),
        }
    }

    /// The reaction (force, torque) this joint applied last step.
    #[must_use]
    pub fn reaction(&self, inv_dt: f32) -> (Vec2, f32) {
        match &self.data {
            JointData::Revolute(j) => (
                inv_dt * j.impulse,
                inv_dt * (j.motor_impulse + j.lower_impulse - j.upper_impulse),
            ),
            JointData::Prismatic(j) => {
                let axial = j.motor_impulse + j.lower_impulse - j.upper_impulse;
                (
                    inv_dt * (j.impulse.x * j.perp + axial * j.axis),
                    inv_dt * j.impulse.y,
                )
            }
            JointData::Distance(j) => (inv_dt * j.impulse * j.u, 0.0),
            JointData::Rope(j) => (inv_dt * j.impulse * j.u, 0.0),
            JointData::Weld(j) => (
                inv_dt * Vec2::new(j.impulse.0, j.impulse.1),
                inv_dt * j.impulse.2,
            ),
            JointData::Friction(j) => (inv_dt * j.linear_impulse, inv_dt * j.angular_impulse),
            JointData::Motor(j) => (inv_dt * j.linear_impulse, inv_dt * j.angular_impulse),
            JointData::Target(j) => (inv_dt * j.impulse, 0.0),
            JointData::Pulley(j) => (inv_dt * j.impulse * j.u_b, 0.0),
            JointData::Gear(j) => (inv_dt * j.impulse * j.jv_ac, inv_dt * j.impulse * j.j_wa),
            JointData::Wheel(j) => (
                inv_dt * (j.impulse * j.ay + j.spring_impulse * j.ax),
                inv_dt * j.motor_impulse,
            ),
        }
    }

    /// Relocate cached world-space anchors after an origin shift.
    pub(crate) fn shift_origin(&mut self, offset: Vec2) {
        match &mut self.data {
            JointData::Target(j) => j.target -= offset,
            JointData::Pulley(j) => {
                j.ground_anchor_a -= offset;
                j.ground_anchor_b -= offset;
            }
            // Every other kind stores body-local anchors only.
            _ => {}
        }
    }
}

// ============================================================================
// Revolute
// ============================================================================

#[derive(Clone, Debug)]
pub(crate) struct RevoluteJoint {
    pub(crate) def: RevoluteJointDef,
    // Accumulated impulses
    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,
    // Cached solver state
    r_a: Vec2,
    r_b: Vec2,
    k: Mat2,
    axial_mass: f32,
    angle: f32,
    limit_state: LimitState,
}

impl RevoluteJoint {
    fn new(def: RevoluteJointDef) -> Self {
        Self {
            def,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k: Mat2::ZERO,
            axial_mass: 0.0,
            angle: 0.0,
            limit_state: LimitState::Inactive,
        }
    }

    fn init_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let a = bodies[ia];
        let b = bodies[ib];
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_inertia, b.inv_inertia);

        let q_a = Rot::new(a.position.angular);
        let q_b = Rot::new(b.position.angular);
        self.r_a = q_a.rotate(self.def.local_anchor_a - a.local_center);
        self.r_b = q_b.rotate(self.def.local_anchor_b - b.local_center);

        self.k = Mat2::from_cols(
            Vec2::new(
                m_a + m_b + i_a * self.r_a.y * self.r_a.y + i_b * self.r_b.y * self.r_b.y,
                -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
            ),
            Vec2::new(
                -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
                m_a + m_b + i_a * self.r_a.x * self.r_a.x + i_b * self.r_b.x * self.r_b.x,
            ),
        );

        let inv_axial = i_a + i_b;
        self.axial_mass = if inv_axial > 0.0 { 1.0 / inv_axial } else { 0.0 };

        self.angle = b.position.angular - a.position.angular - self.def.reference_angle;
        self.limit_state = if !self.def.enable_limit {
            LimitState::Inactive
        } else if (self.def.lower_angle - self.def.upper_angle).abs() < 2.0 * conf.angular_slop {
            LimitState::Equal
        } else if self.angle <= self.def.lower_angle + conf.angular_slop {
            LimitState::AtLower
        } else if self.angle >= self.def.upper_angle - conf.angular_slop {
            LimitState::AtUpper
        } else {
            LimitState::Inactive
        };
        if !self.def.enable_limit {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.def.enable_motor {
            self.motor_impulse = 0.0;
        }

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            self.motor_impulse *= conf.dt_ratio;
            self.lower_impulse *= conf.dt_ratio;
            self.upper_impulse *= conf.dt_ratio;

            let axial = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse;
            bodies[ia].velocity.linear -= m_a * p;
            bodies[ia].velocity.angular -= i_a * (cross(self.r_a, p) + axial);
            bodies[ib].velocity.linear += m_b * p;
            bodies[ib].velocity.angular += i_b * (cross(self.r_b, p) + axial);
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    fn solve_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut v_a = bodies[ia].velocity;
        let mut v_b = bodies[ib].velocity;
        let inv_h = if conf.dt > 0.0 { 1.0 / conf.dt } else { 0.0 };
        let fixed_rotation = i_a + i_b == 0.0;
        let mut inc: f32 = 0.0;

        if self.def.enable_motor && !fixed_rotation {
            let cdot = v_b.angular - v_a.angular - self.def.motor_speed;
            let mut impulse = -self.axial_mass * cdot;
            let old = self.motor_impulse;
            let max = self.def.max_motor_torque * conf.dt;
            self.motor_impulse = (old + impulse).clamp(-max, max);
            impulse = self.motor_impulse - old;
            inc = inc.max(impulse.abs());
            v_a.angular -= i_a * impulse;
            v_b.angular += i_b * impulse;
        }

        if self.def.enable_limit && !fixed_rotation {
            // Lower limit
            {
                let c = self.angle - self.def.lower_angle;
                let cdot = v_b.angular - v_a.angular;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * inv_h);
                let old = self.lower_impulse;
                self.lower_impulse = (old + impulse).max(0.0);
                impulse = self.lower_impulse - old;
                inc = inc.max(impulse.abs());
                v_a.angular -= i_a * impulse;
                v_b.angular += i_b * impulse;
            }
            // Upper limit
            {
                let c = self.def.upper_angle - self.angle;
                let cdot = v_a.angular - v_b.angular;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * inv_h);
                let old = self.upper_impulse;
                self.upper_impulse = (old + impulse).max(0.0);
                impulse = self.upper_impulse - old;
                inc = inc.max(impulse.abs());
                v_a.angular += i_a * impulse;
                v_b.angular -= i_b * impulse;
            }
        }

        // Point-to-point
        {
            let cdot = v_b.linear + cross_sv(v_b.angular, self.r_b)
                - v_a.linear
                - cross_sv(v_a.angular, self.r_a);
            let impulse = solve22(self.k, -cdot);
            self.impulse += impulse;
            inc = inc.max(impulse.length());

            v_a.linear -= m_a * impulse;
            v_a.angular -= i_a * cross(self.r_a, impulse);
            v_b.linear += m_b * impulse;
            v_b.angular += i_b * cross(self.r_b, impulse);
        }

        bodies[ia].velocity = v_a;
        bodies[ib].velocity = v_b;
        inc <= VELOCITY_TOLERANCE
    }

    fn solve_position(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut pos_a = bodies[ia].position;
        let mut pos_b = bodies[ib].position;
        let fixed_rotation = i_a + i_b == 0.0;

        let mut angular_error = 0.0;

        if self.def.enable_limit && !fixed_rotation {
            let angle = pos_b.angular - pos_a.angular - self.def.reference_angle;
            let c = if (self.def.lower_angle - self.def.upper_angle).abs() < 2.0 * conf.angular_slop
            {
                (angle - self.def.lower_angle)
                    .clamp(-conf.max_angular_correction, conf.max_angular_correction)
            } else if angle <= self.def.lower_angle {
                (angle - self.def.lower_angle).clamp(-conf.max_angular_correction, 0.0)
            } else if angle >= self.def.upper_angle {
                (angle - self.def.upper_angle).clamp(0.0, conf.max_angular_correction)
            } else {
                0.0
            };
            let impulse = -self.axial_mass * c;
            pos_a.angular -= i_a * impulse;
            pos_b.angular += i_b * impulse;
            angular_error = c.abs();
        }

        // Point-to-point correction with masses recomputed at the corrected
        // orientation.
        let q_a = Rot::new(pos_a.angular);
        let q_b = Rot::new(pos_b.angular);
        let r_a = q_a.rotate(self.def.local_anchor_a - bodies[ia].local_center);
        let r_b = q_b.rotate(self.def.local_anchor_b - bodies[ib].local_center);
        let c = pos_b.linear + r_b - pos_a.linear - r_a;
        let position_error = c.length();

        let k = Mat2::from_cols(
            Vec2::new(
                m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y,
                -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
            ),
            Vec2::new(
                -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
                m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x,
            ),
        );
        let impulse = -solve22(k, c);

        pos_a.linear -= m_a * impulse;
        pos_a.angular -= i_a * cross(r_a, impulse);
        pos_b.linear += m_b * impulse;
        pos_b.angular += i_b * cross(r_b, impulse);

        bodies[ia].position = pos_a;
        bodies[ib].position = pos_b;

        position_error <= conf.linear_slop && angular_error <= conf.angular_slop
    }
}

// ============================================================================
// Prismatic
// ============================================================================

#[derive(Clone, Debug)]
pub(crate) struct PrismaticJoint {
    pub(crate) def: PrismaticJointDef,
    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,
    axis: Vec2,
    perp: Vec2,
    s1: f32,
    s2: f32,
    a1: f32,
    a2: f32,
    axial_mass: f32,
    k: Mat2,
    translation: f32,
    limit_state: LimitState,
}

impl PrismaticJoint {
    fn new(def: PrismaticJointDef) -> Self {
        Self {
            def,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
            axis: Vec2::ZERO,
            perp: Vec2::ZERO,
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            axial_mass: 0.0,
            k: Mat2::ZERO,
            translation: 0.0,
            limit_state: LimitState::Inactive,
        }
    }

    /// Current translation along the joint axis.
    pub(crate) fn translation(&self) -> f32 {
        self.translation
    }

    fn init_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let a = bodies[ia];
        let b = bodies[ib];
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_inertia, b.inv_inertia);

        let q_a = Rot::new(a.position.angular);
        let q_b = Rot::new(b.position.angular);
        let r_a = q_a.rotate(self.def.local_anchor_a - a.local_center);
        let r_b = q_b.rotate(self.def.local_anchor_b - b.local_center);
        let d = (b.position.linear - a.position.linear) + r_b - r_a;

        self.axis = q_a.rotate(self.def.local_axis_a);
        self.a1 = cross(d + r_a, self.axis);
        self.a2 = cross(r_b, self.axis);
        let inv_axial = m_a + m_b + i_a * self.a1 * self.a1 + i_b * self.a2 * self.a2;
        self.axial_mass = if inv_axial > 0.0 { 1.0 / inv_axial } else { 0.0 };

        self.perp = q_a.rotate(cross_sv(1.0, self.def.local_axis_a));
        self.s1 = cross(d + r_a, self.perp);
        self.s2 = cross(r_b, self.perp);

        let k11 = m_a + m_b + i_a * self.s1 * self.s1 + i_b * self.s2 * self.s2;
        let k12 = i_a * self.s1 + i_b * self.s2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            // Both bodies have fixed rotation; the angular row degenerates.
            k22 = 1.0;
        }
        self.k = Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));

        self.translation = self.axis.dot(d);
        self.limit_state = if !self.def.enable_limit {
            LimitState::Inactive
        } else if (self.def.lower_translation - self.def.upper_translation).abs()
            < 2.0 * conf.linear_slop
        {
            LimitState::Equal
        } else if self.translation <= self.def.lower_translation + conf.linear_slop {
            LimitState::AtLower
        } else if self.translation >= self.def.upper_translation - conf.linear_slop {
            LimitState::AtUpper
        } else {
            LimitState::Inactive
        };
        if !self.def.enable_limit {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.def.enable_motor {
            self.motor_impulse = 0.0;
        }

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            self.motor_impulse *= conf.dt_ratio;
            self.lower_impulse *= conf.dt_ratio;
            self.upper_impulse *= conf.dt_ratio;

            let axial = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse.x * self.perp + axial * self.axis;
            let l_a = self.impulse.x * self.s1 + self.impulse.y + axial * self.a1;
            let l_b = self.impulse.x * self.s2 + self.impulse.y + axial * self.a2;

            bodies[ia].velocity.linear -= m_a * p;
            bodies[ia].velocity.angular -= i_a * l_a;
            bodies[ib].velocity.linear += m_b * p;
            bodies[ib].velocity.angular += i_b * l_b;
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
    }

    fn solve_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut v_a = bodies[ia].velocity;
        let mut v_b = bodies[ib].velocity;
        let inv_h = if conf.dt > 0.0 { 1.0 / conf.dt } else { 0.0 };
        let mut inc: f32 = 0.0;

        if self.def.enable_motor {
            let cdot = self.axis.dot(v_b.linear - v_a.linear) + self.a2 * v_b.angular
                - self.a1 * v_a.angular;
            let mut impulse = self.axial_mass * (self.def.motor_speed - cdot);
            let old = self.motor_impulse;
            let max = self.def.max_motor_force * conf.dt;
            self.motor_impulse = (old + impulse).clamp(-max, max);
            impulse = self.motor_impulse - old;
            inc = inc.max(impulse.abs());

            let p = impulse * self.axis;
            v_a.linear -= m_a * p;
            v_a.angular -= i_a * impulse * self.a1;
            v_b.linear += m_b * p;
            v_b.angular += i_b * impulse * self.a2;
        }

        if self.def.enable_limit {
            // Lower limit
            {
                let c = self.translation - self.def.lower_translation;
                let cdot = self.axis.dot(v_b.linear - v_a.linear) + self.a2 * v_b.angular
                    - self.a1 * v_a.angular;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * inv_h);
                let old = self.lower_impulse;
                self.lower_impulse = (old + impulse).max(0.0);
                impulse = self.lower_impulse - old;
                inc = inc.max(impulse.abs());

                let p = impulse * self.axis;
                v_a.linear -= m_a * p;
                v_a.angular -= i_a * impulse * self.a1;
                v_b.linear += m_b * p;
                v_b.angular += i_b * impulse * self.a2;
            }
            // Upper limit
            {
                let c = self.def.upper_translation - self.translation;
                let cdot = self.axis.dot(v_a.linear - v_b.linear) + self.a1 * v_a.angular
                    - self.a2 * v_b.angular;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * inv_h);
                let old = self.upper_impulse;
                self.upper_impulse = (old + impulse).max(0.0);
                impulse = self.upper_impulse - old;
                inc = inc.max(impulse.abs());

                let p = impulse * self.axis;
                v_a.linear += m_a * p;
                v_a.angular += i_a * impulse * self.a1;
                v_b.linear -= m_b * p;
                v_b.angular -= i_b * impulse * self.a2;
            }
        }

        // Perpendicular and angular rows.
        {
            let cdot = Vec2::new(
                self.perp.dot(v_b.linear - v_a.linear) + self.s2 * v_b.angular
                    - self.s1 * v_a.angular,
                v_b.angular - v_a.angular,
            );
            let df = solve22(self.k, -cdot);
            self.impulse += df;
            inc = inc.max(df.length());

            let p = df.x * self.perp;
            let l_a = df.x * self.s1 + df.y;
            let l_b = df.x * self.s2 + df.y;

            v_a.linear -= m_a * p;
            v_a.angular -= i_a * l_a;
            v_b.linear += m_b * p;
            v_b.angular += i_b * l_b;
        }

        bodies[ia].velocity = v_a;
        bodies[ib].velocity = v_b;
        inc <= VELOCITY_TOLERANCE
    }

    fn solve_position(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut pos_a = bodies[ia].position;
        let mut pos_b = bodies[ib].position;

        let q_a = Rot::new(pos_a.angular);
        let q_b = Rot::new(pos_b.angular);
        let r_a = q_a.rotate(self.def.local_anchor_a - bodies[ia].local_center);
        let r_b = q_b.rotate(self.def.local_anchor_b - bodies[ib].local_center);
        let d = pos_b.linear + r_b - pos_a.linear - r_a;

        let axis = q_a.rotate(self.def.local_axis_a);
        let a1 = cross(d + r_a, axis);
        let a2 = cross(r_b, axis);
        let perp = q_a.rotate(cross_sv(1.0, self.def.local_axis_a));
        let s1 = cross(d + r_a, perp);
        let s2 = cross(r_b, perp);

        let c1 = Vec2::new(
            perp.dot(d),
            pos_b.angular - pos_a.angular - self.def.reference_angle,
        );
        let mut position_error = c1.x.abs();
        let angular_error = c1.y.abs();

        let mut active = false;
        let mut c2 = 0.0;
        if self.def.enable_limit {
            let translation = axis.dot(d);
            if (self.def.lower_translation - self.def.upper_translation).abs()
                < 2.0 * conf.linear_slop
            {
                c2 = (translation - self.def.lower_translation)
                    .clamp(-conf.max_linear_correction, conf.max_linear_correction);
                position_error = position_error.max((translation - self.def.lower_translation).abs());
                active = true;
            } else if translation <= self.def.lower_translation {
                c2 = (translation - self.def.lower_translation + conf.linear_slop)
                    .clamp(-conf.max_linear_correction, 0.0);
                position_error = position_error.max(self.def.lower_translation - translation);
                active = true;
            } else if translation >= self.def.upper_translation {
                c2 = (translation - self.def.upper_translation - conf.linear_slop)
                    .clamp(0.0, conf.max_linear_correction);
                position_error = position_error.max(translation - self.def.upper_translation);
                active = true;
            }
        }

        let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
        let k12 = i_a * s1 + i_b * s2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            k22 = 1.0;
        }

        let (p, l_impulse) = if active {
            let k13 = i_a * s1 * a1 + i_b * s2 * a2;
            let k23 = i_a * a1 + i_b * a2;
            let mut k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;
            if k33 == 0.0 {
                k33 = 1.0;
            }
            let impulse = solve33(
                [
                    [k11, k12, k13],
                    [k12, k22, k23],
                    [k13, k23, k33],
                ],
                [-c1.x, -c1.y, -c2],
            );
            (
                impulse[0] * perp + impulse[2] * axis,
                (
                    impulse[0] * s1 + impulse[1] + impulse[2] * a1,
                    impulse[0] * s2 + impulse[1] + impulse[2] * a2,
                ),
            )
        } else {
            let impulse = solve22(
                Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22)),
                -c1,
            );
            (
                impulse.x * perp,
                (impulse.x * s1 + impulse.y, impulse.x * s2 + impulse.y),
            )
        };

        pos_a.linear -= m_a * p;
        pos_a.angular -= i_a * l_impulse.0;
        pos_b.linear += m_b * p;
        pos_b.angular += i_b * l_impulse.1;

        bodies[ia].position = pos_a;
        bodies[ib].position = pos_b;

        position_error <= conf.linear_slop && angular_error <= conf.angular_slop
    }
}

// ============================================================================
// Distance
// ============================================================================

#[derive(Clone, Debug)]
pub(crate) struct DistanceJoint {
    pub(crate) def: DistanceJointDef,
    impulse: f32,
    r_a: Vec2,
    r_b: Vec2,
    u: Vec2,
    mass: f32,
    gamma: f32,
    bias: f32,
}

impl DistanceJoint {
    fn new(def: DistanceJointDef) -> Self {
        Self {
            def,
            impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            u: Vec2::ZERO,
            mass: 0.0,
            gamma: 0.0,
            bias: 0.0,
        }
    }

    fn init_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let a = bodies[ia];
        let b = bodies[ib];
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_inertia, b.inv_inertia);

        let q_a = Rot::new(a.position.angular);
        let q_b = Rot::new(b.position.angular);
        self.r_a = q_a.rotate(self.def.local_anchor_a - a.local_center);
        self.r_b = q_b.rotate(self.def.local_anchor_b - b.local_center);
        self.u = b.position.linear + self.r_b - a.position.linear - self.r_a;

        let length = self.u.length();
        if length > conf.linear_slop {
            self.u /= length;
        } else {
            self.u = Vec2::ZERO;
        }

        let cr_a = cross(self.r_a, self.u);
        let cr_b = cross(self.r_b, self.u);
        let mut inv_mass = m_a + m_b + i_a * cr_a * cr_a + i_b * cr_b * cr_b;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.def.frequency > 0.0 {
            let c = length - self.def.length;
            let omega = 2.0 * core::f32::consts::PI * self.def.frequency;
            let d = 2.0 * self.mass * self.def.damping_ratio * omega;
            let k = self.mass * omega * omega;
            let h = conf.dt;
            self.gamma = h * (d + h * k);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * k * self.gamma;
            inv_mass += self.gamma;
            self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            let p = self.impulse * self.u;
            bodies[ia].velocity.linear -= m_a * p;
            bodies[ia].velocity.angular -= i_a * cross(self.r_a, p);
            bodies[ib].velocity.linear += m_b * p;
            bodies[ib].velocity.angular += i_b * cross(self.r_b, p);
        } else {
            self.impulse = 0.0;
        }
    }

    fn solve_velocity(&mut self, bodies: &mut [BodyConstraint], _conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut v_a = bodies[ia].velocity;
        let mut v_b = bodies[ib].velocity;

        let vp_a = v_a.linear + cross_sv(v_a.angular, self.r_a);
        let vp_b = v_b.linear + cross_sv(v_b.angular, self.r_b);
        let cdot = self.u.dot(vp_b - vp_a);

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = impulse * self.u;
        v_a.linear -= m_a * p;
        v_a.angular -= i_a * cross(self.r_a, p);
        v_b.linear += m_b * p;
        v_b.angular += i_b * cross(self.r_b, p);

        bodies[ia].velocity = v_a;
        bodies[ib].velocity = v_b;
        impulse.abs() <= VELOCITY_TOLERANCE
    }

    fn solve_position(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        if self.def.frequency > 0.0 {
            // Springy joints don't fight position drift.
            return true;
        }

        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut pos_a = bodies[ia].position;
        let mut pos_b = bodies[ib].position;

        let q_a = Rot::new(pos_a.angular);
        let q_b = Rot::new(pos_b.angular);
        let r_a = q_a.rotate(self.def.local_anchor_a - bodies[ia].local_center);
        let r_b = q_b.rotate(self.def.local_anchor_b - bodies[ib].local_center);
        let mut u = pos_b.linear + r_b - pos_a.linear - r_a;

        let length = u.length();
        if length > f32::EPSILON {
            u /= length;
        }
        let c = (length - self.def.length)
            .clamp(-conf.max_linear_correction, conf.max_linear_correction);

        let impulse = -self.mass * c;
        let p = impulse * u;

        pos_a.linear -= m_a * p;
        pos_a.angular -= i_a * cross(r_a, p);
        pos_b.linear += m_b * p;
        pos_b.angular += i_b * cross(r_b, p);

        bodies[ia].position = pos_a;
        bodies[ib].position = pos_b;
        c.abs() < conf.linear_slop
    }
}

// ============================================================================
// Rope
// ============================================================================

#[derive(Clone, Debug)]
pub(crate) struct RopeJoint {
    pub(crate) def: RopeJointDef,
    /// Accumulated impulse; never positive (a rope cannot push).
    impulse: f32,
    r_a: Vec2,
    r_b: Vec2,
    u: Vec2,
    length: f32,
    mass: f32,
}

impl RopeJoint {
    fn new(def: RopeJointDef) -> Self {
        Self {
            def,
            impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            u: Vec2::ZERO,
            length: 0.0,
            mass: 0.0,
        }
    }

    /// Signed accumulated impulse (≤ 0).
    pub(crate) fn impulse(&self) -> f32 {
        self.impulse
    }

    fn init_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let a = bodies[ia];
        let b = bodies[ib];
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_inertia, b.inv_inertia);

        let q_a = Rot::new(a.position.angular);
        let q_b = Rot::new(b.position.angular);
        self.r_a = q_a.rotate(self.def.local_anchor_a - a.local_center);
        self.r_b = q_b.rotate(self.def.local_anchor_b - b.local_center);
        self.u = b.position.linear + self.r_b - a.position.linear - self.r_a;

        self.length = self.u.length();
        if self.length > conf.linear_slop {
            self.u /= self.length;
        } else {
            self.u = Vec2::ZERO;
            self.mass = 0.0;
            self.impulse = 0.0;
            return;
        }

        let cr_a = cross(self.r_a, self.u);
        let cr_b = cross(self.r_b, self.u);
        let inv_mass = m_a + m_b + i_a * cr_a * cr_a + i_b * cr_b * cr_b;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            let p = self.impulse * self.u;
            bodies[ia].velocity.linear -= m_a * p;
            bodies[ia].velocity.angular -= i_a * cross(self.r_a, p);
            bodies[ib].velocity.linear += m_b * p;
            bodies[ib].velocity.angular += i_b * cross(self.r_b, p);
        } else {
            self.impulse = 0.0;
        }
    }

    fn solve_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut v_a = bodies[ia].velocity;
        let mut v_b = bodies[ib].velocity;

        let vp_a = v_a.linear + cross_sv(v_a.angular, self.r_a);
        let vp_b = v_b.linear + cross_sv(v_b.angular, self.r_b);
        let c = self.length - self.def.max_length;
        let mut cdot = self.u.dot(vp_b - vp_a);

        // Predictive: start resisting just before the rope goes taut.
        if c < 0.0 && conf.dt > 0.0 {
            cdot += c / conf.dt;
        }

        let mut impulse = -self.mass * cdot;
        let old = self.impulse;
        self.impulse = (old + impulse).min(0.0);
        impulse = self.impulse - old;

        let p = impulse * self.u;
        v_a.linear -= m_a * p;
        v_a.angular -= i_a * cross(self.r_a, p);
        v_b.linear += m_b * p;
        v_b.angular += i_b * cross(self.r_b, p);

        bodies[ia].velocity = v_a;
        bodies[ib].velocity = v_b;
        impulse.abs() <= VELOCITY_TOLERANCE
    }

    fn solve_position(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut pos_a = bodies[ia].position;
        let mut pos_b = bodies[ib].position;

        let q_a = Rot::new(pos_a.angular);
        let q_b = Rot::new(pos_b.angular);
        let r_a = q_a.rotate(self.def.local_anchor_a - bodies[ia].local_center);
        let r_b = q_b.rotate(self.def.local_anchor_b - bodies[ib].local_center);
        let mut u = pos_b.linear + r_b - pos_a.linear - r_a;

        let length = u.length();
        if length > f32::EPSILON {
            u /= length;
        }
        let c = (length - self.def.max_length).clamp(0.0, conf.max_linear_correction);

        let impulse = -self.mass * c;
        let p = impulse * u;

        pos_a.linear -= m_a * p;
        pos_a.angular -= i_a * cross(r_a, p);
        pos_b.linear += m_b * p;
        pos_b.angular += i_b * cross(r_b, p);

        bodies[ia].position = pos_a;
        bodies[ib].position = pos_b;
        length - self.def.max_length < conf.linear_slop
    }
}

// ============================================================================
// Weld
// ============================================================================

#[derive(Clone, Debug)]
pub(crate) struct WeldJoint {
    pub(crate) def: WeldJointDef,
    impulse: (f32, f32, f32),
    r_a: Vec2,
    r_b: Vec2,
    mass: [[f32; 3]; 3],
    gamma: f32,
    bias: f32,
}

impl WeldJoint {
    fn new(def: WeldJointDef) -> Self {
        Self {
            def,
            impulse: (0.0, 0.0, 0.0),
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: [[0.0; 3]; 3],
            gamma: 0.0,
            bias: 0.0,
        }
    }

    fn init_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let a = bodies[ia];
        let b = bodies[ib];
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_inertia, b.inv_inertia);

        let q_a = Rot::new(a.position.angular);
        let q_b = Rot::new(b.position.angular);
        self.r_a = q_a.rotate(self.def.local_anchor_a - a.local_center);
        self.r_b = q_b.rotate(self.def.local_anchor_b - b.local_center);

        let k = [
            [
                m_a + m_b + self.r_a.y * self.r_a.y * i_a + self.r_b.y * self.r_b.y * i_b,
                -self.r_a.y * self.r_a.x * i_a - self.r_b.y * self.r_b.x * i_b,
                -self.r_a.y * i_a - self.r_b.y * i_b,
            ],
            [
                -self.r_a.y * self.r_a.x * i_a - self.r_b.y * self.r_b.x * i_b,
                m_a + m_b + self.r_a.x * self.r_a.x * i_a + self.r_b.x * self.r_b.x * i_b,
                self.r_a.x * i_a + self.r_b.x * i_b,
            ],
            [
                -self.r_a.y * i_a - self.r_b.y * i_b,
                self.r_a.x * i_a + self.r_b.x * i_b,
                i_a + i_b,
            ],
        ];

        if self.def.frequency > 0.0 {
            // Soft angular row; the linear rows stay rigid.
            self.mass = invert33_sym22(k);

            let mut inv_m = i_a + i_b;
            let m = if inv_m > 0.0 { 1.0 / inv_m } else { 0.0 };
            let c = b.position.angular - a.position.angular - self.def.reference_angle;
            let omega = 2.0 * core::f32::consts::PI * self.def.frequency;
            let d = 2.0 * m * self.def.damping_ratio * omega;
            let kk = m * omega * omega;
            let h = conf.dt;
            self.gamma = h * (d + h * kk);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * kk * self.gamma;
            inv_m += self.gamma;
            self.mass[2][2] = if inv_m != 0.0 { 1.0 / inv_m } else { 0.0 };
        } else {
            self.mass = invert33(k);
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if conf.do_warm_start {
            self.impulse.0 *= conf.dt_ratio;
            self.impulse.1 *= conf.dt_ratio;
            self.impulse.2 *= conf.dt_ratio;

            let p = Vec2::new(self.impulse.0, self.impulse.1);
            bodies[ia].velocity.linear -= m_a * p;
            bodies[ia].velocity.angular -= i_a * (cross(self.r_a, p) + self.impulse.2);
            bodies[ib].velocity.linear += m_b * p;
            bodies[ib].velocity.angular += i_b * (cross(self.r_b, p) + self.impulse.2);
        } else {
            self.impulse = (0.0, 0.0, 0.0);
        }
    }

    fn solve_velocity(&mut self, bodies: &mut [BodyConstraint], _conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut v_a = bodies[ia].velocity;
        let mut v_b = bodies[ib].velocity;
        let mut inc: f32 = 0.0;

        if self.def.frequency > 0.0 {
            let cdot2 = v_b.angular - v_a.angular;
            let imp2 = -self.mass[2][2] * (cdot2 + self.bias + self.gamma * self.impulse.2);
            self.impulse.2 += imp2;
            inc = inc.max(imp2.abs());
            v_a.angular -= i_a * imp2;
            v_b.angular += i_b * imp2;

            let cdot1 = v_b.linear + cross_sv(v_b.angular, self.r_b)
                - v_a.linear
                - cross_sv(v_a.angular, self.r_a);
            let imp1 = -mul22(&self.mass, cdot1);
            self.impulse.0 += imp1.x;
            self.impulse.1 += imp1.y;
            inc = inc.max(imp1.length());

            v_a.linear -= m_a * imp1;
            v_a.angular -= i_a * cross(self.r_a, imp1);
            v_b.linear += m_b * imp1;
            v_b.angular += i_b * cross(self.r_b, imp1);
        } else {
            let cdot1 = v_b.linear + cross_sv(v_b.angular, self.r_b)
                - v_a.linear
                - cross_sv(v_a.angular, self.r_a);
            let cdot2 = v_b.angular - v_a.angular;
            let imp = mul33(&self.mass, [-cdot1.x, -cdot1.y, -cdot2]);
            self.impulse.0 += imp[0];
            self.impulse.1 += imp[1];
            self.impulse.2 += imp[2];
            let p = Vec2::new(imp[0], imp[1]);
            inc = inc.max(p.length()).max(imp[2].abs());

            v_a.linear -= m_a * p;
            v_a.angular -= i_a * (cross(self.r_a, p) + imp[2]);
            v_b.linear += m_b * p;
            v_b.angular += i_b * (cross(self.r_b, p) + imp[2]);
        }

        bodies[ia].velocity = v_a;
        bodies[ib].velocity = v_b;
        inc <= VELOCITY_TOLERANCE
    }

    fn solve_position(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut pos_a = bodies[ia].position;
        let mut pos_b = bodies[ib].position;

        let q_a = Rot::new(pos_a.angular);
        let q_b = Rot::new(pos_b.angular);
        let r_a = q_a.rotate(self.def.local_anchor_a - bodies[ia].local_center);
        let r_b = q_b.rotate(self.def.local_anchor_b - bodies[ib].local_center);

        let c1 = pos_b.linear + r_b - pos_a.linear - r_a;

        let k = [
            [
                m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b,
                -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b,
                -r_a.y * i_a - r_b.y * i_b,
            ],
            [
                -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b,
                m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b,
                r_a.x * i_a + r_b.x * i_b,
            ],
            [
                -r_a.y * i_a - r_b.y * i_b,
                r_a.x * i_a + r_b.x * i_b,
                i_a + i_b,
            ],
        ];

        let (position_error, angular_error) = if self.def.frequency > 0.0 {
            let mass = invert33_sym22(k);
            let p = -mul22(&mass, c1);
            pos_a.linear -= m_a * p;
            pos_a.angular -= i_a * cross(r_a, p);
            pos_b.linear += m_b * p;
            pos_b.angular += i_b * cross(r_b, p);
            (c1.length(), 0.0)
        } else {
            let c2 = pos_b.angular - pos_a.angular - self.def.reference_angle;
            let mass = invert33(k);
            let imp = mul33(&mass, [-c1.x, -c1.y, -c2]);
            let p = Vec2::new(imp[0], imp[1]);
            pos_a.linear -= m_a * p;
            pos_a.angular -= i_a * (cross(r_a, p) + imp[2]);
            pos_b.linear += m_b * p;
            pos_b.angular += i_b * (cross(r_b, p) + imp[2]);
            (c1.length(), c2.abs())
        };

        bodies[ia].position = pos_a;
        bodies[ib].position = pos_b;
        position_error <= conf.linear_slop && angular_error <= conf.angular_slop
    }
}

// ============================================================================
// Friction
// ============================================================================

#[derive(Clone, Debug)]
pub(crate) struct FrictionJoint {
    pub(crate) def: FrictionJointDef,
    linear_impulse: Vec2,
    angular_impulse: f32,
    r_a: Vec2,
    r_b: Vec2,
    linear_mass: Mat2,
    angular_mass: f32,
}

impl FrictionJoint {
    fn new(def: FrictionJointDef) -> Self {
        Self {
            def,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            linear_mass: Mat2::ZERO,
            angular_mass: 0.0,
        }
    }

    fn init_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let a = bodies[ia];
        let b = bodies[ib];
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_inertia, b.inv_inertia);

        let q_a = Rot::new(a.position.angular);
        let q_b = Rot::new(b.position.angular);
        self.r_a = q_a.rotate(self.def.local_anchor_a - a.local_center);
        self.r_b = q_b.rotate(self.def.local_anchor_b - b.local_center);

        let k = Mat2::from_cols(
            Vec2::new(
                m_a + m_b + i_a * self.r_a.y * self.r_a.y + i_b * self.r_b.y * self.r_b.y,
                -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
            ),
            Vec2::new(
                -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
                m_a + m_b + i_a * self.r_a.x * self.r_a.x + i_b * self.r_b.x * self.r_b.x,
            ),
        );
        self.linear_mass = k.inverse();

        let inv_angular = i_a + i_b;
        self.angular_mass = if inv_angular > 0.0 { 1.0 / inv_angular } else { 0.0 };

        if conf.do_warm_start {
            self.linear_impulse *= conf.dt_ratio;
            self.angular_impulse *= conf.dt_ratio;
            let p = self.linear_impulse;
            bodies[ia].velocity.linear -= m_a * p;
            bodies[ia].velocity.angular -= i_a * (cross(self.r_a, p) + self.angular_impulse);
            bodies[ib].velocity.linear += m_b * p;
            bodies[ib].velocity.angular += i_b * (cross(self.r_b, p) + self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    fn solve_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut v_a = bodies[ia].velocity;
        let mut v_b = bodies[ib].velocity;
        let h = conf.dt;
        let mut inc: f32 = 0.0;

        // Angular friction
        {
            let cdot = v_b.angular - v_a.angular;
            let mut impulse = -self.angular_mass * cdot;
            let old = self.angular_impulse;
            let max = self.def.max_torque * h;
            self.angular_impulse = (old + impulse).clamp(-max, max);
            impulse = self.angular_impulse - old;
            inc = inc.max(impulse.abs());
            v_a.angular -= i_a * impulse;
            v_b.angular += i_b * impulse;
        }

        // Linear friction
        {
            let cdot = v_b.linear + cross_sv(v_b.angular, self.r_b)
                - v_a.linear
                - cross_sv(v_a.angular, self.r_a);
            let mut impulse = -(self.linear_mass * cdot);
            let old = self.linear_impulse;
            self.linear_impulse += impulse;

            let max = self.def.max_force * h;
            if self.linear_impulse.length_squared() > max * max {
                self.linear_impulse = self.linear_impulse.normalize() * max;
            }
            impulse = self.linear_impulse - old;
            inc = inc.max(impulse.length());

            v_a.linear -= m_a * impulse;
            v_a.angular -= i_a * cross(self.r_a, impulse);
            v_b.linear += m_b * impulse;
            v_b.angular += i_b * cross(self.r_b, impulse);
        }

        bodies[ia].velocity = v_a;
        bodies[ib].velocity = v_b;
        inc <= VELOCITY_TOLERANCE
    }
}

// ============================================================================
// Motor
// ============================================================================

#[derive(Clone, Debug)]
pub(crate) struct MotorJoint {
    pub(crate) def: MotorJointDef,
    linear_impulse: Vec2,
    angular_impulse: f32,
    r_a: Vec2,
    r_b: Vec2,
    linear_error: Vec2,
    angular_error: f32,
    linear_mass: Mat2,
    angular_mass: f32,
}

impl MotorJoint {
    fn new(def: MotorJointDef) -> Self {
        Self {
            def,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            linear_error: Vec2::ZERO,
            angular_error: 0.0,
            linear_mass: Mat2::ZERO,
            angular_mass: 0.0,
        }
    }

    fn init_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let a = bodies[ia];
        let b = bodies[ib];
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_inertia, b.inv_inertia);

        let q_a = Rot::new(a.position.angular);
        let q_b = Rot::new(b.position.angular);
        self.r_a = q_a.rotate(self.def.linear_offset - a.local_center);
        self.r_b = q_b.rotate(-b.local_center);

        self.linear_error = b.position.linear + self.r_b - a.position.linear - self.r_a;
        self.angular_error = b.position.angular - a.position.angular - self.def.angular_offset;

        let k = Mat2::from_cols(
            Vec2::new(
                m_a + m_b + i_a * self.r_a.y * self.r_a.y + i_b * self.r_b.y * self.r_b.y,
                -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
            ),
            Vec2::new(
                -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y,
                m_a + m_b + i_a * self.r_a.x * self.r_a.x + i_b * self.r_b.x * self.r_b.x,
            ),
        );
        self.linear_mass = k.inverse();
        let inv_angular = i_a + i_b;
        self.angular_mass = if inv_angular > 0.0 { 1.0 / inv_angular } else { 0.0 };

        if conf.do_warm_start {
            self.linear_impulse *= conf.dt_ratio;
            self.angular_impulse *= conf.dt_ratio;
            let p = self.linear_impulse;
            bodies[ia].velocity.linear -= m_a * p;
            bodies[ia].velocity.angular -= i_a * (cross(self.r_a, p) + self.angular_impulse);
            bodies[ib].velocity.linear += m_b * p;
            bodies[ib].velocity.angular += i_b * (cross(self.r_b, p) + self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }
    }

    fn solve_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut v_a = bodies[ia].velocity;
        let mut v_b = bodies[ib].velocity;
        let h = conf.dt;
        let inv_h = if h > 0.0 { 1.0 / h } else { 0.0 };
        let mut inc: f32 = 0.0;

        // Angular
        {
            let cdot =
                v_b.angular - v_a.angular + inv_h * self.def.correction_factor * self.angular_error;
            let mut impulse = -self.angular_mass * cdot;
            let old = self.angular_impulse;
            let max = self.def.max_torque * h;
            self.angular_impulse = (old + impulse).clamp(-max, max);
            impulse = self.angular_impulse - old;
            inc = inc.max(impulse.abs());
            v_a.angular -= i_a * impulse;
            v_b.angular += i_b * impulse;
        }

        // Linear
        {
            let cdot = v_b.linear + cross_sv(v_b.angular, self.r_b)
                - v_a.linear
                - cross_sv(v_a.angular, self.r_a)
                + inv_h * self.def.correction_factor * self.linear_error;
            let mut impulse = -(self.linear_mass * cdot);
            let old = self.linear_impulse;
            self.linear_impulse += impulse;

            let max = self.def.max_force * h;
            if self.linear_impulse.length_squared() > max * max {
                self.linear_impulse = self.linear_impulse.normalize() * max;
            }
            impulse = self.linear_impulse - old;
            inc = inc.max(impulse.length());

            v_a.linear -= m_a * impulse;
            v_a.angular -= i_a * cross(self.r_a, impulse);
            v_b.linear += m_b * impulse;
            v_b.angular += i_b * cross(self.r_b, impulse);
        }

        bodies[ia].velocity = v_a;
        bodies[ib].velocity = v_b;
        inc <= VELOCITY_TOLERANCE
    }
}

// ============================================================================
// Target
// ============================================================================

#[derive(Clone, Debug)]
pub(crate) struct TargetJoint {
    pub(crate) def: TargetJointDef,
    pub(crate) target: Vec2,
    impulse: Vec2,
    r_b: Vec2,
    mass: Mat2,
    c: Vec2,
    gamma: f32,
}

impl TargetJoint {
    fn new(def: TargetJointDef) -> Self {
        Self {
            target: def.target,
            def,
            impulse: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: Mat2::ZERO,
            c: Vec2::ZERO,
            gamma: 0.0,
        }
    }

    fn init_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) {
        let ib = self.def.body.0 as usize;
        let b = bodies[ib];
        let (m_b, i_b) = (b.inv_mass, b.inv_inertia);

        let mass = if m_b != 0.0 { 1.0 / m_b } else { 0.0 };
        let omega = 2.0 * core::f32::consts::PI * self.def.frequency;
        let d = 2.0 * mass * self.def.damping_ratio * omega;
        let k = mass * omega * omega;
        let h = conf.dt;
        self.gamma = h * (d + h * k);
        self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
        let beta = h * k * self.gamma;

        let q_b = Rot::new(b.position.angular);
        self.r_b = q_b.rotate(self.def.local_anchor - b.local_center);

        let k_mat = Mat2::from_cols(
            Vec2::new(
                m_b + i_b * self.r_b.y * self.r_b.y + self.gamma,
                -i_b * self.r_b.x * self.r_b.y,
            ),
            Vec2::new(
                -i_b * self.r_b.x * self.r_b.y,
                m_b + i_b * self.r_b.x * self.r_b.x + self.gamma,
            ),
        );
        self.mass = k_mat.inverse();

        self.c = (b.position.linear + self.r_b - self.target) * beta;

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            bodies[ib].velocity.linear += m_b * self.impulse;
            bodies[ib].velocity.angular += i_b * cross(self.r_b, self.impulse);
        } else {
            self.impulse = Vec2::ZERO;
        }
    }

    fn solve_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        let ib = self.def.body.0 as usize;
        let (m_b, i_b) = (bodies[ib].inv_mass, bodies[ib].inv_inertia);
        let mut v_b = bodies[ib].velocity;

        let cdot = v_b.linear + cross_sv(v_b.angular, self.r_b);
        let mut impulse = self.mass * (-(cdot + self.c + self.gamma * self.impulse));

        let old = self.impulse;
        self.impulse += impulse;
        let max = self.def.max_force * conf.dt;
        if self.impulse.length_squared() > max * max {
            self.impulse = self.impulse.normalize() * max;
        }
        impulse = self.impulse - old;

        v_b.linear += m_b * impulse;
        v_b.angular += i_b * cross(self.r_b, impulse);

        bodies[ib].velocity = v_b;
        impulse.length() <= VELOCITY_TOLERANCE
    }
}

// ============================================================================
// Small dense solves
// ============================================================================

/// Solve `k x = b` for a symmetric 2x2 system without forming the inverse.
#[inline]
pub(crate) fn solve22(k: Mat2, b: Vec2) -> Vec2 {
    let a11 = k.col(0).x;
    let a12 = k.col(1).x;
    let a21 = k.col(0).y;
    let a22 = k.col(1).y;
    let mut det = a11 * a22 - a12 * a21;
    if det != 0.0 {
        det = 1.0 / det;
    }
    Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
}

/// Solve `k x = b` for a symmetric 3x3 system via Cramer's rule.
pub(crate) fn solve33(k: [[f32; 3]; 3], b: [f32; 3]) -> [f32; 3] {
    let m = invert33(k);
    mul33(&m, b)
}

fn det33(k: &[[f32; 3]; 3]) -> f32 {
    k[0][0] * (k[1][1] * k[2][2] - k[1][2] * k[2][1])
        - k[0][1] * (k[1][0] * k[2][2] - k[1][2] * k[2][0])
        + k[0][2] * (k[1][0] * k[2][1] - k[1][1] * k[2][0])
}

/// Inverse of a symmetric 3x3 matrix (zero matrix on singularity).
pub(crate) fn invert33(k: [[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let mut det = det33(&k);
    if det != 0.0 {
        det = 1.0 / det;
    }
    let mut out = [[0.0; 3]; 3];
    out[0][0] = det * (k[1][1] * k[2][2] - k[1][2] * k[2][1]);
    out[0][1] = det * (k[0][2] * k[2][1] - k[0][1] * k[2][2]);
    out[0][2] = det * (k[0][1] * k[1][2] - k[0][2] * k[1][1]);
    out[1][0] = out[0][1];
    out[1][1] = det * (k[0][0] * k[2][2] - k[0][2] * k[2][0]);
    out[1][2] = det * (k[0][2] * k[1][0] - k[0][0] * k[1][2]);
    out[2][0] = out[0][2];
    out[2][1] = out[1][2];
    out[2][2] = det * (k[0][0] * k[1][1] - k[0][1] * k[1][0]);
    out
}

/// Inverse of the upper-left 2x2 block, embedded in a 3x3 (for soft welds).
pub(crate) fn invert33_sym22(k: [[f32; 3]; 3]) -> [[f32; 3]; 3] {
    let mut det = k[0][0] * k[1][1] - k[0][1] * k[1][0];
    if det != 0.0 {
        det = 1.0 / det;
    }
    let mut out = [[0.0; 3]; 3];
    out[0][0] = det * k[1][1];
    out[0][1] = -det * k[0][1];
    out[1][0] = -det * k[1][0];
    out[1][1] = det * k[0][0];
    out
}

#[inline]
fn mul22(m: &[[f32; 3]; 3], v: Vec2) -> Vec2 {
    Vec2::new(
        m[0][0] * v.x + m[0][1] * v.y,
        m[1][0] * v.x + m[1][1] * v.y,
    )
}

#[inline]
pub(crate) fn mul33(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [
        m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
        m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
        m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
    ]
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Position;

    fn dynamic_constraint(x: f32, y: f32) -> BodyConstraint {
        BodyConstraint {
            position: Position::new(Vec2::new(x, y), 0.0),
            inv_mass: 1.0,
            inv_inertia: 1.0,
            ..Default::default()
        }
    }

    fn conf() -> StepConf {
        StepConf::default()
    }

    #[test]
    fn test_solve22() {
        let k = Mat2::from_cols(Vec2::new(2.0, 0.0), Vec2::new(0.0, 4.0));
        let x = solve22(k, Vec2::new(2.0, 8.0));
        assert!((x - Vec2::new(1.0, 2.0)).length() < 1e-6);
    }

    #[test]
    fn test_invert33_identity() {
        let k = [[2.0, 0.0, 0.0], [0.0, 4.0, 0.0], [0.0, 0.0, 8.0]];
        let m = invert33(k);
        let x = mul33(&m, [2.0, 4.0, 8.0]);
        assert!((x[0] - 1.0).abs() < 1e-6);
        assert!((x[1] - 1.0).abs() < 1e-6);
        assert!((x[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_joint_pulls_bodies_together() {
        let mut bodies = vec![dynamic_constraint(0.0, 0.0), dynamic_constraint(3.0, 0.0)];
        let def = DistanceJointDef::new(BodyId(0), BodyId(1), 2.0);
        let mut joint = Joint::new(&JointDef::Distance(def)).unwrap();

        let conf = conf();
        joint.init_velocity(&mut bodies, &conf);
        for _ in 0..8 {
            joint.solve_velocity(&mut bodies, &conf);
        }
        for _ in 0..10 {
            if joint.solve_position(&mut bodies, &conf) {
                break;
            }
        }

        let d = (bodies[1].position.linear - bodies[0].position.linear).length();
        assert!((d - 2.0).abs() < 0.01, "Distance should converge to rest length, got {d}");
    }

    #[test]
    fn test_rope_joint_only_pulls() {
        // Inside the max length: no impulse at all.
        let mut bodies = vec![dynamic_constraint(0.0, 0.0), dynamic_constraint(1.0, 0.0)];
        bodies[1].velocity.linear = Vec2::new(-1.0, 0.0); // moving closer
        let def = RopeJointDef {
            body_a: BodyId(0),
            body_b: BodyId(1),
            collide_connected: false,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            max_length: 2.0,
        };
        let mut joint = Joint::new(&JointDef::Rope(def)).unwrap();
        let conf = conf();
        joint.init_velocity(&mut bodies, &conf);
        joint.solve_velocity(&mut bodies, &conf);
        assert!(
            (bodies[1].velocity.linear.x + 1.0).abs() < 1e-5,
            "A slack rope must not resist approaching bodies"
        );

        if let JointData::Rope(r) = &joint.data {
            assert!(r.impulse() <= 0.0);
        }
    }

    #[test]
    fn test_rope_joint_position_clamp() {
        let mut bodies = vec![dynamic_constraint(0.0, 0.0), dynamic_constraint(3.0, 0.0)];
        let def = RopeJointDef {
            body_a: BodyId(0),
            body_b: BodyId(1),
            collide_connected: false,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            max_length: 2.0,
        };
        let mut joint = Joint::new(&JointDef::Rope(def)).unwrap();
        let conf = conf();
        joint.init_velocity(&mut bodies, &conf);
        for _ in 0..20 {
            if joint.solve_position(&mut bodies, &conf) {
                break;
            }
        }
        let d = (bodies[1].position.linear - bodies[0].position.linear).length();
        assert!(d <= 2.0 + conf.linear_slop, "Rope upper limit violated: {d}");
    }

    #[test]
    fn test_revolute_holds_anchor() {
        let mut bodies = vec![dynamic_constraint(0.0, 0.0), dynamic_constraint(2.0, 0.0)];
        let mut def = RevoluteJointDef::new(BodyId(0), BodyId(1));
        def.local_anchor_a = Vec2::new(1.0, 0.0);
        def.local_anchor_b = Vec2::new(-1.0, 0.0);
        let mut joint = Joint::new(&JointDef::Revolute(def)).unwrap();
        let conf = conf();

        // Pull body B away and let the joint correct it.
        bodies[1].position.linear = Vec2::new(2.5, 0.0);
        joint.init_velocity(&mut bodies, &conf);
        for _ in 0..20 {
            if joint.solve_position(&mut bodies, &conf) {
                break;
            }
        }
        let anchor_a = bodies[0].position.linear + Vec2::new(1.0, 0.0);
        let anchor_b = bodies[1].position.linear + Vec2::new(-1.0, 0.0);
        assert!(
            (anchor_a - anchor_b).length() < 0.01,
            "Revolute anchors should coincide after position solve"
        );
    }

    #[test]
    fn test_prismatic_limit_state() {
        let mut bodies = vec![dynamic_constraint(-1.0, 0.0), dynamic_constraint(1.0, 0.0)];
        let mut def = PrismaticJointDef::new(BodyId(0), BodyId(1), Vec2::new(1.0, 0.0));
        def.enable_limit = true;
        def.lower_translation = 0.0;
        def.upper_translation = 4.0;
        let mut joint = Joint::new(&JointDef::Prismatic(def)).unwrap();
        let conf = conf();
        joint.init_velocity(&mut bodies, &conf);
        // Translation is 2 with limits [0, 4]: inside the range.
        assert_eq!(joint.limit_state(), Some(LimitState::Inactive));

        // Limits [-4, 2]: translation sits at the upper limit.
        if let JointData::Prismatic(p) = &mut joint.data {
            p.def.lower_translation = -4.0;
            p.def.upper_translation = 2.0;
        }
        joint.init_velocity(&mut bodies, &conf);
        assert_eq!(joint.limit_state(), Some(LimitState::AtUpper));
        if let JointData::Prismatic(p) = &joint.data {
            assert!((p.translation() - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_prismatic_equal_limits_lock_translation() {
        let mut bodies = vec![dynamic_constraint(-1.0, 0.0), dynamic_constraint(1.0, 0.0)];
        let mut def = PrismaticJointDef::new(BodyId(0), BodyId(1), Vec2::new(1.0, 0.0));
        def.local_anchor_a = Vec2::ZERO;
        def.local_anchor_b = Vec2::ZERO;
        def.enable_limit = true;
        def.lower_translation = 0.0;
        def.upper_translation = 0.0;
        let mut joint = Joint::new(&JointDef::Prismatic(def)).unwrap();
        let conf = conf();

        joint.init_velocity(&mut bodies, &conf);
        assert_eq!(joint.limit_state(), Some(LimitState::Equal));
        for _ in 0..30 {
            if joint.solve_position(&mut bodies, &conf) {
                break;
            }
        }
        // The separation along the axis collapses toward zero.
        let d = bodies[1].position.linear - bodies[0].position.linear;
        assert!(d.x.abs() < 1e-2, "Equal limits should pin the translation, got {}", d.x);
    }

    #[test]
    fn test_target_joint_accelerates_toward_target() {
        let mut bodies = vec![dynamic_constraint(0.0, 0.0)];
        let def = TargetJointDef {
            body: BodyId(0),
            local_anchor: Vec2::ZERO,
            target: Vec2::new(10.0, 0.0),
            max_force: 1000.0,
            frequency: 5.0,
            damping_ratio: 0.7,
        };
        let mut joint = Joint::new(&JointDef::Target(def)).unwrap();
        let conf = conf();
        joint.init_velocity(&mut bodies, &conf);
        for _ in 0..8 {
            joint.solve_velocity(&mut bodies, &conf);
        }
        assert!(bodies[0].velocity.linear.x > 0.0, "Body should be dragged toward the target");
        assert!(joint.body_b().is_none());
        assert!(joint.solve_position(&mut bodies, &conf), "Target joints have no position error");
    }

    #[test]
    fn test_friction_joint_damps_motion() {
        let mut bodies = vec![dynamic_constraint(0.0, 0.0), dynamic_constraint(1.0, 0.0)];
        bodies[1].velocity.linear = Vec2::new(4.0, 0.0);
        let def = FrictionJointDef {
            body_a: BodyId(0),
            body_b: BodyId(1),
            collide_connected: false,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            max_force: 100.0,
            max_torque: 100.0,
        };
        let mut joint = Joint::new(&JointDef::Friction(def)).unwrap();
        let conf = conf();
        joint.init_velocity(&mut bodies, &conf);
        let before = (bodies[1].velocity.linear - bodies[0].velocity.linear).length();
        for _ in 0..8 {
            joint.solve_velocity(&mut bodies, &conf);
        }
        let after = (bodies[1].velocity.linear - bodies[0].velocity.linear).length();
        assert!(after < before, "Friction must reduce relative speed");
    }

    #[test]
    fn test_weld_locks_relative_angle() {
        let mut bodies = vec![dynamic_constraint(0.0, 0.0), dynamic_constraint(1.0, 0.0)];
        bodies[1].position.angular = 0.3;
        let def = WeldJointDef {
            body_a: BodyId(0),
            body_b: BodyId(1),
            collide_connected: false,
            local_anchor_a: Vec2::new(0.5, 0.0),
            local_anchor_b: Vec2::new(-0.5, 0.0),
            reference_angle: 0.0,
            frequency: 0.0,
            damping_ratio: 0.0,
        };
        let mut joint = Joint::new(&JointDef::Weld(def)).unwrap();
        let conf = conf();
        joint.init_velocity(&mut bodies, &conf);
        for _ in 0..30 {
            if joint.solve_position(&mut bodies, &conf) {
                break;
            }
        }
        let rel = bodies[1].position.angular - bodies[0].position.angular;
        assert!(rel.abs() < 0.01, "Weld should erase the relative angle, got {rel}");
    }

    #[test]
    fn test_reaction_scales_with_inv_dt() {
        let def = DistanceJointDef::new(BodyId(0), BodyId(1), 1.0);
        let joint = Joint::new(&JointDef::Distance(def)).unwrap();
        let (force, torque) = joint.reaction(60.0);
        assert_eq!(force, Vec2::ZERO, "No impulse accumulated yet");
        assert_eq!(torque, 0.0);
    }
}

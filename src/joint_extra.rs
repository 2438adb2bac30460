//! Extended Joint Types for Mechanical Linkages
//!
//! Additional joint kinds beyond the core set in [`crate::joint`]:
//!
//! - **`PulleyJoint`**: two bodies hung from ground anchors over a pulley
//!   with a configurable ratio
//! - **`GearJoint`**: couples the coordinates of two revolute or prismatic
//!   joints
//! - **`WheelJoint`**: an axle: free axis translation through a spring, with
//!   an optional rotational motor
//!
//! All kinds implement the same solver contract as the core joints and are
//! dispatched from [`crate::joint::Joint`].

use crate::body::BodyId;
use crate::config::StepConf;
use crate::island::BodyConstraint;
use crate::joint::{JointData, VELOCITY_TOLERANCE};
use crate::math::{cross, cross_sv, Rot, Transform, Vec2};

// ============================================================================
// PulleyJoint
// ============================================================================

/// Construction parameters for a pulley joint.
///
/// The constraint maintains `length_a + ratio * length_b = constant`, where
/// `length_a` is the rope length from `ground_anchor_a` to body A's anchor
/// and `length_b` likewise for body B.
#[derive(Clone, Copy, Debug)]
pub struct PulleyJointDef {
    /// First body
    pub body_a: BodyId,
    /// Second body
    pub body_b: BodyId,
    /// World-space fixed anchor for side A
    pub ground_anchor_a: Vec2,
    /// World-space fixed anchor for side B
    pub ground_anchor_b: Vec2,
    /// Anchor in body A local coordinates
    pub local_anchor_a: Vec2,
    /// Anchor in body B local coordinates
    pub local_anchor_b: Vec2,
    /// Rest rope length on side A
    pub length_a: f32,
    /// Rest rope length on side B
    pub length_b: f32,
    /// Mechanical advantage of side A over side B (> 0)
    pub ratio: f32,
}

#[derive(Clone, Debug)]
pub(crate) struct PulleyJoint {
    pub(crate) def: PulleyJointDef,
    /// World ground anchors, relocatable by shift-origin.
    pub(crate) ground_anchor_a: Vec2,
    pub(crate) ground_anchor_b: Vec2,
    constant: f32,
    pub(crate) impulse: f32,
    r_a: Vec2,
    r_b: Vec2,
    u_a: Vec2,
    pub(crate) u_b: Vec2,
    mass: f32,
}

impl PulleyJoint {
    pub(crate) fn new(def: PulleyJointDef) -> Self {
        Self {
            ground_anchor_a: def.ground_anchor_a,
            ground_anchor_b: def.ground_anchor_b,
            constant: def.length_a + def.ratio * def.length_b,
            def,
            impulse: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            u_a: Vec2::ZERO,
            u_b: Vec2::ZERO,
            mass: 0.0,
        }
    }

    pub(crate) fn init_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let a = bodies[ia];
        let b = bodies[ib];
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_inertia, b.inv_inertia);

        let q_a = Rot::new(a.position.angular);
        let q_b = Rot::new(b.position.angular);
        self.r_a = q_a.rotate(self.def.local_anchor_a - a.local_center);
        self.r_b = q_b.rotate(self.def.local_anchor_b - b.local_center);

        self.u_a = a.position.linear + self.r_a - self.ground_anchor_a;
        self.u_b = b.position.linear + self.r_b - self.ground_anchor_b;

        let length_a = self.u_a.length();
        let length_b = self.u_b.length();
        self.u_a = if length_a > 10.0 * conf.linear_slop {
            self.u_a / length_a
        } else {
            Vec2::ZERO
        };
        self.u_b = if length_b > 10.0 * conf.linear_slop {
            self.u_b / length_b
        } else {
            Vec2::ZERO
        };

        let ru_a = cross(self.r_a, self.u_a);
        let ru_b = cross(self.r_b, self.u_b);
        let mass_a = m_a + i_a * ru_a * ru_a;
        let mass_b = m_b + i_b * ru_b * ru_b;
        let inv_mass = mass_a + self.def.ratio * self.def.ratio * mass_b;
        self.mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            let p_a = -self.impulse * self.u_a;
            let p_b = -self.def.ratio * self.impulse * self.u_b;
            bodies[ia].velocity.linear += m_a * p_a;
            bodies[ia].velocity.angular += i_a * cross(self.r_a, p_a);
            bodies[ib].velocity.linear += m_b * p_b;
            bodies[ib].velocity.angular += i_b * cross(self.r_b, p_b);
        } else {
            self.impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity(&mut self, bodies: &mut [BodyConstraint], _conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut v_a = bodies[ia].velocity;
        let mut v_b = bodies[ib].velocity;

        let vp_a = v_a.linear + cross_sv(v_a.angular, self.r_a);
        let vp_b = v_b.linear + cross_sv(v_b.angular, self.r_b);

        let cdot = -self.u_a.dot(vp_a) - self.def.ratio * self.u_b.dot(vp_b);
        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        let p_a = -impulse * self.u_a;
        let p_b = -self.def.ratio * impulse * self.u_b;
        v_a.linear += m_a * p_a;
        v_a.angular += i_a * cross(self.r_a, p_a);
        v_b.linear += m_b * p_b;
        v_b.angular += i_b * cross(self.r_b, p_b);

        bodies[ia].velocity = v_a;
        bodies[ib].velocity = v_b;
        impulse.abs() <= VELOCITY_TOLERANCE
    }

    pub(crate) fn solve_position(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut pos_a = bodies[ia].position;
        let mut pos_b = bodies[ib].position;

        let q_a = Rot::new(pos_a.angular);
        let q_b = Rot::new(pos_b.angular);
        let r_a = q_a.rotate(self.def.local_anchor_a - bodies[ia].local_center);
        let r_b = q_b.rotate(self.def.local_anchor_b - bodies[ib].local_center);

        let mut u_a = pos_a.linear + r_a - self.ground_anchor_a;
        let mut u_b = pos_b.linear + r_b - self.ground_anchor_b;

        let length_a = u_a.length();
        let length_b = u_b.length();
        u_a = if length_a > 10.0 * conf.linear_slop {
            u_a / length_a
        } else {
            Vec2::ZERO
        };
        u_b = if length_b > 10.0 * conf.linear_slop {
            u_b / length_b
        } else {
            Vec2::ZERO
        };

        let ru_a = cross(r_a, u_a);
        let ru_b = cross(r_b, u_b);
        let mass_a = m_a + i_a * ru_a * ru_a;
        let mass_b = m_b + i_b * ru_b * ru_b;
        let inv_mass = mass_a + self.def.ratio * self.def.ratio * mass_b;
        let mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        let c = self.constant - length_a - self.def.ratio * length_b;
        let linear_error = c.abs();
        let impulse = -mass * c;

        let p_a = -impulse * u_a;
        let p_b = -self.def.ratio * impulse * u_b;
        pos_a.linear += m_a * p_a;
        pos_a.angular += i_a * cross(r_a, p_a);
        pos_b.linear += m_b * p_b;
        pos_b.angular += i_b * cross(r_b, p_b);

        bodies[ia].position = pos_a;
        bodies[ib].position = pos_b;
        linear_error < conf.linear_slop
    }
}

// ============================================================================
// GearJoint
// ============================================================================

/// Construction parameters for a gear joint.
///
/// Couples the coordinates of two existing revolute or prismatic joints so
/// that `coordinate₁ + ratio * coordinate₂` stays constant.
#[derive(Clone, Copy, Debug)]
pub struct GearJointDef {
    /// First referenced joint (revolute or prismatic)
    pub joint_1: crate::joint::JointId,
    /// Second referenced joint (revolute or prismatic)
    pub joint_2: crate::joint::JointId,
    /// Gear ratio
    pub ratio: f32,
}

/// Which flavor of base joint a gear side couples to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum GearSide {
    Revolute,
    Prismatic,
}

#[derive(Clone, Debug)]
pub(crate) struct GearJoint {
    /// The referenced base joints, for destroy-order validation.
    pub(crate) joint_1: crate::joint::JointId,
    pub(crate) joint_2: crate::joint::JointId,
    // Bodies: A = joint1's second body, B = joint2's second body,
    // C = joint1's first body, D = joint2's first body.
    body_a: BodyId,
    body_b: BodyId,
    body_c: BodyId,
    body_d: BodyId,
    side_a: GearSide,
    side_b: GearSide,
    local_anchor_a: Vec2,
    local_anchor_b: Vec2,
    local_anchor_c: Vec2,
    local_anchor_d: Vec2,
    local_axis_c: Vec2,
    local_axis_d: Vec2,
    reference_angle_a: f32,
    reference_angle_b: f32,
    ratio: f32,
    constant: f32,

    pub(crate) impulse: f32,
    pub(crate) jv_ac: Vec2,
    jv_bd: Vec2,
    pub(crate) j_wa: f32,
    j_wb: f32,
    j_wc: f32,
    j_wd: f32,
    mass: f32,
}

impl GearJoint {
    /// Assemble a gear from its definition and the resolved base joints,
    /// evaluated at the given body transforms. Returns `None` when a base
    /// joint is neither revolute nor prismatic.
    pub(crate) fn from_parts(
        def: &GearJointDef,
        joint_1: &crate::joint::Joint,
        joint_2: &crate::joint::Joint,
        xf_a: Transform,
        xf_b: Transform,
        xf_c: Transform,
        xf_d: Transform,
    ) -> Option<Self> {
        let body_c = joint_1.body_a();
        let body_a = joint_1.body_b()?;
        let body_d = joint_2.body_a();
        let body_b = joint_2.body_b()?;

        let (side_a, local_anchor_c, local_anchor_a, local_axis_c, reference_angle_a, coordinate_a) =
            match &joint_1.data {
                JointData::Revolute(j) => (
                    GearSide::Revolute,
                    j.def.local_anchor_a,
                    j.def.local_anchor_b,
                    Vec2::ZERO,
                    j.def.reference_angle,
                    xf_a.q.angle() - xf_c.q.angle() - j.def.reference_angle,
                ),
                JointData::Prismatic(j) => {
                    let p_c = j.def.local_anchor_a;
                    let p_a = xf_c
                        .q
                        .inv_rotate(xf_a.q.rotate(j.def.local_anchor_b) + (xf_a.p - xf_c.p));
                    (
                        GearSide::Prismatic,
                        j.def.local_anchor_a,
                        j.def.local_anchor_b,
                        j.def.local_axis_a,
                        j.def.reference_angle,
                        (p_a - p_c).dot(j.def.local_axis_a),
                    )
                }
                _ => return None,
            };

        let (side_b, local_anchor_d, local_anchor_b, local_axis_d, reference_angle_b, coordinate_b) =
            match &joint_2.data {
                JointData::Revolute(j) => (
                    GearSide::Revolute,
                    j.def.local_anchor_a,
                    j.def.local_anchor_b,
                    Vec2::ZERO,
                    j.def.reference_angle,
                    xf_b.q.angle() - xf_d.q.angle() - j.def.reference_angle,
                ),
                JointData::Prismatic(j) => {
                    let p_d = j.def.local_anchor_a;
                    let p_b = xf_d
                        .q
                        .inv_rotate(xf_b.q.rotate(j.def.local_anchor_b) + (xf_b.p - xf_d.p));
                    (
                        GearSide::Prismatic,
                        j.def.local_anchor_a,
                        j.def.local_anchor_b,
                        j.def.local_axis_a,
                        j.def.reference_angle,
                        (p_b - p_d).dot(j.def.local_axis_a),
                    )
                }
                _ => return None,
            };

        Some(Self {
            joint_1: def.joint_1,
            joint_2: def.joint_2,
            body_a,
            body_b,
            body_c,
            body_d,
            side_a,
            side_b,
            local_anchor_a,
            local_anchor_b,
            local_anchor_c,
            local_anchor_d,
            local_axis_c,
            local_axis_d,
            reference_angle_a,
            reference_angle_b,
            ratio: def.ratio,
            constant: coordinate_a + def.ratio * coordinate_b,
            impulse: 0.0,
            jv_ac: Vec2::ZERO,
            jv_bd: Vec2::ZERO,
            j_wa: 0.0,
            j_wb: 0.0,
            j_wc: 0.0,
            j_wd: 0.0,
            mass: 0.0,
        })
    }

    pub(crate) fn init_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) {
        let (ia, ib) = (self.body_a.0 as usize, self.body_b.0 as usize);
        let (ic, id) = (self.body_c.0 as usize, self.body_d.0 as usize);

        let a = bodies[ia];
        let b = bodies[ib];
        let c = bodies[ic];
        let d = bodies[id];

        let q_a = Rot::new(a.position.angular);
        let q_b = Rot::new(b.position.angular);
        let q_c = Rot::new(c.position.angular);
        let q_d = Rot::new(d.position.angular);

        let mut mass = 0.0;

        match self.side_a {
            GearSide::Revolute => {
                self.jv_ac = Vec2::ZERO;
                self.j_wa = 1.0;
                self.j_wc = 1.0;
                mass += a.inv_inertia + c.inv_inertia;
            }
            GearSide::Prismatic => {
                let u = q_c.rotate(self.local_axis_c);
                let r_c = q_c.rotate(self.local_anchor_c - c.local_center);
                let r_a = q_a.rotate(self.local_anchor_a - a.local_center);
                self.jv_ac = u;
                self.j_wc = cross(r_c, u);
                self.j_wa = cross(r_a, u);
                mass += c.inv_mass
                    + a.inv_mass
                    + c.inv_inertia * self.j_wc * self.j_wc
                    + a.inv_inertia * self.j_wa * self.j_wa;
            }
        }

        match self.side_b {
            GearSide::Revolute => {
                self.jv_bd = Vec2::ZERO;
                self.j_wb = self.ratio;
                self.j_wd = self.ratio;
                mass += self.ratio * self.ratio * (b.inv_inertia + d.inv_inertia);
            }
            GearSide::Prismatic => {
                let u = q_d.rotate(self.local_axis_d);
                let r_d = q_d.rotate(self.local_anchor_d - d.local_center);
                let r_b = q_b.rotate(self.local_anchor_b - b.local_center);
                self.jv_bd = self.ratio * u;
                self.j_wd = self.ratio * cross(r_d, u);
                self.j_wb = self.ratio * cross(r_b, u);
                mass += self.ratio * self.ratio * (d.inv_mass + b.inv_mass)
                    + d.inv_inertia * self.j_wd * self.j_wd
                    + b.inv_inertia * self.j_wb * self.j_wb;
            }
        }

        self.mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            self.apply_impulse(bodies, self.impulse);
        } else {
            self.impulse = 0.0;
        }
    }

    fn apply_impulse(&self, bodies: &mut [BodyConstraint], impulse: f32) {
        let (ia, ib) = (self.body_a.0 as usize, self.body_b.0 as usize);
        let (ic, id) = (self.body_c.0 as usize, self.body_d.0 as usize);

        let m_a = bodies[ia].inv_mass;
        let m_b = bodies[ib].inv_mass;
        let m_c = bodies[ic].inv_mass;
        let m_d = bodies[id].inv_mass;

        bodies[ia].velocity.linear += m_a * impulse * self.jv_ac;
        bodies[ia].velocity.angular += bodies[ia].inv_inertia * impulse * self.j_wa;
        bodies[ib].velocity.linear += m_b * impulse * self.jv_bd;
        bodies[ib].velocity.angular += bodies[ib].inv_inertia * impulse * self.j_wb;
        bodies[ic].velocity.linear -= m_c * impulse * self.jv_ac;
        bodies[ic].velocity.angular -= bodies[ic].inv_inertia * impulse * self.j_wc;
        bodies[id].velocity.linear -= m_d * impulse * self.jv_bd;
        bodies[id].velocity.angular -= bodies[id].inv_inertia * impulse * self.j_wd;
    }

    pub(crate) fn solve_velocity(&mut self, bodies: &mut [BodyConstraint], _conf: &StepConf) -> bool {
        let (ia, ib) = (self.body_a.0 as usize, self.body_b.0 as usize);
        let (ic, id) = (self.body_c.0 as usize, self.body_d.0 as usize);

        let v_a = bodies[ia].velocity;
        let v_b = bodies[ib].velocity;
        let v_c = bodies[ic].velocity;
        let v_d = bodies[id].velocity;

        let cdot = self.jv_ac.dot(v_a.linear - v_c.linear)
            + self.jv_bd.dot(v_b.linear - v_d.linear)
            + self.j_wa * v_a.angular
            - self.j_wc * v_c.angular
            + self.j_wb * v_b.angular
            - self.j_wd * v_d.angular;

        let impulse = -self.mass * cdot;
        self.impulse += impulse;
        self.apply_impulse(bodies, impulse);

        impulse.abs() <= VELOCITY_TOLERANCE
    }

    pub(crate) fn solve_position(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        let (ia, ib) = (self.body_a.0 as usize, self.body_b.0 as usize);
        let (ic, id) = (self.body_c.0 as usize, self.body_d.0 as usize);

        let a = bodies[ia];
        let b = bodies[ib];
        let c = bodies[ic];
        let d = bodies[id];

        let q_a = Rot::new(a.position.angular);
        let q_b = Rot::new(b.position.angular);
        let q_c = Rot::new(c.position.angular);
        let q_d = Rot::new(d.position.angular);

        let mut mass = 0.0;
        let (jv_ac, j_wa, j_wc, coordinate_a) = match self.side_a {
            GearSide::Revolute => {
                mass += a.inv_inertia + c.inv_inertia;
                (
                    Vec2::ZERO,
                    1.0,
                    1.0,
                    a.position.angular - c.position.angular - self.reference_angle_a,
                )
            }
            GearSide::Prismatic => {
                let u = q_c.rotate(self.local_axis_c);
                let r_c = q_c.rotate(self.local_anchor_c - c.local_center);
                let r_a = q_a.rotate(self.local_anchor_a - a.local_center);
                let j_wc = cross(r_c, u);
                let j_wa = cross(r_a, u);
                mass += c.inv_mass
                    + a.inv_mass
                    + c.inv_inertia * j_wc * j_wc
                    + a.inv_inertia * j_wa * j_wa;
                let p_c = self.local_anchor_c - c.local_center;
                let p_a = q_c.inv_rotate(r_a + (a.position.linear - c.position.linear));
                (u, j_wa, j_wc, (p_a - p_c).dot(self.local_axis_c))
            }
        };
        let (jv_bd, j_wb, j_wd, coordinate_b) = match self.side_b {
            GearSide::Revolute => {
                mass += self.ratio * self.ratio * (b.inv_inertia + d.inv_inertia);
                (
                    Vec2::ZERO,
                    self.ratio,
                    self.ratio,
                    b.position.angular - d.position.angular - self.reference_angle_b,
                )
            }
            GearSide::Prismatic => {
                let u = q_d.rotate(self.local_axis_d);
                let r_d = q_d.rotate(self.local_anchor_d - d.local_center);
                let r_b = q_b.rotate(self.local_anchor_b - b.local_center);
                let j_wd = self.ratio * cross(r_d, u);
                let j_wb = self.ratio * cross(r_b, u);
                mass += self.ratio * self.ratio * (d.inv_mass + b.inv_mass)
                    + d.inv_inertia * j_wd * j_wd
                    + b.inv_inertia * j_wb * j_wb;
                let p_d = self.local_anchor_d - d.local_center;
                let p_b = q_d.inv_rotate(r_b + (b.position.linear - d.position.linear));
                (self.ratio * u, j_wb, j_wd, (p_b - p_d).dot(self.local_axis_d))
            }
        };

        let c_err = coordinate_a + self.ratio * coordinate_b - self.constant;
        let impulse = if mass > 0.0 { -c_err / mass } else { 0.0 };

        bodies[ia].position.linear += a.inv_mass * impulse * jv_ac;
        bodies[ia].position.angular += a.inv_inertia * impulse * j_wa;
        bodies[ib].position.linear += b.inv_mass * impulse * jv_bd;
        bodies[ib].position.angular += b.inv_inertia * impulse * j_wb;
        bodies[ic].position.linear -= c.inv_mass * impulse * jv_ac;
        bodies[ic].position.angular -= c.inv_inertia * impulse * j_wc;
        bodies[id].position.linear -= d.inv_mass * impulse * jv_bd;
        bodies[id].position.angular -= d.inv_inertia * impulse * j_wd;

        c_err.abs() < conf.linear_slop
    }
}

// ============================================================================
// WheelJoint
// ============================================================================

/// Construction parameters for a wheel joint: body B rides along an axis of
/// body A through a suspension spring, with free rotation and an optional
/// rotational motor.
#[derive(Clone, Copy, Debug)]
pub struct WheelJointDef {
    /// Chassis body
    pub body_a: BodyId,
    /// Wheel body
    pub body_b: BodyId,
    /// Whether the bodies may still collide with each other
    pub collide_connected: bool,
    /// Anchor in body A local coordinates
    pub local_anchor_a: Vec2,
    /// Anchor in body B local coordinates
    pub local_anchor_b: Vec2,
    /// Suspension axis in body A local coordinates (unit)
    pub local_axis_a: Vec2,
    /// Whether the motor applies
    pub enable_motor: bool,
    /// Motor target angular speed (rad/s)
    pub motor_speed: f32,
    /// Motor torque cap (N·m)
    pub max_motor_torque: f32,
    /// Suspension spring frequency (Hz); 0 makes the axis rigid-free
    pub frequency: f32,
    /// Suspension damping ratio
    pub damping_ratio: f32,
}

#[derive(Clone, Debug)]
pub(crate) struct WheelJoint {
    pub(crate) def: WheelJointDef,
    pub(crate) impulse: f32,
    pub(crate) motor_impulse: f32,
    pub(crate) spring_impulse: f32,
    pub(crate) ax: Vec2,
    pub(crate) ay: Vec2,
    s_ax: f32,
    s_bx: f32,
    s_ay: f32,
    s_by: f32,
    mass: f32,
    motor_mass: f32,
    spring_mass: f32,
    bias: f32,
    gamma: f32,
}

impl WheelJoint {
    pub(crate) fn new(def: WheelJointDef) -> Self {
        Self {
            def,
            impulse: 0.0,
            motor_impulse: 0.0,
            spring_impulse: 0.0,
            ax: Vec2::ZERO,
            ay: Vec2::ZERO,
            s_ax: 0.0,
            s_bx: 0.0,
            s_ay: 0.0,
            s_by: 0.0,
            mass: 0.0,
            motor_mass: 0.0,
            spring_mass: 0.0,
            bias: 0.0,
            gamma: 0.0,
        }
    }

    pub(crate) fn init_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let a = bodies[ia];
        let b = bodies[ib];
        let (m_a, m_b, i_a, i_b) = (a.inv_mass, b.inv_mass, a.inv_inertia, b.inv_inertia);

        let q_a = Rot::new(a.position.angular);
        let q_b = Rot::new(b.position.angular);
        let r_a = q_a.rotate(self.def.local_anchor_a - a.local_center);
        let r_b = q_b.rotate(self.def.local_anchor_b - b.local_center);
        let d = b.position.linear + r_b - a.position.linear - r_a;

        // Point constraint perpendicular to the axis.
        self.ay = q_a.rotate(cross_sv(1.0, self.def.local_axis_a));
        self.s_ay = cross(d + r_a, self.ay);
        self.s_by = cross(r_b, self.ay);
        let inv_mass = m_a + m_b + i_a * self.s_ay * self.s_ay + i_b * self.s_by * self.s_by;
        self.mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        // Suspension spring along the axis.
        self.ax = q_a.rotate(self.def.local_axis_a);
        self.s_ax = cross(d + r_a, self.ax);
        self.s_bx = cross(r_b, self.ax);
        self.spring_mass = 0.0;
        self.bias = 0.0;
        self.gamma = 0.0;
        if self.def.frequency > 0.0 {
            let inv_spring =
                m_a + m_b + i_a * self.s_ax * self.s_ax + i_b * self.s_bx * self.s_bx;
            if inv_spring > 0.0 {
                self.spring_mass = 1.0 / inv_spring;
                let c = d.dot(self.ax);
                let omega = 2.0 * core::f32::consts::PI * self.def.frequency;
                let damp = 2.0 * self.spring_mass * self.def.damping_ratio * omega;
                let k = self.spring_mass * omega * omega;
                let h = conf.dt;
                self.gamma = h * (damp + h * k);
                if self.gamma > 0.0 {
                    self.gamma = 1.0 / self.gamma;
                }
                self.bias = c * h * k * self.gamma;
                let total = inv_spring + self.gamma;
                self.spring_mass = if total > 0.0 { 1.0 / total } else { 0.0 };
            }
        } else {
            self.spring_impulse = 0.0;
        }

        let inv_motor = i_a + i_b;
        self.motor_mass = if inv_motor > 0.0 { 1.0 / inv_motor } else { 0.0 };
        if !self.def.enable_motor {
            self.motor_impulse = 0.0;
        }

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            self.spring_impulse *= conf.dt_ratio;
            self.motor_impulse *= conf.dt_ratio;

            let p = self.impulse * self.ay + self.spring_impulse * self.ax;
            let l_a = self.impulse * self.s_ay + self.spring_impulse * self.s_ax
                + self.motor_impulse;
            let l_b = self.impulse * self.s_by + self.spring_impulse * self.s_bx
                + self.motor_impulse;

            bodies[ia].velocity.linear -= m_a * p;
            bodies[ia].velocity.angular -= i_a * l_a;
            bodies[ib].velocity.linear += m_b * p;
            bodies[ib].velocity.angular += i_b * l_b;
        } else {
            self.impulse = 0.0;
            self.spring_impulse = 0.0;
            self.motor_impulse = 0.0;
        }
    }

    pub(crate) fn solve_velocity(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
        let (ia, ib) = (self.def.body_a.0 as usize, self.def.body_b.0 as usize);
        let (m_a, m_b) = (bodies[ia].inv_mass, bodies[ib].inv_mass);
        let (i_a, i_b) = (bodies[ia].inv_inertia, bodies[ib].inv_inertia);
        let mut v_a = bodies[ia].velocity;
        let mut v_b = bodies[ib].velocity;
        let mut inc: f32 = 0.0;

        // Spring
        {
            let cdot = self.ax.dot(v_b.linear - v_a.linear) + self.s_bx * v_b.angular
                - self.s_ax * v_a.angular;
            let impulse =
                -self.spring_mass * (cdot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;
            inc = inc.max(impulse.abs());

            let p = impulse * self.ax;
            v_a.linear -= m_a * p;
            v_a.angular -= i_a * impulse * self.s_ax;
            v_b.linear += m_b * p;
            v_b.angular += i_b * impulse * self.s_bx;
        }

        // Motor
        if self.def.enable_motor {
            let cdot = v_b.angular - v_a.angular - self.def.motor_speed;
            let mut impulse = -self.motor_mass * cdot;
            let old = self.motor_impulse;
            let max = self.def.max_motor_torque * conf.dt;
            self.motor_impulse = (old + impulse).clamp(-max, max);
            impulse = self.motor_impulse - old;
            inc = inc.max(impulse.abs());
            v_a.angular -= i_a * impulse;
            v_b.angular += i_b * impulse;
        }

        // Point constraint
        {
            let cdot = self.ay.dot(v_b.linear - v_a.linear) + self.s_by * v_b.angular
                - self.s_ay * v_a.angular;
            let impulse = -self.mass * cdot;
            self.impulse += impulse;
            inc = inc.max(impulse.abs());

            let p = impulse * self.ay;
            v_a.linear -= m_a * p;
            v_a.angular -= i_a * impulse * self.s_ay;
            v_b.linear += m_b * p;
            v_b.angular += i_b * impulse * self.s_by;
        }

        bodies[ia].velocity = v_a;
        bodies[ib].velocity = v_b;
        inc <= VELOCITY_TOLERANCE
    }

    pub(crate) fn solve_position(&mut self, bodies: &mut [BodyConstraint], conf: &StepConf) -> bool {
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

        let ay = q_a.rotate(cross_sv(1.0, self.def.local_axis_a));
        let s_ay = cross(d + r_a, ay);
        let s_by = cross(r_b, ay);

        let c = d.dot(ay);
        let k = m_a + m_b + i_a * s_ay * s_ay + i_b * s_by * s_by;
        let impulse = if k != 0.0 { -c / k } else { 0.0 };

        let p = impulse * ay;
        pos_a.linear -= m_a * p;
        pos_a.angular -= i_a * impulse * s_ay;
        pos_b.linear += m_b * p;
        pos_b.angular += i_b * impulse * s_by;

        bodies[ia].position = pos_a;
        bodies[ib].position = pos_b;
        c.abs() <= conf.linear_slop
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joint::{Joint, JointDef};
    use crate::math::Position;

    fn dynamic_constraint(x: f32, y: f32) -> BodyConstraint {
        BodyConstraint {
            position: Position::new(Vec2::new(x, y), 0.0),
            inv_mass: 1.0,
            inv_inertia: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_pulley_conserves_total_length() {
        // Two bodies hanging below their ground anchors.
        let mut bodies = vec![dynamic_constraint(-2.0, -1.0), dynamic_constraint(2.0, -1.0)];
        let def = PulleyJointDef {
            body_a: BodyId(0),
            body_b: BodyId(1),
            ground_anchor_a: Vec2::new(-2.0, 0.0),
            ground_anchor_b: Vec2::new(2.0, 0.0),
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            length_a: 1.0,
            length_b: 1.0,
            ratio: 1.0,
        };
        let mut joint = Joint::new(&JointDef::Pulley(def)).unwrap();
        let conf = StepConf::default();

        // Drop body A by 0.5; the constraint must lift body B by about 0.5.
        bodies[0].position.linear.y = -1.5;
        joint.init_velocity(&mut bodies, &conf);
        for _ in 0..30 {
            if joint.solve_position(&mut bodies, &conf) {
                break;
            }
        }
        let len_a = (bodies[0].position.linear - Vec2::new(-2.0, 0.0)).length();
        let len_b = (bodies[1].position.linear - Vec2::new(2.0, 0.0)).length();
        assert!(
            (len_a + len_b - 2.0).abs() < 0.01,
            "Total rope length should stay 2, got {}",
            len_a + len_b
        );
    }

    #[test]
    fn test_wheel_joint_constrains_perpendicular_motion() {
        let mut bodies = vec![dynamic_constraint(0.0, 0.0), dynamic_constraint(0.0, -1.0)];
        let def = WheelJointDef {
            body_a: BodyId(0),
            body_b: BodyId(1),
            collide_connected: false,
            local_anchor_a: Vec2::new(0.0, -1.0),
            local_anchor_b: Vec2::ZERO,
            local_axis_a: Vec2::new(0.0, 1.0),
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            frequency: 4.0,
            damping_ratio: 0.7,
        };
        let mut joint = Joint::new(&JointDef::Wheel(def)).unwrap();
        let conf = StepConf::default();

        // Velocity across the axis should be resisted; along it, passed.
        bodies[1].velocity.linear = Vec2::new(3.0, -1.0);
        joint.init_velocity(&mut bodies, &conf);
        for _ in 0..8 {
            joint.solve_velocity(&mut bodies, &conf);
        }
        let rel = bodies[1].velocity.linear - bodies[0].velocity.linear;
        assert!(rel.x.abs() < 0.1, "Cross-axis velocity should be canceled, got {}", rel.x);
    }

    #[test]
    fn test_gear_couples_revolute_pair() {
        // Bodies: 0 = ground, 1 and 2 = gears pinned to ground.
        let mut bodies = vec![
            BodyConstraint::default(), // static ground
            dynamic_constraint(-1.0, 0.0),
            dynamic_constraint(1.0, 0.0),
        ];

        let rev1 = Joint::new(&JointDef::Revolute(crate::joint::RevoluteJointDef::new(
            BodyId(0),
            BodyId(1),
        )))
        .unwrap();
        let rev2 = Joint::new(&JointDef::Revolute(crate::joint::RevoluteJointDef::new(
            BodyId(0),
            BodyId(2),
        )))
        .unwrap();

        let def = GearJointDef {
            joint_1: crate::joint::JointId(0),
            joint_2: crate::joint::JointId(1),
            ratio: 2.0,
        };
        let gear = GearJoint::from_parts(
            &def,
            &rev1,
            &rev2,
            Transform::IDENTITY,
            Transform::IDENTITY,
            Transform::IDENTITY,
            Transform::IDENTITY,
        )
        .expect("revolute pair should form a gear");
        let mut gear = gear;
        let conf = StepConf::default();

        // Spin gear 1; the constraint must counter-spin gear 2 at ratio 2.
        bodies[1].velocity.angular = 2.0;
        gear.init_velocity(&mut bodies, &conf);
        for _ in 0..16 {
            gear.solve_velocity(&mut bodies, &conf);
        }
        // Constraint: wA + ratio * wB = 0.
        let residual = bodies[1].velocity.angular + 2.0 * bodies[2].velocity.angular;
        assert!(residual.abs() < 1e-3, "Gear constraint violated: {residual}");
    }

    #[test]
    fn test_gear_rejects_unsupported_base() {
        let dist = Joint::new(&JointDef::Distance(crate::joint::DistanceJointDef::new(
            BodyId(0),
            BodyId(1),
            1.0,
        )))
        .unwrap();
        let rev = Joint::new(&JointDef::Revolute(crate::joint::RevoluteJointDef::new(
            BodyId(0),
            BodyId(2),
        )))
        .unwrap();
        let def = GearJointDef {
            joint_1: crate::joint::JointId(0),
            joint_2: crate::joint::JointId(1),
            ratio: 1.0,
        };
        assert!(GearJoint::from_parts(
            &def,
            &dist,
            &rev,
            Transform::IDENTITY,
            Transform::IDENTITY,
            Transform::IDENTITY,
            Transform::IDENTITY,
        )
        .is_none());
    }
}

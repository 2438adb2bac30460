//! Contact Constraint Solver
//!
//! Translates contacts and body snapshots into numeric constraint structs and
//! runs the iterative Gauss-Seidel solves over them: tangential (friction)
//! impulses first, then normal impulses (with an exact two-point block solve
//! when the manifold supports it), and a separate non-linear position solve.

use glam::Mat2;

use crate::body::BodyId;
use crate::config::MAX_MANIFOLD_POINTS;
use crate::contact::ContactId;
use crate::island::BodyConstraint;
use crate::manifold::{Manifold, ManifoldKind, WorldManifold};
use crate::math::{cross, cross_sv, transform_for, Transform, Vec2};

/// Tuning for one flavor of position solve (regular vs TOI).
#[derive(Clone, Copy, Debug)]
pub(crate) struct PositionSolverConf {
    /// Fraction of the separation error corrected per iteration.
    pub resolution_rate: f32,
    /// Target separation the solver leaves between surfaces.
    pub linear_slop: f32,
    /// Cap on the correction applied in one iteration.
    pub max_correction: f32,
}

// ============================================================================
// Constraints
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct VelocityConstraintPoint {
    pub r_a: Vec2,
    pub r_b: Vec2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub normal_mass: f32,
    pub tangent_mass: f32,
    pub velocity_bias: f32,
}

/// Velocity-level view of one contact.
#[derive(Clone, Debug)]
pub(crate) struct VelocityConstraint {
    pub points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    pub point_count: usize,
    pub normal: Vec2,
    /// Effective mass of the two-point normal system (block solve).
    pub normal_mass: Mat2,
    /// The two-point normal system itself.
    pub k: Mat2,
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub inv_mass_a: f32,
    pub inv_mass_b: f32,
    pub inv_inertia_a: f32,
    pub inv_inertia_b: f32,
    pub friction: f32,
    pub restitution: f32,
    pub tangent_speed: f32,
    pub contact: ContactId,
    /// Whether the block solver may be used for this constraint.
    block_solve: bool,
}

/// Position-level view of one contact.
#[derive(Clone, Debug)]
pub(crate) struct PositionConstraint {
    pub local_points: [Vec2; MAX_MANIFOLD_POINTS],
    pub point_count: usize,
    pub local_normal: Vec2,
    pub local_point: Vec2,
    pub kind: ManifoldKind,
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub radius_a: f32,
    pub radius_b: f32,
}

/// Build the position constraint for one contact.
pub(crate) fn position_constraint(
    contact: ContactId,
    manifold: &Manifold,
    body_a: BodyId,
    radius_a: f32,
    body_b: BodyId,
    radius_b: f32,
) -> PositionConstraint {
    let _ = contact;
    let mut local_points = [Vec2::ZERO; MAX_MANIFOLD_POINTS];
    for (i, p) in manifold.points().iter().enumerate() {
        local_points[i] = p.local_point;
    }
    PositionConstraint {
        local_points,
        point_count: manifold.point_count(),
        local_normal: manifold.local_normal,
        local_point: manifold.local_point,
        kind: manifold.kind,
        body_a,
        body_b,
        radius_a,
        radius_b,
    }
}

/// Build the velocity constraint for one contact, deriving the world manifold
/// from the snapshotted body positions and seeding impulses from the cached
/// manifold scaled by `warm_start_scale` (the step's dt ratio, or 0 to start
/// cold).
#[allow(clippy::too_many_arguments)]
pub(crate) fn velocity_constraint(
    contact: ContactId,
    manifold: &Manifold,
    body_a: BodyId,
    radius_a: f32,
    body_b: BodyId,
    radius_b: f32,
    friction: f32,
    restitution: f32,
    tangent_speed: f32,
    bodies: &[BodyConstraint],
    velocity_threshold: f32,
    warm_start_scale: f32,
) -> VelocityConstraint {
    let bc_a = &bodies[body_a.0 as usize];
    let bc_b = &bodies[body_b.0 as usize];

    let xf_a = transform_for(bc_a.position, bc_a.local_center);
    let xf_b = transform_for(bc_b.position, bc_b.local_center);
    let world = WorldManifold::new(manifold, xf_a, radius_a, xf_b, radius_b);

    let mut vc = VelocityConstraint {
        points: [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS],
        point_count: manifold.point_count(),
        normal: world.normal,
        normal_mass: Mat2::ZERO,
        k: Mat2::ZERO,
        body_a,
        body_b,
        inv_mass_a: bc_a.inv_mass,
        inv_mass_b: bc_b.inv_mass,
        inv_inertia_a: bc_a.inv_inertia,
        inv_inertia_b: bc_b.inv_inertia,
        friction,
        restitution,
        tangent_speed,
        contact,
        block_solve: false,
    };

    let tangent = tangent_of(world.normal);
    for (i, mp) in manifold.points().iter().enumerate() {
        let vcp = &mut vc.points[i];
        vcp.r_a = world.points[i] - bc_a.position.linear;
        vcp.r_b = world.points[i] - bc_b.position.linear;
        vcp.normal_impulse = warm_start_scale * mp.normal_impulse;
        vcp.tangent_impulse = warm_start_scale * mp.tangent_impulse;

        let rn_a = cross(vcp.r_a, world.normal);
        let rn_b = cross(vcp.r_b, world.normal);
        let k_normal = vc.inv_mass_a
            + vc.inv_mass_b
            + vc.inv_inertia_a * rn_a * rn_a
            + vc.inv_inertia_b * rn_b * rn_b;
        vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

        let rt_a = cross(vcp.r_a, tangent);
        let rt_b = cross(vcp.r_b, tangent);
        let k_tangent = vc.inv_mass_a
            + vc.inv_mass_b
            + vc.inv_inertia_a * rt_a * rt_a
            + vc.inv_inertia_b * rt_b * rt_b;
        vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

        // Restitution bias from the approach speed.
        vcp.velocity_bias = 0.0;
        let dv = bc_b.velocity.linear + cross_sv(bc_b.velocity.angular, vcp.r_b)
            - bc_a.velocity.linear
            - cross_sv(bc_a.velocity.angular, vcp.r_a);
        let vn = dv.dot(world.normal);
        if vn < -velocity_threshold {
            vcp.velocity_bias = -restitution * vn;
        }
    }

    // Prepare the block solver for two-point manifolds.
    if vc.point_count == 2 {
        let rn1_a = cross(vc.points[0].r_a, world.normal);
        let rn1_b = cross(vc.points[0].r_b, world.normal);
        let rn2_a = cross(vc.points[1].r_a, world.normal);
        let rn2_b = cross(vc.points[1].r_b, world.normal);

        let k11 = vc.inv_mass_a
            + vc.inv_mass_b
            + vc.inv_inertia_a * rn1_a * rn1_a
            + vc.inv_inertia_b * rn1_b * rn1_b;
        let k22 = vc.inv_mass_a
            + vc.inv_mass_b
            + vc.inv_inertia_a * rn2_a * rn2_a
            + vc.inv_inertia_b * rn2_b * rn2_b;
        let k12 = vc.inv_mass_a
            + vc.inv_mass_b
            + vc.inv_inertia_a * rn1_a * rn2_a
            + vc.inv_inertia_b * rn1_b * rn2_b;

        const MAX_CONDITION: f32 = 1000.0;
        if k11 * k11 < MAX_CONDITION * (k11 * k22 - k12 * k12) {
            vc.k = Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
            vc.normal_mass = vc.k.inverse();
            vc.block_solve = true;
        }
    }

    vc
}

/// The contact tangent: the normal rotated -90°.
#[inline]
fn tangent_of(normal: Vec2) -> Vec2 {
    crate::math::cross_vs(normal, 1.0)
}

// ============================================================================
// Warm start
// ============================================================================

/// Apply the seeded impulses to the snapshot velocities.
pub(crate) fn warm_start(constraints: &mut [VelocityConstraint], bodies: &mut [BodyConstraint]) {
    for vc in constraints {
        let tangent = tangent_of(vc.normal);
        let mut v_a = bodies[vc.body_a.0 as usize].velocity;
        let mut v_b = bodies[vc.body_b.0 as usize].velocity;

        for vcp in &vc.points[..vc.point_count] {
            let p = vcp.normal_impulse * vc.normal + vcp.tangent_impulse * tangent;
            v_a.linear -= vc.inv_mass_a * p;
            v_a.angular -= vc.inv_inertia_a * cross(vcp.r_a, p);
            v_b.linear += vc.inv_mass_b * p;
            v_b.angular += vc.inv_inertia_b * cross(vcp.r_b, p);
        }

        bodies[vc.body_a.0 as usize].velocity = v_a;
        bodies[vc.body_b.0 as usize].velocity = v_b;
    }
}

// ============================================================================
// Velocity solve
// ============================================================================

/// One Gauss-Seidel velocity iteration over all constraints. Returns the
/// largest incremental impulse applied.
pub(crate) fn solve_velocity_constraints(
    constraints: &mut [VelocityConstraint],
    bodies: &mut [BodyConstraint],
) -> f32 {
    let mut max_inc = 0.0_f32;

    for vc in constraints {
        let mut v_a = bodies[vc.body_a.0 as usize].velocity;
        let mut v_b = bodies[vc.body_b.0 as usize].velocity;
        let normal = vc.normal;
        let tangent = tangent_of(normal);

        // Tangential (friction) impulses, clamped by the accumulated normal
        // impulse at the same point.
        for vcp in &mut vc.points[..vc.point_count] {
            let dv = v_b.linear + cross_sv(v_b.angular, vcp.r_b)
                - v_a.linear
                - cross_sv(v_a.angular, vcp.r_a);

            let vt = dv.dot(tangent) - vc.tangent_speed;
            let lambda = vcp.tangent_mass * (-vt);

            let max_friction = vc.friction * vcp.normal_impulse;
            let new_impulse = (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
            let lambda = new_impulse - vcp.tangent_impulse;
            vcp.tangent_impulse = new_impulse;
            max_inc = max_inc.max(lambda.abs());

            let p = lambda * tangent;
            v_a.linear -= vc.inv_mass_a * p;
            v_a.angular -= vc.inv_inertia_a * cross(vcp.r_a, p);
            v_b.linear += vc.inv_mass_b * p;
            v_b.angular += vc.inv_inertia_b * cross(vcp.r_b, p);
        }

        // Normal impulses.
        if vc.point_count == 1 || !vc.block_solve {
            for vcp in &mut vc.points[..vc.point_count] {
                let dv = v_b.linear + cross_sv(v_b.angular, vcp.r_b)
                    - v_a.linear
                    - cross_sv(v_a.angular, vcp.r_a);
                let vn = dv.dot(normal);

                let lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);
                let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - vcp.normal_impulse;
                vcp.normal_impulse = new_impulse;
                max_inc = max_inc.max(lambda.abs());

                let p = lambda * normal;
                v_a.linear -= vc.inv_mass_a * p;
                v_a.angular -= vc.inv_inertia_a * cross(vcp.r_a, p);
                v_b.linear += vc.inv_mass_b * p;
                v_b.angular += vc.inv_inertia_b * cross(vcp.r_b, p);
            }
        } else {
            // Two-point block solve: the coupled LCP
            //
            //   vn = A x + b,  x ≥ 0, vn ≥ 0, x ⊥ vn
            //
            // has four cases (both points active, either alone, neither);
            // try them in order and keep the first feasible solution.
            let (cp1_ra, cp1_rb) = (vc.points[0].r_a, vc.points[0].r_b);
            let (cp2_ra, cp2_rb) = (vc.points[1].r_a, vc.points[1].r_b);

            let a = Vec2::new(vc.points[0].normal_impulse, vc.points[1].normal_impulse);
            debug_assert!(a.x >= 0.0 && a.y >= 0.0);

            let dv1 = v_b.linear + cross_sv(v_b.angular, cp1_rb)
                - v_a.linear
                - cross_sv(v_a.angular, cp1_ra);
            let dv2 = v_b.linear + cross_sv(v_b.angular, cp2_rb)
                - v_a.linear
                - cross_sv(v_a.angular, cp2_ra);
            let vn1 = dv1.dot(normal);
            let vn2 = dv2.dot(normal);

            let mut b = Vec2::new(
                vn1 - vc.points[0].velocity_bias,
                vn2 - vc.points[1].velocity_bias,
            );
            b -= vc.k * a;

            let x = 'solve: {
                // Case 1: both points still in contact.
                let x = -(vc.normal_mass * b);
                if x.x >= 0.0 && x.y >= 0.0 {
                    break 'solve Some(x);
                }

                // Case 2: point 1 active, point 2 separating.
                let x = Vec2::new(-vc.points[0].normal_mass * b.x, 0.0);
                let vn2 = vc.k.col(0).y * x.x + b.y;
                if x.x >= 0.0 && vn2 >= 0.0 {
                    break 'solve Some(x);
                }

                // Case 3: point 2 active, point 1 separating.
                let x = Vec2::new(0.0, -vc.points[1].normal_mass * b.y);
                let vn1 = vc.k.col(1).x * x.y + b.x;
                if x.y >= 0.0 && vn1 >= 0.0 {
                    break 'solve Some(x);
                }

                // Case 4: both separating.
                if b.x >= 0.0 && b.y >= 0.0 {
                    break 'solve Some(Vec2::ZERO);
                }

                // Numerically stuck; keep the accumulated impulses as-is.
                None
            };

            if let Some(x) = x {
                let d = x - a;
                let p1 = d.x * normal;
                let p2 = d.y * normal;
                max_inc = max_inc.max(d.x.abs()).max(d.y.abs());

                v_a.linear -= vc.inv_mass_a * (p1 + p2);
                v_a.angular -=
                    vc.inv_inertia_a * (cross(cp1_ra, p1) + cross(cp2_ra, p2));
                v_b.linear += vc.inv_mass_b * (p1 + p2);
                v_b.angular +=
                    vc.inv_inertia_b * (cross(cp1_rb, p1) + cross(cp2_rb, p2));

                vc.points[0].normal_impulse = x.x;
                vc.points[1].normal_impulse = x.y;
            }
        }

        bodies[vc.body_a.0 as usize].velocity = v_a;
        bodies[vc.body_b.0 as usize].velocity = v_b;
    }

    max_inc
}

/// Copy accumulated impulses back into the manifold for next-step warm
/// starting.
pub(crate) fn store_impulses(vc: &VelocityConstraint, manifold: &mut Manifold) {
    for (i, mp) in manifold.points_mut().iter_mut().enumerate() {
        if i < vc.point_count {
            mp.normal_impulse = vc.points[i].normal_impulse;
            mp.tangent_impulse = vc.points[i].tangent_impulse;
        }
    }
}

// ============================================================================
// Position solve
// ============================================================================

/// A position-solver evaluation of one manifold point: world point, normal,
/// and separation at the current snapshot positions.
struct PositionSolverManifold {
    normal: Vec2,
    point: Vec2,
    separation: f32,
}

impl PositionSolverManifold {
    fn new(pc: &PositionConstraint, xf_a: Transform, xf_b: Transform, index: usize) -> Self {
        debug_assert!(pc.point_count > 0);

        match pc.kind {
            ManifoldKind::Circles => {
                let point_a = xf_a.transform_point(pc.local_point);
                let point_b = xf_b.transform_point(pc.local_points[0]);
                let normal = (point_b - point_a).normalize_or_zero();
                Self {
                    normal,
                    point: 0.5 * (point_a + point_b),
                    separation: (point_b - point_a).length() - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldKind::FaceA => {
                let normal = xf_a.q.rotate(pc.local_normal);
                let plane_point = xf_a.transform_point(pc.local_point);
                let clip_point = xf_b.transform_point(pc.local_points[index]);
                Self {
                    normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldKind::FaceB => {
                let normal = xf_b.q.rotate(pc.local_normal);
                let plane_point = xf_b.transform_point(pc.local_point);
                let clip_point = xf_a.transform_point(pc.local_points[index]);
                Self {
                    // Keep the convention: normal points from A to B.
                    normal: -normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
        }
    }
}

/// One Gauss-Seidel position iteration over all constraints. Returns the
/// smallest separation seen (before correction).
pub(crate) fn solve_position_constraints(
    constraints: &[PositionConstraint],
    bodies: &mut [BodyConstraint],
    conf: &PositionSolverConf,
) -> f32 {
    let mut min_separation = f32::INFINITY;

    for pc in constraints {
        let ia = pc.body_a.0 as usize;
        let ib = pc.body_b.0 as usize;
        let (m_a, i_a, lc_a) = (
            bodies[ia].inv_mass,
            bodies[ia].inv_inertia,
            bodies[ia].local_center,
        );
        let (m_b, i_b, lc_b) = (
            bodies[ib].inv_mass,
            bodies[ib].inv_inertia,
            bodies[ib].local_center,
        );
        let mut pos_a = bodies[ia].position;
        let mut pos_b = bodies[ib].position;

        for index in 0..pc.point_count {
            let xf_a = transform_for(pos_a, lc_a);
            let xf_b = transform_for(pos_b, lc_b);
            let psm = PositionSolverManifold::new(pc, xf_a, xf_b, index);

            let normal = psm.normal;
            let point = psm.point;
            let separation = psm.separation;
            min_separation = min_separation.min(separation);

            // Correct toward the slop, never outward, and never more than
            // the per-iteration cap.
            let c = (conf.resolution_rate * (separation + conf.linear_slop))
                .clamp(-conf.max_correction, 0.0);

            let r_a = point - pos_a.linear;
            let r_b = point - pos_b.linear;

            let rn_a = cross(r_a, normal);
            let rn_b = cross(r_b, normal);
            let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

            let impulse = if k > 0.0 { -c / k } else { 0.0 };
            let p = impulse * normal;

            pos_a.linear -= m_a * p;
            pos_a.angular -= i_a * cross(r_a, p);
            pos_b.linear += m_b * p;
            pos_b.angular += i_b * cross(r_b, p);
        }

        bodies[ia].position = pos_a;
        bodies[ib].position = pos_b;
    }

    min_separation
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifold::collide_circles;
    use crate::math::{Position, Velocity};
    use crate::shapes::CircleShape;

    fn two_disk_setup(
        gap: f32,
        approach: f32,
    ) -> (Vec<BodyConstraint>, Manifold, VelocityConstraint, PositionConstraint) {
        let r = 1.0;
        let xf_a = Transform::new(Vec2::new(-r + gap * 0.5, 0.0), 0.0);
        let xf_b = Transform::new(Vec2::new(r - gap * 0.5, 0.0), 0.0);
        let circle = CircleShape::new(r);
        let manifold = collide_circles(&circle, xf_a, &circle, xf_b);
        assert!(manifold.point_count() > 0);

        let bodies = vec![
            BodyConstraint {
                position: Position::new(xf_a.p, 0.0),
                velocity: Velocity {
                    linear: Vec2::new(approach, 0.0),
                    angular: 0.0,
                },
                inv_mass: 1.0,
                inv_inertia: 0.0,
                local_center: Vec2::ZERO,
            },
            BodyConstraint {
                position: Position::new(xf_b.p, 0.0),
                velocity: Velocity {
                    linear: Vec2::new(-approach, 0.0),
                    angular: 0.0,
                },
                inv_mass: 1.0,
                inv_inertia: 0.0,
                local_center: Vec2::ZERO,
            },
        ];

        let vc = velocity_constraint(
            ContactId(0),
            &manifold,
            BodyId(0),
            r,
            BodyId(1),
            r,
            0.0,
            0.0,
            0.0,
            &bodies,
            1.0,
            1.0,
        );
        let pc = position_constraint(ContactId(0), &manifold, BodyId(0), r, BodyId(1), r);
        (bodies, manifold, vc, pc)
    }

    #[test]
    fn test_velocity_solve_stops_approach() {
        let (mut bodies, _m, vc, _pc) = two_disk_setup(-0.005, 1.0);
        let mut constraints = vec![vc];

        for _ in 0..8 {
            solve_velocity_constraints(&mut constraints, &mut bodies);
        }

        let rel = bodies[1].velocity.linear.x - bodies[0].velocity.linear.x;
        assert!(rel.abs() < 1e-3, "Normal relative velocity should vanish, got {rel}");
    }

    #[test]
    fn test_velocity_solve_restitution() {
        let r = 1.0;
        let xf_a = Transform::new(Vec2::new(-0.99, 0.0), 0.0);
        let xf_b = Transform::new(Vec2::new(0.99, 0.0), 0.0);
        let circle = CircleShape::new(r);
        let manifold = collide_circles(&circle, xf_a, &circle, xf_b);

        let mut bodies = vec![
            BodyConstraint {
                position: Position::new(xf_a.p, 0.0),
                velocity: Velocity {
                    linear: Vec2::new(5.0, 0.0),
                    angular: 0.0,
                },
                inv_mass: 1.0,
                ..Default::default()
            },
            BodyConstraint {
                position: Position::new(xf_b.p, 0.0),
                velocity: Velocity {
                    linear: Vec2::new(-5.0, 0.0),
                    angular: 0.0,
                },
                inv_mass: 1.0,
                ..Default::default()
            },
        ];

        let mut constraints = vec![velocity_constraint(
            ContactId(0),
            &manifold,
            BodyId(0),
            r,
            BodyId(1),
            r,
            0.0,
            1.0, // perfectly elastic
            0.0,
            &bodies,
            1.0,
            1.0,
        )];

        for _ in 0..8 {
            solve_velocity_constraints(&mut constraints, &mut bodies);
        }

        // Fully elastic head-on: the speeds reverse.
        assert!(
            (bodies[0].velocity.linear.x + 5.0).abs() < 0.1,
            "Expected bounce-back, got {}",
            bodies[0].velocity.linear.x
        );
    }

    #[test]
    fn test_position_solve_separates_overlap() {
        let (mut bodies, _m, _vc, pc) = two_disk_setup(-0.1, 0.0);
        let constraints = vec![pc];
        let conf = PositionSolverConf {
            resolution_rate: 0.2,
            linear_slop: 0.005,
            max_correction: 0.2,
        };

        let first = solve_position_constraints(&constraints, &mut bodies, &conf);
        assert!(first < 0.0, "Initial separation should be negative (overlap)");

        let mut min_sep = first;
        for _ in 0..20 {
            min_sep = solve_position_constraints(&constraints, &mut bodies, &conf);
        }
        assert!(
            min_sep >= -3.0 * 0.005,
            "Overlap should be resolved to within tolerance, got {min_sep}"
        );
    }

    #[test]
    fn test_position_solve_never_pushes_apart() {
        // Disks already separated: position solve must not move them.
        let r = 1.0;
        let circle = CircleShape::new(r);
        let xf_a = Transform::new(Vec2::new(-1.5, 0.0), 0.0);
        let xf_b = Transform::new(Vec2::new(1.5, 0.0), 0.0);
        let manifold = collide_circles(
            &circle,
            Transform::new(Vec2::new(-0.9, 0.0), 0.0),
            &circle,
            Transform::new(Vec2::new(0.9, 0.0), 0.0),
        );

        let mut bodies = vec![
            BodyConstraint {
                position: Position::new(xf_a.p, 0.0),
                inv_mass: 1.0,
                ..Default::default()
            },
            BodyConstraint {
                position: Position::new(xf_b.p, 0.0),
                inv_mass: 1.0,
                ..Default::default()
            },
        ];
        let pc = position_constraint(ContactId(0), &manifold, BodyId(0), r, BodyId(1), r);
        let conf = PositionSolverConf {
            resolution_rate: 0.2,
            linear_slop: 0.005,
            max_correction: 0.2,
        };
        let before = bodies[0].position.linear;
        solve_position_constraints(&[pc], &mut bodies, &conf);
        assert_eq!(bodies[0].position.linear, before, "Positive separation leaves bodies alone");
    }

    #[test]
    fn test_warm_start_applies_stored_impulses() {
        let (mut bodies, _m, mut vc, _pc) = two_disk_setup(-0.005, 0.0);
        vc.points[0].normal_impulse = 2.0;
        let mut constraints = vec![vc];

        warm_start(&mut constraints, &mut bodies);

        // Impulse along +x pushes A left and B right.
        assert!(bodies[0].velocity.linear.x < 0.0);
        assert!(bodies[1].velocity.linear.x > 0.0);
    }

    #[test]
    fn test_store_impulses_roundtrip() {
        let (_bodies, mut manifold, mut vc, _pc) = two_disk_setup(-0.005, 0.0);
        vc.points[0].normal_impulse = 3.5;
        vc.points[0].tangent_impulse = -1.25;
        store_impulses(&vc, &mut manifold);
        assert_eq!(manifold.points()[0].normal_impulse, 3.5);
        assert_eq!(manifold.points()[0].tangent_impulse, -1.25);
    }
}

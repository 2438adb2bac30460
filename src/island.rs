//! Islands and Body-Constraint Snapshots
//!
//! An island is the transient set of bodies, contacts, and joints solved as
//! one unit. The solver never mutates bodies directly; it works on
//! [`BodyConstraint`] snapshots and copies the results back at the end of the
//! island solve.

use crate::body::BodyId;
use crate::contact::ContactId;
use crate::joint::JointId;
use crate::math::{Position, Vec2, Velocity};

/// A connected component of interacting awake bodies.
#[derive(Clone, Debug, Default)]
pub struct Island {
    /// Bodies in this island, in discovery order.
    pub bodies: Vec<BodyId>,
    /// Contacts in this island.
    pub contacts: Vec<ContactId>,
    /// Joints in this island.
    pub joints: Vec<JointId>,
}

impl Island {
    /// Size the internal vectors for the worst case.
    pub fn reserve(&mut self, bodies: usize, contacts: usize, joints: usize) {
        self.bodies.reserve(bodies);
        self.contacts.reserve(contacts);
        self.joints.reserve(joints);
    }

    /// Empty the island without releasing capacity.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
    }
}

/// The solver-facing snapshot of one body: mass data plus mutable position
/// and velocity. Indexed by the body's slot id.
#[derive(Clone, Copy, Debug, Default)]
pub struct BodyConstraint {
    /// Working position (center of mass)
    pub position: Position,
    /// Working velocity
    pub velocity: Velocity,
    /// Inverse mass
    pub inv_mass: f32,
    /// Inverse rotational inertia about the center of mass
    pub inv_inertia: f32,
    /// Center of mass in body-local coordinates
    pub local_center: Vec2,
}

/// Integrate the island bodies' working positions by their working
/// velocities, capping translation and rotation per step.
pub(crate) fn integrate_positions(
    bodies: &[BodyId],
    constraints: &mut [BodyConstraint],
    h: f32,
    max_translation: f32,
    max_rotation: f32,
) {
    for &id in bodies {
        let bc = &mut constraints[id.0 as usize];

        let mut translation = h * bc.velocity.linear;
        if translation.length_squared() > max_translation * max_translation {
            let ratio = max_translation / translation.length();
            bc.velocity.linear *= ratio;
            translation *= ratio;
        }

        let mut rotation = h * bc.velocity.angular;
        if rotation.abs() > max_rotation {
            let ratio = max_rotation / rotation.abs();
            bc.velocity.angular *= ratio;
            rotation *= ratio;
        }

        bc.position.linear += translation;
        bc.position.angular += rotation;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_island_clear_keeps_capacity() {
        let mut island = Island::default();
        island.reserve(16, 16, 4);
        island.bodies.push(BodyId(0));
        island.contacts.push(ContactId(0));
        let cap = island.bodies.capacity();
        island.clear();
        assert!(island.bodies.is_empty());
        assert_eq!(island.bodies.capacity(), cap);
    }

    #[test]
    fn test_integrate_positions() {
        let mut constraints = vec![BodyConstraint {
            velocity: Velocity {
                linear: Vec2::new(6.0, 0.0),
                angular: 0.6,
            },
            ..Default::default()
        }];
        integrate_positions(&[BodyId(0)], &mut constraints, 0.5, 100.0, 100.0);
        assert!((constraints[0].position.linear.x - 3.0).abs() < 1e-6);
        assert!((constraints[0].position.angular - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_integrate_caps_translation() {
        let mut constraints = vec![BodyConstraint {
            velocity: Velocity {
                linear: Vec2::new(1000.0, 0.0),
                angular: 0.0,
            },
            ..Default::default()
        }];
        integrate_positions(&[BodyId(0)], &mut constraints, 1.0, 2.0, 0.5);
        assert!(
            constraints[0].position.linear.x <= 2.0 + 1e-5,
            "Translation must be capped at max_translation"
        );
        // The velocity itself is scaled down so next iterations stay capped.
        assert!(constraints[0].velocity.linear.x <= 2.0 + 1e-5);
    }

    #[test]
    fn test_integrate_caps_rotation() {
        let mut constraints = vec![BodyConstraint {
            velocity: Velocity {
                linear: Vec2::ZERO,
                angular: 100.0,
            },
            ..Default::default()
        }];
        integrate_positions(&[BodyId(0)], &mut constraints, 1.0, 2.0, 0.5);
        assert!(constraints[0].position.angular <= 0.5 + 1e-5);
    }
}

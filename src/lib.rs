//! impulse2d: A 2D Rigid-Body Physics Engine
//!
//! A world stepper that advances bodies, fixtures, contacts, and joints
//! through time while respecting non-penetration, joint, friction, and
//! restitution constraints.
//!
//! # Features
//!
//! - **Dynamic AABB broadphase**: incremental fat-AABB tree with
//!   surface-area-heuristic insertion and ray casting
//! - **Persistent manifolds**: feature-id matched contact points with
//!   warm-started impulses for stable stacking
//! - **Gauss-Seidel solver**: sequential impulses with an exact two-point
//!   block solve, plus a non-linear position solver
//! - **Continuous collision**: conservative-advancement time of impact with
//!   sub-stepped resolution, so bullets never tunnel
//! - **Islands and sleeping**: connected components solved independently and
//!   put to sleep together when still
//! - **Eleven joint kinds**: revolute, prismatic, distance, pulley, gear,
//!   wheel, weld, friction, rope, motor, target
//!
//! # Example
//!
//! ```rust
//! use impulse2d::prelude::*;
//!
//! // Create a world with gravity.
//! let mut world = World::new(WorldConf::with_gravity(Vec2::new(0.0, -10.0)));
//!
//! // Ground edge and a falling disk.
//! let ground = world.create_body(&BodyDef::static_at(Vec2::ZERO)).unwrap();
//! world
//!     .create_fixture(
//!         ground,
//!         Shape::Edge(EdgeShape::new(Vec2::new(-20.0, 0.0), Vec2::new(20.0, 0.0))),
//!         &FixtureDef::default(),
//!     )
//!     .unwrap();
//!
//! let ball = world.create_body(&BodyDef::dynamic_at(Vec2::new(0.0, 5.0))).unwrap();
//! world
//!     .create_fixture(ball, Shape::Circle(CircleShape::new(0.5)), &FixtureDef::with_density(1.0))
//!     .unwrap();
//!
//! // Step at 60 Hz.
//! let conf = StepConf::default();
//! for _ in 0..60 {
//!     world.step(&conf);
//! }
//! assert!(world.body(ball).unwrap().position().y > 0.0);
//! ```
//!
//! # Modules
//!
//! - [`math`]: geometry kernel (rotations, transforms, sweeps, AABBs)
//! - [`slots`]: slot allocator backing all stable identifiers
//! - [`shapes`]: circle, edge, polygon, and chain shapes
//! - [`distance`]: GJK closest-point queries with simplex caching
//! - [`manifold`]: contact manifolds and shape-vs-shape collision
//! - [`dynamic_tree`]: incremental AABB tree broadphase
//! - [`broad_phase`]: proxy move buffer and pair sweeping
//! - [`filter`]: category/mask/group collision filtering
//! - [`body`]: rigid bodies
//! - [`fixture`]: shape-to-body bindings with material and filter
//! - [`contact`]: contact state and warm-start impulse carrying
//! - [`joint`], [`joint_extra`]: the closed set of joint kinds
//! - [`island`]: island building blocks and body snapshots
//! - [`toi`]: conservative-advancement time of impact
//! - [`world`]: the stepper itself
//! - [`query`]: ray-cast and overlap helpers
//! - [`config`], [`stats`], [`error`]: step tuning, statistics, errors
//!
//! # Units
//!
//! Meters, kilograms, seconds, radians. The engine is tuned for moving
//! objects between roughly 0.1 and 10 meters.

#![warn(missing_docs)]

pub mod body;
pub mod broad_phase;
pub mod config;
pub mod contact;
mod contact_solver;
pub mod distance;
pub mod dynamic_tree;
pub mod error;
pub mod filter;
pub mod fixture;
pub mod island;
pub mod joint;
pub mod joint_extra;
pub mod manifold;
pub mod math;
pub mod query;
pub mod shapes;
pub mod slots;
pub mod stats;
pub mod toi;
pub mod world;

// Re-export commonly used types
pub use body::{Body, BodyDef, BodyId, BodyType};
pub use broad_phase::{BroadPhase, ContactKey};
pub use config::{StepConf, LINEAR_SLOP, MAX_BODIES, MAX_CONTACTS, MAX_FIXTURES, MAX_JOINTS};
pub use contact::{Contact, ContactId};
pub use distance::{distance, test_overlap, DistanceInput, DistanceOutput, SimplexCache};
pub use dynamic_tree::{DynamicTree, LeafData};
pub use error::PhysicsError;
pub use filter::Filter;
pub use fixture::{Fixture, FixtureDef, FixtureId};
pub use island::Island;
pub use joint::{
    DistanceJointDef, FrictionJointDef, Joint, JointDef, JointId, JointKind, LimitState,
    MotorJointDef, PrismaticJointDef, RevoluteJointDef, RopeJointDef, TargetJointDef, WeldJointDef,
};
pub use joint_extra::{GearJointDef, PulleyJointDef, WheelJointDef};
pub use manifold::{ContactFeature, Manifold, ManifoldKind, ManifoldPoint, WorldManifold};
pub use math::{Aabb, Position, Rot, Sweep, Transform, Vec2, Velocity};
pub use query::{batch_ray_cast, overlap_aabb, ray_cast_all, ray_cast_closest, RayCastResult};
pub use shapes::{
    ChainShape, CircleShape, DistanceProxy, EdgeShape, MassData, PolygonShape, RayCastHit,
    RayCastInput, Shape,
};
pub use slots::SlotAllocator;
pub use stats::{IslandStats, PreStepStats, RegStepStats, StepStats, ToiStepStats};
pub use toi::{time_of_impact, ToiConf, ToiInput, ToiOutput, ToiState};
pub use world::{ContactImpulses, World, WorldConf};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::body::{Body, BodyDef, BodyId, BodyType};
    pub use crate::config::StepConf;
    pub use crate::contact::{Contact, ContactId};
    pub use crate::error::PhysicsError;
    pub use crate::filter::Filter;
    pub use crate::fixture::{Fixture, FixtureDef, FixtureId};
    pub use crate::joint::{
        DistanceJointDef, FrictionJointDef, Joint, JointDef, JointId, JointKind, LimitState,
        MotorJointDef, PrismaticJointDef, RevoluteJointDef, RopeJointDef, TargetJointDef,
        WeldJointDef,
    };
    pub use crate::joint_extra::{GearJointDef, PulleyJointDef, WheelJointDef};
    pub use crate::manifold::{Manifold, ManifoldKind, WorldManifold};
    pub use crate::math::{Aabb, Position, Rot, Sweep, Transform, Vec2, Velocity};
    pub use crate::query::{batch_ray_cast, overlap_aabb, ray_cast_all, ray_cast_closest};
    pub use crate::shapes::{
        ChainShape, CircleShape, EdgeShape, MassData, PolygonShape, RayCastInput, Shape,
    };
    pub use crate::stats::StepStats;
    pub use crate::world::{ContactImpulses, World, WorldConf};
}

#[cfg(test)]
mod compile_smoke_tests {
    //! Verify that core types from the prelude and key modules are
    //! accessible. These tests catch accidental breakage of public
    //! re-exports.

    use super::prelude::*;

    #[test]
    fn test_prelude_types_accessible() {
        let _ = Vec2::ZERO;
        let _ = Rot::IDENTITY;
        let _ = Transform::IDENTITY;
        let _ = StepConf::default();
        let _ = Filter::default();
        let _ = BodyDef::default();
        let _ = FixtureDef::default();
        let _ = WorldConf::default();
    }

    #[test]
    fn test_error_type_accessible() {
        let e = PhysicsError::InvalidArgument { reason: "test" };
        let _ = format!("{e}");
    }

    #[test]
    fn test_world_round_trip() {
        let mut world = World::new(WorldConf::default());
        let body = world.create_body(&BodyDef::dynamic_at(Vec2::ZERO)).unwrap();
        assert!(world.body(body).is_some());
        world.destroy_body(body).unwrap();
        assert!(world.body(body).is_none());
    }
}

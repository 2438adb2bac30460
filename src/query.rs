//! Ray Cast and Overlap Queries
//!
//! Convenience spatial queries for game logic on top of the world's broad
//! phase: closest-hit and any-hit ray casts, AABB overlap gathering, and
//! batch ray casting.
//!
//! # Features
//!
//! - `ray_cast_closest`: first fixture along a segment
//! - `ray_cast_all`: every fixture along a segment, sorted by fraction
//! - `overlap_aabb`: fixtures whose fat AABBs overlap a box
//! - `batch_ray_cast`: many rays at once (rayon-parallel with the
//!   `parallel` feature)

use crate::body::Body;
use crate::dynamic_tree::DynamicTree;
use crate::fixture::{Fixture, FixtureId};
use crate::math::{Aabb, Vec2};
use crate::shapes::RayCastInput;
use crate::slots::SlotAllocator;
use crate::world::World;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One ray-cast hit.
#[derive(Clone, Copy, Debug)]
pub struct RayCastResult {
    /// Fixture that was hit
    pub fixture: FixtureId,
    /// World-space hit point
    pub point: Vec2,
    /// Surface normal at the hit point
    pub normal: Vec2,
    /// Fraction along the segment, in [0, 1]
    pub fraction: f32,
}

fn ray_cast_closest_impl(
    tree: &DynamicTree,
    fixtures: &SlotAllocator<Fixture>,
    bodies: &SlotAllocator<Body>,
    p1: Vec2,
    p2: Vec2,
) -> Option<RayCastResult> {
    let mut closest: Option<RayCastResult> = None;
    let input = RayCastInput {
        p1,
        p2,
        max_fraction: 1.0,
    };
    tree.ray_cast(&input, |sub_input, proxy| {
        let data = tree.leaf_data(proxy);
        let fixture = &fixtures[data.fixture.0];
        let xf = bodies[data.body.0].transform();
        match fixture.shape().ray_cast(sub_input, xf, data.child as usize) {
            Some(hit) => {
                let point = p1 + hit.fraction * (p2 - p1);
                closest = Some(RayCastResult {
                    fixture: data.fixture,
                    point,
                    normal: hit.normal,
                    fraction: hit.fraction,
                });
                // Clip the rest of the traversal to this hit.
                hit.fraction
            }
            None => sub_input.max_fraction,
        }
    });
    closest
}

/// The closest fixture along the segment from `p1` to `p2`.
#[must_use]
pub fn ray_cast_closest(world: &World, p1: Vec2, p2: Vec2) -> Option<RayCastResult> {
    let (tree, fixtures, bodies) = world.query_parts();
    ray_cast_closest_impl(tree, fixtures, bodies, p1, p2)
}

/// Every fixture along the segment, sorted by hit fraction.
#[must_use]
pub fn ray_cast_all(world: &World, p1: Vec2, p2: Vec2) -> Vec<RayCastResult> {
    let mut hits = Vec::new();
    world.ray_cast(p1, p2, |fixture, point, normal, fraction| {
        hits.push(RayCastResult {
            fixture,
            point,
            normal,
            fraction,
        });
        // Keep the full segment so later proxies still report.
        1.0
    });
    hits.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));
    hits
}

/// All fixtures whose fat proxy AABB overlaps `aabb`.
#[must_use]
pub fn overlap_aabb(world: &World, aabb: &Aabb) -> Vec<FixtureId> {
    let mut found = Vec::new();
    world.query_aabb(aabb, |fixture| {
        found.push(fixture);
        true
    });
    found.sort_unstable();
    found.dedup();
    found
}

/// Cast many rays, one result per `(p1, p2)` input pair.
#[cfg(feature = "parallel")]
#[must_use]
pub fn batch_ray_cast(world: &World, rays: &[(Vec2, Vec2)]) -> Vec<Option<RayCastResult>> {
    let (tree, fixtures, bodies) = world.query_parts();
    rays.par_iter()
        .map(|&(p1, p2)| ray_cast_closest_impl(tree, fixtures, bodies, p1, p2))
        .collect()
}

/// Cast many rays, one result per `(p1, p2)` input pair.
#[cfg(not(feature = "parallel"))]
#[must_use]
pub fn batch_ray_cast(world: &World, rays: &[(Vec2, Vec2)]) -> Vec<Option<RayCastResult>> {
    let (tree, fixtures, bodies) = world.query_parts();
    rays.iter()
        .map(|&(p1, p2)| ray_cast_closest_impl(tree, fixtures, bodies, p1, p2))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::BodyDef;
    use crate::config::StepConf;
    use crate::fixture::FixtureDef;
    use crate::shapes::{CircleShape, Shape};
    use crate::world::WorldConf;

    fn world_with_disks(xs: &[f32]) -> World {
        let mut world = World::new(WorldConf::with_gravity(Vec2::ZERO));
        for &x in xs {
            let body = world
                .create_body(&BodyDef::static_at(Vec2::new(x, 0.0)))
                .unwrap();
            world
                .create_fixture(
                    body,
                    Shape::Circle(CircleShape::new(0.5)),
                    &FixtureDef::default(),
                )
                .unwrap();
        }
        // Register proxies.
        world.step(&StepConf::default().with_dt(0.0, 0.0));
        world
    }

    #[test]
    fn test_ray_cast_closest_orders_by_distance() {
        let world = world_with_disks(&[10.0, 5.0, 15.0]);
        let hit = ray_cast_closest(&world, Vec2::ZERO, Vec2::new(20.0, 0.0))
            .expect("ray should hit");
        assert!((hit.point.x - 4.5).abs() < 1e-2, "Nearest rim is at x=4.5, got {}", hit.point.x);
    }

    #[test]
    fn test_ray_cast_all_sorted() {
        let world = world_with_disks(&[10.0, 5.0, 15.0]);
        let hits = ray_cast_all(&world, Vec2::ZERO, Vec2::new(20.0, 0.0));
        assert_eq!(hits.len(), 3);
        assert!(hits.windows(2).all(|w| w[0].fraction <= w[1].fraction));
    }

    #[test]
    fn test_ray_cast_miss() {
        let world = world_with_disks(&[5.0]);
        assert!(ray_cast_closest(&world, Vec2::new(0.0, 10.0), Vec2::new(20.0, 10.0)).is_none());
    }

    #[test]
    fn test_overlap_aabb() {
        let world = world_with_disks(&[0.0, 3.0]);
        let found = overlap_aabb(&world, &Aabb::new(Vec2::new(-1.0, -1.0), Vec2::new(1.0, 1.0)));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_batch_ray_cast() {
        let world = world_with_disks(&[5.0]);
        let rays = [
            (Vec2::ZERO, Vec2::new(10.0, 0.0)),
            (Vec2::new(0.0, 10.0), Vec2::new(10.0, 10.0)),
        ];
        let results = batch_ray_cast(&world, &rays);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_some());
        assert!(results[1].is_none());
    }
}

//! GJK Distance
//!
//! Closest-point computation between two convex distance proxies, with a
//! simplex cache so repeated queries against slowly moving shapes converge in
//! one or two iterations. Feeds the narrow phase (sensor overlap tests) and
//! the TOI computer's conservative advancement.

use crate::math::{cross, Transform, Vec2};
use crate::shapes::DistanceProxy;

/// Cached simplex from a previous distance call, keyed by support indices.
#[derive(Clone, Copy, Debug)]
pub struct SimplexCache {
    /// Length or area metric of the cached simplex, used to detect staleness.
    pub metric: f32,
    /// Number of cached support vertices (0 = cold).
    pub count: u16,
    /// Support indices on proxy A
    pub index_a: [u8; 3],
    /// Support indices on proxy B
    pub index_b: [u8; 3],
}

impl Default for SimplexCache {
    fn default() -> Self {
        Self {
            metric: 0.0,
            count: 0,
            index_a: [0; 3],
            index_b: [0; 3],
        }
    }
}

/// Input to [`distance`].
#[derive(Clone, Copy, Debug)]
pub struct DistanceInput<'a> {
    /// Proxy for shape A
    pub proxy_a: &'a DistanceProxy,
    /// Proxy for shape B
    pub proxy_b: &'a DistanceProxy,
    /// Placement of shape A
    pub transform_a: Transform,
    /// Placement of shape B
    pub transform_b: Transform,
    /// Whether to shrink the result by the proxies' vertex radii.
    pub use_radii: bool,
}

/// Output of [`distance`].
#[derive(Clone, Copy, Debug)]
pub struct DistanceOutput {
    /// Closest point on shape A (world)
    pub point_a: Vec2,
    /// Closest point on shape B (world)
    pub point_b: Vec2,
    /// Distance between the closest points (0 when overlapping with radii)
    pub distance: f32,
    /// GJK iterations used
    pub iterations: u32,
}

/// Whether two proxies overlap at the given placements.
#[must_use]
pub fn test_overlap(
    proxy_a: &DistanceProxy,
    xf_a: Transform,
    proxy_b: &DistanceProxy,
    xf_b: Transform,
) -> bool {
    let mut cache = SimplexCache::default();
    let output = distance(
        &mut cache,
        &DistanceInput {
            proxy_a,
            proxy_b,
            transform_a: xf_a,
            transform_b: xf_b,
            use_radii: true,
        },
        20,
    );
    output.distance < 10.0 * f32::EPSILON
}

// ============================================================================
// Simplex
// ============================================================================

#[derive(Clone, Copy, Debug, Default)]
struct SimplexVertex {
    /// Support on A (world)
    w_a: Vec2,
    /// Support on B (world)
    w_b: Vec2,
    /// w_b - w_a
    w: Vec2,
    /// Barycentric weight
    a: f32,
    index_a: u8,
    index_b: u8,
}

#[derive(Clone, Copy, Debug, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: Transform,
        proxy_b: &DistanceProxy,
        xf_b: Transform,
    ) -> Self {
        let mut simplex = Self::default();
        simplex.count = cache.count as usize;

        for i in 0..simplex.count {
            let v = &mut simplex.v[i];
            v.index_a = cache.index_a[i];
            v.index_b = cache.index_b[i];
            v.w_a = xf_a.transform_point(proxy_a.vertex(v.index_a as usize));
            v.w_b = xf_b.transform_point(proxy_b.vertex(v.index_b as usize));
            v.w = v.w_b - v.w_a;
            v.a = 0.0;
        }

        // A stale cache (shape changed size since caching) is discarded.
        if simplex.count > 1 {
            let metric1 = cache.metric;
            let metric2 = simplex.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f32::EPSILON {
                simplex.count = 0;
            }
        }

        if simplex.count == 0 {
            let v = &mut simplex.v[0];
            v.index_a = 0;
            v.index_b = 0;
            v.w_a = xf_a.transform_point(proxy_a.vertex(0));
            v.w_b = xf_b.transform_point(proxy_b.vertex(0));
            v.w = v.w_b - v.w_a;
            v.a = 1.0;
            simplex.count = 1;
        }
        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count as u16;
        for i in 0..self.count {
            cache.index_a[i] = self.v[i].index_a;
            cache.index_b[i] = self.v[i].index_b;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = cross(e12, -self.v[0].w);
                if sgn > 0.0 {
                    // Origin is left of e12.
                    Vec2::new(-e12.y, e12.x)
                } else {
                    Vec2::new(e12.y, -e12.x)
                }
            }
            _ => Vec2::ZERO,
        }
    }

    fn closest_point(&self) -> Vec2 {
        match self.count {
            1 => self.v[0].w,
            2 => self.v[0].a * self.v[0].w + self.v[1].a * self.v[1].w,
            _ => Vec2::ZERO,
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        match self.count {
            1 => (self.v[0].w_a, self.v[0].w_b),
            2 => (
                self.v[0].a * self.v[0].w_a + self.v[1].a * self.v[1].w_a,
                self.v[0].a * self.v[0].w_b + self.v[1].a * self.v[1].w_b,
            ),
            _ => {
                let p = self.v[0].a * self.v[0].w_a
                    + self.v[1].a * self.v[1].w_a
                    + self.v[2].a * self.v[2].w_a;
                (p, p)
            }
        }
    }

    fn metric(&self) -> f32 {
        match self.count {
            1 => 0.0,
            2 => (self.v[1].w - self.v[0].w).length(),
            3 => cross(self.v[1].w - self.v[0].w, self.v[2].w - self.v[0].w),
            _ => 0.0,
        }
    }

    /// Closest point on a segment to the origin, reduced by Voronoi region.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.v[0] = self.v[1];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    /// Closest point on a triangle to the origin, reduced by Voronoi region.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        let e12 = w2 - w1;
        let w1e12 = w1.dot(e12);
        let w2e12 = w2.dot(e12);
        let d12_1 = w2e12;
        let d12_2 = -w1e12;

        let e13 = w3 - w1;
        let w1e13 = w1.dot(e13);
        let w3e13 = w3.dot(e13);
        let d13_1 = w3e13;
        let d13_2 = -w1e13;

        let e23 = w3 - w2;
        let w2e23 = w2.dot(e23);
        let w3e23 = w3.dot(e23);
        let d23_1 = w3e23;
        let d23_2 = -w2e23;

        let n123 = cross(e12, e13);
        let d123_1 = n123 * cross(w2, w3);
        let d123_2 = n123 * cross(w3, w1);
        let d123_3 = n123 * cross(w1, w2);

        // Vertex 1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // Edge 12 region
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv_d12 = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv_d12;
            self.v[1].a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        // Edge 13 region
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv_d13 = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv_d13;
            self.v[2].a = d13_2 * inv_d13;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        // Vertex 2 region
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // Vertex 3 region
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[2].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        // Edge 23 region
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv_d23 = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv_d23;
            self.v[2].a = d23_2 * inv_d23;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // Interior: origin is inside the triangle.
        let inv_d123 = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv_d123;
        self.v[1].a = d123_2 * inv_d123;
        self.v[2].a = d123_3 * inv_d123;
        self.count = 3;
    }
}

/// Compute the closest points between two proxies.
///
/// `cache` carries warm-start state across calls; pass a fresh
/// `SimplexCache::default()` for a cold query.
pub fn distance(cache: &mut SimplexCache, input: &DistanceInput<'_>, max_iters: u32) -> DistanceOutput {
    let proxy_a = input.proxy_a;
    let proxy_b = input.proxy_b;
    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    let mut simplex = Simplex::read_cache(cache, proxy_a, xf_a, proxy_b, xf_b);

    let mut iterations = 0;
    // Support indices of the current simplex, to detect repeats.
    let mut save_a = [0u8; 3];
    let mut save_b = [0u8; 3];

    while iterations < max_iters {
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        // Origin inside the triangle: shapes overlap.
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();
        if d.length_squared() < f32::EPSILON * f32::EPSILON {
            // The origin sits on an edge or vertex of the simplex. Touching,
            // not overlapping; leaving here avoids a degenerate normal below.
            break;
        }

        // New support vertex along d.
        let vertex = &mut simplex.v[simplex.count];
        vertex.index_a = proxy_a.support(xf_a.q.inv_rotate(-d)) as u8;
        vertex.w_a = xf_a.transform_point(proxy_a.vertex(vertex.index_a as usize));
        vertex.index_b = proxy_b.support(xf_b.q.inv_rotate(d)) as u8;
        vertex.w_b = xf_b.transform_point(proxy_b.vertex(vertex.index_b as usize));
        vertex.w = vertex.w_b - vertex.w_a;

        iterations += 1;

        // Repeated support point means convergence.
        let mut duplicate = false;
        for i in 0..save_count {
            if vertex.index_a == save_a[i] && vertex.index_b == save_b[i] {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            break;
        }

        simplex.count += 1;
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = (point_b - point_a).length();
    simplex.write_cache(cache);

    if input.use_radii {
        let r_a = proxy_a.radius;
        let r_b = proxy_b.radius;
        if dist > r_a + r_b && dist > f32::EPSILON {
            // Shapes are separate: pull the witness points onto the surfaces.
            dist -= r_a + r_b;
            let normal = (point_b - point_a).normalize();
            point_a += r_a * normal;
            point_b -= r_b * normal;
        } else {
            // Overlapping with radii: collapse to the midpoint.
            let p = 0.5 * (point_a + point_b);
            point_a = p;
            point_b = p;
            dist = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{CircleShape, PolygonShape, Shape};

    fn query(shape_a: &Shape, xf_a: Transform, shape_b: &Shape, xf_b: Transform, radii: bool) -> DistanceOutput {
        let proxy_a = shape_a.child(0);
        let proxy_b = shape_b.child(0);
        let mut cache = SimplexCache::default();
        distance(
            &mut cache,
            &DistanceInput {
                proxy_a: &proxy_a,
                proxy_b: &proxy_b,
                transform_a: xf_a,
                transform_b: xf_b,
                use_radii: radii,
            },
            20,
        )
    }

    #[test]
    fn test_separated_circles() {
        let a = Shape::Circle(CircleShape::new(1.0));
        let b = Shape::Circle(CircleShape::new(1.0));
        let out = query(
            &a,
            Transform::IDENTITY,
            &b,
            Transform::new(Vec2::new(5.0, 0.0), 0.0),
            true,
        );
        assert!((out.distance - 3.0).abs() < 1e-5, "5 apart minus two radii");
        assert!((out.point_a - Vec2::new(1.0, 0.0)).length() < 1e-4);
        assert!((out.point_b - Vec2::new(4.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_overlapping_circles() {
        let a = Shape::Circle(CircleShape::new(1.0));
        let b = Shape::Circle(CircleShape::new(1.0));
        let out = query(
            &a,
            Transform::IDENTITY,
            &b,
            Transform::new(Vec2::new(1.0, 0.0), 0.0),
            true,
        );
        assert_eq!(out.distance, 0.0);
    }

    #[test]
    fn test_box_box_gap() {
        let a = Shape::Polygon(PolygonShape::new_box(1.0, 1.0));
        let b = Shape::Polygon(PolygonShape::new_box(1.0, 1.0));
        let out = query(
            &a,
            Transform::IDENTITY,
            &b,
            Transform::new(Vec2::new(4.0, 0.0), 0.0),
            false,
        );
        assert!((out.distance - 2.0).abs() < 1e-4, "Faces are 2 apart, got {}", out.distance);
    }

    #[test]
    fn test_box_corner_to_corner() {
        let a = Shape::Polygon(PolygonShape::new_box(1.0, 1.0));
        let b = Shape::Polygon(PolygonShape::new_box(1.0, 1.0));
        let out = query(
            &a,
            Transform::IDENTITY,
            &b,
            Transform::new(Vec2::new(5.0, 5.0), 0.0),
            false,
        );
        let expect = (2.0 * 9.0_f32).sqrt(); // (1,1) to (4,4)
        assert!((out.distance - expect).abs() < 1e-3);
    }

    #[test]
    fn test_overlap_helper() {
        let a = Shape::Circle(CircleShape::new(1.0));
        let b = Shape::Circle(CircleShape::new(1.0));
        let pa = a.child(0);
        let pb = b.child(0);
        assert!(test_overlap(
            &pa,
            Transform::IDENTITY,
            &pb,
            Transform::new(Vec2::new(1.5, 0.0), 0.0)
        ));
        assert!(!test_overlap(
            &pa,
            Transform::IDENTITY,
            &pb,
            Transform::new(Vec2::new(2.5, 0.0), 0.0)
        ));
    }

    #[test]
    fn test_warm_cache_converges_fast() {
        let a = Shape::Polygon(PolygonShape::new_box(1.0, 1.0));
        let b = Shape::Polygon(PolygonShape::new_box(1.0, 1.0));
        let proxy_a = a.child(0);
        let proxy_b = b.child(0);
        let mut cache = SimplexCache::default();
        let input = DistanceInput {
            proxy_a: &proxy_a,
            proxy_b: &proxy_b,
            transform_a: Transform::IDENTITY,
            transform_b: Transform::new(Vec2::new(4.0, 0.1), 0.0),
            use_radii: false,
        };
        let cold = distance(&mut cache, &input, 20);
        let warm = distance(&mut cache, &input, 20);
        assert!(warm.iterations <= cold.iterations);
        assert!((warm.distance - cold.distance).abs() < 1e-6);
    }
}

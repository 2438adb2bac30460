//! Collision Shapes
//!
//! The shape variants the broad and narrow phases consume, behind the small
//! capability set the core needs: child count, vertex radius, distance
//! proxies, AABB computation, mass data, and ray casting.
//!
//! # Shape Types
//!
//! - **Circle**: a disk with a local center
//! - **Edge**: a one-sided segment with optional ghost vertices
//! - **Polygon**: a convex polygon of up to 8 vertices (CCW winding)
//! - **Chain**: a polyline whose children are edges with ghost vertices

use crate::config::{LINEAR_SLOP, MAX_POLYGON_VERTICES};
use crate::math::{cross, Aabb, Transform, Vec2};

/// Skin radius of polygon and edge shapes. Keeping a small shell around
/// polygons lets the position solver hold shapes at a tolerable separation
/// without visual gaps.
pub const POLYGON_RADIUS: f32 = 2.0 * LINEAR_SLOP;

// ============================================================================
// Mass data
// ============================================================================

/// Mass, centroid, and rotational inertia of a shape at a given density.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MassData {
    /// Mass (kg)
    pub mass: f32,
    /// Centroid in shape-local coordinates
    pub center: Vec2,
    /// Rotational inertia about the shape-local origin (kg·m²)
    pub inertia: f32,
}

// ============================================================================
// Ray casting
// ============================================================================

/// A directed segment for ray casting, from `p1` toward `p2`, clipped to
/// `max_fraction` of that span.
#[derive(Clone, Copy, Debug)]
pub struct RayCastInput {
    /// Segment start
    pub p1: Vec2,
    /// Segment end
    pub p2: Vec2,
    /// Fraction of the segment to consider, in [0, 1]
    pub max_fraction: f32,
}

/// A ray-cast hit: the fraction along the input segment and the surface
/// normal at the hit point.
#[derive(Clone, Copy, Debug)]
pub struct RayCastHit {
    /// Hit fraction in [0, max_fraction]
    pub fraction: f32,
    /// Outward surface normal at the hit point
    pub normal: Vec2,
}

// ============================================================================
// Distance proxy
// ============================================================================

/// The vertex cloud + radius view of one shape child, consumed by the GJK
/// distance routine and the TOI computer.
#[derive(Clone, Copy, Debug)]
pub struct DistanceProxy {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    /// Vertex radius: the shell around the convex hull of the vertices.
    pub radius: f32,
}

impl DistanceProxy {
    /// Build a proxy from a vertex slice and radius.
    ///
    /// # Panics
    ///
    /// Panics if `vertices` is empty or longer than [`MAX_POLYGON_VERTICES`].
    #[must_use]
    pub fn new(vertices: &[Vec2], radius: f32) -> Self {
        assert!(!vertices.is_empty() && vertices.len() <= MAX_POLYGON_VERTICES);
        let mut buf = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        buf[..vertices.len()].copy_from_slice(vertices);
        Self {
            vertices: buf,
            count: vertices.len(),
            radius,
        }
    }

    /// The proxy's vertices.
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Vertex by index.
    #[inline]
    #[must_use]
    pub fn vertex(&self, index: usize) -> Vec2 {
        self.vertices[index]
    }

    /// Index of the vertex most extreme in direction `d` (the support point).
    #[must_use]
    pub fn support(&self, d: Vec2) -> usize {
        let mut best = 0;
        let mut best_dot = self.vertices[0].dot(d);
        for i in 1..self.count {
            let dot = self.vertices[i].dot(d);
            if dot > best_dot {
                best_dot = dot;
                best = i;
            }
        }
        best
    }
}

// ============================================================================
// Circle
// ============================================================================

/// A disk: a center point in shape-local coordinates and a radius.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircleShape {
    /// Local center
    pub center: Vec2,
    /// Radius
    pub radius: f32,
}

impl CircleShape {
    /// A circle of `radius` centered at the local origin.
    #[must_use]
    pub fn new(radius: f32) -> Self {
        Self {
            center: Vec2::ZERO,
            radius,
        }
    }

    /// A circle of `radius` at a local offset.
    #[must_use]
    pub const fn with_center(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }
}

// ============================================================================
// Edge
// ============================================================================

/// A one-sided line segment from `v1` to `v2`. Optional ghost vertices smooth
/// collisions across adjacent segments of terrain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeShape {
    /// Segment start
    pub v1: Vec2,
    /// Segment end
    pub v2: Vec2,
    /// Ghost vertex preceding `v1`
    pub v0: Option<Vec2>,
    /// Ghost vertex following `v2`
    pub v3: Option<Vec2>,
}

impl EdgeShape {
    /// An isolated edge without ghost vertices.
    #[must_use]
    pub const fn new(v1: Vec2, v2: Vec2) -> Self {
        Self {
            v1,
            v2,
            v0: None,
            v3: None,
        }
    }
}

// ============================================================================
// Polygon
// ============================================================================

/// A convex polygon of up to [`MAX_POLYGON_VERTICES`] vertices in CCW order,
/// with precomputed edge normals and centroid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PolygonShape {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    /// Centroid in shape-local coordinates
    pub centroid: Vec2,
}

impl PolygonShape {
    /// An axis-aligned box with the given half-extents, centered at the local
    /// origin.
    #[must_use]
    pub fn new_box(half_width: f32, half_height: f32) -> Self {
        let vertices = [
            Vec2::new(-half_width, -half_height),
            Vec2::new(half_width, -half_height),
            Vec2::new(half_width, half_height),
            Vec2::new(-half_width, half_height),
        ];
        let normals = [
            Vec2::new(0.0, -1.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(-1.0, 0.0),
        ];
        let mut out = Self {
            vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            count: 4,
            centroid: Vec2::ZERO,
        };
        out.vertices[..4].copy_from_slice(&vertices);
        out.normals[..4].copy_from_slice(&normals);
        out
    }

    /// A box with the given half-extents placed at `center` with `angle`.
    #[must_use]
    pub fn new_box_at(half_width: f32, half_height: f32, center: Vec2, angle: f32) -> Self {
        let mut shape = Self::new_box(half_width, half_height);
        let xf = Transform::new(center, angle);
        for i in 0..4 {
            shape.vertices[i] = xf.transform_point(shape.vertices[i]);
            shape.normals[i] = xf.q.rotate(shape.normals[i]);
        }
        shape.centroid = center;
        shape
    }

    /// Build a convex polygon from a point cloud.
    ///
    /// Computes the convex hull (gift wrapping) and discards collinear or
    /// near-coincident points, so the result may have fewer vertices than the
    /// input. Returns `None` when fewer than 3 usable vertices remain.
    #[must_use]
    pub fn new(points: &[Vec2]) -> Option<Self> {
        let n = points.len().min(MAX_POLYGON_VERTICES);
        if n < 3 {
            return None;
        }

        // Discard near-coincident points.
        let min_sq = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
        let mut pts: Vec<Vec2> = Vec::with_capacity(n);
        for &p in &points[..n] {
            if pts.iter().all(|&q| (p - q).length_squared() > min_sq) {
                pts.push(p);
            }
        }
        if pts.len() < 3 {
            return None;
        }

        // Gift wrapping from the rightmost point.
        let mut start = 0;
        for (i, p) in pts.iter().enumerate() {
            if p.x > pts[start].x || (p.x == pts[start].x && p.y < pts[start].y) {
                start = i;
            }
        }

        let mut hull = [0usize; MAX_POLYGON_VERTICES];
        let mut count = 0;
        let mut ih = start;
        loop {
            hull[count] = ih;
            count += 1;

            let mut ie = 0;
            for j in 1..pts.len() {
                if ie == ih {
                    ie = j;
                    continue;
                }
                let r = pts[ie] - pts[hull[count - 1]];
                let v = pts[j] - pts[hull[count - 1]];
                let c = cross(r, v);
                if c < 0.0 || (c == 0.0 && v.length_squared() > r.length_squared()) {
                    ie = j;
                }
            }

            ih = ie;
            if ie == start || count == MAX_POLYGON_VERTICES {
                break;
            }
        }
        if count < 3 {
            return None;
        }

        let mut out = Self {
            vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            count,
            centroid: Vec2::ZERO,
        };
        for i in 0..count {
            out.vertices[i] = pts[hull[i]];
        }
        for i in 0..count {
            let i2 = (i + 1) % count;
            let edge = out.vertices[i2] - out.vertices[i];
            debug_assert!(edge.length_squared() > f32::EPSILON);
            out.normals[i] = Vec2::new(edge.y, -edge.x).normalize();
        }
        out.centroid = polygon_centroid(&out.vertices[..count]);
        Some(out)
    }

    /// The polygon's vertices in CCW order.
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    /// The outward edge normals; `normals()[i]` belongs to the edge from
    /// vertex `i` to vertex `i + 1`.
    #[inline]
    #[must_use]
    pub fn normals(&self) -> &[Vec2] {
        &self.normals[..self.count]
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }
}

fn polygon_centroid(vertices: &[Vec2]) -> Vec2 {
    // Sum of triangle centroids weighted by signed area.
    let mut c = Vec2::ZERO;
    let mut area = 0.0;
    let origin = vertices[0];
    for i in 1..vertices.len() - 1 {
        let e1 = vertices[i] - origin;
        let e2 = vertices[i + 1] - origin;
        let a = 0.5 * cross(e1, e2);
        area += a;
        c += a * (e1 + e2) / 3.0;
    }
    origin + c / area
}

// ============================================================================
// Chain
// ============================================================================

/// A polyline whose children are edges. Adjacent vertices become ghost
/// vertices of each child so bodies slide across joints without snagging.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainShape {
    vertices: Vec<Vec2>,
    is_loop: bool,
}

impl ChainShape {
    /// An open chain through the given vertices (at least 2).
    #[must_use]
    pub fn new(vertices: &[Vec2]) -> Self {
        assert!(vertices.len() >= 2);
        Self {
            vertices: vertices.to_vec(),
            is_loop: false,
        }
    }

    /// A closed loop through the given vertices (at least 3); the last child
    /// connects the final vertex back to the first.
    #[must_use]
    pub fn new_loop(vertices: &[Vec2]) -> Self {
        assert!(vertices.len() >= 3);
        Self {
            vertices: vertices.to_vec(),
            is_loop: true,
        }
    }

    /// The chain vertices.
    #[inline]
    #[must_use]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    /// Number of edge children.
    #[inline]
    #[must_use]
    pub fn child_count(&self) -> usize {
        if self.is_loop {
            self.vertices.len()
        } else {
            self.vertices.len() - 1
        }
    }

    /// The edge child at `index`, with ghost vertices from the neighbors.
    #[must_use]
    pub fn child_edge(&self, index: usize) -> EdgeShape {
        let n = self.vertices.len();
        let at = |i: usize| self.vertices[i % n];
        let v1 = at(index);
        let v2 = at(index + 1);
        let v0 = if index > 0 {
            Some(self.vertices[index - 1])
        } else if self.is_loop {
            Some(self.vertices[n - 1])
        } else {
            None
        };
        let v3 = if index + 2 < n {
            Some(self.vertices[index + 2])
        } else if self.is_loop {
            Some(at(index + 2))
        } else {
            None
        };
        EdgeShape { v1, v2, v0, v3 }
    }
}

// ============================================================================
// Shape
// ============================================================================

/// A collision shape variant.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// Disk
    Circle(CircleShape),
    /// One-sided segment
    Edge(EdgeShape),
    /// Convex polygon
    Polygon(PolygonShape),
    /// Edge polyline
    Chain(ChainShape),
}

impl Shape {
    /// Number of broad-phase children this shape contributes.
    #[must_use]
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Circle(_) | Shape::Edge(_) | Shape::Polygon(_) => 1,
            Shape::Chain(chain) => chain.child_count(),
        }
    }

    /// Vertex radius of the given child.
    #[must_use]
    pub fn vertex_radius(&self, _child: usize) -> f32 {
        match self {
            Shape::Circle(c) => c.radius,
            Shape::Edge(_) | Shape::Polygon(_) | Shape::Chain(_) => POLYGON_RADIUS,
        }
    }

    /// Distance proxy of the given child.
    #[must_use]
    pub fn child(&self, child: usize) -> DistanceProxy {
        match self {
            Shape::Circle(c) => DistanceProxy::new(&[c.center], c.radius),
            Shape::Edge(e) => DistanceProxy::new(&[e.v1, e.v2], POLYGON_RADIUS),
            Shape::Polygon(p) => DistanceProxy::new(p.vertices(), POLYGON_RADIUS),
            Shape::Chain(chain) => {
                let e = chain.child_edge(child);
                DistanceProxy::new(&[e.v1, e.v2], POLYGON_RADIUS)
            }
        }
    }

    /// AABB of the given child at a transform.
    #[must_use]
    pub fn compute_aabb(&self, xf: Transform, child: usize) -> Aabb {
        let proxy = self.child(child);
        let mut aabb = {
            let p = xf.transform_point(proxy.vertex(0));
            Aabb::new(p, p)
        };
        for &v in &proxy.vertices()[1..] {
            let p = xf.transform_point(v);
            aabb.min = aabb.min.min(p);
            aabb.max = aabb.max.max(p);
        }
        aabb.fattened(proxy.radius)
    }

    /// AABB covering the child swept between two transforms.
    #[must_use]
    pub fn compute_swept_aabb(&self, xf1: Transform, xf2: Transform, child: usize) -> Aabb {
        self.compute_aabb(xf1, child)
            .union(&self.compute_aabb(xf2, child))
    }

    /// Mass data of the whole shape at `density` (kg/m²).
    ///
    /// Edges and chains have no area; they report zero mass at their
    /// geometric center so a body made only of them stays static-massed.
    #[must_use]
    pub fn mass_data(&self, density: f32) -> MassData {
        match self {
            Shape::Circle(c) => {
                let mass = density * core::f32::consts::PI * c.radius * c.radius;
                MassData {
                    mass,
                    center: c.center,
                    inertia: mass * (0.5 * c.radius * c.radius + c.center.length_squared()),
                }
            }
            Shape::Edge(e) => MassData {
                mass: 0.0,
                center: 0.5 * (e.v1 + e.v2),
                inertia: 0.0,
            },
            Shape::Polygon(p) => polygon_mass_data(p, density),
            Shape::Chain(chain) => {
                let n = chain.vertices().len() as f32;
                let center = chain.vertices().iter().copied().sum::<Vec2>() / n;
                MassData {
                    mass: 0.0,
                    center,
                    inertia: 0.0,
                }
            }
        }
    }

    /// Ray cast against the given child in world space.
    #[must_use]
    pub fn ray_cast(&self, input: &RayCastInput, xf: Transform, child: usize) -> Option<RayCastHit> {
        match self {
            Shape::Circle(c) => ray_cast_circle(c, input, xf),
            Shape::Edge(e) => ray_cast_edge(e.v1, e.v2, input, xf),
            Shape::Polygon(p) => ray_cast_polygon(p, input, xf),
            Shape::Chain(chain) => {
                let e = chain.child_edge(child);
                ray_cast_edge(e.v1, e.v2, input, xf)
            }
        }
    }

    /// Whether a world point is inside the shape (meaningful for solid
    /// shapes; edges and chains always report false).
    #[must_use]
    pub fn test_point(&self, xf: Transform, p: Vec2) -> bool {
        match self {
            Shape::Circle(c) => {
                let center = xf.transform_point(c.center);
                (p - center).length_squared() <= c.radius * c.radius
            }
            Shape::Polygon(poly) => {
                let local = xf.inv_transform_point(p);
                poly.vertices()
                    .iter()
                    .zip(poly.normals())
                    .all(|(&v, &n)| n.dot(local - v) <= 0.0)
            }
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }
}

fn polygon_mass_data(p: &PolygonShape, density: f32) -> MassData {
    let verts = p.vertices();
    let origin = verts[0];

    let mut area = 0.0;
    let mut center = Vec2::ZERO;
    let mut inertia = 0.0;
    let inv3 = 1.0 / 3.0;

    for i in 1..verts.len() - 1 {
        let e1 = verts[i] - origin;
        let e2 = verts[i + 1] - origin;
        let d = cross(e1, e2);
        let tri_area = 0.5 * d;
        area += tri_area;
        center += tri_area * inv3 * (e1 + e2);

        let intx2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
        let inty2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
        inertia += (0.25 * inv3 * d) * (intx2 + inty2);
    }

    let mass = density * area;
    center /= area;
    let centroid = origin + center;
    // Shift inertia from the first-vertex frame to the shape origin.
    let inertia_origin =
        density * inertia + mass * (centroid.length_squared() - center.length_squared());
    MassData {
        mass,
        center: centroid,
        inertia: inertia_origin,
    }
}

fn ray_cast_circle(c: &CircleShape, input: &RayCastInput, xf: Transform) -> Option<RayCastHit> {
    let center = xf.transform_point(c.center);
    let s = input.p1 - center;
    let b = s.length_squared() - c.radius * c.radius;

    let r = input.p2 - input.p1;
    let cc = s.dot(r);
    let rr = r.length_squared();
    let sigma = cc * cc - rr * b;
    if sigma < 0.0 || rr < f32::EPSILON {
        return None;
    }

    let t = -(cc + sigma.sqrt());
    if t >= 0.0 && t <= input.max_fraction * rr {
        let fraction = t / rr;
        let normal = (s + fraction * r).normalize();
        return Some(RayCastHit { fraction, normal });
    }
    None
}

fn ray_cast_edge(v1: Vec2, v2: Vec2, input: &RayCastInput, xf: Transform) -> Option<RayCastHit> {
    // Work in edge-local space.
    let p1 = xf.inv_transform_point(input.p1);
    let p2 = xf.inv_transform_point(input.p2);
    let d = p2 - p1;

    let e = v2 - v1;
    let len = e.length();
    if len < f32::EPSILON {
        return None;
    }
    let normal = Vec2::new(e.y, -e.x) / len;

    // p = p1 + t * d, dot(normal, p - v1) = 0
    let numerator = normal.dot(v1 - p1);
    let denominator = normal.dot(d);
    if denominator == 0.0 {
        return None;
    }
    let t = numerator / denominator;
    if t < 0.0 || t > input.max_fraction {
        return None;
    }

    let q = p1 + t * d;
    let s = (q - v1).dot(e) / (len * len);
    if !(0.0..=1.0).contains(&s) {
        return None;
    }

    let world_normal = if numerator > 0.0 {
        -xf.q.rotate(normal)
    } else {
        xf.q.rotate(normal)
    };
    Some(RayCastHit {
        fraction: t,
        normal: world_normal,
    })
}

fn ray_cast_polygon(p: &PolygonShape, input: &RayCastInput, xf: Transform) -> Option<RayCastHit> {
    let p1 = xf.inv_transform_point(input.p1);
    let p2 = xf.inv_transform_point(input.p2);
    let d = p2 - p1;

    let mut lower = 0.0_f32;
    let mut upper = input.max_fraction;
    let mut index = None;

    for i in 0..p.count() {
        // p = p1 + t * d, dot(normal, p - v) <= 0
        let numerator = p.normals()[i].dot(p.vertices()[i] - p1);
        let denominator = p.normals()[i].dot(d);

        if denominator == 0.0 {
            if numerator < 0.0 {
                return None;
            }
        } else if denominator < 0.0 && numerator < lower * denominator {
            lower = numerator / denominator;
            index = Some(i);
        } else if denominator > 0.0 && numerator < upper * denominator {
            upper = numerator / denominator;
        }

        if upper < lower {
            return None;
        }
    }

    index.map(|i| RayCastHit {
        fraction: lower,
        normal: xf.q.rotate(p.normals()[i]),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circle_mass_data() {
        let c = Shape::Circle(CircleShape::new(2.0));
        let md = c.mass_data(1.0);
        let expect = core::f32::consts::PI * 4.0;
        assert!((md.mass - expect).abs() < 1e-4);
        assert_eq!(md.center, Vec2::ZERO);
        assert!((md.inertia - expect * 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_box_mass_data() {
        let b = Shape::Polygon(PolygonShape::new_box(1.0, 1.0));
        let md = b.mass_data(1.0);
        assert!((md.mass - 4.0).abs() < 1e-4, "2x2 box of density 1 weighs 4");
        assert!(md.center.length() < 1e-5);
        // I = m (w² + h²) / 12 about centroid = 4 * 8 / 12
        assert!((md.inertia - 8.0 / 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_offset_box_centroid() {
        let b = PolygonShape::new_box_at(0.5, 0.5, Vec2::new(3.0, 1.0), 0.0);
        let md = Shape::Polygon(b).mass_data(2.0);
        assert!((md.center - Vec2::new(3.0, 1.0)).length() < 1e-5);
        assert!((md.mass - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_convex_hull_from_points() {
        // A square plus an interior point: the hull drops the interior.
        let pts = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(0.5, 0.5),
        ];
        let p = PolygonShape::new(&pts).expect("hull should exist");
        assert_eq!(p.count(), 4);
    }

    #[test]
    fn test_degenerate_hull_rejected() {
        let pts = [Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)];
        assert!(PolygonShape::new(&pts).is_none(), "Collinear points form no polygon");
    }

    #[test]
    fn test_aabb_circle() {
        let c = Shape::Circle(CircleShape::with_center(Vec2::new(1.0, 0.0), 0.5));
        let aabb = c.compute_aabb(Transform::IDENTITY, 0);
        assert!((aabb.min.x - 0.5).abs() < 1e-6);
        assert!((aabb.max.x - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_swept_aabb_covers_both() {
        let c = Shape::Circle(CircleShape::new(0.5));
        let xf1 = Transform::IDENTITY;
        let xf2 = Transform::new(Vec2::new(10.0, 0.0), 0.0);
        let aabb = c.compute_swept_aabb(xf1, xf2, 0);
        assert!(aabb.min.x <= -0.5);
        assert!(aabb.max.x >= 10.5);
    }

    #[test]
    fn test_chain_children() {
        let chain = ChainShape::new(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 1.0),
        ]);
        assert_eq!(chain.child_count(), 2);
        let e0 = chain.child_edge(0);
        assert_eq!(e0.v0, None);
        assert_eq!(e0.v3, Some(Vec2::new(2.0, 1.0)));
        let e1 = chain.child_edge(1);
        assert_eq!(e1.v0, Some(Vec2::new(0.0, 0.0)));
        assert_eq!(e1.v3, None);

        let ring = ChainShape::new_loop(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 1.0),
        ]);
        assert_eq!(ring.child_count(), 3);
        assert_eq!(ring.child_edge(0).v0, Some(Vec2::new(0.0, 1.0)));
    }

    #[test]
    fn test_ray_cast_circle_hit() {
        let c = Shape::Circle(CircleShape::new(1.0));
        let input = RayCastInput {
            p1: Vec2::new(-5.0, 0.0),
            p2: Vec2::new(5.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = c.ray_cast(&input, Transform::IDENTITY, 0).expect("should hit");
        assert!((hit.fraction - 0.4).abs() < 1e-5, "Enters at x = -1");
        assert!((hit.normal - Vec2::new(-1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_ray_cast_polygon_miss() {
        let b = Shape::Polygon(PolygonShape::new_box(1.0, 1.0));
        let input = RayCastInput {
            p1: Vec2::new(-5.0, 3.0),
            p2: Vec2::new(5.0, 3.0),
            max_fraction: 1.0,
        };
        assert!(b.ray_cast(&input, Transform::IDENTITY, 0).is_none());
    }

    #[test]
    fn test_ray_cast_edge() {
        let e = Shape::Edge(EdgeShape::new(Vec2::new(-1.0, 1.0), Vec2::new(1.0, 1.0)));
        let input = RayCastInput {
            p1: Vec2::new(0.0, 3.0),
            p2: Vec2::new(0.0, -1.0),
            max_fraction: 1.0,
        };
        let hit = e.ray_cast(&input, Transform::IDENTITY, 0).expect("should hit");
        assert!((hit.fraction - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_test_point() {
        let b = Shape::Polygon(PolygonShape::new_box(1.0, 1.0));
        assert!(b.test_point(Transform::IDENTITY, Vec2::new(0.5, 0.5)));
        assert!(!b.test_point(Transform::IDENTITY, Vec2::new(1.5, 0.0)));

        let xf = Transform::new(Vec2::new(10.0, 0.0), 0.0);
        assert!(b.test_point(xf, Vec2::new(10.5, 0.0)));
    }

    #[test]
    fn test_support_point() {
        let proxy = Shape::Polygon(PolygonShape::new_box(1.0, 2.0)).child(0);
        let i = proxy.support(Vec2::new(1.0, 1.0));
        assert_eq!(proxy.vertex(i), Vec2::new(1.0, 2.0));
    }
}

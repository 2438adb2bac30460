//! Contact Manifolds
//!
//! The cached geometric description of one contact: up to two impulse-carrying
//! points plus a local normal or point depending on the manifold flavor, and
//! the shape-vs-shape functions that produce them.
//!
//! # Manifold Flavors
//!
//! - **Circles**: two disks; the normal is derived from the centers
//! - **FaceA**: a reference face on shape A clipped against shape B
//! - **FaceB**: a reference face on shape B clipped against shape A
//!
//! Points carry contact-feature ids so the narrow-phase update can match new
//! points to old ones and carry accumulated impulses across frames.

use crate::config::MAX_MANIFOLD_POINTS;
use crate::math::{cross, Transform, Vec2};
use crate::shapes::{CircleShape, EdgeShape, PolygonShape, Shape, POLYGON_RADIUS};

// ============================================================================
// Contact features
// ============================================================================

/// Which kind of shape feature a contact point touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FeatureKind {
    /// A shape vertex
    #[default]
    Vertex,
    /// A shape face
    Face,
}

/// Identifies the pair of shape features a contact point lies between.
/// Stable across frames for persistent contacts, which is what makes
/// warm-start impulse matching possible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ContactFeature {
    /// Feature index on shape A
    pub index_a: u8,
    /// Feature index on shape B
    pub index_b: u8,
    /// Feature kind on shape A
    pub kind_a: FeatureKind,
    /// Feature kind on shape B
    pub kind_b: FeatureKind,
}

impl ContactFeature {
    /// Feature pair with both sides given explicitly.
    #[must_use]
    pub const fn new(index_a: u8, kind_a: FeatureKind, index_b: u8, kind_b: FeatureKind) -> Self {
        Self {
            index_a,
            index_b,
            kind_a,
            kind_b,
        }
    }

    /// The same feature pair seen from the other shape's perspective.
    #[must_use]
    pub const fn swapped(self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            kind_a: self.kind_b,
            kind_b: self.kind_a,
        }
    }
}

// ============================================================================
// Manifold
// ============================================================================

/// One impulse-carrying contact point.
#[derive(Clone, Copy, Debug, Default)]
pub struct ManifoldPoint {
    /// Contact point in the frame of the non-reference shape
    pub local_point: Vec2,
    /// Accumulated normal impulse (warm-start seed)
    pub normal_impulse: f32,
    /// Accumulated tangent impulse (warm-start seed)
    pub tangent_impulse: f32,
    /// Feature pair this point lies between
    pub feature: ContactFeature,
}

/// Manifold flavor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ManifoldKind {
    /// Disk vs disk
    #[default]
    Circles,
    /// Reference face on shape A
    FaceA,
    /// Reference face on shape B
    FaceB,
}

/// A contact manifold: flavor, reference normal/point, and up to two points.
#[derive(Clone, Copy, Debug, Default)]
pub struct Manifold {
    /// Flavor
    pub kind: ManifoldKind,
    /// Reference normal (unused for Circles)
    pub local_normal: Vec2,
    /// Reference point (circle center for Circles, face midpoint otherwise)
    pub local_point: Vec2,
    points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    count: usize,
}

impl Manifold {
    /// Number of contact points.
    #[inline]
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.count
    }

    /// The contact points.
    #[inline]
    #[must_use]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.count]
    }

    /// The contact points, mutable.
    #[inline]
    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.count]
    }

    /// Append a point. Silently ignored beyond [`MAX_MANIFOLD_POINTS`].
    pub fn push(&mut self, point: ManifoldPoint) {
        if self.count < MAX_MANIFOLD_POINTS {
            self.points[self.count] = point;
            self.count += 1;
        }
    }
}

// ============================================================================
// World manifold
// ============================================================================

/// A manifold evaluated at concrete transforms: world normal, world points,
/// and separations.
#[derive(Clone, Copy, Debug, Default)]
pub struct WorldManifold {
    /// World normal, pointing from A to B
    pub normal: Vec2,
    /// World contact points (midway between the surfaces)
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// Signed separation of each point (negative = penetration)
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    /// Evaluate `manifold` at the given transforms and vertex radii.
    #[must_use]
    pub fn new(
        manifold: &Manifold,
        xf_a: Transform,
        radius_a: f32,
        xf_b: Transform,
        radius_b: f32,
    ) -> Self {
        let mut out = Self::default();
        if manifold.point_count() == 0 {
            return out;
        }

        match manifold.kind {
            ManifoldKind::Circles => {
                let point_a = xf_a.transform_point(manifold.local_point);
                let point_b = xf_b.transform_point(manifold.points[0].local_point);
                out.normal = Vec2::new(1.0, 0.0);
                if (point_b - point_a).length_squared() > f32::EPSILON * f32::EPSILON {
                    out.normal = (point_b - point_a).normalize();
                }
                let c_a = point_a + radius_a * out.normal;
                let c_b = point_b - radius_b * out.normal;
                out.points[0] = 0.5 * (c_a + c_b);
                out.separations[0] = (c_b - c_a).dot(out.normal);
            }
            ManifoldKind::FaceA => {
                out.normal = xf_a.q.rotate(manifold.local_normal);
                let plane_point = xf_a.transform_point(manifold.local_point);
                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_b.transform_point(mp.local_point);
                    let c_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(out.normal)) * out.normal;
                    let c_b = clip_point - radius_b * out.normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_b - c_a).dot(out.normal);
                }
            }
            ManifoldKind::FaceB => {
                out.normal = xf_b.q.rotate(manifold.local_normal);
                let plane_point = xf_b.transform_point(manifold.local_point);
                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = xf_a.transform_point(mp.local_point);
                    let c_b = clip_point
                        + (radius_b - (clip_point - plane_point).dot(out.normal)) * out.normal;
                    let c_a = clip_point - radius_a * out.normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_a - c_b).dot(out.normal);
                }
                // Keep the convention: normal points from A to B.
                out.normal = -out.normal;
            }
        }
        out
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Whether the shape pair must be swapped so the collide functions see their
/// canonical ordering (chain/edge before polygon before circle).
#[must_use]
pub fn needs_swap(a: &Shape, b: &Shape) -> bool {
    fn rank(s: &Shape) -> u8 {
        match s {
            Shape::Chain(_) => 0,
            Shape::Edge(_) => 1,
            Shape::Polygon(_) => 2,
            Shape::Circle(_) => 3,
        }
    }
    rank(a) > rank(b)
}

/// Compute the manifold between two shape children at the given transforms.
///
/// Expects canonical ordering (see [`needs_swap`]); non-colliding pairings
/// (edge vs edge, chain vs chain) produce an empty manifold.
#[must_use]
pub fn collide_shapes(
    shape_a: &Shape,
    xf_a: Transform,
    child_a: usize,
    shape_b: &Shape,
    xf_b: Transform,
    _child_b: usize,
) -> Manifold {
    match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_circle(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Circle(b)) => collide_edge_circle(a, xf_a, b, xf_b),
        (Shape::Edge(a), Shape::Polygon(b)) => collide_edge_polygon(a, xf_a, b, xf_b),
        (Shape::Chain(chain), Shape::Circle(b)) => {
            collide_edge_circle(&chain.child_edge(child_a), xf_a, b, xf_b)
        }
        (Shape::Chain(chain), Shape::Polygon(b)) => {
            collide_edge_polygon(&chain.child_edge(child_a), xf_a, b, xf_b)
        }
        _ => Manifold::default(),
    }
}

// ============================================================================
// Circle vs circle
// ============================================================================

/// Collide two disks.
#[must_use]
pub fn collide_circles(
    a: &CircleShape,
    xf_a: Transform,
    b: &CircleShape,
    xf_b: Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = xf_a.transform_point(a.center);
    let p_b = xf_b.transform_point(b.center);
    let radius = a.radius + b.radius;
    if (p_b - p_a).length_squared() > radius * radius {
        return manifold;
    }

    manifold.kind = ManifoldKind::Circles;
    manifold.local_point = a.center;
    manifold.push(ManifoldPoint {
        local_point: b.center,
        ..Default::default()
    });
    manifold
}

// ============================================================================
// Polygon vs circle
// ============================================================================

/// Collide a polygon (reference) with a disk.
#[must_use]
pub fn collide_polygon_circle(
    poly: &PolygonShape,
    xf_a: Transform,
    circle: &CircleShape,
    xf_b: Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Circle center in polygon frame.
    let c = xf_a.inv_transform_point(xf_b.transform_point(circle.center));
    let radius = POLYGON_RADIUS + circle.radius;

    // Deepest-penetration face.
    let mut normal_index = 0;
    let mut separation = f32::NEG_INFINITY;
    for i in 0..poly.count() {
        let s = poly.normals()[i].dot(c - poly.vertices()[i]);
        if s > radius {
            return manifold;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let v1 = poly.vertices()[normal_index];
    let v2 = poly.vertices()[(normal_index + 1) % poly.count()];

    let point = ManifoldPoint {
        local_point: circle.center,
        ..Default::default()
    };

    if separation < f32::EPSILON {
        // Center is inside the polygon.
        manifold.kind = ManifoldKind::FaceA;
        manifold.local_normal = poly.normals()[normal_index];
        manifold.local_point = 0.5 * (v1 + v2);
        manifold.push(point);
        return manifold;
    }

    // Voronoi region of the face.
    let u1 = (c - v1).dot(v2 - v1);
    let u2 = (c - v2).dot(v1 - v2);
    if u1 <= 0.0 {
        if (c - v1).length_squared() > radius * radius {
            return manifold;
        }
        manifold.kind = ManifoldKind::FaceA;
        manifold.local_normal = (c - v1).normalize();
        manifold.local_point = v1;
    } else if u2 <= 0.0 {
        if (c - v2).length_squared() > radius * radius {
            return manifold;
        }
        manifold.kind = ManifoldKind::FaceA;
        manifold.local_normal = (c - v2).normalize();
        manifold.local_point = v2;
    } else {
        let face_center = 0.5 * (v1 + v2);
        if (c - face_center).dot(poly.normals()[normal_index]) > radius {
            return manifold;
        }
        manifold.kind = ManifoldKind::FaceA;
        manifold.local_normal = poly.normals()[normal_index];
        manifold.local_point = face_center;
    }
    manifold.push(point);
    manifold
}

// ============================================================================
// Polygon vs polygon
// ============================================================================

#[derive(Clone, Copy, Default)]
struct ClipVertex {
    v: Vec2,
    feature: ContactFeature,
}

/// Sutherland-Hodgman style clip of a two-point segment against a half-plane.
fn clip_segment_to_line(
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: u8,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    let mut num_out = 0;

    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    if distance0 <= 0.0 {
        v_out[num_out] = v_in[0];
        num_out += 1;
    }
    if distance1 <= 0.0 {
        v_out[num_out] = v_in[1];
        num_out += 1;
    }

    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        v_out[num_out].v = v_in[0].v + interp * (v_in[1].v - v_in[0].v);
        v_out[num_out].feature = ContactFeature::new(
            vertex_index_a,
            FeatureKind::Vertex,
            v_in[0].feature.index_b,
            FeatureKind::Face,
        );
        num_out += 1;
    }

    (v_out, num_out)
}

/// Largest separation of `poly2`'s hull from `poly1`'s faces.
fn find_max_separation(
    poly1: &PolygonShape,
    xf1: Transform,
    poly2: &PolygonShape,
    xf2: Transform,
) -> (usize, f32) {
    let xf = xf2.inv_mul(xf1);

    let mut best_index = 0;
    let mut max_separation = f32::NEG_INFINITY;
    for i in 0..poly1.count() {
        // poly1's face normal and vertex in poly2's frame.
        let n = xf.q.rotate(poly1.normals()[i]);
        let v1 = xf.transform_point(poly1.vertices()[i]);

        let mut si = f32::INFINITY;
        for &v2 in poly2.vertices() {
            si = si.min(n.dot(v2 - v1));
        }

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }
    (best_index, max_separation)
}

fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: Transform,
) -> [ClipVertex; 2] {
    // Reference normal in poly2's frame.
    let normal1 = xf2.q.inv_rotate(xf1.q.rotate(poly1.normals()[edge1]));

    // Most anti-parallel face of poly2.
    let mut index = 0;
    let mut min_dot = f32::INFINITY;
    for (i, &n) in poly2.normals().iter().enumerate() {
        let dot = normal1.dot(n);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = (i1 + 1) % poly2.count();
    [
        ClipVertex {
            v: xf2.transform_point(poly2.vertices()[i1]),
            feature: ContactFeature::new(
                edge1 as u8,
                FeatureKind::Face,
                i1 as u8,
                FeatureKind::Vertex,
            ),
        },
        ClipVertex {
            v: xf2.transform_point(poly2.vertices()[i2]),
            feature: ContactFeature::new(
                edge1 as u8,
                FeatureKind::Face,
                i2 as u8,
                FeatureKind::Vertex,
            ),
        },
    ]
}

/// Collide two convex polygons (SAT reference face + clipping).
#[must_use]
pub fn collide_polygons(
    poly_a: &PolygonShape,
    xf_a: Transform,
    poly_b: &PolygonShape,
    xf_b: Transform,
) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = 2.0 * POLYGON_RADIUS;

    let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return manifold;
    }
    let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return manifold;
    }

    let k_tol = 0.1 * crate::config::LINEAR_SLOP;
    let (poly1, poly2, xf1, xf2, edge1, flip) = if separation_b > separation_a + k_tol {
        manifold.kind = ManifoldKind::FaceB;
        (poly_b, poly_a, xf_b, xf_a, edge_b, true)
    } else {
        manifold.kind = ManifoldKind::FaceA;
        (poly_a, poly_b, xf_a, xf_b, edge_a, false)
    };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let iv1 = edge1;
    let iv2 = (edge1 + 1) % poly1.count();
    let mut v11 = poly1.vertices()[iv1];
    let mut v12 = poly1.vertices()[iv2];

    let local_tangent = (v12 - v11).normalize();
    let local_normal = Vec2::new(local_tangent.y, -local_tangent.x);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = xf1.q.rotate(local_tangent);
    let normal = Vec2::new(tangent.y, -tangent.x);

    v11 = xf1.transform_point(v11);
    v12 = xf1.transform_point(v12);

    let front_offset = normal.dot(v11);
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    let (clip1, np1) = clip_segment_to_line(&incident_edge, -tangent, side_offset1, iv1 as u8);
    if np1 < 2 {
        return manifold;
    }
    let (clip2, np2) = clip_segment_to_line(&clip1, tangent, side_offset2, iv2 as u8);
    if np2 < 2 {
        return manifold;
    }

    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;

    for clip in &clip2 {
        let separation = normal.dot(clip.v) - front_offset;
        if separation <= total_radius {
            manifold.push(ManifoldPoint {
                local_point: xf2.inv_transform_point(clip.v),
                feature: if flip {
                    clip.feature.swapped()
                } else {
                    clip.feature
                },
                ..Default::default()
            });
        }
    }
    manifold
}

// ============================================================================
// Edge vs circle
// ============================================================================

/// Collide a one-sided edge with a disk.
#[must_use]
pub fn collide_edge_circle(
    edge: &EdgeShape,
    xf_a: Transform,
    circle: &CircleShape,
    xf_b: Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Circle center in edge frame.
    let q = xf_a.inv_transform_point(xf_b.transform_point(circle.center));

    let a = edge.v1;
    let b = edge.v2;
    let e = b - a;

    // One-sided: ignore hits from behind the face.
    let n = Vec2::new(e.y, -e.x);
    let offset = n.dot(q - a);
    let one_sided = edge.v0.is_some() || edge.v3.is_some();
    if one_sided && offset < 0.0 {
        return manifold;
    }

    // Barycentric coordinates of q on (a, b).
    let u = e.dot(b - q);
    let v = e.dot(q - a);
    let radius = POLYGON_RADIUS + circle.radius;

    let point = |feature: ContactFeature| ManifoldPoint {
        local_point: circle.center,
        feature,
        ..Default::default()
    };

    if v <= 0.0 {
        // Region A.
        if (q - a).length_squared() > radius * radius {
            return manifold;
        }
        // The preceding segment owns this vertex region.
        if let Some(v0) = edge.v0 {
            if (a - v0).dot(a - q) > 0.0 {
                return manifold;
            }
        }
        manifold.kind = ManifoldKind::Circles;
        manifold.local_point = a;
        manifold.push(point(ContactFeature::new(
            0,
            FeatureKind::Vertex,
            0,
            FeatureKind::Vertex,
        )));
    } else if u <= 0.0 {
        // Region B.
        if (q - b).length_squared() > radius * radius {
            return manifold;
        }
        if let Some(v3) = edge.v3 {
            if (v3 - b).dot(q - b) > 0.0 {
                return manifold;
            }
        }
        manifold.kind = ManifoldKind::Circles;
        manifold.local_point = b;
        manifold.push(point(ContactFeature::new(
            1,
            FeatureKind::Vertex,
            0,
            FeatureKind::Vertex,
        )));
    } else {
        // Region AB: face contact.
        let den = e.length_squared();
        debug_assert!(den > 0.0);
        let p = (u * a + v * b) / den;
        if (q - p).length_squared() > radius * radius {
            return manifold;
        }
        let normal = if offset < 0.0 { -n } else { n }.normalize();
        manifold.kind = ManifoldKind::FaceA;
        manifold.local_normal = normal;
        manifold.local_point = a;
        manifold.push(point(ContactFeature::new(
            0,
            FeatureKind::Face,
            0,
            FeatureKind::Vertex,
        )));
    }
    manifold
}

// ============================================================================
// Edge vs polygon
// ============================================================================

#[derive(Clone, Copy)]
enum EpAxisKind {
    EdgeA,
    EdgeB,
}

#[derive(Clone, Copy)]
struct EpAxis {
    kind: EpAxisKind,
    index: usize,
    separation: f32,
    normal: Vec2,
}

/// Collide a one-sided edge with a polygon (SAT on the edge normal and the
/// polygon faces, then reference-face clipping).
#[must_use]
pub fn collide_edge_polygon(
    edge: &EdgeShape,
    xf_a: Transform,
    poly: &PolygonShape,
    xf_b: Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let xf = xf_a.inv_mul(xf_b);
    let centroid_b = xf.transform_point(poly.centroid);

    let v1 = edge.v1;
    let v2 = edge.v2;
    let edge_dir = (v2 - v1).normalize();
    let normal1 = Vec2::new(edge_dir.y, -edge_dir.x);
    let offset1 = normal1.dot(centroid_b - v1);

    let one_sided = edge.v0.is_some() || edge.v3.is_some();
    if one_sided && offset1 < 0.0 {
        return manifold;
    }

    // Polygon B in the edge frame.
    let count_b = poly.count();
    let mut verts_b = [Vec2::ZERO; crate::config::MAX_POLYGON_VERTICES];
    let mut norms_b = [Vec2::ZERO; crate::config::MAX_POLYGON_VERTICES];
    for i in 0..count_b {
        verts_b[i] = xf.transform_point(poly.vertices()[i]);
        norms_b[i] = xf.q.rotate(poly.normals()[i]);
    }

    let radius = 2.0 * POLYGON_RADIUS;

    // Axis along the edge normal (front or back face).
    let edge_axis = {
        let axes = if one_sided {
            [normal1, normal1]
        } else {
            [normal1, -normal1]
        };
        let mut best = EpAxis {
            kind: EpAxisKind::EdgeA,
            index: 0,
            separation: f32::NEG_INFINITY,
            normal: normal1,
        };
        for (j, &axis) in axes.iter().enumerate() {
            let mut s = f32::INFINITY;
            for &vb in &verts_b[..count_b] {
                s = s.min(axis.dot(vb - v1));
            }
            if s > best.separation {
                best.separation = s;
                best.index = j;
                best.normal = axis;
            }
        }
        best
    };
    if edge_axis.separation > radius {
        return manifold;
    }

    // Axis along a polygon face normal.
    let polygon_axis = {
        let mut best = EpAxis {
            kind: EpAxisKind::EdgeB,
            index: 0,
            separation: f32::NEG_INFINITY,
            normal: Vec2::ZERO,
        };
        for i in 0..count_b {
            let n = norms_b[i];
            let s = (n.dot(v1 - verts_b[i])).min(n.dot(v2 - verts_b[i]));
            if s > best.separation {
                best.separation = s;
                best.index = i;
                best.normal = n;
            }
        }
        best
    };
    if polygon_axis.separation > radius {
        return manifold;
    }

    // Prefer the edge axis unless the polygon axis is clearly deeper.
    let k_relative_tol = 0.98;
    let k_absolute_tol = 0.001;
    let mut primary = if polygon_axis.separation - radius
        > k_relative_tol * (edge_axis.separation - radius) + k_absolute_tol
    {
        polygon_axis
    } else {
        edge_axis
    };

    if one_sided {
        // Smooth chain collision: a normal outside the arc permitted by the
        // ghost vertices would snag bodies on interior seams.
        let side1 = primary.normal.dot(edge_dir) <= 0.0;
        if side1 {
            if let Some(v0) = edge.v0 {
                let edge0 = (v1 - v0).normalize();
                let convex = cross(edge0, edge_dir) >= 0.0;
                if convex {
                    let normal0 = Vec2::new(edge0.y, -edge0.x);
                    if cross(primary.normal, normal0) > 0.1 {
                        return manifold;
                    }
                } else {
                    primary = edge_axis;
                }
            }
        } else if let Some(v3) = edge.v3 {
            let edge2 = (v3 - v2).normalize();
            let convex = cross(edge_dir, edge2) >= 0.0;
            if convex {
                let normal2 = Vec2::new(edge2.y, -edge2.x);
                if cross(normal2, primary.normal) > 0.1 {
                    return manifold;
                }
            } else {
                primary = edge_axis;
            }
        }
    }

    // Reference face and incident points, all in the edge frame.
    let (clip_points, ref_v1, ref_v2, ref_normal) = match primary.kind {
        EpAxisKind::EdgeA => {
            manifold.kind = ManifoldKind::FaceA;

            // Incident face: polygon face most anti-parallel to the edge normal.
            let mut best = 0;
            let mut best_dot = f32::INFINITY;
            for i in 0..count_b {
                let dot = primary.normal.dot(norms_b[i]);
                if dot < best_dot {
                    best_dot = dot;
                    best = i;
                }
            }
            let i1 = best;
            let i2 = (best + 1) % count_b;
            let clip = [
                ClipVertex {
                    v: verts_b[i1],
                    feature: ContactFeature::new(
                        0,
                        FeatureKind::Face,
                        i1 as u8,
                        FeatureKind::Vertex,
                    ),
                },
                ClipVertex {
                    v: verts_b[i2],
                    feature: ContactFeature::new(
                        0,
                        FeatureKind::Face,
                        i2 as u8,
                        FeatureKind::Vertex,
                    ),
                },
            ];
            (clip, v1, v2, primary.normal)
        }
        EpAxisKind::EdgeB => {
            manifold.kind = ManifoldKind::FaceB;
            let clip = [
                ClipVertex {
                    v: v2,
                    feature: ContactFeature::new(
                        1,
                        FeatureKind::Vertex,
                        primary.index as u8,
                        FeatureKind::Face,
                    ),
                },
                ClipVertex {
                    v: v1,
                    feature: ContactFeature::new(
                        0,
                        FeatureKind::Vertex,
                        primary.index as u8,
                        FeatureKind::Face,
                    ),
                },
            ];
            let i1 = primary.index;
            let i2 = (i1 + 1) % count_b;
            (clip, verts_b[i1], verts_b[i2], norms_b[i1])
        }
    };

    let tangent = Vec2::new(-ref_normal.y, ref_normal.x);
    let side_offset1 = -tangent.dot(ref_v1) + radius;
    let side_offset2 = tangent.dot(ref_v2) + radius;

    let (clip1, np1) = clip_segment_to_line(&clip_points, -tangent, side_offset1, 0);
    if np1 < 2 {
        return manifold;
    }
    let (clip2, np2) = clip_segment_to_line(&clip1, tangent, side_offset2, 1);
    if np2 < 2 {
        return manifold;
    }

    match manifold.kind {
        ManifoldKind::FaceA => {
            manifold.local_normal = ref_normal;
            manifold.local_point = ref_v1;
            for clip in &clip2 {
                let separation = ref_normal.dot(clip.v - ref_v1);
                if separation <= radius {
                    manifold.push(ManifoldPoint {
                        // Into the polygon's frame.
                        local_point: xf.inv_transform_point(clip.v),
                        feature: clip.feature,
                        ..Default::default()
                    });
                }
            }
        }
        _ => {
            manifold.local_normal = poly.normals()[primary.index];
            manifold.local_point = poly.vertices()[primary.index];
            for clip in &clip2 {
                let separation = ref_normal.dot(clip.v - ref_v1);
                if separation <= radius {
                    manifold.push(ManifoldPoint {
                        // Already in the edge's frame.
                        local_point: clip.v,
                        feature: clip.feature,
                        ..Default::default()
                    });
                }
            }
        }
    }
    manifold
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn xf(x: f32, y: f32) -> Transform {
        Transform::new(Vec2::new(x, y), 0.0)
    }

    #[test]
    fn test_circles_touching() {
        let a = CircleShape::new(1.0);
        let b = CircleShape::new(1.0);
        let m = collide_circles(&a, xf(0.0, 0.0), &b, xf(1.5, 0.0));
        assert_eq!(m.point_count(), 1);
        assert_eq!(m.kind, ManifoldKind::Circles);

        let wm = WorldManifold::new(&m, xf(0.0, 0.0), 1.0, xf(1.5, 0.0), 1.0);
        assert!((wm.normal - Vec2::new(1.0, 0.0)).length() < 1e-6);
        assert!((wm.separations[0] + 0.5).abs() < 1e-5, "0.5 m of overlap");
    }

    #[test]
    fn test_circles_apart() {
        let a = CircleShape::new(1.0);
        let b = CircleShape::new(1.0);
        let m = collide_circles(&a, xf(0.0, 0.0), &b, xf(3.0, 0.0));
        assert_eq!(m.point_count(), 0);
    }

    #[test]
    fn test_polygon_circle_face_contact() {
        let poly = PolygonShape::new_box(1.0, 1.0);
        let circle = CircleShape::new(0.5);
        let m = collide_polygon_circle(&poly, xf(0.0, 0.0), &circle, xf(1.4, 0.0));
        assert_eq!(m.point_count(), 1);
        assert_eq!(m.kind, ManifoldKind::FaceA);

        let wm = WorldManifold::new(&m, xf(0.0, 0.0), POLYGON_RADIUS, xf(1.4, 0.0), 0.5);
        assert!((wm.normal - Vec2::new(1.0, 0.0)).length() < 1e-5);
        assert!(wm.separations[0] < 0.0);
    }

    #[test]
    fn test_polygon_circle_vertex_region_miss() {
        let poly = PolygonShape::new_box(1.0, 1.0);
        let circle = CircleShape::new(0.25);
        // Diagonal placement beyond the corner.
        let m = collide_polygon_circle(&poly, xf(0.0, 0.0), &circle, xf(1.5, 1.5));
        assert_eq!(m.point_count(), 0);
    }

    #[test]
    fn test_boxes_face_contact_two_points() {
        let a = PolygonShape::new_box(1.0, 1.0);
        let b = PolygonShape::new_box(1.0, 1.0);
        let m = collide_polygons(&a, xf(0.0, 0.0), &b, xf(1.99, 0.0));
        assert_eq!(m.point_count(), 2, "Aligned boxes rest on two points");

        let wm = WorldManifold::new(&m, xf(0.0, 0.0), POLYGON_RADIUS, xf(1.99, 0.0), POLYGON_RADIUS);
        assert!((wm.normal.x.abs() - 1.0).abs() < 1e-5);
        assert!(wm.separations[0] < 0.05);
    }

    #[test]
    fn test_boxes_apart() {
        let a = PolygonShape::new_box(1.0, 1.0);
        let b = PolygonShape::new_box(1.0, 1.0);
        let m = collide_polygons(&a, xf(0.0, 0.0), &b, xf(5.0, 0.0));
        assert_eq!(m.point_count(), 0);
    }

    #[test]
    fn test_feature_ids_stable_across_small_motion() {
        let a = PolygonShape::new_box(1.0, 1.0);
        let b = PolygonShape::new_box(1.0, 1.0);
        let m1 = collide_polygons(&a, xf(0.0, 0.0), &b, xf(1.99, 0.0));
        let m2 = collide_polygons(&a, xf(0.0, 0.0), &b, xf(1.985, 0.001));
        assert_eq!(m1.point_count(), 2);
        assert_eq!(m2.point_count(), 2);
        for (p1, p2) in m1.points().iter().zip(m2.points()) {
            assert_eq!(p1.feature, p2.feature, "Feature ids must persist for warm starting");
        }
    }

    #[test]
    fn test_edge_circle_face() {
        let edge = EdgeShape::new(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0));
        let circle = CircleShape::new(0.5);
        let m = collide_edge_circle(&edge, xf(0.0, 0.0), &circle, xf(0.0, 0.4));
        assert_eq!(m.point_count(), 1);
        assert_eq!(m.kind, ManifoldKind::FaceA);

        let wm = WorldManifold::new(&m, xf(0.0, 0.0), POLYGON_RADIUS, xf(0.0, 0.4), 0.5);
        assert!(wm.normal.y < -0.99 || wm.normal.y > 0.99);
    }

    #[test]
    fn test_edge_circle_vertex_region_ghost_discard() {
        let mut edge = EdgeShape::new(Vec2::new(0.0, 0.0), Vec2::new(2.0, 0.0));
        // Ghost vertex making the previous segment own region A.
        edge.v0 = Some(Vec2::new(-2.0, 0.0));
        let circle = CircleShape::new(0.3);
        let m = collide_edge_circle(&edge, xf(0.0, 0.0), &circle, xf(-0.2, 0.1));
        assert_eq!(m.point_count(), 0, "Neighbor segment owns this contact");
    }

    #[test]
    fn test_edge_polygon_resting() {
        let edge = EdgeShape::new(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0));
        let poly = PolygonShape::new_box(0.5, 0.5);
        let m = collide_edge_polygon(&edge, xf(0.0, 0.0), &poly, xf(0.0, 0.49));
        assert_eq!(m.point_count(), 2, "Box resting on an edge has a 2-point manifold");

        let wm = WorldManifold::new(&m, xf(0.0, 0.0), POLYGON_RADIUS, xf(0.0, 0.49), POLYGON_RADIUS);
        assert!(wm.normal.y > 0.99, "Normal should point from edge to box, got {:?}", wm.normal);
    }

    #[test]
    fn test_edge_polygon_behind_one_sided() {
        let mut edge = EdgeShape::new(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0));
        edge.v0 = Some(Vec2::new(-6.0, 0.0));
        edge.v3 = Some(Vec2::new(6.0, 0.0));
        let poly = PolygonShape::new_box(0.5, 0.5);
        // Below the edge: behind the face, no contact for one-sided edges.
        let m = collide_edge_polygon(&edge, xf(0.0, 0.0), &poly, xf(0.0, -0.4));
        assert_eq!(m.point_count(), 0);
    }

    #[test]
    fn test_needs_swap_ordering() {
        let circle = Shape::Circle(CircleShape::new(1.0));
        let poly = Shape::Polygon(PolygonShape::new_box(1.0, 1.0));
        let edge = Shape::Edge(EdgeShape::new(Vec2::ZERO, Vec2::new(1.0, 0.0)));
        assert!(needs_swap(&circle, &poly));
        assert!(!needs_swap(&poly, &circle));
        assert!(needs_swap(&poly, &edge));
        assert!(!needs_swap(&edge, &circle));
    }

    #[test]
    fn test_world_manifold_face_b() {
        // Force a FaceB manifold by colliding so B's face is the reference.
        let a = PolygonShape::new_box(0.1, 1.0);
        let b = PolygonShape::new_box(2.0, 2.0);
        let m = collide_polygons(&a, Transform::new(Vec2::new(-2.05, 0.0), 0.3), &b, xf(0.0, 0.0));
        if m.point_count() > 0 && m.kind == ManifoldKind::FaceB {
            let wm = WorldManifold::new(
                &m,
                Transform::new(Vec2::new(-2.05, 0.0), 0.3),
                POLYGON_RADIUS,
                xf(0.0, 0.0),
                POLYGON_RADIUS,
            );
            // Normal must point from A toward B regardless of flavor.
            assert!(wm.normal.x > 0.0);
        }
    }
}

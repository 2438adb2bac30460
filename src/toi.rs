//! Time of Impact
//!
//! Conservative advancement between two moving convex shapes: find the
//! earliest time in [0, t_max] at which the separation along the most
//! separating feature drops to the conservative target (sum of vertex radii
//! minus a small slop). Uses the GJK distance routine as its sub-procedure
//! and a bisection/secant root finder on the separation function.
//!
//! Large rotations defeat the root finder; callers normalize sweeps first
//! (see [`Sweep::normalize`]).

use crate::distance::{distance, DistanceInput, SimplexCache};
use crate::math::{Sweep, Transform, Vec2};
use crate::shapes::DistanceProxy;

/// Input to [`time_of_impact`].
#[derive(Clone, Copy, Debug)]
pub struct ToiInput<'a> {
    /// Proxy for shape A
    pub proxy_a: &'a DistanceProxy,
    /// Motion of shape A over the step
    pub sweep_a: Sweep,
    /// Proxy for shape B
    pub proxy_b: &'a DistanceProxy,
    /// Motion of shape B over the step
    pub sweep_b: Sweep,
    /// Upper bound of the search interval, in [0, 1]
    pub t_max: f32,
}

/// Iteration bounds and tolerances for the TOI computer.
#[derive(Clone, Copy, Debug)]
pub struct ToiConf {
    /// Collision tolerance defining the target separation.
    pub linear_slop: f32,
    /// Outer conservative-advancement iteration bound.
    pub max_toi_iters: u32,
    /// Root-finder iteration bound per push-back.
    pub max_root_iters: u32,
    /// GJK iteration bound per distance query.
    pub max_distance_iters: u32,
}

impl Default for ToiConf {
    fn default() -> Self {
        Self {
            linear_slop: crate::config::LINEAR_SLOP,
            max_toi_iters: 20,
            max_root_iters: 30,
            max_distance_iters: 20,
        }
    }
}

/// How a TOI computation concluded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToiState {
    /// The computation did not conclude (should not normally escape).
    Unknown,
    /// Iteration bounds were exhausted before convergence.
    Failed,
    /// The shapes already overlap at the start of the interval.
    Overlapped,
    /// The shapes reach the target separation at time `t`.
    Touching,
    /// The shapes stay separated through the whole interval.
    Separated,
}

/// Iteration counters from one TOI computation.
#[derive(Clone, Copy, Debug, Default)]
pub struct ToiStats {
    /// Outer iterations used.
    pub toi_iters: u32,
    /// Largest distance-iteration count of any sub-query.
    pub max_dist_iters: u32,
    /// Largest root-finder iteration count of any push-back.
    pub max_root_iters: u32,
}

/// Output of [`time_of_impact`].
#[derive(Clone, Copy, Debug)]
pub struct ToiOutput {
    /// Conclusion state; only `Touching` carries a usable impact time.
    pub state: ToiState,
    /// The impact (or interval-end) time.
    pub t: f32,
    /// Iteration counters.
    pub stats: ToiStats,
}

// ============================================================================
// Separation function
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SeparationKind {
    Points,
    FaceA,
    FaceB,
}

struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationKind,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: Sweep,
        t1: f32,
    ) -> Self {
        let count = cache.count as usize;
        debug_assert!(count > 0 && count < 3);

        let xf_a = sweep_a.transform_at(beta(&sweep_a, t1));
        let xf_b = sweep_b.transform_at(beta(&sweep_b, t1));

        if count == 1 {
            let local_point_a = proxy_a.vertex(cache.index_a[0] as usize);
            let local_point_b = proxy_b.vertex(cache.index_b[0] as usize);
            let point_a = xf_a.transform_point(local_point_a);
            let point_b = xf_b.transform_point(local_point_b);
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::Points,
                local_point: Vec2::ZERO,
                axis: (point_b - point_a).normalize_or_zero(),
            }
        } else if cache.index_a[0] == cache.index_a[1] {
            // Two support points on B: B's face separates.
            let local_point_b1 = proxy_b.vertex(cache.index_b[0] as usize);
            let local_point_b2 = proxy_b.vertex(cache.index_b[1] as usize);

            let mut axis =
                crate::math::cross_vs(local_point_b2 - local_point_b1, 1.0).normalize_or_zero();
            let normal = xf_b.q.rotate(axis);

            let local_point = 0.5 * (local_point_b1 + local_point_b2);
            let point_b = xf_b.transform_point(local_point);
            let local_point_a = proxy_a.vertex(cache.index_a[0] as usize);
            let point_a = xf_a.transform_point(local_point_a);

            if (point_a - point_b).dot(normal) < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::FaceB,
                local_point,
                axis,
            }
        } else {
            // Two support points on A: A's face separates.
            let local_point_a1 = proxy_a.vertex(cache.index_a[0] as usize);
            let local_point_a2 = proxy_a.vertex(cache.index_a[1] as usize);

            let mut axis =
                crate::math::cross_vs(local_point_a2 - local_point_a1, 1.0).normalize_or_zero();
            let normal = xf_a.q.rotate(axis);

            let local_point = 0.5 * (local_point_a1 + local_point_a2);
            let point_a = xf_a.transform_point(local_point);
            let local_point_b = proxy_b.vertex(cache.index_b[0] as usize);
            let point_b = xf_b.transform_point(local_point_b);

            if (point_b - point_a).dot(normal) < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::FaceA,
                local_point,
                axis,
            }
        }
    }

    /// Deepest-point separation at time `t` and the supporting vertex pair.
    fn find_min_separation(&self, t: f32) -> (f32, usize, usize) {
        let xf_a = self.sweep_a.transform_at(beta(&self.sweep_a, t));
        let xf_b = self.sweep_b.transform_at(beta(&self.sweep_b, t));

        match self.kind {
            SeparationKind::Points => {
                let axis_a = xf_a.q.inv_rotate(self.axis);
                let axis_b = xf_b.q.inv_rotate(-self.axis);

                let index_a = self.proxy_a.support(axis_a);
                let index_b = self.proxy_b.support(axis_b);

                let point_a = xf_a.transform_point(self.proxy_a.vertex(index_a));
                let point_b = xf_b.transform_point(self.proxy_b.vertex(index_b));
                ((point_b - point_a).dot(self.axis), index_a, index_b)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.transform_point(self.local_point);

                let axis_b = xf_b.q.inv_rotate(-normal);
                let index_b = self.proxy_b.support(axis_b);
                let point_b = xf_b.transform_point(self.proxy_b.vertex(index_b));
                ((point_b - point_a).dot(normal), usize::MAX, index_b)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.transform_point(self.local_point);

                let axis_a = xf_a.q.inv_rotate(-normal);
                let index_a = self.proxy_a.support(axis_a);
                let point_a = xf_a.transform_point(self.proxy_a.vertex(index_a));
                ((point_a - point_b).dot(normal), index_a, usize::MAX)
            }
        }
    }

    /// Separation of a fixed vertex pair at time `t`.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f32) -> f32 {
        let xf_a = self.sweep_a.transform_at(beta(&self.sweep_a, t));
        let xf_b = self.sweep_b.transform_at(beta(&self.sweep_b, t));

        match self.kind {
            SeparationKind::Points => {
                let point_a = xf_a.transform_point(self.proxy_a.vertex(index_a));
                let point_b = xf_b.transform_point(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.transform_point(self.local_point);
                let point_b = xf_b.transform_point(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(normal)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.transform_point(self.local_point);
                let point_a = xf_a.transform_point(self.proxy_a.vertex(index_a));
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// Convert an absolute step fraction into the sweep's local interpolation
/// fraction (sweeps may start mid-step after prior TOI advances).
#[inline]
fn beta(sweep: &Sweep, t: f32) -> f32 {
    if sweep.alpha0 < 1.0 {
        (t - sweep.alpha0) / (1.0 - sweep.alpha0)
    } else {
        1.0
    }
}

/// Placement of a sweep at absolute step fraction `t`.
#[inline]
fn transform_at(sweep: &Sweep, t: f32) -> Transform {
    sweep.transform_at(beta(sweep, t))
}

// ============================================================================
// Conservative advancement
// ============================================================================

/// Compute the earliest impact time of two swept proxies.
#[must_use]
pub fn time_of_impact(input: &ToiInput<'_>, conf: &ToiConf) -> ToiOutput {
    let mut stats = ToiStats::default();

    let proxy_a = input.proxy_a;
    let proxy_b = input.proxy_b;
    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = conf.linear_slop.max(total_radius - 3.0 * conf.linear_slop);
    let tolerance = 0.25 * conf.linear_slop;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0_f32;
    let mut cache = SimplexCache::default();

    loop {
        let xf_a = transform_at(&sweep_a, t1);
        let xf_b = transform_at(&sweep_b, t1);

        // Closest points at the current time.
        let dist_out = distance(
            &mut cache,
            &DistanceInput {
                proxy_a,
                proxy_b,
                transform_a: xf_a,
                transform_b: xf_b,
                use_radii: false,
            },
            conf.max_distance_iters,
        );
        stats.max_dist_iters = stats.max_dist_iters.max(dist_out.iterations);

        if dist_out.distance <= 0.0 {
            return ToiOutput {
                state: ToiState::Overlapped,
                t: 0.0,
                stats,
            };
        }

        if dist_out.distance < target + tolerance {
            return ToiOutput {
                state: ToiState::Touching,
                t: t1,
                stats,
            };
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // Resolve the deepest point at t2, pushing t1 forward as features
        // stay separated.
        let mut t2 = t_max;
        let mut push_back_iters = 0;
        loop {
            let (mut s2, index_a, index_b) = fcn.find_min_separation(t2);

            if s2 > target + tolerance {
                return ToiOutput {
                    state: ToiState::Separated,
                    t: t_max,
                    stats,
                };
            }

            if s2 > target - tolerance {
                // Advance the interval start and re-run the distance query.
                t1 = t2;
                break;
            }

            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            if s1 < target - tolerance {
                // The interval start is already deeper than the target; the
                // advancement presumption broke down.
                return ToiOutput {
                    state: ToiState::Failed,
                    t: t1,
                    stats,
                };
            }

            if s1 <= target + tolerance {
                return ToiOutput {
                    state: ToiState::Touching,
                    t: t1,
                    stats,
                };
            }

            // Root find on [t1, t2], alternating secant and bisection steps.
            let mut root_iters = 0;
            let mut a1 = t1;
            let mut a2 = t2;
            loop {
                let t = if root_iters & 1 == 1 {
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    0.5 * (a1 + a2)
                };
                root_iters += 1;

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    t2 = t;
                    break;
                }
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iters == conf.max_root_iters {
                    break;
                }
            }
            stats.max_root_iters = stats.max_root_iters.max(root_iters);

            push_back_iters += 1;
            if push_back_iters as usize == crate::config::MAX_POLYGON_VERTICES {
                break;
            }
        }

        stats.toi_iters += 1;
        if stats.toi_iters == conf.max_toi_iters {
            // Root finder got stuck: report no impact for this contact.
            return ToiOutput {
                state: ToiState::Failed,
                t: t1,
                stats,
            };
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

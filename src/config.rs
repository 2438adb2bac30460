//! Step Configuration
//!
//! Every tunable the stepper recognizes, gathered into one plain-data struct
//! passed to [`crate::world::World::step`]. Defaults follow the values the
//! engine is tuned for at 60 Hz; all lengths are meters, angles radians,
//! times seconds.

/// Maximum number of live bodies.
pub const MAX_BODIES: usize = 0xFFFE;
/// Maximum number of live fixtures.
pub const MAX_FIXTURES: usize = 0xFFFE;
/// Maximum number of live contacts.
pub const MAX_CONTACTS: usize = MAX_FIXTURES * 2;
/// Maximum number of live joints.
pub const MAX_JOINTS: usize = 0xFFFE;

/// Maximum vertex count of a convex polygon shape.
pub const MAX_POLYGON_VERTICES: usize = 8;
/// Maximum contact points in one manifold.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Default linear slop: the collision tolerance the solver leaves between
/// shapes so contacts persist frame to frame.
pub const LINEAR_SLOP: f32 = 0.005;

/// Configuration for one call to `step`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepConf {
    /// Length of this step (seconds). Zero advances bookkeeping only.
    pub dt: f32,
    /// `dt / previous dt`, used to scale warm-start impulses.
    pub dt_ratio: f32,

    /// Velocity iteration bound for the regular solve.
    pub reg_velocity_iterations: u32,
    /// Position iteration bound for the regular solve.
    pub reg_position_iterations: u32,
    /// Early-exit threshold on the max incremental impulse per velocity
    /// iteration of the regular solve.
    pub reg_min_momentum: f32,
    /// Early-exit threshold on the min separation per position iteration of
    /// the regular solve.
    pub reg_min_separation: f32,

    /// Velocity iteration bound for the TOI sub-step solve.
    pub toi_velocity_iterations: u32,
    /// Position iteration bound for the TOI sub-step solve.
    pub toi_position_iterations: u32,
    /// Early-exit threshold on the max incremental impulse per velocity
    /// iteration of the TOI solve.
    pub toi_min_momentum: f32,
    /// Early-exit threshold on the min separation per position iteration of
    /// the TOI solve.
    pub toi_min_separation: f32,

    /// Per-contact cap on TOI sub-steps within one step.
    pub max_sub_steps: u32,
    /// Iteration bound of the GJK distance sub-procedure.
    pub max_distance_iters: u32,
    /// Outer iteration bound of the TOI computer.
    pub max_toi_iters: u32,
    /// Iteration bound of the TOI separation root finder.
    pub max_root_iters: u32,

    /// Collision tolerance between shapes.
    pub linear_slop: f32,
    /// Angular collision tolerance.
    pub angular_slop: f32,
    /// Largest positional correction applied in one position iteration.
    pub max_linear_correction: f32,
    /// Largest angular correction applied in one position iteration.
    pub max_angular_correction: f32,

    /// Normal-speed threshold above which restitution applies.
    pub velocity_threshold: f32,
    /// Per-step cap on how far a body may translate.
    pub max_translation: f32,
    /// Per-step cap on how far a body may rotate.
    pub max_rotation: f32,

    /// Linear speed below which a body counts as still.
    pub linear_sleep_tolerance: f32,
    /// Angular speed below which a body counts as still.
    pub angular_sleep_tolerance: f32,
    /// How long a whole island must stay still before it sleeps.
    pub min_still_time: f32,

    /// Broad-phase AABB fattening margin.
    pub aabb_extension: f32,
    /// Multiplier on per-step displacement used to pre-stretch fat AABBs.
    pub displace_multiplier: f32,

    /// Whether to warm start the contact solver from cached impulses.
    pub do_warm_start: bool,
    /// Whether to run the continuous-collision (TOI) solve.
    pub do_toi: bool,
}

impl StepConf {
    /// Set the step time and the ratio against the previous step time.
    #[must_use]
    pub fn with_dt(mut self, dt: f32, prev_dt: f32) -> Self {
        self.dt = dt;
        self.dt_ratio = if prev_dt != 0.0 { dt / prev_dt } else { 0.0 };
        self
    }

    /// The regular-phase target tolerance used by the position solver.
    #[inline]
    #[must_use]
    pub fn reg_resolution_rate(&self) -> f32 {
        0.2
    }

    /// The TOI-phase target tolerance used by the position solver. Pushing
    /// harder during sub-steps keeps bullets from re-penetrating.
    #[inline]
    #[must_use]
    pub fn toi_resolution_rate(&self) -> f32 {
        0.75
    }
}

impl Default for StepConf {
    fn default() -> Self {
        let pi = core::f32::consts::PI;
        Self {
            dt: 1.0 / 60.0,
            dt_ratio: 1.0,
            reg_velocity_iterations: 8,
            reg_position_iterations: 3,
            reg_min_momentum: 0.0,
            reg_min_separation: -LINEAR_SLOP * 3.0,
            toi_velocity_iterations: 8,
            toi_position_iterations: 20,
            toi_min_momentum: 0.0,
            toi_min_separation: -LINEAR_SLOP * 1.5,
            max_sub_steps: 8,
            max_distance_iters: 20,
            max_toi_iters: 20,
            max_root_iters: 30,
            linear_slop: LINEAR_SLOP,
            angular_slop: 2.0 / 180.0 * pi,
            max_linear_correction: 0.2,
            max_angular_correction: 8.0 / 180.0 * pi,
            velocity_threshold: 1.0,
            max_translation: 2.0,
            max_rotation: 0.5 * pi,
            linear_sleep_tolerance: 0.01,
            angular_sleep_tolerance: 2.0 / 180.0 * pi,
            min_still_time: 0.5,
            aabb_extension: 0.1,
            displace_multiplier: 2.0,
            do_warm_start: true,
            do_toi: true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_sane() {
        let conf = StepConf::default();
        assert!(conf.dt > 0.0);
        assert!(conf.reg_velocity_iterations > 0);
        assert!(conf.reg_min_separation < 0.0, "separation target is a penetration bound");
        assert!(conf.toi_min_separation > conf.reg_min_separation);
        assert!(conf.do_warm_start);
        assert!(conf.do_toi);
    }

    #[test]
    fn test_with_dt() {
        let conf = StepConf::default().with_dt(1.0 / 30.0, 1.0 / 60.0);
        assert!((conf.dt_ratio - 2.0).abs() < 1e-6);

        let first = StepConf::default().with_dt(1.0 / 60.0, 0.0);
        assert_eq!(first.dt_ratio, 0.0, "no previous step means no warm-start scale");
    }
}

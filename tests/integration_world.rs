//! Integration tests for impulse2d
//!
//! End-to-end behaviour of the stepper through the public API only:
//! identifier stability, listener ordering, contact-set consistency,
//! non-penetration, sleeping, continuous collision, and origin shifting.

use std::cell::RefCell;
use std::rc::Rc;

use impulse2d::prelude::*;
use impulse2d::manifold::WorldManifold;

// ============================================================================
// Helpers
// ============================================================================

/// Run a world for `steps` frames with the given configuration.
fn run_world(world: &mut World, steps: usize, conf: &StepConf) {
    for _ in 0..steps {
        world.step(conf);
    }
}

fn add_disk(world: &mut World, at: Vec2, radius: f32, density: f32) -> (BodyId, FixtureId) {
    let body = world.create_body(&BodyDef::dynamic_at(at)).unwrap();
    let fixture = world
        .create_fixture(
            body,
            Shape::Circle(CircleShape::new(radius)),
            &FixtureDef::with_density(density),
        )
        .unwrap();
    (body, fixture)
}

fn add_ground_edge(world: &mut World, from: Vec2, to: Vec2) -> BodyId {
    let body = world.create_body(&BodyDef::static_at(Vec2::ZERO)).unwrap();
    world
        .create_fixture(
            body,
            Shape::Edge(EdgeShape::new(from, to)),
            &FixtureDef::default(),
        )
        .unwrap();
    body
}

/// Worst touching separation over all non-sensor contacts.
fn min_contact_separation(world: &World) -> f32 {
    let mut min_sep = f32::INFINITY;
    for &(_, cid) in world.contact_list() {
        let contact = world.contact(cid).unwrap();
        if !contact.is_touching() || contact.is_sensor() {
            continue;
        }
        let fixture_a = world.fixture(contact.fixture_a()).unwrap();
        let fixture_b = world.fixture(contact.fixture_b()).unwrap();
        let body_a = world.body(contact.body_a()).unwrap();
        let body_b = world.body(contact.body_b()).unwrap();
        let wm = WorldManifold::new(
            contact.manifold(),
            body_a.transform(),
            fixture_a.shape().vertex_radius(contact.child_a() as usize),
            body_b.transform(),
            fixture_b.shape().vertex_radius(contact.child_b() as usize),
        );
        for i in 0..contact.manifold().point_count() {
            min_sep = min_sep.min(wm.separations[i]);
        }
    }
    min_sep
}

// ============================================================================
// Identifier stability
// ============================================================================

#[test]
fn test_identifier_stability() {
    let mut world = World::new(WorldConf::default());

    let a = world.create_body(&BodyDef::dynamic_at(Vec2::new(1.0, 0.0))).unwrap();
    let b = world.create_body(&BodyDef::dynamic_at(Vec2::new(2.0, 0.0))).unwrap();
    let c = world.create_body(&BodyDef::dynamic_at(Vec2::new(3.0, 0.0))).unwrap();

    run_world(&mut world, 3, &StepConf::default());

    // Identifiers keep referring to the same entities.
    assert_eq!(world.body(a).unwrap().position().x.round(), 1.0);
    assert_eq!(world.body(b).unwrap().position().x.round(), 2.0);

    world.destroy_body(b).unwrap();
    assert!(world.body(b).is_none(), "Destroyed id must be invalid");
    assert!(world.body(a).is_some());
    assert!(world.body(c).is_some());

    // The freed slot may be reused only after destruction.
    let d = world.create_body(&BodyDef::dynamic_at(Vec2::new(4.0, 0.0))).unwrap();
    assert_eq!(d, b, "Slot reuse after destroy");
    assert_eq!(world.body(d).unwrap().position().x.round(), 4.0);
}

// ============================================================================
// Listener ordering
// ============================================================================

#[test]
fn test_listener_ordering() {
    let mut world = World::new(WorldConf::with_gravity(Vec2::ZERO));
    let (a, _) = add_disk(&mut world, Vec2::new(-0.4, 0.0), 0.5, 1.0);
    add_disk(&mut world, Vec2::new(0.4, 0.0), 0.5, 1.0);

    let log: Rc<RefCell<Vec<&'static str>>> = Rc::default();

    let l = log.clone();
    world.on_begin_contact(move |_| l.borrow_mut().push("begin"));
    let l = log.clone();
    world.on_end_contact(move |_| l.borrow_mut().push("end"));
    let l = log.clone();
    world.on_pre_solve(move |_, _| l.borrow_mut().push("pre"));
    let l = log.clone();
    world.on_post_solve(move |_, _, _| l.borrow_mut().push("post"));

    world.step(&StepConf::default());

    {
        let events = log.borrow();
        let begin = events.iter().position(|&e| e == "begin").expect("begin fired");
        let pre = events.iter().position(|&e| e == "pre").expect("pre-solve fired");
        let post = events.iter().position(|&e| e == "post").expect("post-solve fired");
        assert!(begin < post, "begin-contact precedes post-solve");
        assert!(begin <= pre, "pre-solve never precedes begin-contact");
        assert!(!events.contains(&"end"));
    }

    // Separate the bodies: exactly one end-contact.
    log.borrow_mut().clear();
    world
        .set_velocity(
            a,
            Velocity {
                linear: Vec2::new(-20.0, 0.0),
                angular: 0.0,
            },
        )
        .unwrap();
    run_world(&mut world, 30, &StepConf::default());
    let ends = log.borrow().iter().filter(|&&e| e == "end").count();
    assert_eq!(ends, 1, "end-contact fires exactly once per transition");
}

#[test]
fn test_pre_solve_not_called_for_sensors() {
    let mut world = World::new(WorldConf::with_gravity(Vec2::ZERO));
    let body = world.create_body(&BodyDef::dynamic_at(Vec2::ZERO)).unwrap();
    world
        .create_fixture(
            body,
            Shape::Circle(CircleShape::new(0.5)),
            &FixtureDef {
                is_sensor: true,
                density: 1.0,
                ..Default::default()
            },
        )
        .unwrap();
    add_disk(&mut world, Vec2::new(0.4, 0.0), 0.5, 1.0);

    let began = Rc::new(RefCell::new(false));
    let pre_solved = Rc::new(RefCell::new(false));
    let b = began.clone();
    world.on_begin_contact(move |_| *b.borrow_mut() = true);
    let p = pre_solved.clone();
    world.on_pre_solve(move |_, _| *p.borrow_mut() = true);

    run_world(&mut world, 2, &StepConf::default());

    assert!(*began.borrow(), "Sensors still report begin-contact");
    assert!(!*pre_solved.borrow(), "Sensors never reach pre-solve");
}

// ============================================================================
// Mass-sum invariant
// ============================================================================

#[test]
fn test_mass_sum_invariant() {
    let mut world = World::new(WorldConf::default());
    let body = world.create_body(&BodyDef::dynamic_at(Vec2::ZERO)).unwrap();
    world
        .create_fixture(
            body,
            Shape::Circle(CircleShape::new(1.0)),
            &FixtureDef::with_density(2.0),
        )
        .unwrap();
    world
        .create_fixture(
            body,
            Shape::Polygon(PolygonShape::new_box_at(0.5, 0.5, Vec2::new(3.0, 0.0), 0.0)),
            &FixtureDef::with_density(1.0),
        )
        .unwrap();

    let expected = 2.0 * core::f32::consts::PI + 1.0;
    let b = world.body(body).unwrap();
    assert!(
        ((1.0 / b.inv_mass()) - expected).abs() < 1e-3,
        "Inverse mass must equal 1/Σ(density·area), mass = {}",
        1.0 / b.inv_mass()
    );

    // Static bodies always have zero inverse mass.
    let ground = world.create_body(&BodyDef::static_at(Vec2::ZERO)).unwrap();
    world
        .create_fixture(
            ground,
            Shape::Circle(CircleShape::new(1.0)),
            &FixtureDef::with_density(5.0),
        )
        .unwrap();
    assert_eq!(world.body(ground).unwrap().inv_mass(), 0.0);
}

// ============================================================================
// Proxy-AABB containment
// ============================================================================

#[test]
fn test_proxy_aabb_contains_shape_aabb() {
    let mut world = World::new(WorldConf::with_gravity(Vec2::new(0.0, -10.0)));
    add_ground_edge(&mut world, Vec2::new(-20.0, 0.0), Vec2::new(20.0, 0.0));
    let mut fixtures = Vec::new();
    for i in 0..5 {
        let (_, f) = add_disk(&mut world, Vec2::new(i as f32, 3.0 + i as f32), 0.4, 1.0);
        fixtures.push(f);
    }

    let conf = StepConf::default();
    for _ in 0..30 {
        world.step(&conf);
        for &fid in &fixtures {
            let fixture = world.fixture(fid).unwrap();
            let body = world.body(fixture.body()).unwrap();
            for child in 0..fixture.shape().child_count() {
                let tight = fixture.shape().compute_aabb(body.transform(), child);
                let fat = world.fixture_aabb(fid, child).expect("proxy exists");
                assert!(
                    fat.contains(&tight),
                    "Fat AABB must contain the shape AABB between steps"
                );
            }
        }
    }
}

// ============================================================================
// Contact-set consistency
// ============================================================================

#[test]
fn test_contact_set_consistency() {
    let mut world = World::new(WorldConf::with_gravity(Vec2::ZERO));
    let (a, _) = add_disk(&mut world, Vec2::new(0.0, 0.0), 0.5, 1.0);
    add_disk(&mut world, Vec2::new(0.8, 0.0), 0.5, 1.0);
    add_disk(&mut world, Vec2::new(10.0, 0.0), 0.5, 1.0);

    world.step(&StepConf::default());
    assert_eq!(
        world.contact_list().len(),
        1,
        "Exactly one contact for the one overlapping pair"
    );

    // Move the pair apart: the contact must be destroyed.
    world.set_transform(a, Vec2::new(-30.0, 0.0), 0.0).unwrap();
    run_world(&mut world, 2, &StepConf::default());
    assert_eq!(world.contact_list().len(), 0, "No overlap, no contact");
}

// ============================================================================
// Two-disk rest (non-penetration bound)
// ============================================================================

#[test]
fn test_two_disk_rest() {
    let mut world = World::new(WorldConf::with_gravity(Vec2::ZERO));
    let (a, fa) = add_disk(&mut world, Vec2::new(-0.5, 0.0), 1.0, 1.0);
    let (b, _) = add_disk(&mut world, Vec2::new(0.5, 0.0), 1.0, 1.0);
    world.set_friction(fa, 0.0).unwrap();

    let conf = StepConf::default();
    world.step(&conf);

    // The velocity solve kills the approach velocity immediately.
    let va = world.body(a).unwrap().velocity().linear;
    let vb = world.body(b).unwrap().velocity().linear;
    let normal = (world.body(b).unwrap().position() - world.body(a).unwrap().position())
        .normalize_or_zero();
    assert!(
        ((vb - va).dot(normal)).abs() < 1e-3,
        "Relative normal velocity should be ~0 after one step"
    );

    // The position solver walks the deep overlap out over the next steps
    // (corrections are capped per iteration) and settles at the slop.
    run_world(&mut world, 120, &conf);
    let min_sep = min_contact_separation(&world);
    assert!(
        min_sep >= -conf.linear_slop - 1e-3,
        "Touching separation must respect the slop bound, got {min_sep}"
    );
    assert!(min_sep <= 0.0 + 1e-3, "Disks should still touch, got {min_sep}");
}

// ============================================================================
// Warm-start idempotence
// ============================================================================

#[test]
fn test_zero_dt_steps_are_noops() {
    let mut world = World::new(WorldConf::with_gravity(Vec2::new(0.0, -10.0)));
    add_ground_edge(&mut world, Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0));
    let (body, _) = add_disk(&mut world, Vec2::new(0.0, 2.0), 0.5, 1.0);

    run_world(&mut world, 30, &StepConf::default());

    let pos = world.body(body).unwrap().position();
    let vel = world.body(body).unwrap().velocity();

    let zero = StepConf::default().with_dt(0.0, 0.0);
    world.step(&zero);
    world.step(&zero);

    assert_eq!(world.body(body).unwrap().position(), pos);
    assert_eq!(world.body(body).unwrap().velocity(), vel);
}

// ============================================================================
// Bullet through plank
// ============================================================================

fn bullet_world() -> (World, BodyId) {
    let mut world = World::new(WorldConf::with_gravity(Vec2::new(0.0, -10.0)));
    add_ground_edge(&mut world, Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0));

    // Thin dynamic plank.
    let plank = world.create_body(&BodyDef::dynamic_at(Vec2::new(0.0, 4.0))).unwrap();
    world
        .create_fixture(
            plank,
            Shape::Polygon(PolygonShape::new_box(1.0, 0.05)),
            &FixtureDef::with_density(1.0),
        )
        .unwrap();

    // Fast bullet-flagged box.
    let bullet = world
        .create_body(&BodyDef {
            body_type: BodyType::Dynamic,
            position: Vec2::new(0.20352793, 10.0),
            linear_velocity: Vec2::new(0.0, -50.0),
            bullet: true,
            ..Default::default()
        })
        .unwrap();
    world
        .create_fixture(
            bullet,
            Shape::Polygon(PolygonShape::new_box(0.125, 0.125)),
            &FixtureDef::with_density(1.0),
        )
        .unwrap();
    (world, bullet)
}

#[test]
fn test_bullet_does_not_tunnel_with_toi() {
    let (mut world, bullet) = bullet_world();
    let conf = StepConf::default(); // do_toi on

    for _ in 0..180 {
        world.step(&conf);
        let y = world.body(bullet).unwrap().position().y;
        assert!(y >= 0.0, "Bullet tunneled below the ground edge: y = {y}");
    }
}

#[test]
fn test_bullet_may_tunnel_without_toi() {
    let (mut world, bullet) = bullet_world();
    let conf = StepConf {
        do_toi: false,
        ..Default::default()
    };

    // Without the TOI solve the step is purely discrete; the bullet crosses
    // several body-widths per step and tunneling is permitted. All that is
    // guaranteed is that the run completes and the bullet fell.
    run_world(&mut world, 180, &conf);
    assert!(world.body(bullet).unwrap().position().y < 10.0);
}

// ============================================================================
// Prismatic limits
// ============================================================================

#[test]
fn test_prismatic_limits() {
    let mut world = World::new(WorldConf::with_gravity(Vec2::ZERO));
    let (a, _) = add_disk(&mut world, Vec2::new(-1.0, 0.0), 0.1, 1.0);
    let (b, _) = add_disk(&mut world, Vec2::new(1.0, 0.0), 0.1, 1.0);

    // Anchors chosen so the initial translation along +x is zero.
    let mut def = PrismaticJointDef::new(a, b, Vec2::new(1.0, 0.0));
    def.local_anchor_a = Vec2::new(2.0, 0.0);
    def.local_anchor_b = Vec2::ZERO;
    def.enable_limit = true;
    def.lower_translation = 0.0;
    def.upper_translation = 0.0;
    let joint = world.create_joint(&JointDef::Prismatic(def)).unwrap();

    // One big 1-second step: the locked limits must hold the translation.
    let conf = StepConf::default().with_dt(1.0, 1.0 / 60.0);
    world.step(&conf);

    let d = world.body(b).unwrap().position() - world.body(a).unwrap().position();
    assert!(
        (d.x - 2.0).abs() <= 1e-3,
        "Equal limits pin the separation along the axis, got {}",
        d.x
    );

    // Widen the limits upward: translation 0 sits at the lower limit.
    let mut widened = def;
    widened.lower_translation = 0.0;
    widened.upper_translation = 2.0;
    world.set_joint(joint, &JointDef::Prismatic(widened)).unwrap();
    world.step(&StepConf::default());
    assert_eq!(
        world.joint(joint).unwrap().limit_state(),
        Some(LimitState::AtLower)
    );

    // And downward: translation 0 sits at the upper limit.
    let mut lowered = def;
    lowered.lower_translation = -2.0;
    lowered.upper_translation = 0.0;
    world.set_joint(joint, &JointDef::Prismatic(lowered)).unwrap();
    world.step(&StepConf::default());
    assert_eq!(
        world.joint(joint).unwrap().limit_state(),
        Some(LimitState::AtUpper)
    );
}

// ============================================================================
// Rope-joint upper limit
// ============================================================================

#[test]
fn test_rope_joint_upper_limit() {
    let mut world = World::new(WorldConf::with_gravity(Vec2::ZERO));
    let (a, _) = add_disk(&mut world, Vec2::ZERO, 0.1, 1.0);
    let (b, _) = add_disk(&mut world, Vec2::new(3.0, 0.0), 0.1, 1.0);

    let joint = world
        .create_joint(&JointDef::Rope(RopeJointDef {
            body_a: a,
            body_b: b,
            collide_connected: false,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            max_length: 2.0,
        }))
        .unwrap();

    let conf = StepConf::default();
    // Per-iteration position corrections are capped; give the joint a few
    // steps to reel the slack in.
    run_world(&mut world, 20, &conf);

    let delta = world.body(b).unwrap().position() - world.body(a).unwrap().position();
    assert!(
        delta.length() <= 2.0 + conf.linear_slop + 1e-3,
        "Rope length bound violated: {}",
        delta.length()
    );

    // A rope only ever pulls: the reaction along the rope direction is
    // non-positive.
    let (force, _) = world.joint_reaction(joint, 60.0).unwrap();
    let along = force.dot(delta.normalize_or_zero());
    assert!(along <= 1e-4, "Rope reaction should never push, got {along}");
}

// ============================================================================
// Sleeping island
// ============================================================================

#[test]
fn test_sleeping_island() {
    let mut world = World::new(WorldConf::with_gravity(Vec2::new(0.0, -10.0)));
    add_ground_edge(&mut world, Vec2::new(-10.0, 0.0), Vec2::new(120.0, 0.0));

    let mut disks = Vec::new();
    for i in 0..100 {
        let (body, _) = add_disk(&mut world, Vec2::new(i as f32 * 1.1, 0.5), 0.5, 1.0);
        disks.push(body);
    }

    let conf = StepConf::default(); // min_still_time 0.5 s, tolerance 0.01 m/s
    run_world(&mut world, 120, &conf); // 2 simulated seconds

    for &body in &disks {
        assert!(
            !world.body(body).unwrap().is_awake(),
            "All resting disks should be asleep within 2 s"
        );
    }

    // Drop a disk onto the first one: only the contacted island wakes.
    let (intruder, _) = add_disk(&mut world, Vec2::new(0.0, 3.0), 0.5, 1.0);
    let mut woke_target = false;
    for _ in 0..90 {
        world.step(&conf);
        woke_target |= world.body(disks[0]).unwrap().is_awake();
    }
    assert!(woke_target, "The struck disk must wake");
    assert!(
        !world.body(disks[50]).unwrap().is_awake(),
        "Distant islands must stay asleep"
    );
    assert!(world.body(intruder).is_some());
}

// ============================================================================
// Origin shift
// ============================================================================

#[test]
fn test_origin_shift() {
    let far = Vec2::new(1_000_000.0, 0.0);

    // Reference world living near the origin. The fixture is centered so the
    // far position stays exactly representable in f32.
    let mut reference = World::new(WorldConf::with_gravity(Vec2::new(0.0, -10.0)));
    let ref_body = reference.create_body(&BodyDef::dynamic_at(Vec2::ZERO)).unwrap();
    reference
        .create_fixture(
            ref_body,
            Shape::Circle(CircleShape::new(0.5)),
            &FixtureDef::with_density(1.0),
        )
        .unwrap();

    // Same setup a million meters out, then shifted back.
    let mut world = World::new(WorldConf::with_gravity(Vec2::new(0.0, -10.0)));
    let body = world.create_body(&BodyDef::dynamic_at(far)).unwrap();
    world
        .create_fixture(
            body,
            Shape::Circle(CircleShape::new(0.5)),
            &FixtureDef::with_density(1.0),
        )
        .unwrap();

    let local_center_before = world.body(body).unwrap().local_center();
    world.shift_origin(far).unwrap();

    assert!(
        world.body(body).unwrap().position().length() < 1e-3,
        "World position should be back at the origin"
    );
    assert_eq!(
        world.body(body).unwrap().local_center(),
        local_center_before,
        "Local data is unchanged by an origin shift"
    );

    // Subsequent stepping matches the reference world.
    let conf = StepConf::default();
    run_world(&mut world, 60, &conf);
    run_world(&mut reference, 60, &conf);
    let delta = world.body(body).unwrap().position()
        - reference.body(ref_body).unwrap().position();
    assert!(
        delta.length() < 1e-4,
        "Shifted world must evolve like the reference, delta = {delta:?}"
    );
}

// ============================================================================
// Step statistics
// ============================================================================

#[test]
fn test_step_statistics_reflect_activity() {
    let mut world = World::new(WorldConf::with_gravity(Vec2::new(0.0, -10.0)));
    add_ground_edge(&mut world, Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0));
    add_disk(&mut world, Vec2::new(0.0, 0.6), 0.5, 1.0);

    let stats = world.step(&StepConf::default());
    assert!(stats.pre.contacts_added > 0, "First step discovers the contact");
    assert!(stats.reg.islands_found > 0);
    assert!(stats.reg.sum_velocity_iterations > 0);

    // Once everything sleeps, islands stop being found.
    run_world(&mut world, 120, &StepConf::default());
    let idle = world.step(&StepConf::default());
    assert_eq!(idle.reg.islands_found, 0, "Sleeping world finds no islands");
}

//! Benchmarks for impulse2d
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use impulse2d::prelude::*;

// ============================================================================
// World step benchmarks
// ============================================================================

fn falling_disks_world(count: usize) -> World {
    let mut world = World::new(WorldConf::with_gravity(Vec2::new(0.0, -10.0)));

    let ground = world.create_body(&BodyDef::static_at(Vec2::ZERO)).unwrap();
    world
        .create_fixture(
            ground,
            Shape::Edge(EdgeShape::new(Vec2::new(-200.0, 0.0), Vec2::new(200.0, 0.0))),
            &FixtureDef::default(),
        )
        .unwrap();

    for i in 0..count {
        let x = (i % 20) as f32 * 1.1 - 10.0;
        let y = 1.0 + (i / 20) as f32 * 1.1;
        let body = world
            .create_body(&BodyDef::dynamic_at(Vec2::new(x, y)))
            .unwrap();
        world
            .create_fixture(
                body,
                Shape::Circle(CircleShape::new(0.5)),
                &FixtureDef::with_density(1.0),
            )
            .unwrap();
    }
    world
}

fn bench_world_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");

    group.bench_function("single_disk_60_steps", |b| {
        b.iter(|| {
            let mut world = falling_disks_world(1);
            let conf = StepConf::default();
            for _ in 0..60 {
                world.step(black_box(&conf));
            }
            world.body_ids().len()
        });
    });

    group.bench_function("hundred_disks_60_steps", |b| {
        b.iter(|| {
            let mut world = falling_disks_world(100);
            let conf = StepConf::default();
            for _ in 0..60 {
                world.step(black_box(&conf));
            }
            world.body_ids().len()
        });
    });

    group.bench_function("settled_stack_step", |b| {
        // Pre-settle so the bench measures the sleeping fast path.
        let mut world = falling_disks_world(100);
        let conf = StepConf::default();
        for _ in 0..300 {
            world.step(&conf);
        }
        b.iter(|| world.step(black_box(&conf)));
    });

    group.finish();
}

// ============================================================================
// Broadphase benchmarks
// ============================================================================

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");

    let mut world = falling_disks_world(200);
    let conf = StepConf::default();
    for _ in 0..30 {
        world.step(&conf);
    }

    group.bench_function("ray_cast_closest", |b| {
        b.iter(|| {
            impulse2d::ray_cast_closest(
                black_box(&world),
                Vec2::new(-50.0, 0.5),
                Vec2::new(50.0, 0.5),
            )
        });
    });

    group.bench_function("overlap_aabb", |b| {
        b.iter(|| {
            impulse2d::overlap_aabb(
                black_box(&world),
                &Aabb::new(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 5.0)),
            )
        });
    });

    group.finish();
}

criterion_group!(benches, bench_world_step, bench_queries);
criterion_main!(benches);

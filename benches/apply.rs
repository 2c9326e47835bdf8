use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use sim_ecs::prelude::*;
use sim_ecs::SimdProbe;

mod common;
use common::*;

fn scalar_movement_world() -> Movement {
    let mut world = World::with_probe(SimdProbe::disabled());
    let position = world.define_uniform("Position", "f32", &["x", "y"]).unwrap();
    let velocity = world.define_uniform("Velocity", "f32", &["vx", "vy"]).unwrap();
    let frozen = world.define_tag("Frozen");
    let x = world.field_ref(position, "x").unwrap();
    let vx = world.field_ref(velocity, "vx").unwrap();
    Movement { world, position, velocity, frozen, x, vx }
}

fn apply_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");
    group.sample_size(20);

    let mut movement = movement_world();
    populate(&mut movement, AGENTS_MED);
    let Movement { mut world, x, vx, .. } = movement;
    let integrate = Expr::add(Expr::field(x), Expr::field(vx));

    group.bench_function("integrate_100k", |b| {
        b.iter(|| {
            world.apply(x, &integrate, &ApplyFilter::default()).unwrap();
            black_box(())
        });
    });

    group.bench_function("random_fill_100k", |b| {
        let jitter = Expr::random(-1.0, 1.0);
        b.iter(|| {
            world.apply(x, &jitter, &ApplyFilter::default()).unwrap();
            black_box(())
        });
    });

    // Scalar fallback for comparison against the lane path.
    group.bench_function("integrate_100k_scalar", |b| {
        let mut movement = scalar_movement_world();
        populate(&mut movement, AGENTS_MED);
        let integrate = Expr::add(Expr::field(movement.x), Expr::field(movement.vx));
        b.iter(|| {
            movement.world.apply(movement.x, &integrate, &ApplyFilter::default()).unwrap();
            black_box(())
        });
    });

    group.finish();
}

criterion_group!(benches, apply_benchmark);
criterion_main!(benches);

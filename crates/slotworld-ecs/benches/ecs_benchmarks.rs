//! ECS throughput benchmarks: add/commit churn, mask queries over a full
//! table, and encode/decode of a populated world.
//!
//! Run with: `cargo bench --bench ecs_benchmarks`

use bytemuck_derive::{Pod, Zeroable};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use slotworld_ecs::prelude::*;

// ---------------------------------------------------------------------------
// Benchmark component types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct Health(u32);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Ids {
    position: ComponentTypeId,
    velocity: ComponentTypeId,
    health: ComponentTypeId,
}

fn setup_world() -> (World, Ids) {
    let mut world = World::new();
    let ids = Ids {
        position: world.register::<Position>("position", true).unwrap(),
        velocity: world.register::<Velocity>("velocity", true).unwrap(),
        health: world.register::<Health>("health", false).unwrap(),
    };
    (world, ids)
}

/// Fill `count` slots; every other entity also moves.
fn populated(count: usize) -> (World, Ids) {
    let (mut world, ids) = setup_world();
    for i in 0..count {
        let mut mask = ComponentMask::from(ids.position) | ids.health;
        if i % 2 == 0 {
            mask |= ids.velocity;
        }
        let e = world.add(mask).unwrap();
        if i % 2 == 0 {
            *world.get_mut::<Velocity>(e, ids.velocity, true).unwrap() = Velocity { dx: 1.0, dy: 0.5 };
        }
    }
    world.update();
    (world, ids)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_add_commit_remove(c: &mut Criterion) {
    let (mut world, ids) = setup_world();
    let mask = ComponentMask::from(ids.position) | ids.velocity;
    let mut entities = Vec::with_capacity(MAX_ENTITIES);

    c.bench_function("add_commit_remove_full_table", |b| {
        b.iter(|| {
            entities.clear();
            for _ in 0..MAX_ENTITIES {
                entities.push(world.add(mask).unwrap());
            }
            black_box(world.update());
            for &e in &entities {
                world.remove(e, false).unwrap();
            }
            black_box(world.update());
        });
    });
}

fn bench_movement_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_query");

    for &count in &[64usize, 256, MAX_ENTITIES] {
        let (mut world, ids) = populated(count);
        let mask = ComponentMask::from(ids.position) | ids.velocity;

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &_count| {
            b.iter(|| {
                let mut cursor = world.query(mask);
                while cursor.is_valid() {
                    let v = *cursor.get::<Velocity>(&world, ids.velocity).unwrap();
                    let p = cursor.get_mut::<Position>(&mut world, ids.position).unwrap();
                    p.x += v.dx;
                    p.y += v.dy;
                    cursor.advance(&world);
                }
            });
        });
    }

    group.finish();
}

fn bench_query_iter_count(c: &mut Criterion) {
    let (world, ids) = populated(MAX_ENTITIES);
    let mask = ComponentMask::from(ids.position) | ids.velocity;

    c.bench_function("query_iter_count_full_table", |b| {
        b.iter(|| black_box(world.query_iter(black_box(mask)).count()));
    });
}

fn bench_encode_decode(c: &mut Criterion) {
    let (world, _) = populated(MAX_ENTITIES);
    let bytes = world.encode();
    let (mut target, _) = setup_world();

    c.bench_function("encode_full_table", |b| {
        b.iter(|| black_box(world.encode()));
    });
    c.bench_function("decode_full_table", |b| {
        b.iter(|| target.decode_into(black_box(&bytes)).unwrap());
    });
}

// ---------------------------------------------------------------------------
// Criterion groups and main
// ---------------------------------------------------------------------------

criterion_group!(
    benches,
    bench_add_commit_remove,
    bench_movement_query,
    bench_query_iter_count,
    bench_encode_decode,
);
criterion_main!(benches);

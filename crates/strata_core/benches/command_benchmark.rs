//! # Command & Step Benchmark
//!
//! Cost of deferred structural changes and of a full scheduler step.
//!
//! Run with: `cargo bench --package strata_core --bench command_benchmark`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use serde::{Deserialize, Serialize};
use strata_core::{Component, Context, World};

#[derive(Clone, Copy, Default, Serialize, Deserialize)]
struct Position {
    x: f32,
    y: f32,
}

impl Component for Position {
    const UUID: &'static str = "bench.position";
}

#[derive(Clone, Copy, Default, Serialize, Deserialize)]
struct Lifetime(usize);

impl Component for Lifetime {
    const UUID: &'static str = "bench.lifetime";
}

/// Benchmark: queue and flush N spawn commands.
fn bench_spawn_commands(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_commands");
    for count in [1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter_batched(
                World::new,
                |mut world| {
                    world.run_once(|ctx| {
                        for i in 0..count {
                            ctx.spawn((Position::default(), Lifetime(i)));
                        }
                    });
                    black_box(world.entity_count())
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// Benchmark: out-of-order inserts forcing shift-inserts into a store.
fn bench_shift_insert(c: &mut Criterion) {
    c.bench_function("shift_insert_reverse_10K", |b| {
        b.iter_batched(
            || {
                let mut world = World::new();
                let entities: Vec<_> = (0..10_000).map(|_| world.spawn()).collect();
                (world, entities)
            },
            |(mut world, entities)| {
                for &entity in entities.iter().rev() {
                    world.insert(entity, Position::default());
                }
                black_box(world.entity_count())
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: one step of a spawn/expire churn simulation.
fn bench_churn_step(c: &mut Criterion) {
    let mut world = World::new();
    world.run_once(|ctx| {
        for i in 0..10_000 {
            ctx.spawn((Position::default(), Lifetime(i % 60)));
        }
    });
    world.add_system_fn("age", 0, |ctx: &mut Context<'_>| {
        let mut expired = Vec::new();
        ctx.query::<(Lifetime,)>().for_each(|entity, life| {
            if life.0 == 0 {
                expired.push(entity);
            } else {
                life.0 -= 1;
            }
        });
        for entity in expired {
            ctx.remove_entity(entity);
            ctx.spawn((Position::default(), Lifetime(60)));
        }
    });
    world.add_system_fn("move", 1, |ctx: &mut Context<'_>| {
        ctx.query::<(Position,)>().for_each(|_, pos| {
            pos.x += 1.0;
            pos.y += 0.5;
        });
    });

    c.bench_function("churn_step_10K", |b| {
        b.iter(|| {
            world.step();
            if world.step_count() % 120 == 0 {
                world.gc();
            }
            black_box(world.entity_count())
        });
    });
}

criterion_group!(benches, bench_spawn_commands, bench_shift_insert, bench_churn_step);
criterion_main!(benches);

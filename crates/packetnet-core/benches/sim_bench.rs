//! Criterion benchmarks for the packetnet simulation.
//!
//! Three benchmark groups:
//! - `tick`: one tick of a 200-lane mesh kept busy by long schedules
//! - `predict`: fast-forward previews of a 50-lane mesh
//! - `level_io`: bitcode save/load of a 200-lane level

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use packetnet_core::config::SimConfig;
use packetnet_core::predict::Predictor;
use packetnet_core::serialize::{load_level, save_level};
use packetnet_core::test_utils::*;
use packetnet_core::world::World;

// ===========================================================================
// Builders
// ===========================================================================

/// A mesh that never runs dry during a benchmark, warmed up until every
/// lane has packets in flight.
fn busy_world(lanes: usize) -> World {
    let topology = mesh(lanes, 1_000_000);
    let mut world = World::new(topology, SimConfig::default());
    run_world(&mut world, 300);
    world
}

// ===========================================================================
// Benchmarks
// ===========================================================================

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    group.sample_size(50);

    let mut world = busy_world(200);

    group.bench_function("200_lanes", |b| {
        b.iter(|| {
            world.step();
        });
    });

    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict");
    group.sample_size(20);

    let topology = mesh(50, 20);
    let predictor = Predictor::new(&topology, &SimConfig::default());

    group.bench_function("50_lanes_10s", |b| {
        b.iter(|| predictor.predict(10_000));
    });

    group.bench_function("50_lanes_to_completion", |b| {
        b.iter(|| predictor.run(u64::MAX / 2));
    });

    group.finish();
}

fn bench_level_io(c: &mut Criterion) {
    let mut group = c.benchmark_group("level_io");
    group.sample_size(30);

    let topology = mesh(200, 10);
    let config = SimConfig::default();

    group.bench_function("save_200_lanes", |b| {
        b.iter(|| save_level(&topology, &config).unwrap());
    });

    let data = save_level(&topology, &config).unwrap();
    group.bench_function("load_200_lanes", |b| {
        b.iter_batched(
            || data.clone(),
            |bytes| load_level(&bytes).unwrap(),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_tick, bench_predict, bench_level_io);
criterion_main!(benches);

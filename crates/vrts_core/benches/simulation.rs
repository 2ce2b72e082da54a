//! Simulation benchmarks for vrts_core.
//!
//! Run with: `cargo bench -p vrts_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use vrts_test_utils::fixtures::line_battle;

/// Cost of one tick mid-battle at increasing army sizes.
pub fn tick_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    for per_side in [5u32, 20, 50] {
        let mut sim = line_battle("jackal", "hornet", per_side, 3).expect("builtin defs");
        // Let both lines close and open fire so the bench covers combat,
        // projectiles and spatial rebuilds rather than an empty march.
        for _ in 0..200 {
            sim.tick(16.0).expect("tick");
        }
        group.bench_function(format!("{per_side}v{per_side}"), |b| {
            b.iter(|| {
                sim.tick(black_box(16.0)).expect("tick");
            });
        });
    }
    group.finish();
}

/// Snapshot cost for save/replay paths.
pub fn snapshot_benchmark(c: &mut Criterion) {
    let mut sim = line_battle("jackal", "hornet", 20, 3).expect("builtin defs");
    for _ in 0..200 {
        sim.tick(16.0).expect("tick");
    }
    c.bench_function("serialize_20v20", |b| {
        b.iter(|| black_box(sim.serialize().expect("serialize")));
    });
    c.bench_function("state_hash_20v20", |b| {
        b.iter(|| black_box(sim.state_hash()));
    });
}

criterion_group!(benches, tick_benchmark, snapshot_benchmark);
criterion_main!(benches);

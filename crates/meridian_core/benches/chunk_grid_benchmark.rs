//! # Chunk Grid Benchmark
//!
//! Every tick, each observer walks its view grid and each entity maps its
//! bounding box to chunks. Both must stay cheap at the largest render
//! distance.
//!
//! Run with: `cargo bench --package meridian_core --bench chunk_grid_benchmark`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meridian_core::{BoundingBox, ChunkGrid, ChunkLocation, Vec3};

/// Benchmark: iterate every location of a view grid.
fn bench_locations(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_locations");

    for radius in [0u32, 4, 8, 16, 32] {
        let grid = ChunkGrid::around(ChunkLocation::new(-3, 7), radius);
        group.bench_with_input(BenchmarkId::from_parameter(radius), &grid, |b, grid| {
            b.iter(|| {
                let mut sum = 0i64;
                for location in grid {
                    sum += i64::from(location.x) + i64::from(location.z);
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

/// Benchmark: position to chunk, including negative coordinates.
fn bench_from_position(c: &mut Criterion) {
    let positions: Vec<_> = (0..10_000)
        .map(|i| {
            let f = f64::from(i);
            Vec3::new(f * 0.37 - 1_800.0, 64.0, 1_800.0 - f * 0.41)
        })
        .collect();

    c.bench_function("from_position_10k", |b| {
        b.iter(|| {
            for &p in &positions {
                black_box(ChunkLocation::from_position(p));
            }
        });
    });
}

/// Benchmark: bounding box coverage plus containment test.
fn bench_covering(c: &mut Criterion) {
    let view = ChunkGrid::around(ChunkLocation::new(0, 0), 8);
    let boxes: Vec<_> = (0..10_000)
        .map(|i| {
            let f = f64::from(i);
            BoundingBox::standing_at(Vec3::new(f * 0.05 - 250.0, 64.0, f * 0.03), 0.6, 1.8)
        })
        .collect();

    c.bench_function("covering_then_contains_10k", |b| {
        b.iter(|| {
            let mut visible = 0usize;
            for bounds in &boxes {
                let grid = ChunkGrid::covering(bounds);
                if grid.locations().any(|location| view.contains(location)) {
                    visible += 1;
                }
            }
            black_box(visible)
        });
    });
}

criterion_group!(benches, bench_locations, bench_from_position, bench_covering);
criterion_main!(benches);

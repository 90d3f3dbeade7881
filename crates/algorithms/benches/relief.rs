//! Benchmarks for the relief scoring chain

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use moundscan_algorithms::scoring::{ReliefScoringParams, score_relief};
use moundscan_algorithms::terrain::{RadiusSet, relief_stack};
use moundscan_core::{GeoTransform, Raster};

fn create_dem(size: usize) -> Raster<f64> {
    let mut dem = Raster::new(size, size);
    dem.set_transform(GeoTransform::north_up(0.0, size as f64 * 2.0, 2.0));

    // Gentle slope with a mound every 64 cells
    for row in 0..size {
        for col in 0..size {
            let base = (row + col) as f64 * 0.01;
            let (dr, dc) = ((row % 64) as f64 - 32.0, (col % 64) as f64 - 32.0);
            let d = dr.hypot(dc) * 2.0;
            let mound = if d < 20.0 { 2.0 * (1.0 - d / 20.0) } else { 0.0 };
            dem.set(row, col, base + mound).unwrap();
        }
    }
    dem
}

fn bench_relief_stack(c: &mut Criterion) {
    let mut group = c.benchmark_group("relief_stack");
    let radii = RadiusSet::default();

    for size in [256, 512, 1024].iter() {
        let dem = create_dem(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| relief_stack(black_box(&dem), &radii).unwrap())
        });
    }

    group.finish();
}

fn bench_score_relief(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_relief");
    let params = ReliefScoringParams::default();

    for size in [256, 512].iter() {
        let dem = create_dem(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| score_relief(black_box(&dem), &params).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_relief_stack, bench_score_relief);
criterion_main!(benches);

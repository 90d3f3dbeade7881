//! Benchmarks for mask vectorization

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use moundscan_algorithms::vector::{VectorizeParams, vectorize};
use moundscan_core::{CancelToken, GeoTransform, Raster};

/// Scattered blobs of varying size, some touching diagonally
fn create_mask(size: usize) -> Raster<u8> {
    let mut mask = Raster::new(size, size);
    mask.set_transform(GeoTransform::north_up(0.0, size as f64 * 10.0, 10.0));
    for row in 0..size {
        for col in 0..size {
            let v = ((row / 3) * 7 + (col / 3) * 13) % 5 == 0 || (row * 31 + col * 17) % 23 == 0;
            mask.set(row, col, u8::from(v)).unwrap();
        }
    }
    mask
}

fn bench_vectorize(c: &mut Criterion) {
    let mut group = c.benchmark_group("vectorize");
    let params = VectorizeParams::default();
    let cancel = CancelToken::new();

    for size in [128, 256, 512].iter() {
        let mask = create_mask(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| vectorize(black_box(&mask), &params, &cancel).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_vectorize);
criterion_main!(benches);

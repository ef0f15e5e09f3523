use cartogrid_spectral::{Direction, cos_cos_transform, staggered_cos_cos_transform};
use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use nalgebra::DMatrix;
use std::hint::black_box;

fn density(n: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, n, |i, j| 10.0 + ((i * 31 + j * 17) % 97) as f64)
}

fn bench_transforms(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectral");
    for n in [64usize, 128, 256] {
        group.bench_with_input(BenchmarkId::new("cos_cos_node", n), &n, |b, &n| {
            b.iter_batched(
                || density(n + 1),
                |mut m| {
                    cos_cos_transform(&mut m, Direction::Forward, Direction::Forward);
                    black_box(m)
                },
                BatchSize::LargeInput,
            )
        });
        // Off-by-one sizes exercise the chirp-z path.
        group.bench_with_input(BenchmarkId::new("staggered_cell", n - 1), &n, |b, &n| {
            b.iter_batched(
                || density(n - 1),
                |mut m| {
                    staggered_cos_cos_transform(&mut m, Direction::Forward);
                    black_box(m)
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_transforms);
criterion_main!(benches);

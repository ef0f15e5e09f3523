use cartogrid::{
    Algorithm, CartogramOptions, CartogramRequest, Feature, GastnerOptions, Layer, NoopStatus,
    Shape, compute_cartogram,
};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use geo::polygon;
use std::hint::black_box;

/// An `n × n` checkerboard of unit squares with alternating light and heavy values.
fn checkerboard(n: usize) -> Layer {
    let mut features = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let (x, y) = (i as f64, j as f64);
            let value = if (i + j) % 2 == 0 { 1.0 } else { 5.0 };
            let square = polygon![
                (x: x, y: y),
                (x: x + 1.0, y: y),
                (x: x + 1.0, y: y + 1.0),
                (x: x, y: y + 1.0),
            ];
            features.push(Feature::new(Shape::Polygon(square)).with_attribute("value", value));
        }
    }
    Layer::with_features("checkerboard", features)
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    let request = CartogramRequest::new(checkerboard(6), "value");
    for grid_size in [32usize, 64] {
        let newman = CartogramOptions {
            grid_size,
            create_grid_layer: false,
            create_legend: false,
            ..CartogramOptions::default()
        };
        group.bench_with_input(BenchmarkId::new("newman", grid_size), &newman, |b, o| {
            b.iter(|| black_box(compute_cartogram(&request, o, &NoopStatus)))
        });

        let gastner = CartogramOptions {
            algorithm: Algorithm::Gastner(GastnerOptions {
                lattice_size: 2 * grid_size,
                ..GastnerOptions::default()
            }),
            ..newman.clone()
        };
        group.bench_with_input(BenchmarkId::new("gastner", grid_size), &gastner, |b, o| {
            b.iter(|| black_box(compute_cartogram(&request, o, &NoopStatus)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);

use cartogrid_core::{
    CartogramGrid, Cancellation, Error, Feature, Layer, NoopStatus, RasterOptions, Shape,
    StatusSink,
};
use cartogrid_diffusion::{Algorithm, GastnerOptions, NewmanOptions, compute};
use geo::{Rect, coord, polygon};

fn rect_shape(x0: f64, y0: f64, x1: f64, y1: f64) -> Shape {
    Shape::Polygon(polygon![
        (x: x0, y: y0),
        (x: x1, y: y0),
        (x: x1, y: y1),
        (x: x0, y: y1),
    ])
}

/// Two halves of a square, the right one four times as dense.
fn two_halves(n: usize) -> CartogramGrid {
    halves_of(20.0, n, n)
}

/// Left and right halves of a `width × 20` envelope holding 2000 and 8000.
fn halves_of(width: f64, size_x: usize, size_y: usize) -> CartogramGrid {
    let env = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: width, y: 20.0 });
    let mut grid = CartogramGrid::new(size_x, size_y, env).unwrap();
    let mid = 0.5 * width;
    let layer = Layer::with_features(
        "halves",
        vec![
            Feature::new(rect_shape(0.0, 0.0, mid, 20.0)).with_attribute("pop", 2000.0),
            Feature::new(rect_shape(mid, 0.0, width, 20.0)).with_attribute("pop", 8000.0),
        ],
    );
    grid.compute_original_density(&layer, "pop", RasterOptions::default(), &NoopStatus)
        .unwrap();
    grid
}

fn density_spread(grid: &CartogramGrid) -> f64 {
    let d = grid.current_density();
    let mean = d.mean();
    (d.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / d.len() as f64).sqrt() / mean
}

fn half_areas(grid: &CartogramGrid) -> (f64, f64) {
    let (cx, cy) = grid.cell_count();
    let (mut left, mut right) = (0.0, 0.0);
    for j in 0..cy {
        for i in 0..cx {
            if i < cx / 2 {
                left += grid.cell_area(i, j);
            } else {
                right += grid.cell_area(i, j);
            }
        }
    }
    (left, right)
}

/// Density of each half relative to the whole, from the rasterized mass over the deformed area.
fn relative_half_densities(grid: &CartogramGrid) -> (f64, f64) {
    let (cx, cy) = grid.cell_count();
    let (w, h) = grid.cell_size();
    let (mut left, mut right) = (0.0, 0.0);
    for j in 0..cy {
        for i in 0..cx {
            let mass = grid.original_density()[(i, j)] * w * h;
            if i < cx / 2 {
                left += mass;
            } else {
                right += mass;
            }
        }
    }
    let (left_area, right_area) = half_areas(grid);
    let mean = (left + right) / (left_area + right_area);
    (left / left_area / mean, right / right_area / mean)
}

fn density_contrast(grid: &CartogramGrid) -> f64 {
    let d = grid.current_density();
    d.max() / d.min()
}

fn assert_equalizes(mut grid: CartogramGrid, algorithm: &Algorithm) {
    let area = grid.total_area();
    let spread = density_spread(&grid);
    let (left, right) = relative_half_densities(&grid);
    assert!(left < 0.5 && right > 1.5, "left {left} right {right}");
    assert!(density_contrast(&grid) > 3.9);

    let stats = compute(&mut grid, algorithm, &NoopStatus).unwrap();
    assert!(stats.steps > 0);

    assert!((grid.total_area() - area).abs() / area < 1e-6);
    assert!(density_spread(&grid) < 0.5 * spread);
    let (left, right) = relative_half_densities(&grid);
    assert!((0.9..1.1).contains(&left), "left half at {left} of the mean density");
    assert!((0.9..1.1).contains(&right), "right half at {right} of the mean density");
    // only the cells straddling the border between the halves stay off the mean
    let contrast = density_contrast(&grid);
    assert!(contrast < 2.0, "cell densities still span a factor {contrast}");

    let env = grid.envelope();
    for v in grid.node_x().iter() {
        assert!(*v >= env.min().x - 1e-9 && *v <= env.max().x + 1e-9);
    }
}

#[test]
fn newman_equalizes_density() {
    assert_equalizes(two_halves(21), &Algorithm::Newman(NewmanOptions::default()));
}

#[test]
fn gastner_equalizes_density() {
    let options = GastnerOptions {
        lattice_size: 32,
        ..GastnerOptions::default()
    };
    assert_equalizes(two_halves(17), &Algorithm::Gastner(options));
}

#[test]
fn gastner_equalizes_density_on_a_wide_envelope() {
    let options = GastnerOptions {
        lattice_size: 32,
        ..GastnerOptions::default()
    };
    let mut grid = halves_of(40.0, 33, 17);
    compute(&mut grid, &Algorithm::Gastner(options), &NoopStatus).unwrap();
    let (left, right) = relative_half_densities(&grid);
    assert!((0.9..1.1).contains(&left), "left half at {left} of the mean density");
    assert!((0.9..1.1).contains(&right), "right half at {right} of the mean density");
    // the halves only differ along x, so rows stay put
    for j in 0..17 {
        for i in 0..33 {
            assert!((grid.node(i, j).y - grid.lattice_node(i, j).y).abs() < 1e-6);
        }
    }
}

#[test]
fn uniform_density_leaves_the_grid_in_place() {
    let env = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 8.0, y: 8.0 });
    let mut grid = CartogramGrid::new(9, 9, env).unwrap();
    let layer = Layer::with_features(
        "flat",
        vec![Feature::new(rect_shape(0.0, 0.0, 8.0, 8.0)).with_attribute("pop", 640.0)],
    );
    grid.compute_original_density(&layer, "pop", RasterOptions::default(), &NoopStatus)
        .unwrap();
    compute(&mut grid, &Algorithm::default(), &NoopStatus).unwrap();
    for j in 0..9 {
        for i in 0..9 {
            let (n, l) = (grid.node(i, j), grid.lattice_node(i, j));
            assert!((n.x - l.x).abs() < 1e-6 && (n.y - l.y).abs() < 1e-6);
        }
    }
}

struct CancelOnFirstProgress(Cancellation);

impl StatusSink for CancelOnFirstProgress {
    fn on_progress(&self, _progress: u16, _phase: &str, _detail: &str) {
        self.0.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

#[test]
fn cancellation_interrupts_within_one_step() {
    for algorithm in [
        Algorithm::Newman(NewmanOptions::default()),
        Algorithm::Gastner(GastnerOptions {
            lattice_size: 16,
            ..GastnerOptions::default()
        }),
    ] {
        let mut grid = two_halves(11);
        let before = grid.node_x().clone();
        let sink = CancelOnFirstProgress(Cancellation::new());
        let err = compute(&mut grid, &algorithm, &sink).unwrap_err();
        assert!(err.is_cancellation());
        assert!(matches!(err, Error::Interrupted));
        assert_eq!(grid.node_x(), &before);
    }
}

#[test]
fn step_budget_exhaustion_is_reported() {
    let mut grid = two_halves(11);
    let algorithm = Algorithm::Newman(NewmanOptions {
        max_steps: 1,
        ..NewmanOptions::default()
    });
    let err = compute(&mut grid, &algorithm, &NoopStatus).unwrap_err();
    assert!(matches!(err, Error::NonConvergence { iterations: 1, .. }));
}

#[test]
fn algorithm_is_tagged_in_json() {
    let a: Algorithm = serde_json::from_str(r#"{"type":"gastner","latticeSize":64}"#).unwrap();
    let Algorithm::Gastner(opts) = a else {
        panic!("expected gastner");
    };
    assert_eq!(opts.lattice_size, 64);
    assert_eq!(opts.newton_iterations, 50);

    let a: Algorithm = serde_json::from_str(r#"{"type":"newman"}"#).unwrap();
    assert_eq!(a, Algorithm::default());
}

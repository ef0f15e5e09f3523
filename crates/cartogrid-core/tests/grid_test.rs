use cartogrid_core::{
    CartogramGrid, CellState, Feature, Layer, NoopStatus, RasterOptions, Shape,
    resolve_constrained_deformation,
};
use geo::{Coord, Rect, coord, polygon};
use proptest::prelude::*;

fn square(x0: f64, y0: f64, side: f64) -> Shape {
    Shape::Polygon(polygon![
        (x: x0, y: y0),
        (x: x0 + side, y: y0),
        (x: x0 + side, y: y0 + side),
        (x: x0, y: y0 + side),
    ])
}

fn grid(n: usize) -> CartogramGrid {
    let env = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 });
    CartogramGrid::new(n, n, env).unwrap()
}

fn covered_density(g: &CartogramGrid) -> f64 {
    let (cx, cy) = g.cell_count();
    let mut sum = 0.0;
    for j in 0..cy {
        for i in 0..cx {
            if g.cell_state(i, j) == CellState::Deformable {
                sum += g.original_density()[(i, j)];
            }
        }
    }
    sum
}

#[test]
fn rasterized_density_scales_linearly_with_the_attribute() {
    let options = RasterOptions {
        attribute_is_density: true,
        missing_value: None,
    };
    let mut sums = Vec::new();
    for v in [20.0, 40.0, 80.0] {
        let mut g = grid(11);
        let layer = Layer::with_features(
            "m",
            vec![Feature::new(square(2.0, 2.0, 4.0)).with_attribute("v", v)],
        );
        g.compute_original_density(&layer, "v", options, &NoopStatus)
            .unwrap();
        sums.push(covered_density(&g));
    }
    assert!(((sums[1] / sums[0]) - 2.0).abs() < 1e-2);
    assert!(((sums[2] / sums[0]) - 4.0).abs() < 1e-2);
}

#[test]
fn deformed_cells_spread_their_mass_over_the_new_area() {
    let mut g = grid(11);
    let layer = Layer::with_features(
        "m",
        vec![
            Feature::new(square(0.0, 0.0, 5.0)).with_attribute("v", 25.0),
            Feature::new(square(5.0, 5.0, 5.0)).with_attribute("v", 250.0),
        ],
    );
    g.compute_original_density(&layer, "v", RasterOptions::default(), &NoopStatus)
        .unwrap();
    let area = g.total_area();
    let d = g.original_density()[(0, 0)];

    // widen cell (0, 0) into a trapezoid of area 1.25 at the expense of cell (1, 0)
    g.set_node(1, 1, coord! { x: 1.5, y: 1.0 });
    g.update_current_density();
    assert!((g.current_density()[(0, 0)] - d / 1.25).abs() < 1e-9);
    assert!((g.current_density()[(1, 0)] - d / 0.75).abs() < 1e-9);
    assert!((g.current_density()[(5, 5)] - g.original_density()[(5, 5)]).abs() < 1e-12);

    // shift interior nodes while keeping the boundary on the envelope
    for j in 1..10 {
        for i in 1..10 {
            let n = g.node(i, j);
            g.set_node(i, j, coord! { x: n.x + 0.2 * (j as f64 * 0.7).sin(), y: n.y + 0.1 });
        }
    }
    assert!((g.total_area() - area).abs() / area < 1e-9);
}

#[test]
fn constrained_resolution_keeps_topology() {
    let mut g = grid(11);
    let master = Layer::with_features(
        "m",
        vec![Feature::new(square(0.0, 0.0, 4.0)).with_attribute("v", 100.0)],
    );
    g.compute_original_density(&master, "v", RasterOptions::default(), &NoopStatus)
        .unwrap();
    let lake = Layer::with_features("lake", vec![Feature::new(square(6.0, 6.0, 3.0))]);
    g.prepare_constrained_deformation(&[lake]);
    for j in 1..10 {
        for i in 1..10 {
            let n = g.node(i, j);
            g.set_node(i, j, coord! { x: n.x * 0.9 + 0.05 * j as f64, y: n.y });
        }
    }
    resolve_constrained_deformation(&mut g);
    for j in 0..11 {
        for i in 1..11 {
            assert!(g.node(i, j).x > g.node(i - 1, j).x);
            assert!(g.node(j, i).y > g.node(j, i - 1).y);
        }
    }
}

fn deformed_grid(offsets: &[(f64, f64)]) -> CartogramGrid {
    let mut g = grid(6);
    let mut k = 0;
    for j in 1..5 {
        for i in 1..5 {
            let (dx, dy) = offsets[k % offsets.len()];
            k += 1;
            let n = g.node(i, j);
            g.set_node(i, j, Coord { x: n.x + dx, y: n.y + dy });
        }
    }
    g
}

proptest! {
    #[test]
    fn lattice_nodes_project_onto_their_deformed_positions(
        offsets in prop::collection::vec((-0.6f64..0.6, -0.6f64..0.6), 16),
    ) {
        let g = deformed_grid(&offsets);
        for j in 0..6 {
            for i in 0..6 {
                let lattice = g.lattice_node(i, j);
                let p = g.project_point(lattice.x, lattice.y);
                let n = g.node(i, j);
                prop_assert!((p.x - n.x).abs() < 1e-9 && (p.y - n.y).abs() < 1e-9);
            }
        }
    }
}

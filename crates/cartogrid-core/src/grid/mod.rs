//! The deformable cartogram lattice.
//!
//! A [`CartogramGrid`] holds `size_x × size_y` nodes laid out uniformly over an envelope and the
//! `(size_x - 1) × (size_y - 1)` cells between them. Node coordinates start as a regular lattice
//! and are moved in place by the diffusion solver and the constrained resolver; the cell size and
//! the envelope never change, so index arithmetic always refers to the undeformed lattice.

pub mod constrained;
mod density;
mod project;

pub use constrained::{ConstrainedReport, resolve_constrained_deformation};
pub use density::{DENSITY_BIAS, MIN_POSITIVE_DENSITY, RasterOptions, RasterSummary};

use crate::error::{Error, Result, try_matrix};
use crate::geom::quad_area;
use geo::{Coord, Rect};
use nalgebra::DMatrix;

/// Constraint classification of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i8)]
pub enum CellState {
    /// Outside every master feature.
    #[default]
    Unset = -1,
    /// Centre lies inside a master feature.
    Deformable = 0,
    /// Touches a constrained feature and is not deformable.
    Constrained = 1,
}

#[derive(Debug, Clone)]
pub struct CartogramGrid {
    pub(crate) envelope: Rect<f64>,
    pub(crate) size_x: usize,
    pub(crate) size_y: usize,
    pub(crate) cell_size_x: f64,
    pub(crate) cell_size_y: f64,
    pub(crate) node_x: DMatrix<f64>,
    pub(crate) node_y: DMatrix<f64>,
    pub(crate) original_density: DMatrix<f64>,
    pub(crate) current_density: DMatrix<f64>,
    pub(crate) cell_state: DMatrix<CellState>,
    pub(crate) mean_density: f64,
}

impl CartogramGrid {
    /// Allocates a regular lattice of `size_x × size_y` nodes spanning `envelope`.
    pub fn new(size_x: usize, size_y: usize, envelope: Rect<f64>) -> Result<Self> {
        if size_x < 2 || size_y < 2 {
            return Err(Error::InvalidParameter {
                name: "grid_size",
                message: format!("a grid needs at least 2×2 nodes, got {size_x}×{size_y}"),
            });
        }
        let (w, h) = (envelope.width(), envelope.height());
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(Error::InvalidParameter {
                name: "envelope",
                message: format!("envelope must have a positive finite extent, got {w}×{h}"),
            });
        }

        let cell_size_x = w / (size_x - 1) as f64;
        let cell_size_y = h / (size_y - 1) as f64;
        let min = envelope.min();

        let mut node_x = try_matrix(size_x, size_y, 0.0, "grid node coordinates")?;
        let mut node_y = try_matrix(size_x, size_y, 0.0, "grid node coordinates")?;
        for j in 0..size_y {
            for i in 0..size_x {
                node_x[(i, j)] = min.x + i as f64 * cell_size_x;
                node_y[(i, j)] = min.y + j as f64 * cell_size_y;
            }
        }

        let (cx, cy) = (size_x - 1, size_y - 1);
        Ok(Self {
            envelope,
            size_x,
            size_y,
            cell_size_x,
            cell_size_y,
            node_x,
            node_y,
            original_density: try_matrix(cx, cy, 0.0, "cell densities")?,
            current_density: try_matrix(cx, cy, 0.0, "cell densities")?,
            cell_state: try_matrix(cx, cy, CellState::Unset, "cell states")?,
            mean_density: 0.0,
        })
    }

    pub fn envelope(&self) -> Rect<f64> {
        self.envelope
    }

    /// Node count along x.
    pub fn size_x(&self) -> usize {
        self.size_x
    }

    /// Node count along y.
    pub fn size_y(&self) -> usize {
        self.size_y
    }

    pub fn cell_count(&self) -> (usize, usize) {
        (self.size_x - 1, self.size_y - 1)
    }

    pub fn cell_size(&self) -> (f64, f64) {
        (self.cell_size_x, self.cell_size_y)
    }

    pub fn node(&self, i: usize, j: usize) -> Coord<f64> {
        Coord {
            x: self.node_x[(i, j)],
            y: self.node_y[(i, j)],
        }
    }

    pub fn set_node(&mut self, i: usize, j: usize, c: Coord<f64>) {
        self.node_x[(i, j)] = c.x;
        self.node_y[(i, j)] = c.y;
    }

    /// Undeformed position of node `(i, j)`.
    pub fn lattice_node(&self, i: usize, j: usize) -> Coord<f64> {
        let min = self.envelope.min();
        Coord {
            x: min.x + i as f64 * self.cell_size_x,
            y: min.y + j as f64 * self.cell_size_y,
        }
    }

    pub fn node_x(&self) -> &DMatrix<f64> {
        &self.node_x
    }

    pub fn node_y(&self) -> &DMatrix<f64> {
        &self.node_y
    }

    pub fn original_density(&self) -> &DMatrix<f64> {
        &self.original_density
    }

    pub fn current_density(&self) -> &DMatrix<f64> {
        &self.current_density
    }

    pub fn cell_state(&self, i: usize, j: usize) -> CellState {
        self.cell_state[(i, j)]
    }

    pub fn mean_density(&self) -> f64 {
        self.mean_density
    }

    /// Corners of cell `(i, j)` in ring order: lower-left, lower-right, upper-right, upper-left.
    pub fn cell_corners(&self, i: usize, j: usize) -> [Coord<f64>; 4] {
        [
            self.node(i, j),
            self.node(i + 1, j),
            self.node(i + 1, j + 1),
            self.node(i, j + 1),
        ]
    }

    /// Area of the (possibly deformed) quadrilateral of cell `(i, j)`.
    pub fn cell_area(&self, i: usize, j: usize) -> f64 {
        quad_area(&self.cell_corners(i, j))
    }

    /// Sum of all deformed cell areas.
    pub fn total_area(&self) -> f64 {
        let (cx, cy) = self.cell_count();
        (0..cy)
            .flat_map(|j| (0..cx).map(move |i| (i, j)))
            .map(|(i, j)| self.cell_area(i, j))
            .sum()
    }

    /// Recomputes every cell's current density as its original mass over its deformed area.
    pub fn update_current_density(&mut self) {
        let lattice_area = self.cell_size_x * self.cell_size_y;
        let (cx, cy) = self.cell_count();
        for j in 0..cy {
            for i in 0..cx {
                let area = self.cell_area(i, j);
                if area > 0.0 {
                    self.current_density[(i, j)] =
                        self.original_density[(i, j)] * lattice_area / area;
                }
            }
        }
    }

    /// Blends every cell density toward the mean: `100` keeps the full contrast, `0` removes it.
    pub fn apply_amount_of_deformation(&mut self, percent: u8) {
        let factor = f64::from(percent.min(100)) / 100.0;
        if factor == 1.0 {
            return;
        }
        let mean = self.mean_density;
        for d in self
            .original_density
            .iter_mut()
            .chain(self.current_density.iter_mut())
        {
            *d = mean + (*d - mean) * factor;
        }
    }

    /// Cell-index ranges covering `rect`, clamped to the grid.
    pub(crate) fn cell_span(
        &self,
        rect: &Rect<f64>,
    ) -> (std::ops::RangeInclusive<usize>, std::ops::RangeInclusive<usize>) {
        let min = self.envelope.min();
        let last_x = (self.size_x - 2) as f64;
        let last_y = (self.size_y - 2) as f64;
        let ix = |x: f64| ((x - min.x) / self.cell_size_x).floor().clamp(0.0, last_x) as usize;
        let iy = |y: f64| ((y - min.y) / self.cell_size_y).floor().clamp(0.0, last_y) as usize;
        (
            ix(rect.min().x)..=ix(rect.max().x),
            iy(rect.min().y)..=iy(rect.max().y),
        )
    }

    /// Undeformed rectangle of cell `(i, j)`.
    pub(crate) fn lattice_cell(&self, i: usize, j: usize) -> Rect<f64> {
        Rect::new(self.lattice_node(i, j), self.lattice_node(i + 1, j + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn unit_grid(n: usize) -> CartogramGrid {
        let env = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 5.0 });
        CartogramGrid::new(n, n, env).unwrap()
    }

    #[test]
    fn lattice_is_uniform_and_monotone() {
        let g = unit_grid(6);
        assert_eq!(g.cell_size(), (2.0, 1.0));
        assert_eq!(g.node(0, 0), coord! { x: 0.0, y: 0.0 });
        assert_eq!(g.node(5, 5), coord! { x: 10.0, y: 5.0 });
        for j in 0..6 {
            for i in 1..6 {
                assert!(g.node(i, j).x > g.node(i - 1, j).x);
                assert!(g.node(j, i).y > g.node(j, i - 1).y);
            }
        }
        assert!((g.total_area() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_degenerate_sizes() {
        let env = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        assert!(CartogramGrid::new(1, 4, env).is_err());
        let flat = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 0.0 });
        assert!(CartogramGrid::new(4, 4, flat).is_err());
    }

    #[test]
    fn amount_of_deformation_blends_toward_mean() {
        let mut g = unit_grid(3);
        g.mean_density = 20.0;
        g.original_density[(0, 0)] = 10.0;
        g.original_density[(1, 1)] = 40.0;
        g.apply_amount_of_deformation(50);
        assert_eq!(g.original_density[(0, 0)], 15.0);
        assert_eq!(g.original_density[(1, 1)], 30.0);
    }

    #[test]
    fn update_current_density_follows_the_cell_area() {
        let mut g = unit_grid(4);
        g.original_density.fill(12.0);
        g.current_density.fill(12.0);
        let mut moved = g.node(1, 1);
        moved.x += 0.4;
        moved.y += 0.2;
        g.set_node(1, 1, moved);
        g.update_current_density();
        // the grown cell thins out, the shrunk one on the other side of the node thickens
        assert!(g.current_density[(0, 0)] < 12.0);
        assert!(g.current_density[(1, 1)] > 12.0);
        let expected = 12.0 * g.cell_size_x * g.cell_size_y / g.cell_area(0, 0);
        assert!((g.current_density[(0, 0)] - expected).abs() < 1e-12);
        assert!((g.current_density[(2, 2)] - 12.0).abs() < 1e-9);
    }
}

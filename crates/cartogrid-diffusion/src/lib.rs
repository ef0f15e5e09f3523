#![forbid(unsafe_code)]

//! Density-equalizing diffusion for cartogram grids.
//!
//! Both solvers take a rasterized [`CartogramGrid`] and move its nodes so that, once the grid is
//! deformed, every cell carries the same density. [`Algorithm::Newman`] is the default.

pub mod algo;

pub use algo::{Algorithm, DiffusionStats, GastnerOptions, NewmanOptions};
pub use cartogrid_core::{Error, Result};

use cartogrid_core::grid::CartogramGrid;
use cartogrid_core::status::StatusSink;

/// Deforms `grid` in place. Cancellation is polled once per integration step.
pub fn compute(
    grid: &mut CartogramGrid,
    algorithm: &Algorithm,
    status: &dyn StatusSink,
) -> Result<DiffusionStats> {
    match algorithm {
        Algorithm::Newman(opts) => algo::newman::compute(grid, opts, status),
        Algorithm::Gastner(opts) => algo::gastner::compute(grid, opts, status),
    }
}

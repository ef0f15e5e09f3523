#![forbid(unsafe_code)]

//! Geometry model and deformable grid for diffusion cartograms.
//!
//! `cartogrid-core` rasterizes a layer attribute into a cell density grid, relaxes constrained
//! cells after the grid has been deformed, and re-projects features through the deformed grid.
//! The diffusion itself lives in `cartogrid-diffusion`.

pub mod error;
pub mod feature;
pub mod geom;
pub mod grid;
pub mod project;
pub mod status;

pub use error::{Error, ErrorKind, Result};
pub use feature::{Attributes, Feature, Layer};
pub use geom::{Shape, intersection_of_segments};
pub use grid::{
    CartogramGrid, CellState, ConstrainedReport, RasterOptions, RasterSummary,
    resolve_constrained_deformation,
};
pub use project::{FeatureProjector, regularize_coordinates, regularize_shape};
pub use status::{Cancellation, NoopStatus, PROGRESS_MAX, ScopedStatus, StatusSink};

#![forbid(unsafe_code)]

//! `cartogrid` computes diffusion cartograms.
//!
//! A master layer's regions are resized so that their areas become proportional to an
//! attribute; slave layers follow the same deformation and constrained layers resist it. The
//! computation is synchronous ([`compute_cartogram`]) and reports progress and polls for
//! cancellation through a [`StatusSink`]; [`CartogramTask`] runs it on a worker thread.
//!
//! Layer I/O is out of scope: features are built from `geo` geometries by the caller.

mod grid_layer;
mod legend;
mod options;
mod pipeline;
mod report;
mod size_error;
mod task;

pub use cartogrid_core::{
    Attributes, Cancellation, CartogramGrid, CellState, ErrorKind, Feature, FeatureProjector,
    Layer, NoopStatus, PROGRESS_MAX, ScopedStatus, Shape, StatusSink,
};
pub use cartogrid_diffusion::{Algorithm, DiffusionStats, GastnerOptions, NewmanOptions};
pub use cartogrid_spectral as spectral;
pub use grid_layer::GRID_LAYER_NAME;
pub use legend::{LEGEND_LAYER_NAME, nice_value};
pub use options::CartogramOptions;
pub use pipeline::{CartogramOutput, CartogramRequest, compute_cartogram};
pub use report::{ComputationReport, LayerSummary};
pub use size_error::{DENSITY_ATTRIBUTE, SIZE_ERROR_ATTRIBUTE, SizeErrorStats};
pub use task::{CartogramTask, ChannelStatus, StatusEvent};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] cartogrid_core::Error),
    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),
    #[error("failed to spawn the cartogram worker thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("the cartogram worker thread panicked")]
    WorkerPanicked,
}

impl Error {
    /// True when the computation stopped because cancellation was requested.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Core(e) if e.is_cancellation())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

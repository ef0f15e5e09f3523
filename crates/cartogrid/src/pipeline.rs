//! The end-to-end cartogram computation.
//!
//! Phases and their share of the progress scale:
//!
//! | phase                  | progress   |
//! |------------------------|------------|
//! | density rasterization  | 0–100      |
//! | diffusion              | 100–800    |
//! | constrained cells      | 800–850    |
//! | feature projection     | 850–950    |
//! | statistics and layers  | 950–1000   |

use crate::grid_layer::deformation_grid_layer;
use crate::legend::legend_layer;
use crate::options::CartogramOptions;
use crate::report::{ComputationReport, LayerSummary};
use crate::size_error::{SizeErrorStats, compute_size_error, feature_masses};
use crate::{Error, Result};
use cartogrid_core::error::ErrorKind;
use cartogrid_core::geom::{expand_envelope, union_envelopes};
use cartogrid_core::{
    CartogramGrid, FeatureProjector, Layer, RasterOptions, ScopedStatus, StatusSink,
    resolve_constrained_deformation,
};
use cartogrid_diffusion::Algorithm;
use geo::{Coord, Rect};
use std::time::Instant;

/// Margin added on every side of the input envelope, as a fraction of its extent.
const ENVELOPE_MARGIN: f64 = 0.1;

/// Fraction of the longer envelope side used as the default maximum segment length.
const SEGMENT_FRACTION: f64 = 1.0 / 500.0;

/// Layers taking part in one computation.
#[derive(Debug, Clone, Default)]
pub struct CartogramRequest {
    /// Layer whose attribute drives the deformation.
    pub master: Layer,
    pub master_attribute: String,
    /// Layers deformed along with the master.
    pub slaves: Vec<Layer>,
    /// Layers whose shape should change as little as possible.
    pub constrained: Vec<Layer>,
}

impl CartogramRequest {
    pub fn new(master: Layer, master_attribute: impl Into<String>) -> Self {
        Self {
            master,
            master_attribute: master_attribute.into(),
            slaves: Vec::new(),
            constrained: Vec::new(),
        }
    }

    pub fn with_slave(mut self, layer: Layer) -> Self {
        self.slaves.push(layer);
        self
    }

    pub fn with_constrained(mut self, layer: Layer) -> Self {
        self.constrained.push(layer);
        self
    }

    fn layers(&self) -> impl Iterator<Item = &Layer> {
        std::iter::once(&self.master)
            .chain(self.slaves.iter())
            .chain(self.constrained.iter())
    }
}

#[derive(Debug, Clone)]
pub struct CartogramOutput {
    /// Projected master layer carrying the `Density` and `SizeError` attributes.
    pub master: Layer,
    pub slaves: Vec<Layer>,
    pub constrained: Vec<Layer>,
    pub deformation_grid: Option<Layer>,
    pub legend: Option<Layer>,
    pub report: ComputationReport,
    pub size_error: SizeErrorStats,
}

/// Computes a cartogram synchronously on the calling thread.
///
/// Data-format and resource errors are also reported through [`StatusSink::on_error`] before
/// being returned; cancellation is returned as [`cartogrid_core::Error::Interrupted`].
pub fn compute_cartogram(
    request: &CartogramRequest,
    options: &CartogramOptions,
    status: &dyn StatusSink,
) -> Result<CartogramOutput> {
    let result = run(request, options, status);
    if let Err(Error::Core(err)) = &result {
        let title = match err.kind() {
            ErrorKind::DataFormat => Some("Data format error"),
            ErrorKind::ResourceExhaustion => Some("Cartogram computation failed"),
            ErrorKind::Interrupted | ErrorKind::InvalidInput => None,
        };
        if let Some(title) = title {
            tracing::error!(error = %err, "cartogram computation aborted");
            status.on_error(title, &err.to_string(), &format!("{err:?}"));
        }
    }
    result
}

fn run(
    request: &CartogramRequest,
    options: &CartogramOptions,
    status: &dyn StatusSink,
) -> Result<CartogramOutput> {
    let started = Instant::now();
    options.validate()?;

    let envelope = request
        .layers()
        .fold(None, |acc, l| union_envelopes(acc, l.envelope()))
        .ok_or_else(|| invalid("master", "the input layers contain no geometry".to_string()))?;
    let (size_x, size_y, grid_envelope) =
        grid_layout(expand_envelope(envelope, ENVELOPE_MARGIN), options.grid_size)?;
    tracing::info!(
        master = %request.master.name,
        attribute = %request.master_attribute,
        size_x,
        size_y,
        "starting cartogram computation"
    );

    let mut grid = CartogramGrid::new(size_x, size_y, grid_envelope)?;
    let raster = grid.compute_original_density(
        &request.master,
        &request.master_attribute,
        RasterOptions {
            attribute_is_density: options.attribute_is_density,
            missing_value: options.missing_value,
        },
        &ScopedStatus::new(status, 0, 100),
    )?;
    grid.prepare_constrained_deformation(&request.constrained);
    grid.apply_amount_of_deformation(options.amount_of_deformation);

    let diffusion = cartogrid_diffusion::compute(
        &mut grid,
        &options.algorithm,
        &ScopedStatus::new(status, 100, 800),
    )?;

    let constrained_report = if request.constrained.is_empty() {
        None
    } else {
        status.on_progress(800, "Resolving constrained deformation", "");
        Some(resolve_constrained_deformation(&mut grid))
    };
    status.on_progress(850, "Projecting layers", "");

    let max_segment = options.max_segment_length.unwrap_or_else(|| {
        envelope.width().max(envelope.height()) * SEGMENT_FRACTION
    });
    let projector = FeatureProjector::new(&grid).with_max_segment_length(max_segment);
    let projection = ScopedStatus::new(status, 850, 950);
    let layer_count = 1 + request.slaves.len() + request.constrained.len();
    let mut projected = Vec::with_capacity(layer_count);
    for (k, layer) in request.layers().enumerate() {
        projection.fraction(
            k as f64 / layer_count as f64,
            "Projecting layers",
            &layer.name,
        );
        projected.push(projector.project_layer(layer, &projection)?);
    }
    let constrained: Vec<Layer> = projected.split_off(1 + request.slaves.len());
    let slaves: Vec<Layer> = projected.split_off(1);
    let mut master = projected.pop().unwrap_or_default();

    status.on_progress(950, "Computing statistics", "");
    let masses = feature_masses(
        &request.master,
        &request.master_attribute,
        options.attribute_is_density,
        options.missing_value,
    );
    let size_error = compute_size_error(&request.master, &mut master, &masses);

    let deformation_grid = options.create_grid_layer.then(|| {
        deformation_grid_layer(&grid, envelope, options.grid_layer_size, max_segment)
    });
    let legend = if options.create_legend {
        let known: Vec<f64> = masses.iter().flatten().copied().collect();
        let total: f64 = known.iter().sum();
        let mean = total / known.len().max(1) as f64;
        master
            .envelope()
            .and_then(|env| legend_layer(mean, total / master.total_area(), env))
    } else {
        None
    };

    let layers = std::iter::once(&master)
        .chain(slaves.iter())
        .chain(constrained.iter())
        .map(|l| LayerSummary {
            name: l.name.clone(),
            features: l.len(),
            dropped_geometries: l.features.iter().filter(|f| f.geometry.is_none()).count(),
        })
        .collect();

    let report = ComputationReport {
        master_layer: request.master.name.clone(),
        attribute: request.master_attribute.clone(),
        attribute_is_density: options.attribute_is_density,
        algorithm: match options.algorithm {
            Algorithm::Newman(_) => "newman",
            Algorithm::Gastner(_) => "gastner",
        },
        grid_size: (size_x, size_y),
        amount_of_deformation: options.amount_of_deformation,
        raster,
        diffusion,
        constrained: constrained_report,
        size_error,
        layers,
        elapsed_ms: started.elapsed().as_millis(),
    };
    tracing::info!(
        mean_size_error = size_error.mean,
        elapsed_ms = report.elapsed_ms,
        "cartogram computation finished"
    );
    status.on_progress(1000, "Done", "");

    Ok(CartogramOutput {
        master,
        slaves,
        constrained,
        deformation_grid,
        legend,
        report,
        size_error,
    })
}

/// Node counts and envelope giving square cells, `grid_size` nodes along the longer side.
fn grid_layout(envelope: Rect<f64>, grid_size: usize) -> Result<(usize, usize, Rect<f64>)> {
    let (w, h) = (envelope.width(), envelope.height());
    let long = w.max(h);
    if !(long.is_finite() && long > 0.0) {
        return Err(invalid(
            "envelope",
            "the input layers have no extent".to_string(),
        ));
    }
    let cell = long / (grid_size - 1) as f64;
    let nodes = |extent: f64| ((extent / cell).ceil() as usize).max(1) + 1;
    let (size_x, size_y) = (nodes(w), nodes(h));

    // grow the short side so the cells stay square
    let pad_x = 0.5 * ((size_x - 1) as f64 * cell - w);
    let pad_y = 0.5 * ((size_y - 1) as f64 * cell - h);
    let (min, max) = (envelope.min(), envelope.max());
    let adjusted = Rect::new(
        Coord {
            x: min.x - pad_x,
            y: min.y - pad_y,
        },
        Coord {
            x: max.x + pad_x,
            y: max.y + pad_y,
        },
    );
    Ok((size_x, size_y, adjusted))
}

fn invalid(name: &'static str, message: String) -> Error {
    Error::Core(cartogrid_core::Error::InvalidParameter { name, message })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    #[test]
    fn grid_layout_keeps_cells_square() {
        let env = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 100.0, y: 40.0 });
        let (sx, sy, adjusted) = grid_layout(env, 51).unwrap();
        assert_eq!(sx, 51);
        assert_eq!(sy, 21);
        let cx = adjusted.width() / (sx - 1) as f64;
        let cy = adjusted.height() / (sy - 1) as f64;
        assert!((cx - cy).abs() < 1e-9);
        assert!(adjusted.min().y <= 0.0 && adjusted.max().y >= 40.0);
    }

    #[test]
    fn flat_envelopes_still_get_two_rows() {
        let env = Rect::new(coord! { x: 0.0, y: 5.0 }, coord! { x: 10.0, y: 5.0 });
        let (sx, sy, adjusted) = grid_layout(env, 11).unwrap();
        assert_eq!((sx, sy), (11, 2));
        assert!(adjusted.height() > 0.0);
    }
}

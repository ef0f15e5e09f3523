use crate::size_error::SizeErrorStats;
use cartogrid_core::{ConstrainedReport, RasterSummary};
use cartogrid_diffusion::DiffusionStats;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerSummary {
    pub name: String,
    pub features: usize,
    /// Features whose geometry could not be rebuilt after projection.
    pub dropped_geometries: usize,
}

/// Everything worth telling the user about a finished computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputationReport {
    pub master_layer: String,
    pub attribute: String,
    pub attribute_is_density: bool,
    pub algorithm: &'static str,
    /// Grid nodes along x and y.
    pub grid_size: (usize, usize),
    pub amount_of_deformation: u8,
    pub raster: RasterSummary,
    pub diffusion: DiffusionStats,
    pub constrained: Option<ConstrainedReport>,
    pub size_error: SizeErrorStats,
    pub layers: Vec<LayerSummary>,
    pub elapsed_ms: u128,
}

impl ComputationReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for ComputationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CARTOGRAM COMPUTATION REPORT")?;
        writeln!(f)?;
        writeln!(f, "Master layer: {}", self.master_layer)?;
        writeln!(
            f,
            "Attribute: {} ({})",
            self.attribute,
            if self.attribute_is_density {
                "density"
            } else {
                "population"
            }
        )?;
        writeln!(
            f,
            "Features: {} with data, {} without",
            self.raster.features, self.raster.missing
        )?;
        writeln!(f, "Mean density (rescaled): {:.4}", self.raster.mean_density)?;
        writeln!(f)?;
        writeln!(f, "Algorithm: {}", self.algorithm)?;
        writeln!(f, "Grid: {} x {} nodes", self.grid_size.0, self.grid_size.1)?;
        writeln!(f, "Amount of deformation: {}%", self.amount_of_deformation)?;
        writeln!(
            f,
            "Integration: {} steps, t = {:.3e}, max error {:.3e}",
            self.diffusion.steps, self.diffusion.final_time, self.diffusion.max_error
        )?;
        if self.diffusion.blur_passes > 0 {
            writeln!(f, "Gaussian blur passes: {}", self.diffusion.blur_passes)?;
        }
        if let Some(c) = &self.constrained {
            writeln!(
                f,
                "Constrained cells: {} ({} nodes moved, {} moves rejected)",
                c.constrained_cells, c.moved_nodes, c.rejected_moves
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Size error (100 = exact):")?;
        writeln!(f, "  mean     {:.2}", self.size_error.mean)?;
        writeln!(f, "  std dev  {:.2}", self.size_error.std_dev)?;
        writeln!(f, "  min      {:.2}", self.size_error.min)?;
        writeln!(f, "  max      {:.2}", self.size_error.max)?;
        writeln!(f)?;
        writeln!(f, "Layers:")?;
        for layer in &self.layers {
            write!(f, "  {}: {} features", layer.name, layer.features)?;
            if layer.dropped_geometries > 0 {
                write!(f, ", {} invalid geometries", layer.dropped_geometries)?;
            }
            writeln!(f)?;
        }
        write!(f, "Computation time: {} ms", self.elapsed_ms)
    }
}

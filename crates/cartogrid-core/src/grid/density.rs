use super::{CartogramGrid, CellState};
use crate::error::{Error, Result};
use crate::feature::Layer;
use crate::status::{StatusSink, check_cancelled};
use geo::Coord;
use nalgebra::DMatrix;
use serde::Serialize;

/// Smallest positive cell density after rescaling.
pub const MIN_POSITIVE_DENSITY: f64 = 10.0;

/// Added to every cell after rescaling so no cell is left with zero density.
pub const DENSITY_BIAS: f64 = 0.01;

/// How attribute values are turned into densities.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RasterOptions {
    /// The attribute already is a density; otherwise it is divided by the feature area.
    pub attribute_is_density: bool,
    /// Attribute value marking a feature without data.
    pub missing_value: Option<f64>,
}

/// What the rasterization pass observed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RasterSummary {
    /// Area-weighted mean density after rescaling and bias.
    pub mean_density: f64,
    /// Factor applied so the smallest positive density reaches [`MIN_POSITIVE_DENSITY`].
    pub scale: f64,
    /// Features that contributed a value.
    pub features: usize,
    /// Features without a usable value; they take the mean density.
    pub missing: usize,
    pub deformable_cells: usize,
}

impl CartogramGrid {
    /// Rasterizes the density of `attribute` over `layer` into the cell arrays.
    ///
    /// Every cell starts at the layer's area-weighted mean density. A cell whose centre lies in
    /// a feature takes that feature's density and becomes [`CellState::Deformable`].
    pub fn compute_original_density(
        &mut self,
        layer: &Layer,
        attribute: &str,
        options: RasterOptions,
        status: &dyn StatusSink,
    ) -> Result<RasterSummary> {
        let mut densities: Vec<Option<f64>> = Vec::with_capacity(layer.features.len());
        let mut weighted = 0.0;
        let mut weight = 0.0;
        let mut any_nonzero = false;
        let mut summary = RasterSummary::default();

        for feature in &layer.features {
            let area = feature.area();
            let value = feature
                .number(attribute)
                .filter(|v| options.missing_value != Some(*v));
            let density = match value {
                Some(v) if options.attribute_is_density => Some(v),
                Some(v) if area > 0.0 => Some(v / area),
                _ => None,
            };
            let density = density.map(|d| {
                if d < 0.0 {
                    tracing::warn!(layer = %layer.name, attribute, "negative value treated as zero");
                    0.0
                } else {
                    d
                }
            });
            match density {
                Some(d) => {
                    summary.features += 1;
                    any_nonzero |= d > 0.0;
                    weighted += d * area;
                    weight += area;
                }
                None => summary.missing += 1,
            }
            densities.push(density);
        }

        if !any_nonzero {
            return Err(Error::DataFormat {
                layer: layer.name.clone(),
                attribute: attribute.to_string(),
                message: "every feature has a zero or missing value".to_string(),
            });
        }
        if weight <= 0.0 {
            return Err(Error::DataFormat {
                layer: layer.name.clone(),
                attribute: attribute.to_string(),
                message: "the features carrying a value have no area".to_string(),
            });
        }
        let mean = weighted / weight;

        self.original_density.fill(mean);
        self.current_density.fill(mean);
        self.cell_state.fill(CellState::Unset);

        let total = layer.features.len().max(1) as f64;
        for (k, (feature, density)) in layer.features.iter().zip(&densities).enumerate() {
            check_cancelled(status)?;
            status.on_progress(
                (k as f64 / total * 1000.0) as u16,
                "Computing the density",
                &format!("feature {} of {}", k + 1, layer.features.len()),
            );

            let (Some(geometry), Some(envelope)) = (&feature.geometry, feature.envelope()) else {
                continue;
            };
            if !geometry.is_areal() {
                continue;
            }
            let density = density.unwrap_or(mean);
            let (span_x, span_y) = self.cell_span(&envelope);
            for j in span_y {
                for i in span_x.clone() {
                    if geometry.contains_coord(self.cell_center(i, j)) {
                        self.original_density[(i, j)] = density;
                        self.current_density[(i, j)] = density;
                        self.cell_state[(i, j)] = CellState::Deformable;
                    }
                }
            }
        }

        let min_positive = self
            .original_density
            .iter()
            .copied()
            .filter(|d| *d > 0.0)
            .fold(f64::INFINITY, f64::min);
        let scale = if min_positive < MIN_POSITIVE_DENSITY {
            MIN_POSITIVE_DENSITY / min_positive
        } else {
            1.0
        };
        for d in self.original_density.iter_mut() {
            *d = *d * scale + DENSITY_BIAS;
        }
        self.current_density.copy_from(&self.original_density);
        self.mean_density = mean * scale + DENSITY_BIAS;

        summary.mean_density = self.mean_density;
        summary.scale = scale;
        summary.deformable_cells = self
            .cell_state
            .iter()
            .filter(|s| **s == CellState::Deformable)
            .count();
        tracing::debug!(
            layer = %layer.name,
            attribute,
            mean = summary.mean_density,
            scale,
            missing = summary.missing,
            deformable = summary.deformable_cells,
            "rasterized density"
        );
        status.on_progress(1000, "Computing the density", "");
        Ok(summary)
    }

    /// Marks cells touched by a constrained feature, unless they are already deformable.
    pub fn prepare_constrained_deformation(&mut self, layers: &[Layer]) -> usize {
        let mut marked = 0;
        for feature in layers.iter().flat_map(|l| l.features.iter()) {
            let (Some(geometry), Some(envelope)) = (&feature.geometry, feature.envelope()) else {
                continue;
            };
            let (span_x, span_y) = self.cell_span(&envelope);
            for j in span_y {
                for i in span_x.clone() {
                    if self.cell_state[(i, j)] != CellState::Unset {
                        continue;
                    }
                    if geometry.intersects_rect(&self.lattice_cell(i, j)) {
                        self.cell_state[(i, j)] = CellState::Constrained;
                        marked += 1;
                    }
                }
            }
        }
        tracing::debug!(cells = marked, "marked constrained cells");
        marked
    }

    /// Resamples the current cell densities onto `out`, whose bins evenly split
    /// `[min_x, max_x] × [min_y, max_y]`.
    ///
    /// Each cell contributes to every bin overlapped by the bounding box of its four (possibly
    /// deformed) corners; overlapping contributions are averaged. Bins that receive nothing take
    /// the mean density.
    pub fn fill_regular_density_grid(
        &self,
        out: &mut DMatrix<f64>,
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
    ) {
        let (nx, ny) = out.shape();
        if nx == 0 || ny == 0 {
            return;
        }
        let bin_x = (max_x - min_x) / nx as f64;
        let bin_y = (max_y - min_y) / ny as f64;
        let mut counts = DMatrix::<u32>::zeros(nx, ny);
        out.fill(0.0);

        let bins = |lo: f64, hi: f64, n: usize| -> Option<(usize, usize)> {
            let first = (lo + 1e-9).floor();
            let last = (hi - 1e-9).ceil() - 1.0;
            if last < 0.0 || first > (n - 1) as f64 {
                return None;
            }
            let first = first.max(0.0) as usize;
            let last = (last.min((n - 1) as f64) as usize).max(first);
            Some((first, last))
        };

        let (cx, cy) = self.cell_count();
        for j in 0..cy {
            for i in 0..cx {
                let corners = self.cell_corners(i, j);
                let (lo, hi) = corner_bounds(&corners);
                let Some((kx0, kx1)) = bins((lo.x - min_x) / bin_x, (hi.x - min_x) / bin_x, nx)
                else {
                    continue;
                };
                let Some((ky0, ky1)) = bins((lo.y - min_y) / bin_y, (hi.y - min_y) / bin_y, ny)
                else {
                    continue;
                };
                let d = self.current_density[(i, j)];
                for l in ky0..=ky1 {
                    for k in kx0..=kx1 {
                        out[(k, l)] += d;
                        counts[(k, l)] += 1;
                    }
                }
            }
        }

        for (v, n) in out.iter_mut().zip(counts.iter()) {
            *v = if *n > 0 {
                *v / f64::from(*n)
            } else {
                self.mean_density
            };
        }
    }

    pub(crate) fn cell_center(&self, i: usize, j: usize) -> Coord<f64> {
        let min = self.envelope.min();
        Coord {
            x: min.x + (i as f64 + 0.5) * self.cell_size_x,
            y: min.y + (j as f64 + 0.5) * self.cell_size_y,
        }
    }
}

fn corner_bounds(corners: &[Coord<f64>; 4]) -> (Coord<f64>, Coord<f64>) {
    corners.iter().skip(1).fold((corners[0], corners[0]), |(lo, hi), c| {
        (
            Coord {
                x: lo.x.min(c.x),
                y: lo.y.min(c.y),
            },
            Coord {
                x: hi.x.max(c.x),
                y: hi.y.max(c.y),
            },
        )
    })
}

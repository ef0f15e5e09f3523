//! Per-feature size accuracy of a finished cartogram.

use cartogrid_core::{Feature, Layer};
use serde::Serialize;

/// Attribute holding the feature's density before deformation.
pub const DENSITY_ATTRIBUTE: &str = "Density";
/// Attribute holding `100 · projected area / ideal area`.
pub const SIZE_ERROR_ATTRIBUTE: &str = "SizeError";

/// Distribution of the size error over the master features; 100 is a perfect fit.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeErrorStats {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub features: usize,
}

/// Attribute mass of each master feature, `None` where the value is missing.
pub(crate) fn feature_masses(
    original: &Layer,
    attribute: &str,
    attribute_is_density: bool,
    missing_value: Option<f64>,
) -> Vec<Option<f64>> {
    original
        .features
        .iter()
        .map(|f| {
            let v = f.number(attribute).filter(|v| missing_value != Some(*v))?;
            let mass = if attribute_is_density { v * f.area() } else { v };
            Some(mass.max(0.0))
        })
        .collect()
}

/// Writes the density and size-error attributes into `projected` and summarizes the errors.
///
/// `masses[k]` belongs to `original.features[k]`, which was projected to `projected.features[k]`.
pub(crate) fn compute_size_error(
    original: &Layer,
    projected: &mut Layer,
    masses: &[Option<f64>],
) -> SizeErrorStats {
    let (total_mass, total_area) = projected
        .features
        .iter()
        .zip(masses)
        .filter_map(|(f, m)| m.map(|m| (m, f.area())))
        .fold((0.0, 0.0), |(m, a), (fm, fa)| (m + fm, a + fa));

    let mut errors = Vec::with_capacity(projected.features.len());
    for ((orig, proj), mass) in original
        .features
        .iter()
        .zip(projected.features.iter_mut())
        .zip(masses)
    {
        let Some(mass) = *mass else {
            continue;
        };
        let area = orig.area();
        if area > 0.0 {
            proj.set_attribute(DENSITY_ATTRIBUTE, mass / area);
        }
        if let Some(err) = size_error(proj, mass, total_mass, total_area) {
            proj.set_attribute(SIZE_ERROR_ATTRIBUTE, err);
            errors.push(err);
        }
    }
    summarize(&errors)
}

fn size_error(feature: &Feature, mass: f64, total_mass: f64, total_area: f64) -> Option<f64> {
    if total_mass <= 0.0 || mass <= 0.0 {
        return None;
    }
    let ideal = total_area * mass / total_mass;
    (ideal > 0.0).then(|| 100.0 * feature.area() / ideal)
}

fn summarize(errors: &[f64]) -> SizeErrorStats {
    if errors.is_empty() {
        return SizeErrorStats::default();
    }
    let n = errors.len() as f64;
    let mean = errors.iter().sum::<f64>() / n;
    let variance = errors.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
    SizeErrorStats {
        mean,
        std_dev: variance.sqrt(),
        min: errors.iter().copied().fold(f64::INFINITY, f64::min),
        max: errors.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        features: errors.len(),
    }
}

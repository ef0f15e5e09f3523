pub mod gastner;
pub mod newman;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Algorithm {
    /// Fast flow-based integration with adaptive Runge-Kutta steps on the grid's own cells.
    Newman(NewmanOptions),
    /// Implicit Volterra integration on a power-of-two diffusion lattice.
    Gastner(GastnerOptions),
}

impl Default for Algorithm {
    fn default() -> Self {
        Algorithm::Newman(NewmanOptions::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NewmanOptions {
    /// Time step of the first integration step.
    pub initial_step: f64,
    /// Target truncation error per step, in grid cells.
    pub target_error: f64,
    /// Largest factor by which the step may grow between two steps.
    pub max_ratio: f64,
    /// Gaussian pre-blur width in cells; integration starts at `t = blur² / 2`.
    pub blur: f64,
    /// Upper bound on combined integration steps before giving up.
    pub max_steps: usize,
}

impl Default for NewmanOptions {
    fn default() -> Self {
        Self {
            initial_step: 0.001,
            target_error: 0.01,
            max_ratio: 4.0,
            blur: 0.0,
            max_steps: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GastnerOptions {
    /// Lattice cells along the longer envelope side; must be a power of two.
    pub lattice_size: usize,
    pub initial_step: f64,
    /// Step growth factor after an accepted step.
    pub step_growth: f64,
    pub max_steps: usize,
    pub newton_iterations: usize,
    /// Times a step may be halved when the implicit solve fails before giving up.
    pub max_step_halvings: usize,
    /// Initial Gaussian blur width in lattice cells, applied before the first transform.
    pub blur: f64,
    /// Blur attempts with a doubling width when the density has negative values.
    pub max_blur_passes: usize,
    /// Integration stops once no tracer moves more than this many lattice cells in a step.
    pub convergence: f64,
}

impl Default for GastnerOptions {
    fn default() -> Self {
        Self {
            lattice_size: 128,
            initial_step: 1e-4,
            step_growth: 1.1,
            max_steps: 3000,
            newton_iterations: 50,
            max_step_halvings: 30,
            blur: 0.0,
            max_blur_passes: 8,
            convergence: 1e-6,
        }
    }
}

/// Summary of one diffusion run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffusionStats {
    pub steps: usize,
    /// Virtual diffusion time reached.
    pub final_time: f64,
    /// Largest per-step error estimate (Newman) or Newton residual (Gastner).
    pub max_error: f64,
    /// Gaussian blur passes needed before integrating.
    pub blur_passes: usize,
}

/// Bilinear interpolation weights of the fractional offsets `(dx, dy)`.
#[inline]
pub(crate) fn bilinear(dx: f64, dy: f64, v00: f64, v10: f64, v01: f64, v11: f64) -> f64 {
    (1.0 - dx) * (1.0 - dy) * v00 + dx * (1.0 - dy) * v10 + (1.0 - dx) * dy * v01 + dx * dy * v11
}

/// Fraction of the run completed, on a log scale of the diffusion time.
pub(crate) fn log_progress(t: f64, start: f64, expected: f64) -> u16 {
    if t <= start || start <= 0.0 {
        return 0;
    }
    let done = (t / start).ln() / (expected / start).ln();
    (done.clamp(0.0, 1.0) * 1000.0) as u16
}

//! Density equalization on a power-of-two diffusion lattice by implicit integration.
//!
//! The initial density is sampled on the `(Lx + 1) × (Ly + 1)` lattice nodes and expanded in
//! cosines. `Lx` and `Ly` follow the envelope's aspect ratio so lattice bins stay square. At
//! every step the velocity `-∇ρ / ρ` is evaluated exactly from the diffused modes, and each
//! lattice node is advanced with the implicit trapezoidal rule, solved per node by Newton
//! iteration. Failed solves halve the step. The cartogram grid is finally mapped through the
//! displaced lattice.

mod blur;
mod newton;

use super::{DiffusionStats, GastnerOptions, bilinear, log_progress};
use cartogrid_core::error::{Error, Result, try_filled, try_matrix};
use cartogrid_core::grid::CartogramGrid;
use cartogrid_core::status::{StatusSink, check_cancelled};
use cartogrid_spectral::{
    Direction, cos_cos_transform, cos_sin_transform, sin_cos_transform,
};
use geo::Coord;
use nalgebra::DMatrix;
use newton::{implicit_step, Velocities};
use std::f64::consts::PI;

/// Integration stops at this diffusion time even if nodes still creep.
const MAX_TIME: f64 = 1e8;

pub fn compute(
    grid: &mut CartogramGrid,
    options: &GastnerOptions,
    status: &dyn StatusSink,
) -> Result<DiffusionStats> {
    validate(options)?;
    let envelope = grid.envelope();
    let (min, max) = (envelope.min(), envelope.max());
    let (nx, ny) = lattice_dims(options.lattice_size, envelope.width(), envelope.height());
    let bin_x = envelope.width() / nx as f64;
    let bin_y = envelope.height() / ny as f64;

    // bins centred on the lattice nodes
    let mut rho0 = try_matrix(nx + 1, ny + 1, 0.0, "the diffusion lattice")?;
    grid.fill_regular_density_grid(
        &mut rho0,
        min.x - 0.5 * bin_x,
        max.x + 0.5 * bin_x,
        min.y - 0.5 * bin_y,
        max.y + 0.5 * bin_y,
    );

    let mut stats = DiffusionStats::default();
    let spectrum = positive_spectrum(&rho0, options, &mut stats)?;
    let field = ModeField::new(spectrum);
    let mut lattice = Lattice::regular(nx, ny)?;

    integrate(&mut lattice, &field, options, status, &mut stats)?;

    for j in 0..grid.size_y() {
        for i in 0..grid.size_x() {
            let node = grid.node(i, j);
            let (a, b) = lattice.interpolate((node.x - min.x) / bin_x, (node.y - min.y) / bin_y);
            grid.set_node(
                i,
                j,
                Coord {
                    x: min.x + a * bin_x,
                    y: min.y + b * bin_y,
                },
            );
        }
    }
    grid.update_current_density();

    tracing::info!(
        steps = stats.steps,
        final_time = stats.final_time,
        blur_passes = stats.blur_passes,
        "gastner diffusion converged"
    );
    status.on_progress(1000, "Computing the cartogram", "");
    Ok(stats)
}

fn validate(options: &GastnerOptions) -> Result<()> {
    if options.lattice_size < 2 || !options.lattice_size.is_power_of_two() {
        return Err(Error::InvalidParameter {
            name: "lattice_size",
            message: format!("must be a power of two ≥ 2, got {}", options.lattice_size),
        });
    }
    for (name, v) in [
        ("initial_step", options.initial_step),
        ("step_growth", options.step_growth),
        ("convergence", options.convergence),
    ] {
        if !(v.is_finite() && v > 0.0) {
            return Err(Error::InvalidParameter {
                name,
                message: format!("must be positive and finite, got {v}"),
            });
        }
    }
    if !(options.blur.is_finite() && options.blur >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "blur",
            message: format!("must be non-negative, got {}", options.blur),
        });
    }
    Ok(())
}

/// Lattice cells along x and y: `lattice_size` on the longer side, the shorter side scaled to
/// the aspect ratio.
fn lattice_dims(lattice_size: usize, width: f64, height: f64) -> (usize, usize) {
    let scaled = |short: f64, long: f64| {
        ((lattice_size as f64 * short / long).round() as usize).clamp(2, lattice_size)
    };
    if width >= height {
        (lattice_size, scaled(height, width))
    } else {
        (scaled(width, height), lattice_size)
    }
}

/// Cosine spectrum of `rho0`, blurred until its transform round trip is strictly positive.
fn positive_spectrum(
    rho0: &DMatrix<f64>,
    options: &GastnerOptions,
    stats: &mut DiffusionStats,
) -> Result<DMatrix<f64>> {
    let mut sigma = options.blur;
    let mut rho = if sigma > 0.0 {
        stats.blur_passes += 1;
        blur::gaussian_blur(rho0, sigma)?
    } else {
        rho0.clone()
    };

    loop {
        let mut spectrum = rho;
        cos_cos_transform(&mut spectrum, Direction::Forward, Direction::Forward);
        let mut check = spectrum.clone();
        cos_cos_transform(&mut check, Direction::Inverse, Direction::Inverse);
        if check.iter().all(|v| *v > 0.0) {
            return Ok(spectrum);
        }
        if stats.blur_passes >= options.max_blur_passes {
            return Err(Error::NonConvergence {
                phase: "gaussian blur",
                iterations: stats.blur_passes,
            });
        }
        sigma = if sigma > 0.0 { 2.0 * sigma } else { 1.0 };
        tracing::warn!(sigma, "density is not positive everywhere, blurring");
        stats.blur_passes += 1;
        rho = blur::gaussian_blur(rho0, sigma)?;
    }
}

/// Cosine modes of the initial density.
struct ModeField {
    spectrum: DMatrix<f64>,
    /// `π k / Lx` per mode index along x.
    wave_x: Vec<f64>,
    wave_y: Vec<f64>,
}

impl ModeField {
    fn new(spectrum: DMatrix<f64>) -> Self {
        let wave = |nodes: usize| -> Vec<f64> {
            let n = nodes - 1;
            (0..=n).map(|k| PI * k as f64 / n as f64).collect()
        };
        let (wave_x, wave_y) = (wave(spectrum.nrows()), wave(spectrum.ncols()));
        Self {
            spectrum,
            wave_x,
            wave_y,
        }
    }

    /// Velocity field on the lattice nodes at diffusion time `t`.
    fn velocities(&self, t: f64) -> Result<Velocities> {
        let (sx, sy) = self.spectrum.shape();
        let mut rho = try_matrix(sx, sy, 0.0, "the velocity field")?;
        let mut grad_x = try_matrix(sx, sy, 0.0, "the velocity field")?;
        let mut grad_y = try_matrix(sx, sy, 0.0, "the velocity field")?;
        for l in 0..sy {
            let wl = self.wave_y[l];
            for k in 0..sx {
                let wk = self.wave_x[k];
                let e = (-(wk * wk + wl * wl) * t).exp() * self.spectrum[(k, l)];
                rho[(k, l)] = e;
                grad_x[(k, l)] = -wk * e;
                grad_y[(k, l)] = -wl * e;
            }
        }
        cos_cos_transform(&mut rho, Direction::Inverse, Direction::Inverse);
        sin_cos_transform(&mut grad_x, Direction::Inverse, Direction::Inverse);
        cos_sin_transform(&mut grad_y, Direction::Inverse, Direction::Inverse);

        for ((gx, gy), r) in grad_x.iter_mut().zip(grad_y.iter_mut()).zip(rho.iter()) {
            *gx = -*gx / *r;
            *gy = -*gy / *r;
        }
        Ok(Velocities {
            vx: grad_x,
            vy: grad_y,
        })
    }
}

/// Displaced positions of the lattice nodes, in lattice index space.
struct Lattice {
    nx: usize,
    ny: usize,
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Lattice {
    fn regular(nx: usize, ny: usize) -> Result<Self> {
        let count = (nx + 1) * (ny + 1);
        let mut x = try_filled(count, 0.0, "the lattice positions")?;
        let mut y = try_filled(count, 0.0, "the lattice positions")?;
        for b in 0..=ny {
            for a in 0..=nx {
                x[b * (nx + 1) + a] = a as f64;
                y[b * (nx + 1) + a] = b as f64;
            }
        }
        Ok(Self { nx, ny, x, y })
    }

    fn at(&self, a: usize, b: usize) -> (f64, f64) {
        let k = b * (self.nx + 1) + a;
        (self.x[k], self.y[k])
    }

    /// Displaced position of the undeformed lattice point `(u, v)`.
    fn interpolate(&self, u: f64, v: f64) -> (f64, f64) {
        let ia = u.floor().clamp(0.0, (self.nx - 1) as f64);
        let ib = v.floor().clamp(0.0, (self.ny - 1) as f64);
        let (du, dv) = (u - ia, v - ib);
        let (ia, ib) = (ia as usize, ib as usize);
        let p00 = self.at(ia, ib);
        let p10 = self.at(ia + 1, ib);
        let p01 = self.at(ia, ib + 1);
        let p11 = self.at(ia + 1, ib + 1);
        (
            bilinear(du, dv, p00.0, p10.0, p01.0, p11.0),
            bilinear(du, dv, p00.1, p10.1, p01.1, p11.1),
        )
    }
}

fn integrate(
    lattice: &mut Lattice,
    field: &ModeField,
    options: &GastnerOptions,
    status: &dyn StatusSink,
    stats: &mut DiffusionStats,
) -> Result<()> {
    let bound = (lattice.nx as f64, lattice.ny as f64);
    let mut t = 0.0;
    let mut h = options.initial_step;
    let mut current = field.velocities(t)?;
    let mut next_x = try_filled(lattice.x.len(), 0.0, "the lattice positions")?;
    let mut next_y = try_filled(lattice.y.len(), 0.0, "the lattice positions")?;

    loop {
        check_cancelled(status)?;
        if stats.steps >= options.max_steps {
            tracing::warn!(steps = stats.steps, t, "gastner integration hit the step limit");
            return Err(Error::NonConvergence {
                phase: "gastner diffusion",
                iterations: stats.steps,
            });
        }

        let mut halvings = 0;
        let (next, max_change) = loop {
            let next = field.velocities(t + h)?;
            let mut max_change: f64 = 0.0;
            let mut residual: f64 = 0.0;
            let mut solved = true;
            for p in 0..lattice.x.len() {
                let (x0, y0) = (lattice.x[p], lattice.y[p]);
                let v0 = current.sample(x0, y0).value;
                match implicit_step((x0, y0), v0, &next, h, bound, options.newton_iterations) {
                    Some(step) => {
                        next_x[p] = step.x;
                        next_y[p] = step.y;
                        residual = residual.max(step.residual);
                        max_change = max_change.max((step.x - x0).hypot(step.y - y0));
                    }
                    None => {
                        solved = false;
                        break;
                    }
                }
            }
            if solved {
                stats.max_error = stats.max_error.max(residual);
                break (next, max_change);
            }
            halvings += 1;
            if halvings > options.max_step_halvings {
                return Err(Error::NonConvergence {
                    phase: "implicit step",
                    iterations: halvings,
                });
            }
            h *= 0.5;
            tracing::debug!(h, "newton solve failed, halving the step");
        };

        std::mem::swap(&mut lattice.x, &mut next_x);
        std::mem::swap(&mut lattice.y, &mut next_y);
        current = next;
        t += h;
        h *= options.step_growth;
        stats.steps += 1;
        stats.final_time = t;

        status.on_progress(
            log_progress(t, options.initial_step, MAX_TIME),
            "Computing the cartogram",
            &format!("t = {t:.3e}, max displacement {max_change:.3e}"),
        );

        if max_change < options.convergence || t > MAX_TIME {
            return Ok(());
        }
    }
}

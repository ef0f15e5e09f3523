//! Flow-based density equalization on the cartogram grid's own cells.
//!
//! The density is diffused analytically in the cosine basis; grid nodes are advected through the
//! resulting velocity field with 4th-order Runge-Kutta steps. Each combined step integrates one
//! `2h` step and two chained `h` steps, using their difference both to correct the position and
//! to adapt `h`.

mod field;

use super::{DiffusionStats, NewmanOptions, log_progress};
use cartogrid_core::error::{Error, Result, try_filled, try_matrix};
use cartogrid_core::grid::CartogramGrid;
use cartogrid_core::status::{StatusSink, check_cancelled};
use field::{DensityField, SLOTS};
use geo::Coord;

/// Diffusion time used to scale progress reports.
const EXPECTED_TIME: f64 = 1e8;

/// Once `k_min² · t` exceeds this, every non-constant mode has underflowed to zero.
const FULL_DECAY: f64 = 746.0;

pub fn compute(
    grid: &mut CartogramGrid,
    options: &NewmanOptions,
    status: &dyn StatusSink,
) -> Result<DiffusionStats> {
    validate(options)?;
    let (xsize, ysize) = grid.cell_count();
    let envelope = grid.envelope();
    let (min, max) = (envelope.min(), envelope.max());

    let mut rho = try_matrix(xsize, ysize, 0.0, "the diffusion density array")?;
    grid.fill_regular_density_grid(&mut rho, min.x, max.x, min.y, max.y);
    let mut field = DensityField::new(rho)?;

    let (cell_x, cell_y) = grid.cell_size();
    let nodes = grid.size_x() * grid.size_y();
    let mut px = try_filled(nodes, 0.0, "the tracer positions")?;
    let mut py = try_filled(nodes, 0.0, "the tracer positions")?;
    for j in 0..grid.size_y() {
        for i in 0..grid.size_x() {
            let n = grid.node(i, j);
            let k = j * grid.size_x() + i;
            px[k] = (n.x - min.x) / cell_x;
            py[k] = (n.y - min.y) / cell_y;
        }
    }

    let mut tracers = Tracers {
        x: px,
        y: py,
        xmax: xsize as f64,
        ymax: ysize as f64,
    };

    let t0 = 0.5 * options.blur * options.blur;
    let mut t = t0;
    let mut h = options.initial_step;
    let mut slot = 0;
    field.compute_snapshot(t, slot);

    let mut stats = DiffusionStats::default();
    let full_decay_time = FULL_DECAY / field.min_wave2();

    loop {
        check_cancelled(status)?;
        if stats.steps >= options.max_steps {
            tracing::warn!(steps = stats.steps, t, "newman integration hit the step limit");
            return Err(Error::NonConvergence {
                phase: "newman diffusion",
                iterations: stats.steps,
            });
        }

        let step = tracers.two_steps(&mut field, t, h, slot);
        t += 2.0 * h;
        slot = step.next_slot;
        stats.steps += 1;
        stats.max_error = stats.max_error.max(step.error);

        let ratio = (2.0 * options.target_error / step.error).powf(0.2);
        h *= ratio.min(options.max_ratio);

        status.on_progress(
            log_progress(t, options.initial_step, EXPECTED_TIME),
            "Computing the cartogram",
            &format!("t = {t:.3e}, max displacement {:.3e}", step.displacement),
        );

        if step.displacement <= 0.0 || t - t0 > full_decay_time {
            break;
        }
    }

    stats.final_time = t;
    for j in 0..grid.size_y() {
        for i in 0..grid.size_x() {
            let k = j * grid.size_x() + i;
            grid.set_node(
                i,
                j,
                Coord {
                    x: min.x + tracers.x[k] * cell_x,
                    y: min.y + tracers.y[k] * cell_y,
                },
            );
        }
    }
    grid.update_current_density();

    tracing::info!(
        steps = stats.steps,
        final_time = stats.final_time,
        max_error = stats.max_error,
        "newman diffusion converged"
    );
    status.on_progress(1000, "Computing the cartogram", "");
    Ok(stats)
}

fn validate(options: &NewmanOptions) -> Result<()> {
    let positive = |name: &'static str, v: f64| {
        if v.is_finite() && v > 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidParameter {
                name,
                message: format!("must be positive and finite, got {v}"),
            })
        }
    };
    positive("initial_step", options.initial_step)?;
    positive("target_error", options.target_error)?;
    positive("max_ratio", options.max_ratio)?;
    if !(options.blur.is_finite() && options.blur >= 0.0) {
        return Err(Error::InvalidParameter {
            name: "blur",
            message: format!("must be non-negative, got {}", options.blur),
        });
    }
    Ok(())
}

/// Tracer positions in grid index space, one per grid node.
struct Tracers {
    x: Vec<f64>,
    y: Vec<f64>,
    xmax: f64,
    ymax: f64,
}

struct StepOutcome {
    error: f64,
    displacement: f64,
    next_slot: usize,
}

impl Tracers {
    /// Advances every tracer from `t` to `t + 2h`; `s0` holds the density at `t`.
    fn two_steps(&mut self, field: &mut DensityField, t: f64, h: f64, s0: usize) -> StepOutcome {
        let s1 = (s0 + 1) % SLOTS;
        let s2 = (s0 + 2) % SLOTS;
        let s3 = (s0 + 3) % SLOTS;
        let s4 = (s0 + 4) % SLOTS;
        field.compute_snapshot(t + 0.5 * h, s1);
        field.compute_snapshot(t + h, s2);
        field.compute_snapshot(t + 1.5 * h, s3);
        field.compute_snapshot(t + 2.0 * h, s4);

        let field = &*field;
        let mut esq_max: f64 = 0.0;
        let mut drsq_max: f64 = 0.0;

        for p in 0..self.x.len() {
            let (rx1, ry1) = (self.x[p], self.y[p]);

            // one big step of 2h
            let (v1x, v1y) = field.velocity(rx1, ry1, s0);
            let (k1x, k1y) = (2.0 * h * v1x, 2.0 * h * v1y);
            let (vx, vy) = field.velocity(rx1 + 0.5 * k1x, ry1 + 0.5 * k1y, s2);
            let (k2x, k2y) = (2.0 * h * vx, 2.0 * h * vy);
            let (vx, vy) = field.velocity(rx1 + 0.5 * k2x, ry1 + 0.5 * k2y, s2);
            let (k3x, k3y) = (2.0 * h * vx, 2.0 * h * vy);
            let (vx, vy) = field.velocity(rx1 + k3x, ry1 + k3y, s4);
            let (k4x, k4y) = (2.0 * h * vx, 2.0 * h * vy);
            let dx12 = (k1x + k4x + 2.0 * (k2x + k3x)) / 6.0;
            let dy12 = (k1y + k4y + 2.0 * (k2y + k3y)) / 6.0;

            // first small step reuses the initial velocity
            let (k1x, k1y) = (h * v1x, h * v1y);
            let (vx, vy) = field.velocity(rx1 + 0.5 * k1x, ry1 + 0.5 * k1y, s1);
            let (k2x, k2y) = (h * vx, h * vy);
            let (vx, vy) = field.velocity(rx1 + 0.5 * k2x, ry1 + 0.5 * k2y, s1);
            let (k3x, k3y) = (h * vx, h * vy);
            let (vx, vy) = field.velocity(rx1 + k3x, ry1 + k3y, s2);
            let (k4x, k4y) = (h * vx, h * vy);
            let dx1 = (k1x + k4x + 2.0 * (k2x + k3x)) / 6.0;
            let dy1 = (k1y + k4y + 2.0 * (k2y + k3y)) / 6.0;

            // second small step
            let (rx2, ry2) = (rx1 + dx1, ry1 + dy1);
            let (vx, vy) = field.velocity(rx2, ry2, s2);
            let (k1x, k1y) = (h * vx, h * vy);
            let (vx, vy) = field.velocity(rx2 + 0.5 * k1x, ry2 + 0.5 * k1y, s3);
            let (k2x, k2y) = (h * vx, h * vy);
            let (vx, vy) = field.velocity(rx2 + 0.5 * k2x, ry2 + 0.5 * k2y, s3);
            let (k3x, k3y) = (h * vx, h * vy);
            let (vx, vy) = field.velocity(rx2 + k3x, ry2 + k3y, s4);
            let (k4x, k4y) = (h * vx, h * vy);
            let dx2 = (k1x + k4x + 2.0 * (k2x + k3x)) / 6.0;
            let dy2 = (k1y + k4y + 2.0 * (k2y + k3y)) / 6.0;

            // Richardson estimate of the local error, also used as a correction
            let ex = (dx1 + dx2 - dx12) / 15.0;
            let ey = (dy1 + dy2 - dy12) / 15.0;
            esq_max = esq_max.max(ex * ex + ey * ey);

            let nx = (rx1 + dx1 + dx2 + ex).clamp(0.0, self.xmax);
            let ny = (ry1 + dy1 + dy2 + ey).clamp(0.0, self.ymax);
            let (ddx, ddy) = (nx - rx1, ny - ry1);
            drsq_max = drsq_max.max(ddx * ddx + ddy * ddy);
            self.x[p] = nx;
            self.y[p] = ny;
        }

        StepOutcome {
            error: esq_max.sqrt(),
            displacement: drsq_max.sqrt(),
            next_slot: s4,
        }
    }
}

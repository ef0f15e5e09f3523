use crate::algo::bilinear;
use nalgebra::{DMatrix, Matrix2, Vector2};

/// Newton iterations stop once the update is shorter than this (lattice cells).
const TOLERANCE: f64 = 1e-10;

/// Velocity components on the lattice nodes.
pub(super) struct Velocities {
    pub(super) vx: DMatrix<f64>,
    pub(super) vy: DMatrix<f64>,
}

/// Interpolated velocity and its Jacobian at a point.
pub(super) struct Sample {
    pub(super) value: (f64, f64),
    jacobian: Matrix2<f64>,
}

impl Velocities {
    pub(super) fn sample(&self, x: f64, y: f64) -> Sample {
        let (sx, sy) = self.vx.shape();
        let ia = x.floor().clamp(0.0, (sx - 2) as f64);
        let ib = y.floor().clamp(0.0, (sy - 2) as f64);
        let (dx, dy) = (x - ia, y - ib);
        let (ia, ib) = (ia as usize, ib as usize);

        let corners = |m: &DMatrix<f64>| {
            (
                m[(ia, ib)],
                m[(ia + 1, ib)],
                m[(ia, ib + 1)],
                m[(ia + 1, ib + 1)],
            )
        };
        let (x00, x10, x01, x11) = corners(&self.vx);
        let (y00, y10, y01, y11) = corners(&self.vy);

        Sample {
            value: (
                bilinear(dx, dy, x00, x10, x01, x11),
                bilinear(dx, dy, y00, y10, y01, y11),
            ),
            jacobian: Matrix2::new(
                (1.0 - dy) * (x10 - x00) + dy * (x11 - x01),
                (1.0 - dx) * (x01 - x00) + dx * (x11 - x10),
                (1.0 - dy) * (y10 - y00) + dy * (y11 - y01),
                (1.0 - dx) * (y01 - y00) + dx * (y11 - y10),
            ),
        }
    }
}

pub(super) struct Step {
    pub(super) x: f64,
    pub(super) y: f64,
    /// Length of the last Newton update.
    pub(super) residual: f64,
}

/// Solves `r = r0 + h/2 · (v0 + v(r))` for `r` by Newton iteration, keeping `r` inside
/// `[0, bound.0] × [0, bound.1]`.
///
/// Returns `None` when the iteration does not settle within `max_iterations` or the Jacobian is
/// singular; the caller retries with a smaller step.
pub(super) fn implicit_step(
    r0: (f64, f64),
    v0: (f64, f64),
    next: &Velocities,
    h: f64,
    bound: (f64, f64),
    max_iterations: usize,
) -> Option<Step> {
    let start = Vector2::new(r0.0, r0.1);
    let v0 = Vector2::new(v0.0, v0.1);
    let clamp = |r: Vector2<f64>| Vector2::new(r.x.clamp(0.0, bound.0), r.y.clamp(0.0, bound.1));
    let mut r = clamp(start + v0 * h);

    for _ in 0..max_iterations {
        let s = next.sample(r.x, r.y);
        let v = Vector2::new(s.value.0, s.value.1);
        let f = r - start - (v0 + v) * (0.5 * h);
        let j = Matrix2::identity() - s.jacobian * (0.5 * h);
        let delta = j.try_inverse()? * f;
        if !(delta.x.is_finite() && delta.y.is_finite()) {
            return None;
        }
        r = clamp(r - delta);
        let residual = delta.norm();
        if residual < TOLERANCE {
            return Some(Step {
                x: r.x,
                y: r.y,
                residual,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_flow(n: usize, vx: f64, vy: f64) -> Velocities {
        Velocities {
            vx: DMatrix::from_element(n + 1, n + 1, vx),
            vy: DMatrix::from_element(n + 1, n + 1, vy),
        }
    }

    #[test]
    fn constant_flow_is_integrated_exactly() {
        let v = uniform_flow(8, 0.5, -0.25);
        let step = implicit_step((2.0, 4.0), (0.5, -0.25), &v, 2.0, (8.0, 8.0), 50).unwrap();
        assert!((step.x - 3.0).abs() < 1e-12);
        assert!((step.y - 3.5).abs() < 1e-12);
    }

    #[test]
    fn linear_flow_matches_the_trapezoidal_rule() {
        // v = (x, 0): the trapezoidal rule gives x1 = x0 (1 + h/2) / (1 - h/2)
        let n = 16;
        let v = Velocities {
            vx: DMatrix::from_fn(n + 1, n + 1, |i, _| i as f64),
            vy: DMatrix::zeros(n + 1, n + 1),
        };
        let h = 0.1;
        let step = implicit_step((2.0, 3.0), (2.0, 0.0), &v, h, (n as f64, n as f64), 50).unwrap();
        let expected = 2.0 * (1.0 + h / 2.0) / (1.0 - h / 2.0);
        assert!((step.x - expected).abs() < 1e-9);
        assert!((step.y - 3.0).abs() < 1e-12);
    }

    #[test]
    fn jacobian_follows_the_bilinear_gradient() {
        let n = 4;
        let v = Velocities {
            vx: DMatrix::from_fn(n + 1, n + 1, |i, j| 2.0 * i as f64 + j as f64),
            vy: DMatrix::from_fn(n + 1, n + 1, |_, j| -3.0 * j as f64),
        };
        let s = v.sample(1.5, 2.25);
        assert!((s.value.0 - 5.25).abs() < 1e-12);
        assert_eq!(s.jacobian, Matrix2::new(2.0, 1.0, 0.0, -3.0));
    }
}

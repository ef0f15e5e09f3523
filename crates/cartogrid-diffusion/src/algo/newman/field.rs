//! Density snapshots and the flow velocity derived from them.

use crate::algo::bilinear;
use cartogrid_core::error::{Result, try_matrix};
use cartogrid_spectral::{Direction, staggered_cos_cos_transform};
use nalgebra::DMatrix;
use std::f64::consts::PI;

/// Number of density snapshots kept alive during a combined step.
pub(crate) const SLOTS: usize = 5;

/// Spectrum of the initial density and the rotating real-space snapshots computed from it.
pub(crate) struct DensityField {
    spectrum: DMatrix<f64>,
    snapshots: Vec<DMatrix<f64>>,
    scratch: DMatrix<f64>,
    kx2: Vec<f64>,
    ky2: Vec<f64>,
}

impl DensityField {
    /// Transforms `rho` (one value per cell) to the cosine basis.
    pub(crate) fn new(mut rho: DMatrix<f64>) -> Result<Self> {
        let (xsize, ysize) = rho.shape();
        staggered_cos_cos_transform(&mut rho, Direction::Forward);
        let mut snapshots = Vec::with_capacity(SLOTS);
        for _ in 0..SLOTS {
            snapshots.push(try_matrix(xsize, ysize, 0.0, "density snapshots")?);
        }
        let wave2 = |n: usize| -> Vec<f64> {
            (0..n)
                .map(|k| {
                    let w = PI * k as f64 / n as f64;
                    w * w
                })
                .collect()
        };
        Ok(Self {
            spectrum: rho,
            snapshots,
            scratch: try_matrix(xsize, ysize, 0.0, "density snapshots")?,
            kx2: wave2(xsize),
            ky2: wave2(ysize),
        })
    }

    pub(crate) fn size(&self) -> (usize, usize) {
        self.spectrum.shape()
    }

    /// Smallest non-zero squared wave number.
    pub(crate) fn min_wave2(&self) -> f64 {
        let (xsize, ysize) = self.size();
        let w = PI / xsize.max(ysize) as f64;
        w * w
    }

    /// Fills `slot` with the density at diffusion time `t`.
    pub(crate) fn compute_snapshot(&mut self, t: f64, slot: usize) {
        let (xsize, ysize) = self.size();
        for iy in 0..ysize {
            let decay_y = (-self.ky2[iy] * t).exp();
            for ix in 0..xsize {
                self.scratch[(ix, iy)] =
                    (-self.kx2[ix] * t).exp() * decay_y * self.spectrum[(ix, iy)];
            }
        }
        staggered_cos_cos_transform(&mut self.scratch, Direction::Inverse);
        std::mem::swap(&mut self.snapshots[slot], &mut self.scratch);
    }

    /// Flow velocity at index-space position `(rx, ry)` under snapshot `slot`.
    ///
    /// Node velocities `-∇ρ / ρ` are formed from the four cells around each of the four nodes of
    /// the cell containing the point, then interpolated bilinearly. Indices clamp at the border,
    /// which zeroes the normal component there.
    pub(crate) fn velocity(&self, rx: f64, ry: f64, slot: usize) -> (f64, f64) {
        let rho = &self.snapshots[slot];
        let (xsize, ysize) = rho.shape();

        let ix = (rx.floor().max(0.0) as usize).min(xsize - 1);
        let iy = (ry.floor().max(0.0) as usize).min(ysize - 1);
        let ixm1 = ix.saturating_sub(1);
        let ixp1 = (ix + 1).min(xsize - 1);
        let iym1 = iy.saturating_sub(1);
        let iyp1 = (iy + 1).min(ysize - 1);

        let r00 = rho[(ixm1, iym1)];
        let r10 = rho[(ix, iym1)];
        let r20 = rho[(ixp1, iym1)];
        let r01 = rho[(ixm1, iy)];
        let r11 = rho[(ix, iy)];
        let r21 = rho[(ixp1, iy)];
        let r02 = rho[(ixm1, iyp1)];
        let r12 = rho[(ix, iyp1)];
        let r22 = rho[(ixp1, iyp1)];

        let node = |a: f64, b: f64, c: f64, d: f64| {
            // a b c d: lower-left, lower-right, upper-left, upper-right cells
            let mid = a + b + c + d;
            (-2.0 * (b - a + d - c) / mid, -2.0 * (c - a + d - b) / mid)
        };
        let (vx00, vy00) = node(r00, r10, r01, r11);
        let (vx10, vy10) = node(r10, r20, r11, r21);
        let (vx01, vy01) = node(r01, r11, r02, r12);
        let (vx11, vy11) = node(r11, r21, r12, r22);

        let dx = rx - ix as f64;
        let dy = ry - iy as f64;
        (
            bilinear(dx, dy, vx00, vx10, vx01, vx11),
            bilinear(dx, dy, vy00, vy10, vy01, vy11),
        )
    }

    #[cfg(test)]
    pub(crate) fn snapshot(&self, slot: usize) -> &DMatrix<f64> {
        &self.snapshots[slot]
    }
}

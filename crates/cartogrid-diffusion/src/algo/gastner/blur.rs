//! Gaussian smoothing of a density lattice by FFT convolution.

use cartogrid_core::error::{Result, try_filled};
use cartogrid_spectral::{inverse_real_fourier_3d, real_fourier_3d};
use nalgebra::DMatrix;
use statrs::function::erf::erf;

/// Mass of a unit Gaussian of width `sigma` falling in the unit bin centred on `d`.
fn bin_weights(sigma: f64, radius: usize) -> Vec<f64> {
    let s = sigma * std::f64::consts::SQRT_2;
    (0..=radius)
        .map(|d| {
            let d = d as f64;
            0.5 * (erf((d + 0.5) / s) - erf((d - 0.5) / s))
        })
        .collect()
}

/// Blurs `rho` with a Gaussian of width `sigma` lattice cells.
///
/// The convolution is normalized by the convolved support so the borders do not lose mass to
/// the zero padding.
pub(crate) fn gaussian_blur(rho: &DMatrix<f64>, sigma: f64) -> Result<DMatrix<f64>> {
    let (nx, ny) = rho.shape();
    let px = (2 * nx).next_power_of_two();
    let py = (2 * ny).next_power_of_two();
    let dims = [1, px, py];
    let at = |i: usize, j: usize| i * py + j;

    let rx = ((4.0 * sigma).ceil() as usize).clamp(1, nx);
    let ry = ((4.0 * sigma).ceil() as usize).clamp(1, ny);
    let wx = bin_weights(sigma, rx);
    let wy = bin_weights(sigma, ry);

    let mut kernel = try_filled(px * py, 0.0, "the blur kernel")?;
    for (di, &a) in wx.iter().enumerate() {
        for (dj, &b) in wy.iter().enumerate() {
            let w = a * b;
            for i in [di, (px - di) % px] {
                for j in [dj, (py - dj) % py] {
                    kernel[at(i, j)] = w;
                }
            }
        }
    }

    let mut data = try_filled(px * py, 0.0, "the blur buffer")?;
    let mut mask = try_filled(px * py, 0.0, "the blur buffer")?;
    for j in 0..ny {
        for i in 0..nx {
            data[at(i, j)] = rho[(i, j)];
            mask[at(i, j)] = 1.0;
        }
    }

    let kernel_hat = real_fourier_3d(&kernel, dims);
    let convolve = |values: &[f64]| -> Vec<f64> {
        let mut hat = real_fourier_3d(values, dims);
        for (v, k) in hat.iter_mut().zip(&kernel_hat) {
            *v *= *k;
        }
        inverse_real_fourier_3d(&hat, dims)
    };
    let blurred = convolve(&data);
    let support = convolve(&mask);

    Ok(DMatrix::from_fn(nx, ny, |i, j| {
        blurred[at(i, j)] / support[at(i, j)]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_weights_sum_to_the_gaussian_mass() {
        let w = bin_weights(1.0, 6);
        let total = w[0] + 2.0 * w[1..].iter().sum::<f64>();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(w.windows(2).all(|p| p[0] > p[1]));
    }

    #[test]
    fn blur_keeps_a_constant_field() {
        let rho = DMatrix::from_element(9, 9, 5.0);
        let out = gaussian_blur(&rho, 1.5).unwrap();
        for v in out.iter() {
            assert!((v - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn blur_spreads_a_spike_and_fills_negative_holes() {
        let mut rho = DMatrix::from_element(9, 9, 1.0);
        rho[(4, 4)] = 50.0;
        rho[(1, 1)] = -0.5;
        let out = gaussian_blur(&rho, 1.0).unwrap();
        assert!(out[(4, 4)] < 50.0);
        assert!(out[(5, 4)] > 1.0);
        assert!(out.iter().all(|v| *v > 0.0));
    }
}

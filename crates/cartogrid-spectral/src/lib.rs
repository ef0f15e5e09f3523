#![forbid(unsafe_code)]

//! Spectral building blocks for density diffusion.
//!
//! The diffusion solvers never need a general-purpose FFT library: they need cosine and sine
//! transforms with the normalization conventions of the classic heat-equation cartogram codes.
//! This crate provides exactly those, on top of a small complex FFT.
//!
//! Conventions:
//! - [`Direction::Forward`] transforms are unnormalized.
//! - [`cosft`] / [`sinft`] operate on `n + 1` samples (nodes `0..=n`); their inverse is the same
//!   sum scaled by `2 / n`.
//! - [`staggered_cosft`] operates on `n` cell-centred samples; its inverse restores the input.

mod fft;
mod transform2d;
mod trig;

pub use fft::{fourier_1d, fourier_nd, inverse_real_fourier_3d, real_fourier_3d};
pub use nalgebra::Complex;
pub use transform2d::{
    cos_cos_transform, cos_sin_transform, sin_cos_transform, staggered_cos_cos_transform,
};
pub use trig::{cosft, sinft, staggered_cosft};

/// Direction of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Inverse,
}

impl Direction {
    /// Sign of the exponent used by the complex transform (`-1` forward, `+1` inverse).
    pub fn exponent_sign(self) -> f64 {
        match self {
            Direction::Forward => -1.0,
            Direction::Inverse => 1.0,
        }
    }
}

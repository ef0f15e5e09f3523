use crate::Direction;
use crate::fft::fourier_1d;
use nalgebra::Complex;
use std::f64::consts::PI;

/// Cosine transform of the `n + 1` node samples `z[0..=n]`.
///
/// ```text
/// Z_k = ½ (z_0 + (-1)^k z_n) + Σ_{j=1}^{n-1} z_j cos(π j k / n)
/// ```
///
/// The forward transform is unnormalized; the inverse evaluates the same sum and scales it by
/// `2 / n`, so `Inverse ∘ Forward` is the identity. Computed through a `2n` complex FFT of the
/// even extension, which is radix-2 whenever `n` is a power of two.
pub fn cosft(z: &mut [f64], direction: Direction) {
    let Some(n) = z.len().checked_sub(1).filter(|&n| n > 0) else {
        return;
    };

    let mut buf = vec![Complex::new(0.0, 0.0); 2 * n];
    for (j, &v) in z.iter().enumerate() {
        buf[j] = Complex::new(v, 0.0);
    }
    for j in 1..n {
        buf[2 * n - j] = Complex::new(z[j], 0.0);
    }
    fourier_1d(&mut buf, Direction::Forward);

    let scale = end_scale(n, direction);
    for (k, v) in z.iter_mut().enumerate() {
        *v = buf[k].re * scale;
    }
}

/// Sine transform of the `n + 1` node samples `z[0..=n]`.
///
/// ```text
/// Z_k = Σ_{j=1}^{n-1} z_j sin(π j k / n)
/// ```
///
/// `z[0]` and `z[n]` are ignored on input and zero on output. Normalization follows [`cosft`].
pub fn sinft(z: &mut [f64], direction: Direction) {
    let Some(n) = z.len().checked_sub(1).filter(|&n| n > 0) else {
        return;
    };

    let mut buf = vec![Complex::new(0.0, 0.0); 2 * n];
    for j in 1..n {
        buf[j] = Complex::new(z[j], 0.0);
        buf[2 * n - j] = Complex::new(-z[j], 0.0);
    }
    fourier_1d(&mut buf, Direction::Forward);

    // The odd extension transforms to -2i Σ z_j sin(πjk/n).
    let scale = end_scale(n, direction);
    z[0] = 0.0;
    z[n] = 0.0;
    for k in 1..n {
        z[k] = -buf[k].im * scale;
    }
}

/// Cosine transform of `n` cell-centred samples (sample `j` sits at `j + ½`).
///
/// Forward: `X_k = Σ_j x_j cos(π k (j + ½) / n)`.
/// Inverse: `x_j = (X_0 + 2 Σ_{k≥1} X_k cos(π k (j + ½) / n)) / n`, so the pair round-trips.
///
/// Works for any `n`; non-power-of-two lengths fall back to the chirp-z FFT.
pub fn staggered_cosft(z: &mut [f64], direction: Direction) {
    let n = z.len();
    if n == 0 {
        return;
    }

    let mut buf = vec![Complex::new(0.0, 0.0); 2 * n];
    match direction {
        Direction::Forward => {
            for (j, &v) in z.iter().enumerate() {
                buf[j] = Complex::new(v, 0.0);
                buf[2 * n - 1 - j] = Complex::new(v, 0.0);
            }
            fourier_1d(&mut buf, Direction::Forward);
            for (k, v) in z.iter_mut().enumerate() {
                let shift = Complex::from_polar(1.0, -PI * k as f64 / (2 * n) as f64);
                *v = 0.5 * (shift * buf[k]).re;
            }
        }
        Direction::Inverse => {
            for (k, &v) in z.iter().enumerate() {
                let c = Complex::from_polar(v, PI * k as f64 / (2 * n) as f64);
                buf[k] = c;
                if k > 0 {
                    buf[2 * n - k] = c.conj();
                }
            }
            fourier_1d(&mut buf, Direction::Inverse);
            let scale = 1.0 / n as f64;
            for (j, v) in z.iter_mut().enumerate() {
                *v = buf[j].re * scale;
            }
        }
    }
}

fn end_scale(n: usize, direction: Direction) -> f64 {
    // The FFT of the symmetric extension carries a factor of two.
    match direction {
        Direction::Forward => 0.5,
        Direction::Inverse => 1.0 / n as f64,
    }
}

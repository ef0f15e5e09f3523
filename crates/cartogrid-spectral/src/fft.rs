use crate::Direction;
use nalgebra::Complex;
use std::f64::consts::PI;

const ZERO: Complex<f64> = Complex { re: 0.0, im: 0.0 };

/// In-place unnormalized discrete Fourier transform.
///
/// `Forward` computes `X_k = Σ x_j exp(-2πi jk/n)`, `Inverse` uses the positive exponent. Applying
/// both yields the input scaled by `n`. Powers of two use an iterative radix-2 kernel, every other
/// length goes through Bluestein's chirp-z reformulation (which itself runs radix-2 internally).
pub fn fourier_1d(data: &mut [Complex<f64>], direction: Direction) {
    let n = data.len();
    if n <= 1 {
        return;
    }
    if n.is_power_of_two() {
        radix2(data, direction);
    } else {
        bluestein(data, direction);
    }
}

/// In-place N-dimensional transform of row-major data (last dimension varies fastest).
///
/// # Panics
///
/// Panics if `data.len()` differs from the product of `dims`.
pub fn fourier_nd(data: &mut [Complex<f64>], dims: &[usize], direction: Direction) {
    let total: usize = dims.iter().product();
    assert_eq!(
        data.len(),
        total,
        "fourier_nd: data length does not match dimensions {dims:?}"
    );

    let mut stride = 1usize;
    let mut line: Vec<Complex<f64>> = Vec::new();
    for &len in dims.iter().rev() {
        if len > 1 {
            let block = stride * len;
            for outer in (0..total).step_by(block) {
                for inner in 0..stride {
                    let base = outer + inner;
                    line.clear();
                    line.extend((0..len).map(|k| data[base + k * stride]));
                    fourier_1d(&mut line, direction);
                    for (k, v) in line.iter().enumerate() {
                        data[base + k * stride] = *v;
                    }
                }
            }
        }
        stride *= len;
    }
}

/// Forward transform of a real 3D array (row-major, `dims = [n1, n2, n3]`).
///
/// Returns the full complex spectrum. Use `n1 = 1` for planar data.
pub fn real_fourier_3d(data: &[f64], dims: [usize; 3]) -> Vec<Complex<f64>> {
    let mut spectrum: Vec<Complex<f64>> = data.iter().map(|&v| Complex::new(v, 0.0)).collect();
    fourier_nd(&mut spectrum, &dims, Direction::Forward);
    spectrum
}

/// Inverse of [`real_fourier_3d`], normalized so that the round trip restores the input.
///
/// Imaginary residue (non-Hermitian input, rounding) is discarded.
pub fn inverse_real_fourier_3d(spectrum: &[Complex<f64>], dims: [usize; 3]) -> Vec<f64> {
    let mut data = spectrum.to_vec();
    fourier_nd(&mut data, &dims, Direction::Inverse);
    let scale = 1.0 / data.len().max(1) as f64;
    data.into_iter().map(|c| c.re * scale).collect()
}

fn radix2(data: &mut [Complex<f64>], direction: Direction) {
    let n = data.len();
    debug_assert!(n.is_power_of_two());

    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            data.swap(i, j);
        }
    }

    let sign = direction.exponent_sign();
    let mut twiddles: Vec<Complex<f64>> = Vec::with_capacity(n / 2);
    let mut len = 2usize;
    while len <= n {
        let half = len / 2;
        let theta = sign * 2.0 * PI / len as f64;
        twiddles.clear();
        // Direct evaluation keeps the twiddles accurate for long transforms.
        twiddles.extend((0..half).map(|k| Complex::from_polar(1.0, theta * k as f64)));
        for start in (0..n).step_by(len) {
            for k in 0..half {
                let u = data[start + k];
                let v = data[start + k + half] * twiddles[k];
                data[start + k] = u + v;
                data[start + k + half] = u - v;
            }
        }
        len <<= 1;
    }
}

fn bluestein(data: &mut [Complex<f64>], direction: Direction) {
    let n = data.len();
    let m = (2 * n - 1).next_power_of_two();
    let sign = direction.exponent_sign();
    let period = 2 * n as u64;

    // exp(±iπ k²/n) is periodic in k² with period 2n.
    let chirp: Vec<Complex<f64>> = (0..n as u64)
        .map(|k| {
            let k2 = (k * k) % period;
            Complex::from_polar(1.0, sign * PI * k2 as f64 / n as f64)
        })
        .collect();

    let mut a = vec![ZERO; m];
    for k in 0..n {
        a[k] = data[k] * chirp[k];
    }

    let mut b = vec![ZERO; m];
    b[0] = chirp[0].conj();
    for k in 1..n {
        let c = chirp[k].conj();
        b[k] = c;
        b[m - k] = c;
    }

    radix2(&mut a, Direction::Forward);
    radix2(&mut b, Direction::Forward);
    for (x, y) in a.iter_mut().zip(&b) {
        *x *= *y;
    }
    radix2(&mut a, Direction::Inverse);

    let scale = 1.0 / m as f64;
    for k in 0..n {
        data[k] = chirp[k] * a[k] * scale;
    }
}

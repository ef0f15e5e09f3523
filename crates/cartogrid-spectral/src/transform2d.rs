use crate::Direction;
use crate::trig::{cosft, sinft, staggered_cosft};
use nalgebra::DMatrix;

// Matrices are indexed `(i, j)` with `i` along x and `j` along y.

/// Cosine transform along x, then cosine transform along y.
pub fn cos_cos_transform(m: &mut DMatrix<f64>, x: Direction, y: Direction) {
    along_x(m, |line| cosft(line, x));
    along_y(m, |line| cosft(line, y));
}

/// Sine transform along x, cosine transform along y (the basis of the x velocity component).
pub fn sin_cos_transform(m: &mut DMatrix<f64>, x: Direction, y: Direction) {
    along_x(m, |line| sinft(line, x));
    along_y(m, |line| cosft(line, y));
}

/// Cosine transform along x, sine transform along y (the basis of the y velocity component).
pub fn cos_sin_transform(m: &mut DMatrix<f64>, x: Direction, y: Direction) {
    along_x(m, |line| cosft(line, x));
    along_y(m, |line| sinft(line, y));
}

/// Cell-centred cosine transform along both axes.
pub fn staggered_cos_cos_transform(m: &mut DMatrix<f64>, direction: Direction) {
    along_x(m, |line| staggered_cosft(line, direction));
    along_y(m, |line| staggered_cosft(line, direction));
}

fn along_x(m: &mut DMatrix<f64>, mut f: impl FnMut(&mut [f64])) {
    let (nx, ny) = m.shape();
    let mut line = vec![0.0; nx];
    for j in 0..ny {
        for (i, v) in line.iter_mut().enumerate() {
            *v = m[(i, j)];
        }
        f(&mut line);
        for (i, v) in line.iter().enumerate() {
            m[(i, j)] = *v;
        }
    }
}

fn along_y(m: &mut DMatrix<f64>, mut f: impl FnMut(&mut [f64])) {
    let (nx, ny) = m.shape();
    let mut line = vec![0.0; ny];
    for i in 0..nx {
        for (j, v) in line.iter_mut().enumerate() {
            *v = m[(i, j)];
        }
        f(&mut line);
        for (j, v) in line.iter().enumerate() {
            m[(i, j)] = *v;
        }
    }
}

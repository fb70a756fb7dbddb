//! 2D discrete Fourier transforms of square complex fields
//!
//! The transforms are unitary: both directions are scaled by `1/sqrt(n_rows n_cols)`
//! so the total energy of a field is preserved and a forward transform
//! followed by an inverse transform is the identity.

use nalgebra::{DMatrix, Scalar};
use rustfft::{num_complex::Complex64, FftDirection, FftPlanner};

/// Complex field sampled on a 2D grid
pub type Field = DMatrix<Complex64>;

fn fft_columns(field: &mut Field, planner: &mut FftPlanner<f64>, direction: FftDirection) {
    let n = field.nrows();
    let fft = planner.plan_fft(n, direction);
    // column major storage: every chunk of `n` samples is a column
    field
        .as_mut_slice()
        .chunks_exact_mut(n)
        .for_each(|column| fft.process(column));
}

fn transform(field: &Field, direction: FftDirection) -> Field {
    let mut planner = FftPlanner::new();
    let mut buffer = field.clone();
    fft_columns(&mut buffer, &mut planner, direction);
    let mut buffer = buffer.transpose();
    fft_columns(&mut buffer, &mut planner, direction);
    let mut buffer = buffer.transpose();
    let norm = ((buffer.nrows() * buffer.ncols()) as f64).sqrt().recip();
    buffer.iter_mut().for_each(|x| *x *= norm);
    buffer
}

/// Forward unitary 2D FFT
pub fn fft2(field: &Field) -> Field {
    transform(field, FftDirection::Forward)
}

/// Inverse unitary 2D FFT
pub fn ifft2(field: &Field) -> Field {
    transform(field, FftDirection::Inverse)
}

fn roll<T: Scalar>(data: &DMatrix<T>, shift_rows: usize, shift_cols: usize) -> DMatrix<T> {
    let (n_rows, n_cols) = data.shape();
    DMatrix::from_fn(n_rows, n_cols, |i, j| {
        data[(
            (i + n_rows - shift_rows) % n_rows,
            (j + n_cols - shift_cols) % n_cols,
        )]
            .clone()
    })
}

/// Moves the zero frequency sample from `[0,0]` to the center of the array
pub fn fftshift<T: Scalar>(data: &DMatrix<T>) -> DMatrix<T> {
    let (n_rows, n_cols) = data.shape();
    roll(data, n_rows / 2, n_cols / 2)
}

/// Moves the center of the array to `[0,0]`, inverse of [fftshift]
pub fn ifftshift<T: Scalar>(data: &DMatrix<T>) -> DMatrix<T> {
    let (n_rows, n_cols) = data.shape();
    roll(data, n_rows - n_rows / 2, n_cols - n_cols / 2)
}

/// Zero pads `data` into a `size x size` array, keeping it centered
///
/// The center sample `[n/2, n/2]` of `data` lands on `[size/2, size/2]`
pub fn pad_centered<T: Scalar + Default>(data: &DMatrix<T>, size: usize) -> DMatrix<T> {
    let (n_rows, n_cols) = data.shape();
    let (i0, j0) = (size / 2 - n_rows / 2, size / 2 - n_cols / 2);
    DMatrix::from_fn(size, size, |i, j| {
        if (i0..i0 + n_rows).contains(&i) && (j0..j0 + n_cols).contains(&j) {
            data[(i - i0, j - j0)].clone()
        } else {
            T::default()
        }
    })
}

/// Total energy of a field
pub fn energy(field: &Field) -> f64 {
    field.iter().map(|x| x.norm_sqr()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shifts() {
        let data = DMatrix::from_row_slice(1, 5, &[0, 1, 2, 3, 4]);
        assert_eq!(fftshift(&data).as_slice(), &[3, 4, 0, 1, 2]);
        assert_eq!(ifftshift(&data).as_slice(), &[2, 3, 4, 0, 1]);
        let data = DMatrix::from_fn(4, 4, |i, j| i * 4 + j);
        assert_eq!(ifftshift(&fftshift(&data)), data);
        assert_eq!(fftshift(&data)[(2, 2)], 0);
    }

    #[test]
    fn delta_transforms_to_constant() {
        let n = 8;
        let mut delta = Field::zeros(n, n);
        delta[(0, 0)] = Complex64::new(1., 0.);
        let spectrum = fft2(&delta);
        let expected = 1. / n as f64;
        assert!(spectrum
            .iter()
            .all(|x| (x.re - expected).abs() < 1e-12 && x.im.abs() < 1e-12));
        assert!((energy(&spectrum) - 1.).abs() < 1e-12);
    }

    #[test]
    fn round_trip() {
        let field = Field::from_fn(16, 16, |i, j| {
            Complex64::new((i as f64 * 0.3).sin(), (j as f64 * 0.7).cos())
        });
        let back = ifft2(&fft2(&field));
        assert!((back - &field).iter().all(|x| x.norm() < 1e-12));
    }

    #[test]
    fn padding() {
        let data = DMatrix::from_element(2, 2, 1f64);
        let padded = pad_centered(&data, 6);
        assert_eq!(padded.sum(), 4.);
        assert_eq!(padded[(2, 2)], 1.);
        assert_eq!(padded[(3, 3)], 1.);
        assert_eq!(padded[(4, 4)], 0.);
    }
}

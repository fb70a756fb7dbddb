//! Bicubic spline resampling
//!
//! A square 2D array sampled on a regular grid is interpolated with natural cubic splines,
//! first along the columns then along the rows, and evaluated on another regular grid.
//! Both grids are defined like `numpy.arange(start, end, step)`.

use nalgebra::DMatrix;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ResampleError {
    #[error("spline needs at least 2 nodes, found {0}")]
    TooFewNodes(usize),
    #[error("spline has {x} nodes but {y} values")]
    Length { x: usize, y: usize },
    #[error("spline nodes must be strictly increasing")]
    Unsorted,
    #[error("grid step must be positive, found {0}")]
    Step(f64),
    #[error("grid [{start},{end}) is empty")]
    EmptyGrid { start: f64, end: f64 },
    #[error("data shape {data:?} does not match the {grid}x{grid} input grid")]
    Shape { data: (usize, usize), grid: usize },
}
type Result<T> = std::result::Result<T, ResampleError>;

/// Regular 1D grid: `start + k * step` for `k` in `0..len`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    start: f64,
    step: f64,
    len: usize,
}
impl Grid {
    /// Creates the grid spanning `[start,end)` with increment `step`
    pub fn new(start: f64, end: f64, step: f64) -> Result<Self> {
        if !step.is_finite() || step <= 0f64 {
            return Err(ResampleError::Step(step));
        }
        // rounding noise must not add a sample at `end`
        let len = ((end - start) / step - 1e-9).ceil();
        if !len.is_finite() || len < 1f64 {
            return Err(ResampleError::EmptyGrid { start, end });
        }
        Ok(Self {
            start,
            step,
            len: len as usize,
        })
    }
    /// Creates the grid spanning `[-hfov,hfov)` with increment `step`
    pub fn symmetric(hfov: f64, step: f64) -> Result<Self> {
        Self::new(-hfov, hfov, step)
    }
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
    pub fn points(&self) -> Vec<f64> {
        (0..self.len)
            .map(|k| self.start + k as f64 * self.step)
            .collect()
    }
}

/// Natural cubic spline through a set of nodes
///
/// Each segment `i` is the polynomial `a + b(x-xi) + c(x-xi)^2 + d(x-xi)^3`
#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    coeffs: Vec<[f64; 4]>,
}
impl CubicSpline {
    /// Fits the spline through `(x,y)`, `x` must be strictly increasing
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self> {
        let n = x.len();
        if n != y.len() {
            return Err(ResampleError::Length { x: n, y: y.len() });
        }
        if n < 2 {
            return Err(ResampleError::TooFewNodes(n));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ResampleError::Unsorted);
        }

        let h: Vec<f64> = x.windows(2).map(|w| w[1] - w[0]).collect();
        let mut alpha = vec![0f64; n];
        for i in 1..n - 1 {
            alpha[i] = 3. / h[i] * (y[i + 1] - y[i]) - 3. / h[i - 1] * (y[i] - y[i - 1]);
        }

        // tridiagonal system for the second order coefficients (Thomas algorithm)
        let mut l = vec![1f64; n];
        let mut mu = vec![0f64; n];
        let mut z = vec![0f64; n];
        for i in 1..n - 1 {
            l[i] = 2. * (x[i + 1] - x[i - 1]) - h[i - 1] * mu[i - 1];
            mu[i] = h[i] / l[i];
            z[i] = (alpha[i] - h[i - 1] * z[i - 1]) / l[i];
        }

        let mut c = vec![0f64; n];
        let mut coeffs = vec![[0f64; 4]; n - 1];
        for j in (0..n - 1).rev() {
            c[j] = z[j] - mu[j] * c[j + 1];
            let b = (y[j + 1] - y[j]) / h[j] - h[j] * (c[j + 1] + 2. * c[j]) / 3.;
            let d = (c[j + 1] - c[j]) / (3. * h[j]);
            coeffs[j] = [y[j], b, c[j], d];
        }

        Ok(Self {
            x: x.to_vec(),
            coeffs,
        })
    }
    /// Finds the segment index and the offset within the segment of `x`
    ///
    /// Returns `None` if `x` is outside the nodes range
    pub fn locate(nodes: &[f64], x: f64) -> Option<(usize, f64)> {
        let (first, last) = (*nodes.first()?, *nodes.last()?);
        if x < first || x > last || nodes.len() < 2 {
            return None;
        }
        let i = nodes
            .partition_point(|&xi| xi <= x)
            .saturating_sub(1)
            .min(nodes.len() - 2);
        Some((i, x - nodes[i]))
    }
    /// Evaluates the spline at a location given by [CubicSpline::locate]
    pub fn evaluate_at(&self, (i, dx): (usize, f64)) -> f64 {
        let [a, b, c, d] = self.coeffs[i];
        a + dx * (b + dx * (c + dx * d))
    }
    /// Evaluates the spline at `x`, returns 0 outside the nodes range
    pub fn evaluate(&self, x: f64) -> f64 {
        Self::locate(&self.x, x).map_or(0f64, |at| self.evaluate_at(at))
    }
}

/// Resamples `data` from the `input` grid to the `output` grid
///
/// `data` is square and sampled on `input` along both axis,
/// the returned array is sampled on `output` along both axis.
/// Samples of the output grid outside the input grid are set to 0.
pub fn resample2d(data: &DMatrix<f64>, input: &Grid, output: &Grid) -> Result<DMatrix<f64>> {
    if data.shape() != (input.len(), input.len()) {
        return Err(ResampleError::Shape {
            data: data.shape(),
            grid: input.len(),
        });
    }
    let nodes = input.points();
    let locations: Vec<_> = output
        .points()
        .into_iter()
        .map(|x| CubicSpline::locate(&nodes, x))
        .collect();
    let interpolate = |values: Vec<f64>| -> Result<Vec<f64>> {
        let spline = CubicSpline::new(&nodes, &values)?;
        Ok(locations
            .iter()
            .map(|at| at.map_or(0f64, |at| spline.evaluate_at(at)))
            .collect())
    };

    // along the columns (x axis) of every input row
    let rows = data
        .row_iter()
        .map(|row| interpolate(row.iter().cloned().collect()))
        .collect::<Result<Vec<_>>>()?;
    let stage = DMatrix::from_fn(input.len(), output.len(), |i, j| rows[i][j]);
    // along the rows (y axis) of every intermediate column
    let columns = stage
        .column_iter()
        .map(|column| interpolate(column.iter().cloned().collect()))
        .collect::<Result<Vec<_>>>()?;
    Ok(DMatrix::from_fn(output.len(), output.len(), |i, j| {
        columns[j][i]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_like_arange() {
        let grid = Grid::new(-1., 1., 0.25).unwrap();
        assert_eq!(grid.len(), 8);
        assert_eq!(grid.points()[0], -1.);
        assert_eq!(grid.points()[7], 0.75);
        let grid = Grid::symmetric(0.1 * 64., 0.1).unwrap();
        assert_eq!(grid.len(), 128);
        assert_eq!(Grid::new(0., 1., 0.).unwrap_err(), ResampleError::Step(0.));
        assert!(Grid::new(1., 1., 0.1).is_err());
    }

    #[test]
    fn spline_through_nodes() {
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|x| x.sin()).collect();
        let spline = CubicSpline::new(&x, &y).unwrap();
        x.iter()
            .zip(&y)
            .for_each(|(x, y)| assert!((spline.evaluate(*x) - y).abs() < 1e-12));
        assert!((spline.evaluate(1.25) - 1.25f64.sin()).abs() < 1e-2);
        assert_eq!(spline.evaluate(-0.1), 0.);
        assert_eq!(spline.evaluate(4.6), 0.);
    }

    #[test]
    fn spline_errors() {
        assert_eq!(
            CubicSpline::new(&[0.], &[1.]).unwrap_err(),
            ResampleError::TooFewNodes(1)
        );
        assert_eq!(
            CubicSpline::new(&[0., 0.], &[1., 1.]).unwrap_err(),
            ResampleError::Unsorted
        );
        assert_eq!(
            CubicSpline::new(&[0., 1.], &[1.]).unwrap_err(),
            ResampleError::Length { x: 2, y: 1 }
        );
    }

    #[test]
    fn identity() {
        let n = 32;
        let data = DMatrix::from_fn(n, n, |i, j| {
            (-((i as f64 - 16.).powi(2) + (j as f64 - 14.).powi(2)) / 20.).exp()
        });
        let grid = Grid::symmetric(0.05 * n as f64 / 2., 0.05).unwrap();
        let resampled = resample2d(&data, &grid, &grid).unwrap();
        assert!((resampled - &data).abs().max() < 1e-12);
    }

    #[test]
    fn bilinear_plane_is_exact() {
        let n = 16;
        let input = Grid::symmetric(8., 1.).unwrap();
        let x = input.points();
        let data = DMatrix::from_fn(n, n, |i, j| 2. * x[j] - 0.5 * x[i] + 1.);
        let output = Grid::symmetric(4., 0.5).unwrap();
        let resampled = resample2d(&data, &input, &output).unwrap();
        let u = output.points();
        assert_eq!(resampled.shape(), (16, 16));
        for i in 0..16 {
            for j in 0..16 {
                let expected = 2. * u[j] - 0.5 * u[i] + 1.;
                assert!((resampled[(i, j)] - expected).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn shape_mismatch() {
        let data = DMatrix::zeros(4, 4);
        let grid = Grid::symmetric(4., 1.).unwrap();
        assert_eq!(
            resample2d(&data, &grid, &grid).unwrap_err(),
            ResampleError::Shape {
                data: (4, 4),
                grid: 8
            }
        );
    }
}

//! Least-squares fits over a window, evaluated at the leading (newest) edge.
//!
//! Abscissae are bar offsets from the newest sample, so the fitted value at
//! the leading edge is the constant coefficient. Polynomial fits scale the
//! offsets into [-1, 0] before solving the normal equations to keep them
//! well conditioned for long windows.

use super::{has_nan, is_flat};
use crate::error::FeatureError;

/// Fitted polynomial over a window.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyFit {
    /// Coefficients in the scaled abscissa u = offset / (n - 1), lowest first.
    coefficients: Vec<f64>,
    /// Bars per unit of u.
    span: f64,
}

impl PolyFit {
    fn constant(value: f64, degree: usize, span: f64) -> Self {
        let mut coefficients = vec![0.0; degree + 1];
        coefficients[0] = value;
        Self { coefficients, span }
    }

    fn undefined(degree: usize, span: f64) -> Self {
        Self {
            coefficients: vec![f64::NAN; degree + 1],
            span,
        }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Fitted value at the newest sample.
    pub fn fitted(&self) -> f64 {
        self.coefficients[0]
    }

    /// Fitted value `offset` bars from the newest sample (negative = older).
    pub fn value_at(&self, offset: f64) -> f64 {
        let u = offset / self.span;
        self.coefficients
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * u + c)
    }

    /// First derivative per bar at the newest sample.
    pub fn derivative(&self) -> f64 {
        match self.coefficients.get(1) {
            Some(c1) => c1 / self.span,
            None => 0.0,
        }
    }
}

/// Slope per bar of the least-squares line through the window.
pub fn linear_slope(window: &[f64]) -> Result<f64, FeatureError> {
    let n = window.len();
    if n < 2 {
        return Err(FeatureError::InsufficientWindow {
            requested: n,
            minimum: 2,
        });
    }
    if has_nan(window) {
        return Ok(f64::NAN);
    }
    if is_flat(window) {
        return Ok(0.0);
    }
    let centre = 0.5 * (n - 1) as f64;
    let mut num = 0.0;
    let mut denom = 0.0;
    for (i, y) in window.iter().enumerate() {
        let coef = i as f64 - centre;
        num += coef * y;
        denom += coef * coef;
    }
    Ok(num / denom)
}

/// Least-squares line through the window, evaluated at the newest sample.
pub fn linear_fit(window: &[f64]) -> Result<f64, FeatureError> {
    let slope = linear_slope(window)?;
    if slope.is_nan() {
        return Ok(f64::NAN);
    }
    if is_flat(window) {
        return Ok(window[0]);
    }
    let mean = window.iter().sum::<f64>() / window.len() as f64;
    Ok(mean + slope * 0.5 * (window.len() - 1) as f64)
}

/// Least-squares polynomial of `degree` through the window.
///
/// Fails with `InsufficientWindow` when the window has no more samples than
/// the degree, and with `DivisionDegenerate` if the normal equations are
/// singular.
pub fn poly_fit(window: &[f64], degree: usize) -> Result<PolyFit, FeatureError> {
    let n = window.len();
    if n <= degree {
        return Err(FeatureError::InsufficientWindow {
            requested: n,
            minimum: degree + 1,
        });
    }
    let span = (n - 1).max(1) as f64;
    if has_nan(window) {
        return Ok(PolyFit::undefined(degree, span));
    }
    if is_flat(window) {
        return Ok(PolyFit::constant(window[0], degree, span));
    }

    let size = degree + 1;
    // Power sums Σ u^k for k in 0..=2·degree and moments Σ u^k·y.
    let mut power_sums = vec![0.0; 2 * degree + 1];
    let mut rhs = vec![0.0; size];
    for (i, &y) in window.iter().enumerate() {
        let u = (i as f64 - (n - 1) as f64) / span;
        let mut p = 1.0;
        for (k, sum) in power_sums.iter_mut().enumerate() {
            *sum += p;
            if k < size {
                rhs[k] += p * y;
            }
            p *= u;
        }
    }
    let mut matrix: Vec<Vec<f64>> = (0..size)
        .map(|row| (0..size).map(|col| power_sums[row + col]).collect())
        .collect();

    let coefficients = solve(&mut matrix, &mut rhs)?;
    Ok(PolyFit { coefficients, span })
}

/// Gaussian elimination with partial pivoting.
fn solve(matrix: &mut [Vec<f64>], rhs: &mut [f64]) -> Result<Vec<f64>, FeatureError> {
    let size = rhs.len();
    for col in 0..size {
        let pivot = (col..size)
            .max_by(|&a, &b| matrix[a][col].abs().total_cmp(&matrix[b][col].abs()))
            .unwrap_or(col);
        if matrix[pivot][col].abs() < 1e-12 {
            return Err(FeatureError::DivisionDegenerate {
                context: "polynomial normal equations",
            });
        }
        matrix.swap(col, pivot);
        rhs.swap(col, pivot);

        for row in (col + 1)..size {
            let factor = matrix[row][col] / matrix[col][col];
            for k in col..size {
                matrix[row][k] -= factor * matrix[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut solution = vec![0.0; size];
    for row in (0..size).rev() {
        let tail: f64 = ((row + 1)..size)
            .map(|k| matrix[row][k] * solution[k])
            .sum();
        solution[row] = (rhs[row] - tail) / matrix[row][row];
    }
    Ok(solution)
}

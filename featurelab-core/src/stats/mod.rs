//! Rolling-window statistics.
//!
//! Every function takes a window slice ordered oldest first (the last element
//! is the current sample) and is pure. Any NaN inside the window yields the
//! NaN sentinel. Hard failures are reserved for windows below a transform's
//! structural minimum, reported as `FeatureError::InsufficientWindow`.

pub mod extrema;
pub mod filter;
pub mod fractal;
pub mod moments;
pub mod regression;

pub use extrema::{highest, lowest, median, true_range};
pub use filter::{low_pass_step, smooth_step, LowPassHistory};
pub use fractal::{
    market_meanness_index, rescaled_range_exponent, HURST_MIN_WINDOW, MMI_MIN_WINDOW,
};
pub use moments::{mean, moment, stddev, variance};
pub use regression::{linear_fit, linear_slope, poly_fit, PolyFit};

/// True if any sample in the window is NaN.
pub fn has_nan(window: &[f64]) -> bool {
    window.iter().any(|v| v.is_nan())
}

/// True if every sample in a non-empty window is bit-identical.
///
/// Flat windows short-circuit the moment and regression code so a constant
/// input yields an exact mean and an exact zero dispersion.
pub fn is_flat(window: &[f64]) -> bool {
    match window.first() {
        Some(first) => window.iter().all(|v| v.to_bits() == first.to_bits()),
        None => false,
    }
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for statistics tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_detection() {
        assert!(is_flat(&[2.0, 2.0, 2.0]));
        assert!(!is_flat(&[2.0, 2.0, 2.000001]));
        assert!(!is_flat(&[]));
    }

    #[test]
    fn nan_detection() {
        assert!(has_nan(&[1.0, f64::NAN]));
        assert!(!has_nan(&[1.0, 2.0]));
    }
}

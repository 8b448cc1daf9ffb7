//! Mean, variance, standard deviation and central moments.
//!
//! Population statistics (divide by n) throughout.

use super::{has_nan, is_flat};

/// Arithmetic mean of the window.
pub fn mean(window: &[f64]) -> f64 {
    if window.is_empty() || has_nan(window) {
        return f64::NAN;
    }
    if is_flat(window) {
        return window[0];
    }
    window.iter().sum::<f64>() / window.len() as f64
}

/// Population variance. Exactly 0.0 for a constant window.
pub fn variance(window: &[f64]) -> f64 {
    moment(window, 2)
}

/// Population standard deviation. Exactly 0.0 for a constant window.
pub fn stddev(window: &[f64]) -> f64 {
    variance(window).sqrt()
}

/// Moment of the window.
///
/// Order 1 returns the mean: the first central moment is identically zero,
/// so the first raw moment is the useful one. Orders >= 2 are central moments
/// about the window mean. Order 0 is 1.0 by definition.
pub fn moment(window: &[f64], order: u32) -> f64 {
    if window.is_empty() || has_nan(window) {
        return f64::NAN;
    }
    match order {
        0 => 1.0,
        1 => mean(window),
        _ => {
            if is_flat(window) {
                return 0.0;
            }
            let m = mean(window);
            let exp = order as i32;
            window.iter().map(|v| (v - m).powi(exp)).sum::<f64>() / window.len() as f64
        }
    }
}

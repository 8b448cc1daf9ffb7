//! Window extrema, median and true range.

use super::has_nan;

/// Highest value in the window.
pub fn highest(window: &[f64]) -> f64 {
    if window.is_empty() || has_nan(window) {
        return f64::NAN;
    }
    window.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Lowest value in the window.
pub fn lowest(window: &[f64]) -> f64 {
    if window.is_empty() || has_nan(window) {
        return f64::NAN;
    }
    window.iter().copied().fold(f64::INFINITY, f64::min)
}

/// Median of the window; mean of the two middle values for even lengths.
pub fn median(window: &[f64]) -> f64 {
    if window.is_empty() || has_nan(window) {
        return f64::NAN;
    }
    let mut sorted = window.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// True range of one bar: max(high-low, |high-prev_close|, |low-prev_close|).
///
/// Without a previous close (first bar) this is just high - low.
pub fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    match prev_close {
        Some(pc) if !pc.is_nan() => (high - low).max((high - pc).abs()).max((low - pc).abs()),
        _ => high - low,
    }
}

//! Fractal and memory indicators: Market Meanness Index and the
//! rescaled-range (Hurst) exponent.

use super::{has_nan, mean, median};
use crate::error::FeatureError;

/// Smallest window the Market Meanness Index accepts.
pub const MMI_MIN_WINDOW: usize = 3;

/// Smallest window the rescaled-range exponent accepts.
pub const HURST_MIN_WINDOW: usize = 20;

/// Smallest sub-window used in the rescaled-range regression.
const RS_MIN_CHUNK: usize = 8;

/// Market Meanness Index in [0, 100].
///
/// Counts consecutive pairs where the older sample sits on one side of the
/// window median and the newer one moves back toward it. A random walk scores
/// about 75; a steady trend scores about 50.
pub fn market_meanness_index(window: &[f64]) -> Result<f64, FeatureError> {
    let n = window.len();
    if n < MMI_MIN_WINDOW {
        return Err(FeatureError::InsufficientWindow {
            requested: n,
            minimum: MMI_MIN_WINDOW,
        });
    }
    if has_nan(window) {
        return Ok(f64::NAN);
    }
    let m = median(window);
    let reverting = window
        .windows(2)
        .filter(|pair| {
            let (older, newer) = (pair[0], pair[1]);
            (older > m && older > newer) || (older < m && older < newer)
        })
        .count();
    Ok(100.0 * reverting as f64 / (n - 1) as f64)
}

/// Long-memory exponent from rescaled-range analysis of the window's
/// increments.
///
/// The increments are split into non-overlapping chunks aligned to the newest
/// sample, halving the chunk size from the full length down to
/// `RS_MIN_CHUNK`. The exponent is the slope of ln(mean R/S) against
/// ln(chunk size), clamped to [0, 1]: about 0.5 for a random walk, above for
/// persistent paths, below for anti-persistent ones. Chunks with zero
/// dispersion are skipped; fewer than two usable sizes yields NaN.
pub fn rescaled_range_exponent(window: &[f64]) -> Result<f64, FeatureError> {
    let n = window.len();
    if n < HURST_MIN_WINDOW {
        return Err(FeatureError::InsufficientWindow {
            requested: n,
            minimum: HURST_MIN_WINDOW,
        });
    }
    if has_nan(window) {
        return Ok(f64::NAN);
    }

    let increments: Vec<f64> = window.windows(2).map(|p| p[1] - p[0]).collect();
    let m = increments.len();

    let mut log_sizes = Vec::new();
    let mut log_rs = Vec::new();
    let mut size = m;
    while size >= RS_MIN_CHUNK {
        let chunks = m / size;
        let ratios: Vec<f64> = (0..chunks)
            .filter_map(|c| rescaled_range(&increments[m - (c + 1) * size..m - c * size]))
            .collect();
        if !ratios.is_empty() {
            let avg = ratios.iter().sum::<f64>() / ratios.len() as f64;
            log_sizes.push((size as f64).ln());
            log_rs.push(avg.ln());
        }
        size /= 2;
    }

    if log_sizes.len() < 2 {
        return Ok(f64::NAN);
    }
    let x_mean = mean(&log_sizes);
    let y_mean = log_rs.iter().sum::<f64>() / log_rs.len() as f64;
    let mut num = 0.0;
    let mut denom = 0.0;
    for (x, y) in log_sizes.iter().zip(&log_rs) {
        num += (x - x_mean) * (y - y_mean);
        denom += (x - x_mean) * (x - x_mean);
    }
    if denom == 0.0 {
        return Ok(f64::NAN);
    }
    Ok((num / denom).clamp(0.0, 1.0))
}

/// R/S statistic of one chunk, `None` when the chunk has no dispersion.
fn rescaled_range(chunk: &[f64]) -> Option<f64> {
    let len = chunk.len() as f64;
    let avg = chunk.iter().sum::<f64>() / len;
    let mut running = 0.0;
    let mut max_dev = f64::NEG_INFINITY;
    let mut min_dev = f64::INFINITY;
    let mut sum_sq = 0.0;
    for &v in chunk {
        running += v - avg;
        max_dev = max_dev.max(running);
        min_dev = min_dev.min(running);
        sum_sq += (v - avg) * (v - avg);
    }
    let s = (sum_sq / len).sqrt();
    let r = max_dev - min_dev;
    if s <= 0.0 || r <= 0.0 {
        return None;
    }
    Some(r / s)
}

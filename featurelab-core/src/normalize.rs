//! Distribution-relative normalization over a trailing window.
//!
//! Both kinds see the window oldest first with the current value last and
//! require `period` defined samples; before that the output is the NaN
//! sentinel.

use serde::{Deserialize, Serialize};

use crate::error::FeatureError;
use crate::stats::{has_nan, mean, stddev};

/// Lower bound of percentile-rank output.
pub const RANK_MIN: f64 = -1.0;
/// Upper bound of percentile-rank output.
pub const RANK_MAX: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Rank of the current value among the window, mapped to [-1, +1].
    PercentRank,
    /// (current - mean) / stddev over the window.
    ZScore,
}

impl Normalization {
    pub fn suffix(&self) -> &'static str {
        match self {
            Normalization::PercentRank => "N",
            Normalization::ZScore => "Zscore",
        }
    }

    /// Normalize the window's newest sample.
    pub fn apply(&self, window: &[f64]) -> Result<f64, FeatureError> {
        match self {
            Normalization::PercentRank => Ok(percentile_rank(window)),
            Normalization::ZScore => zscore(window),
        }
    }
}

/// Percentile rank of the window's newest sample.
pub fn percentile_rank(window: &[f64]) -> f64 {
    match window.last() {
        Some(&current) => rank_against(current, window),
        None => f64::NAN,
    }
}

/// Percentile rank of `value` against `window`, mapped to [-1, +1].
///
/// Ties share the average of their ranks, so only relative order matters.
/// A window of one sample ranks at the midpoint.
pub fn rank_against(value: f64, window: &[f64]) -> f64 {
    if window.is_empty() || value.is_nan() || has_nan(window) {
        return f64::NAN;
    }
    let n = window.len();
    if n == 1 {
        return 0.0;
    }
    let lower = window.iter().filter(|v| **v < value).count();
    let upper = window.iter().filter(|v| **v <= value).count();
    let avg_rank = (lower + 1 + upper) as f64 * 0.5;
    let unit = ((avg_rank - 1.0) / (n - 1) as f64).clamp(0.0, 1.0);
    RANK_MIN + unit * (RANK_MAX - RANK_MIN)
}

/// Z-score of the window's newest sample.
///
/// A constant window has no dispersion and fails with `DivisionDegenerate`;
/// callers store the NaN sentinel.
pub fn zscore(window: &[f64]) -> Result<f64, FeatureError> {
    let Some(&current) = window.last() else {
        return Ok(f64::NAN);
    };
    if has_nan(window) {
        return Ok(f64::NAN);
    }
    let sd = stddev(window);
    if sd == 0.0 {
        return Err(FeatureError::DivisionDegenerate {
            context: "z-score of a constant window",
        });
    }
    Ok((current - mean(window)) / sd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn newest_maximum_ranks_at_top() {
        let w: Vec<f64> = (0..50).map(|i| i as f64).collect();
        assert_eq!(percentile_rank(&w), RANK_MAX);
    }

    #[test]
    fn newest_minimum_ranks_at_bottom() {
        let w = [5.0, 4.0, 3.0, 1.0];
        assert_eq!(percentile_rank(&w), RANK_MIN);
    }

    #[test]
    fn ties_share_the_average_rank() {
        // All equal: everyone shares the middle rank.
        assert_approx(percentile_rank(&[2.0; 10]), 0.0, DEFAULT_EPSILON);
        // [1, 2, 2, 3] ranking 2: ranks 2 and 3 → 2.5 → (1.5 / 3) → 0.0
        assert_approx(rank_against(2.0, &[1.0, 2.0, 2.0, 3.0]), 0.0, DEFAULT_EPSILON);
    }

    #[test]
    fn rank_is_bounded() {
        let w = [1.0, 2.0, 3.0];
        assert_eq!(rank_against(100.0, &w), RANK_MAX);
        assert_eq!(rank_against(-100.0, &w), RANK_MIN);
    }

    #[test]
    fn zscore_basic() {
        // mean 5, population sd 2
        let w = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_approx(zscore(&w).unwrap(), 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn zscore_of_constant_window_is_degenerate() {
        assert!(matches!(
            zscore(&[3.0; 50]),
            Err(FeatureError::DivisionDegenerate { .. })
        ));
    }

    #[test]
    fn nan_in_window_is_sentinel() {
        assert!(percentile_rank(&[1.0, f64::NAN, 2.0]).is_nan());
        assert!(zscore(&[1.0, f64::NAN, 2.0]).unwrap().is_nan());
    }

    #[test]
    fn suffixes() {
        assert_eq!(Normalization::PercentRank.suffix(), "N");
        assert_eq!(Normalization::ZScore.suffix(), "Zscore");
    }
}

//! Node transforms of the derived-series graph.
//!
//! A transform is a pure function of its inputs' current and historical
//! samples (plus, for the recursive filters, their own previous outputs).

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{EvalContext, SeriesRef};
use crate::error::FeatureError;
use crate::normalize::Normalization;
use crate::series::Series;
use crate::stats::{self, LowPassHistory};

/// The filter's last two outputs, once both exist.
fn filter_history(own: &Series) -> Result<Option<LowPassHistory>, FeatureError> {
    if own.len() < 2 {
        return Ok(None);
    }
    Ok(Some(LowPassHistory {
        y1: own.get(0)?,
        y2: own.get(1)?,
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Ln,
    Sqrt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Sub,
    Div,
}

/// Statistic computed over a rolling window of one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RollingStat {
    Mean,
    StdDev,
    Moment(u32),
    Highest,
    Lowest,
    /// Least-squares line evaluated at the newest sample.
    LinearFit,
    /// Slope per bar of the least-squares line.
    LinearSlope,
    /// Least-squares polynomial of the given degree at the newest sample.
    PolyFit(usize),
    MeannessIndex,
    HurstExponent,
}

impl RollingStat {
    pub fn apply(&self, window: &[f64]) -> Result<f64, FeatureError> {
        match self {
            RollingStat::Mean => Ok(stats::mean(window)),
            RollingStat::StdDev => Ok(stats::stddev(window)),
            RollingStat::Moment(order) => Ok(stats::moment(window, *order)),
            RollingStat::Highest => Ok(stats::highest(window)),
            RollingStat::Lowest => Ok(stats::lowest(window)),
            RollingStat::LinearFit => stats::linear_fit(window),
            RollingStat::LinearSlope => stats::linear_slope(window),
            RollingStat::PolyFit(degree) => stats::poly_fit(window, *degree).map(|f| f.fitted()),
            RollingStat::MeannessIndex => stats::market_meanness_index(window),
            RollingStat::HurstExponent => stats::rescaled_range_exponent(window),
        }
    }
}

impl fmt::Display for RollingStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollingStat::Mean => write!(f, "mean"),
            RollingStat::StdDev => write!(f, "stddev"),
            RollingStat::Moment(order) => write!(f, "moment{order}"),
            RollingStat::Highest => write!(f, "highest"),
            RollingStat::Lowest => write!(f, "lowest"),
            RollingStat::LinearFit => write!(f, "linfit"),
            RollingStat::LinearSlope => write!(f, "linslope"),
            RollingStat::PolyFit(degree) => write!(f, "polyfit{degree}"),
            RollingStat::MeannessIndex => write!(f, "mmi"),
            RollingStat::HurstExponent => write!(f, "hurst"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Mean of the bar's OHLC fields.
    MeanPrice,
    Unary {
        input: SeriesRef,
        op: UnaryOp,
    },
    Binary {
        lhs: SeriesRef,
        rhs: SeriesRef,
        op: BinaryOp,
    },
    Scale {
        input: SeriesRef,
        factor: f64,
    },
    /// Sample `lag` bars back.
    Lag {
        input: SeriesRef,
        lag: usize,
    },
    /// x[0] - x[lag].
    Change {
        input: SeriesRef,
        lag: usize,
    },
    TrueRange {
        high: SeriesRef,
        low: SeriesRef,
        close: SeriesRef,
    },
    Rolling {
        input: SeriesRef,
        window: usize,
        stat: RollingStat,
    },
    LowPass {
        input: SeriesRef,
        period: usize,
    },
    /// Super smoother over the input.
    Smooth {
        input: SeriesRef,
        period: usize,
    },
    Normalize {
        input: SeriesRef,
        period: usize,
        kind: Normalization,
    },
}

impl Transform {
    /// Inputs paired with how many of their most recent samples this
    /// transform reads.
    pub(crate) fn inputs(&self) -> Vec<(SeriesRef, usize)> {
        use crate::domain::BarField;
        match self {
            Transform::MeanPrice => BarField::ALL
                .iter()
                .map(|&f| (SeriesRef::Bar(f), 1))
                .collect(),
            Transform::Unary { input, .. } | Transform::Scale { input, .. } => vec![(*input, 1)],
            Transform::Binary { lhs, rhs, .. } => vec![(*lhs, 1), (*rhs, 1)],
            Transform::Lag { input, lag } | Transform::Change { input, lag } => {
                vec![(*input, lag + 1)]
            }
            Transform::TrueRange { high, low, close } => vec![(*high, 1), (*low, 1), (*close, 2)],
            Transform::Rolling { input, window, .. } => vec![(*input, *window)],
            Transform::LowPass { input, .. } => vec![(*input, 3)],
            Transform::Smooth { input, .. } => vec![(*input, 2)],
            Transform::Normalize { input, period, .. } => vec![(*input, *period)],
        }
    }

    /// Previous samples of its own output the transform reads.
    pub(crate) fn own_history(&self) -> usize {
        match self {
            Transform::LowPass { .. } | Transform::Smooth { .. } => 2,
            _ => 1,
        }
    }

    /// Index of the first bar at which the output can be defined, given the
    /// same for each input.
    pub(crate) fn first_defined(&self, first: impl Fn(SeriesRef) -> usize) -> usize {
        match self {
            Transform::Lag { input, lag } | Transform::Change { input, lag } => first(*input) + lag,
            Transform::Rolling { input, window, .. } => first(*input) + window.saturating_sub(1),
            Transform::Normalize { input, period, .. } => first(*input) + period.saturating_sub(1),
            Transform::TrueRange { high, low, .. } => first(*high).max(first(*low)),
            other => other
                .inputs()
                .iter()
                .map(|(r, _)| first(*r))
                .max()
                .unwrap_or(0),
        }
    }

    /// Value for the current bar.
    pub(crate) fn evaluate(&self, ctx: &EvalContext<'_>, own: &Series) -> Result<f64, FeatureError> {
        match self {
            Transform::MeanPrice => {
                use crate::domain::BarField;
                let bars = ctx.bars();
                let sum = bars.get(BarField::Open, 0)?
                    + bars.get(BarField::High, 0)?
                    + bars.get(BarField::Low, 0)?
                    + bars.get(BarField::Close, 0)?;
                Ok(sum / 4.0)
            }
            Transform::Unary { input, op } => {
                let x = ctx.value(*input, 0)?;
                if x.is_nan() {
                    return Ok(f64::NAN);
                }
                match op {
                    UnaryOp::Ln if x <= 0.0 => Err(FeatureError::DivisionDegenerate {
                        context: "logarithm of a non-positive value",
                    }),
                    UnaryOp::Ln => Ok(x.ln()),
                    UnaryOp::Sqrt if x < 0.0 => Err(FeatureError::DivisionDegenerate {
                        context: "square root of a negative value",
                    }),
                    UnaryOp::Sqrt => Ok(x.sqrt()),
                }
            }
            Transform::Binary { lhs, rhs, op } => {
                let a = ctx.value(*lhs, 0)?;
                let b = ctx.value(*rhs, 0)?;
                if a.is_nan() || b.is_nan() {
                    return Ok(f64::NAN);
                }
                match op {
                    BinaryOp::Sub => Ok(a - b),
                    BinaryOp::Div if b == 0.0 => Err(FeatureError::DivisionDegenerate {
                        context: "zero denominator",
                    }),
                    BinaryOp::Div => Ok(a / b),
                }
            }
            Transform::Scale { input, factor } => Ok(ctx.value(*input, 0)? * factor),
            Transform::Lag { input, lag } => ctx.value(*input, *lag),
            Transform::Change { input, lag } => {
                Ok(ctx.value(*input, 0)? - ctx.value(*input, *lag)?)
            }
            Transform::TrueRange { high, low, close } => {
                let h = ctx.value(*high, 0)?;
                let l = ctx.value(*low, 0)?;
                let prev_close = ctx.value(*close, 1)?;
                if h.is_nan() || l.is_nan() {
                    return Ok(f64::NAN);
                }
                let prev = (!prev_close.is_nan()).then_some(prev_close);
                Ok(stats::true_range(h, l, prev))
            }
            Transform::Rolling {
                input,
                window,
                stat,
            } => match ctx.window(*input, *window)? {
                Some(w) => stat.apply(w),
                None => Ok(f64::NAN),
            },
            Transform::LowPass { input, period } => {
                let series = ctx.series(*input);
                let available = series.len().min(3);
                let inputs = series.window(available)?.unwrap_or(&[]);
                Ok(stats::low_pass_step(inputs, filter_history(own)?, *period))
            }
            Transform::Smooth { input, period } => {
                let series = ctx.series(*input);
                let available = series.len().min(2);
                let inputs = series.window(available)?.unwrap_or(&[]);
                Ok(stats::smooth_step(inputs, filter_history(own)?, *period))
            }
            Transform::Normalize {
                input,
                period,
                kind,
            } => match ctx.window(*input, *period)? {
                Some(w) => kind.apply(w),
                None => Ok(f64::NAN),
            },
        }
    }
}

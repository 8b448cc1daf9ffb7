//! Two-pole recursive filters: the trend low-pass and the super smoother.
//!
//! Low-pass:
//!
//! y[t] = (a - a²/4)·x[t] + (a²/2)·x[t-1] - (a - 3a²/4)·x[t-2]
//!        + 2(1-a)·y[t-1] - (1-a)²·y[t-2],   a = 2/(period+1)
//!
//! The filter's own previous outputs are the previous samples of its output
//! series. Until three inputs and two prior outputs are defined the output is
//! the input itself, which makes warm-up deterministic.
//!
//! Super smoother (two-pole Butterworth over a two-bar average):
//!
//! y[t] = c1·(x[t] + x[t-1])/2 + c2·y[t-1] + c3·y[t-2]
//!
//! with f = √2·π/period, c2 = 2e^(-f)·cos(f), c3 = -e^(-2f), c1 = 1 - c2 - c3.

/// Previous filter outputs, newest first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowPassHistory {
    pub y1: f64,
    pub y2: f64,
}

/// One filter step.
///
/// `inputs` are the last three raw samples oldest first (`[x2, x1, x0]`), or
/// fewer during warm-up. `history` is `None` until two outputs exist.
pub fn low_pass_step(inputs: &[f64], history: Option<LowPassHistory>, period: usize) -> f64 {
    let Some(&x0) = inputs.last() else {
        return f64::NAN;
    };
    let (x1, x2) = match inputs.len() {
        n if n >= 3 => (inputs[n - 2], inputs[n - 3]),
        _ => return x0,
    };
    let Some(LowPassHistory { y1, y2 }) = history else {
        return x0;
    };
    if y1.is_nan() || y2.is_nan() {
        return x0;
    }

    let a = 2.0 / (period as f64 + 1.0);
    let a2 = a * a;
    let c0 = a - 0.25 * a2;
    let c1 = 0.5 * a2;
    let c2 = a - 0.75 * a2;
    let feedback = (1.0 - a) * (1.0 - a);

    // Increment form of the recurrence: input and feedback coefficients sum
    // to one, so constant input is an exact fixed point.
    y1 + c0 * (x0 - y1) + c1 * (x1 - y1) - c2 * (x2 - y1) + feedback * (y1 - y2)
}

/// One super smoother step.
///
/// `inputs` are the last two raw samples oldest first (`[x1, x0]`).
/// Warm-up follows `low_pass_step`: the input passes through until two
/// inputs and two prior outputs exist.
pub fn smooth_step(inputs: &[f64], history: Option<LowPassHistory>, period: usize) -> f64 {
    let Some(&x0) = inputs.last() else {
        return f64::NAN;
    };
    if inputs.len() < 2 {
        return x0;
    }
    let x1 = inputs[inputs.len() - 2];
    let Some(LowPassHistory { y1, y2 }) = history else {
        return x0;
    };
    if y1.is_nan() || y2.is_nan() {
        return x0;
    }

    let f = std::f64::consts::SQRT_2 * std::f64::consts::PI / period.max(1) as f64;
    let decay = (-f).exp();
    let c2 = 2.0 * decay * f.cos();
    let c3 = -decay * decay;
    let c1 = 1.0 - c2 - c3;

    // Increment form, as for the low-pass.
    y1 + c1 * (0.5 * (x0 + x1) - y1) + c3 * (y2 - y1)
}

//! Error taxonomy for feature derivation.
//!
//! Two families live here. Numeric degeneracies (`InsufficientWindow`,
//! `DivisionDegenerate`) are recovered locally: the owning series stores
//! `f64::NAN` for that bar and the run continues. Structural contract
//! violations (`OutOfOrderBar`, `OutOfRange`) and graph declaration mistakes
//! (`UnknownSeries`, `DuplicateName`) abort the run.

use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("window of {requested} samples is below the minimum of {minimum}")]
    InsufficientWindow { requested: usize, minimum: usize },

    #[error("degenerate denominator in {context}")]
    DivisionDegenerate { context: &'static str },

    #[error("bar at {timestamp} does not advance past the previous bar at {previous}")]
    OutOfOrderBar {
        timestamp: NaiveDateTime,
        previous: NaiveDateTime,
    },

    #[error("lag {lag} exceeds retained history of {retained} samples")]
    OutOfRange { lag: usize, retained: usize },

    #[error("unknown series '{0}'")]
    UnknownSeries(String),

    #[error("series name '{0}' is already bound to a different series")]
    DuplicateName(String),
}

impl FeatureError {
    /// True for the numeric degeneracies that map to the NaN sentinel.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FeatureError::InsufficientWindow { .. } | FeatureError::DivisionDegenerate { .. }
        )
    }

    /// Stable label used for once-per-class logging.
    pub fn class(&self) -> &'static str {
        match self {
            FeatureError::InsufficientWindow { .. } => "insufficient_window",
            FeatureError::DivisionDegenerate { .. } => "division_degenerate",
            FeatureError::OutOfOrderBar { .. } => "out_of_order_bar",
            FeatureError::OutOfRange { .. } => "out_of_range",
            FeatureError::UnknownSeries(_) => "unknown_series",
            FeatureError::DuplicateName(_) => "duplicate_name",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_degeneracies_are_recoverable() {
        assert!(FeatureError::InsufficientWindow {
            requested: 5,
            minimum: 20
        }
        .is_recoverable());
        assert!(FeatureError::DivisionDegenerate { context: "ratio" }.is_recoverable());
        assert!(!FeatureError::OutOfRange {
            lag: 10,
            retained: 3
        }
        .is_recoverable());
        assert!(!FeatureError::UnknownSeries("x".into()).is_recoverable());
    }

    #[test]
    fn error_messages_name_the_problem() {
        let err = FeatureError::OutOfRange {
            lag: 7,
            retained: 4,
        };
        assert_eq!(err.to_string(), "lag 7 exceeds retained history of 4 samples");
        assert_eq!(err.class(), "out_of_range");
    }
}

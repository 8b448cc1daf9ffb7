//! Declarative construction of a `DerivedSeriesGraph`.

use std::collections::{HashMap, HashSet};

use super::transform::{BinaryOp, RollingStat, Transform, UnaryOp};
use super::{DerivedSeriesGraph, Node, SeriesId, SeriesRef};
use crate::domain::BarField;
use crate::error::FeatureError;
use crate::normalize::Normalization;
use crate::series::{BarSeries, Series};

/// Builder for the derived-series graph.
///
/// Helpers return handles immediately; a malformed declaration is remembered
/// and reported by `build()`.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<Node>,
    keys: HashMap<String, SeriesId>,
    names: HashMap<String, SeriesRef>,
    history: Vec<usize>,
    bar_history: usize,
    error: Option<FeatureError>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            bar_history: 1,
            ..Self::default()
        }
    }

    /// Handle to a raw bar field.
    pub fn bar(&self, field: BarField) -> SeriesRef {
        SeriesRef::Bar(field)
    }

    /// Declare a node, or return the existing node with the same transform.
    pub fn derive(&mut self, transform: Transform) -> SeriesRef {
        let inputs = transform.inputs();
        for (input, _) in &inputs {
            if let SeriesRef::Derived(id) = input {
                if id.0 >= self.nodes.len() {
                    self.fail(FeatureError::UnknownSeries(format!("#{}", id.0)));
                    return *input;
                }
            }
        }

        let key = self.key_of(&transform);
        if let Some(&id) = self.keys.get(&key) {
            return SeriesRef::Derived(id);
        }

        for (input, samples) in inputs {
            self.require_history(input, samples);
        }
        let first_defined = transform.first_defined(|r| self.first_defined(r));
        let id = SeriesId(self.nodes.len());
        self.history.push(transform.own_history().max(1));
        self.nodes.push(Node {
            key: key.clone(),
            transform,
            output: Series::new(),
            first_defined,
        });
        self.keys.insert(key, id);
        SeriesRef::Derived(id)
    }

    /// Register a public name for a series.
    pub fn name(&mut self, name: &str, series: SeriesRef) -> Result<(), FeatureError> {
        match self.names.get(name) {
            Some(existing) if *existing != series => {
                Err(FeatureError::DuplicateName(name.to_string()))
            }
            _ => {
                self.names.insert(name.to_string(), series);
                Ok(())
            }
        }
    }

    /// Make sure the last `samples` values of `series` stay addressable.
    pub fn require_history(&mut self, series: SeriesRef, samples: usize) {
        match series {
            SeriesRef::Bar(_) => self.bar_history = self.bar_history.max(samples),
            SeriesRef::Derived(id) => {
                if let Some(need) = self.history.get_mut(id.0) {
                    *need = (*need).max(samples);
                }
            }
        }
    }

    pub fn first_defined(&self, series: SeriesRef) -> usize {
        match series {
            SeriesRef::Bar(_) => 0,
            SeriesRef::Derived(id) => self.nodes.get(id.0).map_or(0, |n| n.first_defined),
        }
    }

    pub fn mean_price(&mut self) -> SeriesRef {
        self.derive(Transform::MeanPrice)
    }

    pub fn ln(&mut self, input: SeriesRef) -> SeriesRef {
        self.derive(Transform::Unary {
            input,
            op: UnaryOp::Ln,
        })
    }

    pub fn sqrt(&mut self, input: SeriesRef) -> SeriesRef {
        self.derive(Transform::Unary {
            input,
            op: UnaryOp::Sqrt,
        })
    }

    pub fn sub(&mut self, lhs: SeriesRef, rhs: SeriesRef) -> SeriesRef {
        self.binary(lhs, rhs, BinaryOp::Sub)
    }

    pub fn div(&mut self, lhs: SeriesRef, rhs: SeriesRef) -> SeriesRef {
        self.binary(lhs, rhs, BinaryOp::Div)
    }

    fn binary(&mut self, lhs: SeriesRef, rhs: SeriesRef, op: BinaryOp) -> SeriesRef {
        self.derive(Transform::Binary { lhs, rhs, op })
    }

    pub fn scale(&mut self, input: SeriesRef, factor: f64) -> SeriesRef {
        self.derive(Transform::Scale { input, factor })
    }

    pub fn lag(&mut self, input: SeriesRef, lag: usize) -> SeriesRef {
        self.derive(Transform::Lag { input, lag })
    }

    /// x[0] - x[lag].
    pub fn change(&mut self, input: SeriesRef, lag: usize) -> SeriesRef {
        self.derive(Transform::Change { input, lag })
    }

    pub fn rolling(&mut self, input: SeriesRef, window: usize, stat: RollingStat) -> SeriesRef {
        self.derive(Transform::Rolling {
            input,
            window,
            stat,
        })
    }

    pub fn true_range(&mut self, high: SeriesRef, low: SeriesRef, close: SeriesRef) -> SeriesRef {
        self.derive(Transform::TrueRange { high, low, close })
    }

    pub fn low_pass(&mut self, input: SeriesRef, period: usize) -> SeriesRef {
        self.derive(Transform::LowPass { input, period })
    }

    pub fn smooth(&mut self, input: SeriesRef, period: usize) -> SeriesRef {
        self.derive(Transform::Smooth { input, period })
    }

    pub fn normalize(&mut self, input: SeriesRef, period: usize, kind: Normalization) -> SeriesRef {
        self.derive(Transform::Normalize {
            input,
            period,
            kind,
        })
    }

    /// Finish declaration. Retention of every series is sized to the longest
    /// window or lag any consumer reads from it.
    pub fn build(self) -> Result<DerivedSeriesGraph, FeatureError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let nodes = self
            .nodes
            .into_iter()
            .zip(self.history)
            .map(|(node, need)| Node {
                output: Series::with_retention(need),
                ..node
            })
            .collect();
        Ok(DerivedSeriesGraph {
            bars: BarSeries::with_retention(self.bar_history),
            nodes,
            names: self.names,
            reported: HashSet::new(),
        })
    }

    fn fail(&mut self, err: FeatureError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn key(&self, r: SeriesRef) -> String {
        match r {
            SeriesRef::Bar(field) => field.as_str().to_string(),
            SeriesRef::Derived(id) => self.nodes[id.0].key.clone(),
        }
    }

    fn key_of(&self, transform: &Transform) -> String {
        match transform {
            Transform::MeanPrice => "price".to_string(),
            Transform::Unary { input, op } => {
                let name = match op {
                    UnaryOp::Ln => "ln",
                    UnaryOp::Sqrt => "sqrt",
                };
                format!("{name}({})", self.key(*input))
            }
            Transform::Binary { lhs, rhs, op } => {
                let sym = match op {
                    BinaryOp::Sub => "-",
                    BinaryOp::Div => "/",
                };
                format!("({} {sym} {})", self.key(*lhs), self.key(*rhs))
            }
            Transform::Scale { input, factor } => format!("({} * {factor:?})", self.key(*input)),
            Transform::Lag { input, lag } => format!("{}[{lag}]", self.key(*input)),
            Transform::Change { input, lag } => format!("delta({},{lag})", self.key(*input)),
            Transform::TrueRange { high, low, close } => format!(
                "tr({},{},{})",
                self.key(*high),
                self.key(*low),
                self.key(*close)
            ),
            Transform::Rolling {
                input,
                window,
                stat,
            } => format!("{stat}({},{window})", self.key(*input)),
            Transform::LowPass { input, period } => {
                format!("lowpass({},{period})", self.key(*input))
            }
            Transform::Smooth { input, period } => {
                format!("smooth({},{period})", self.key(*input))
            }
            Transform::Normalize {
                input,
                period,
                kind,
            } => {
                let name = match kind {
                    Normalization::PercentRank => "rank",
                    Normalization::ZScore => "zscore",
                };
                format!("{name}({},{period})", self.key(*input))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_describe_the_composition() {
        let mut b = GraphBuilder::new();
        let close = b.bar(BarField::Close);
        let ln = b.ln(close);
        let fit = b.rolling(ln, 10, RollingStat::PolyFit(2));
        let rank = b.normalize(fit, 50, Normalization::PercentRank);
        let g = b.build().unwrap();
        assert_eq!(g.key(rank), "rank(polyfit2(ln(close),10),50)");
    }

    #[test]
    fn first_defined_accumulates_windows_and_lags() {
        let mut b = GraphBuilder::new();
        let close = b.bar(BarField::Close);
        let sma = b.rolling(close, 10, RollingStat::Mean); // 9
        let delta = b.change(sma, 3); // 12
        let rank = b.normalize(delta, 50, Normalization::PercentRank); // 61
        assert_eq!(b.first_defined(sma), 9);
        assert_eq!(b.first_defined(delta), 12);
        assert_eq!(b.first_defined(rank), 61);
    }

    #[test]
    fn retention_follows_consumers() {
        let mut b = GraphBuilder::new();
        let close = b.bar(BarField::Close);
        let ln = b.ln(close);
        b.rolling(ln, 100, RollingStat::StdDev);
        b.rolling(close, 7, RollingStat::Mean);
        let g = b.build().unwrap();
        let SeriesRef::Derived(id) = ln else {
            panic!("ln should be a derived series");
        };
        assert_eq!(g.nodes[id.index()].output.retention(), Some(100));
        assert_eq!(g.bars().series(BarField::Close).retention(), Some(7));
    }

    #[test]
    fn rebinding_a_name_to_another_series_fails() {
        let mut b = GraphBuilder::new();
        let close = b.bar(BarField::Close);
        let high = b.bar(BarField::High);
        b.name("x", close).unwrap();
        b.name("x", close).unwrap();
        assert_eq!(
            b.name("x", high),
            Err(FeatureError::DuplicateName("x".into()))
        );
    }

    #[test]
    fn foreign_handle_is_rejected_at_build() {
        let mut other = GraphBuilder::new();
        let close = other.bar(BarField::Close);
        other.rolling(close, 2, RollingStat::Mean);
        let foreign = other.rolling(close, 3, RollingStat::Mean);

        let mut b = GraphBuilder::new();
        b.ln(foreign);
        assert!(matches!(b.build(), Err(FeatureError::UnknownSeries(_))));
    }
}

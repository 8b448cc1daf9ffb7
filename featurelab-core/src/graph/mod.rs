//! Derived-series graph.
//!
//! Each node is declared once with a transform over bar fields or earlier
//! nodes. Declaration order is a topological order by construction, so one
//! forward pass per bar evaluates every node exactly once with all of its
//! inputs already updated for that bar.
//!
//! Nodes are deduplicated by transform: asking the builder twice for
//! `mean(close, 5)` yields the same series. Feature families are generated by
//! parameterizing one transform over a list of periods.

mod builder;
pub mod transform;

pub use builder::GraphBuilder;
pub use transform::{BinaryOp, RollingStat, Transform, UnaryOp};

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Bar, BarField};
use crate::error::FeatureError;
use crate::series::{BarSeries, Series};

/// Opaque handle to a derived series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesId(usize);

impl SeriesId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Input of a transform: a raw bar field or a derived series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeriesRef {
    Bar(BarField),
    Derived(SeriesId),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) key: String,
    pub(crate) transform: Transform,
    pub(crate) output: Series,
    pub(crate) first_defined: usize,
}

/// Read-only view of everything evaluated before the current node.
pub(crate) struct EvalContext<'a> {
    bars: &'a BarSeries,
    nodes: &'a [Node],
}

impl<'a> EvalContext<'a> {
    pub(crate) fn bars(&self) -> &'a BarSeries {
        self.bars
    }

    pub(crate) fn series(&self, r: SeriesRef) -> &'a Series {
        match r {
            SeriesRef::Bar(field) => self.bars.series(field),
            SeriesRef::Derived(id) => &self.nodes[id.0].output,
        }
    }

    pub(crate) fn value(&self, r: SeriesRef, lag: usize) -> Result<f64, FeatureError> {
        self.series(r).lagged(lag)
    }

    pub(crate) fn window(&self, r: SeriesRef, n: usize) -> Result<Option<&'a [f64]>, FeatureError> {
        self.series(r).window(n)
    }
}

/// The set of derived series, advanced in lock-step with bar arrival.
///
/// Owns the bar history and every derived series; readers borrow it
/// immutably between bars.
#[derive(Debug, Clone)]
pub struct DerivedSeriesGraph {
    bars: BarSeries,
    nodes: Vec<Node>,
    names: HashMap<String, SeriesRef>,
    reported: HashSet<(usize, &'static str)>,
}

impl DerivedSeriesGraph {
    /// Append a bar and evaluate every node once, in declaration order.
    ///
    /// Numeric degeneracies store the NaN sentinel and are logged once per
    /// node and class. Structural violations abort with an error; the bar
    /// is then only partially applied and the run must stop.
    pub fn push_bar(&mut self, bar: &Bar) -> Result<(), FeatureError> {
        self.bars.append(bar)?;
        for i in 0..self.nodes.len() {
            let (done, rest) = self.nodes.split_at_mut(i);
            let node = &mut rest[0];
            let ctx = EvalContext {
                bars: &self.bars,
                nodes: done,
            };
            let value = match node.transform.evaluate(&ctx, &node.output) {
                Ok(v) => v,
                Err(err) if err.is_recoverable() => {
                    if self.reported.insert((i, err.class())) {
                        debug!(series = %node.key, class = err.class(), error = %err,
                            "numeric degeneracy, storing sentinel");
                    }
                    f64::NAN
                }
                Err(err) => return Err(err),
            };
            node.output.push(value);
        }
        Ok(())
    }

    pub fn bars(&self) -> &BarSeries {
        &self.bars
    }

    /// Number of bars processed.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn series(&self, r: SeriesRef) -> &Series {
        match r {
            SeriesRef::Bar(field) => self.bars.series(field),
            SeriesRef::Derived(id) => &self.nodes[id.0].output,
        }
    }

    /// Look up a series registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<SeriesRef, FeatureError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| FeatureError::UnknownSeries(name.to_string()))
    }

    /// Series registered under `name`.
    pub fn named(&self, name: &str) -> Result<&Series, FeatureError> {
        Ok(self.series(self.lookup(name)?))
    }

    /// Value of `r` at `lag`, NaN during warm-up.
    pub fn value(&self, r: SeriesRef, lag: usize) -> Result<f64, FeatureError> {
        self.series(r).lagged(lag)
    }

    /// Canonical key of a series, e.g. `mean(close,5)`.
    pub fn key(&self, r: SeriesRef) -> String {
        match r {
            SeriesRef::Bar(field) => field.as_str().to_string(),
            SeriesRef::Derived(id) => self.nodes[id.0].key.clone(),
        }
    }

    /// Index of the first bar at which `r` can hold a defined value.
    pub fn first_defined(&self, r: SeriesRef) -> usize {
        match r {
            SeriesRef::Bar(_) => 0,
            SeriesRef::Derived(id) => self.nodes[id.0].first_defined,
        }
    }
}

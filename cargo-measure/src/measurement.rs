//! Measurement tree: method, class, package and project results.
use crate::error::{Error, Result};
use serde::Serialize;

/// Granularity of a [`Measurement`], from finest to coarsest.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Method,
    Class,
    Package,
    Project,
}

impl Scope {
    /// The scope children of this scope must have.
    pub fn finer(self) -> Option<Scope> {
        match self {
            Scope::Method => None,
            Scope::Class => Some(Scope::Method),
            Scope::Package => Some(Scope::Class),
            Scope::Project => Some(Scope::Package),
        }
    }
}

/// Value of one metric for one measurement.
///
/// A parent value receiving child contributions is *pending* until its
/// aggregation policy materializes it.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MetricValue {
    pub name: String,
    pub value: f64,
    pub element_count: usize,
    pub violated: bool,
    #[serde(skip)]
    pub(crate) pending: bool,
}

impl MetricValue {
    /// An empty pending value, ready to receive contributions.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: 0.0,
            element_count: 0,
            violated: false,
            pending: true,
        }
    }

    /// A final value computed directly from a walk.
    pub fn computed(
        name: impl Into<String>,
        value: f64,
        element_count: usize,
        violated: bool,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            element_count,
            violated,
            pending: false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}

/// Results of one analyzed unit of code plus the results of its parts.
///
/// Children are identified by `(scope, name)`; metric values by name.
#[derive(Debug, Serialize, Clone)]
pub struct Measurement {
    pub scope: Scope,
    pub name: String,
    metric_values: Vec<MetricValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<Measurement>,
}

impl Measurement {
    pub fn new(scope: Scope, name: impl Into<String>) -> Self {
        Self {
            scope,
            name: name.into(),
            metric_values: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn metric_values(&self) -> &[MetricValue] {
        &self.metric_values
    }

    pub fn metric_value(&self, name: &str) -> Option<&MetricValue> {
        self.metric_values.iter().find(|mv| mv.name == name)
    }

    pub fn metric_value_mut(&mut self, name: &str) -> Option<&mut MetricValue> {
        self.metric_values.iter_mut().find(|mv| mv.name == name)
    }

    /// Insert a value for a metric this measurement has no value for yet.
    pub fn insert_metric_value(&mut self, value: MetricValue) -> Result<&mut MetricValue> {
        if self.metric_value(&value.name).is_some() {
            return Err(Error::AggregationInvariantViolation(format!(
                "{:?} `{}` already holds a value for `{}`",
                self.scope, self.name, value.name
            )));
        }
        self.metric_values.push(value);
        let last = self.metric_values.len() - 1;
        Ok(&mut self.metric_values[last])
    }

    pub fn children(&self) -> &[Measurement] {
        &self.children
    }

    pub fn child(&self, scope: Scope, name: &str) -> Option<&Measurement> {
        self.children
            .iter()
            .find(|c| c.scope == scope && c.name == name)
    }

    /// Insert `child` unless a child with the same identity exists, and
    /// return whichever child now holds that identity.
    ///
    /// The child must sit exactly one scope below `self`.
    pub fn add_or_merge_child(&mut self, child: Measurement) -> Result<&mut Measurement> {
        if self.scope.finer() != Some(child.scope) {
            return Err(Error::AggregationInvariantViolation(format!(
                "{:?} `{}` cannot be a child of {:?} `{}`",
                child.scope, child.name, self.scope, self.name
            )));
        }
        let index = match self
            .children
            .iter()
            .position(|c| c.scope == child.scope && c.name == child.name)
        {
            Some(index) => index,
            None => {
                self.children.push(child);
                self.children.len() - 1
            }
        };
        Ok(&mut self.children[index])
    }

    /// Whether this measurement or any descendant has a violated value.
    pub fn any_violated(&self) -> bool {
        self.metric_values.iter().any(|mv| mv.violated)
            || self.children.iter().any(Measurement::any_violated)
    }
}

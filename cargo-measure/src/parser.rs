//! The metric parser framework shared by every metric.
//!
//! A parser walks one unit with its own listener, turns the collected data
//! into one value per class, verifies it, and folds each class into the
//! package measurement under the metric's [`AggregationPolicy`].
use crate::context::Context;
use crate::error::{Error, Result};
use crate::frontend::{FrontEnd, Listener, SourceUnit};
use crate::measurement::{Measurement, MetricValue, Scope};
use crate::metrics::Metric;
use log::debug;
use serde::Serialize;

/// How child values roll up into their parent.
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Element-count weighted mean, materialized by [`AggregationPolicy::finalize`].
    Average,
    /// Highest value seen; violated as soon as one child is.
    WorstOf,
}

fn invariant(message: String) -> Error {
    Error::AggregationInvariantViolation(message)
}

fn check_final(value: &MetricValue) -> Result<()> {
    if value.is_pending() {
        return Err(invariant(format!("`{}` was never finalized", value.name)));
    }
    if value.element_count == 0 {
        return Err(invariant(format!(
            "`{}` has no contributing elements",
            value.name
        )));
    }
    Ok(())
}

impl AggregationPolicy {
    /// Add a final child value to a pending parent value.
    pub fn accumulate(self, parent: &mut MetricValue, child: &MetricValue) -> Result<()> {
        check_final(child)?;
        if !parent.is_pending() {
            return Err(invariant(format!(
                "`{}` received a contribution after being finalized",
                parent.name
            )));
        }
        match self {
            AggregationPolicy::Average => {
                parent.value += child.value * child.element_count as f64;
            }
            AggregationPolicy::WorstOf => {
                if parent.element_count == 0 || child.value > parent.value {
                    parent.value = child.value;
                }
                parent.violated |= child.violated;
            }
        }
        parent.element_count += child.element_count;
        Ok(())
    }

    /// Combine two final values describing the same element, e.g. a type
    /// whose `impl` blocks are spread over several files.
    pub fn merge(
        self,
        existing: &mut MetricValue,
        incoming: &MetricValue,
        metric: &Metric,
    ) -> Result<()> {
        check_final(existing)?;
        check_final(incoming)?;
        let count = existing.element_count + incoming.element_count;
        match self {
            AggregationPolicy::Average => {
                existing.value = (existing.value * existing.element_count as f64
                    + incoming.value * incoming.element_count as f64)
                    / count as f64;
                existing.violated = metric.verify(existing.value);
            }
            AggregationPolicy::WorstOf => {
                existing.value = existing.value.max(incoming.value);
                existing.violated |= incoming.violated;
            }
        }
        existing.element_count = count;
        Ok(())
    }

    /// Turn a pending parent value into its reported value.
    pub fn finalize(self, value: &mut MetricValue, metric: &Metric) -> Result<()> {
        if !value.is_pending() {
            return Err(invariant(format!("`{}` finalized twice", value.name)));
        }
        if value.element_count == 0 {
            return Err(invariant(format!(
                "`{}` cannot be averaged over zero elements",
                value.name
            )));
        }
        if self == AggregationPolicy::Average {
            value.value /= value.element_count as f64;
            value.violated = metric.verify(value.value);
        }
        value.pending = false;
        Ok(())
    }
}

/// Raw data a listener collected for each class of one unit, in discovery
/// order. Re-entering a class resumes its existing entry.
#[derive(Debug)]
pub struct ClassTable<T> {
    entries: Vec<(String, T)>,
    current: Option<usize>,
}

impl<T> Default for ClassTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            current: None,
        }
    }
}

impl<T: Default> ClassTable<T> {
    pub fn enter(&mut self, name: &str) {
        let index = match self.entries.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                self.entries.push((name.to_string(), T::default()));
                self.entries.len() - 1
            }
        };
        self.current = Some(index);
    }

    pub fn exit(&mut self) {
        self.current = None;
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        let index = self.current?;
        Some(&mut self.entries[index].1)
    }

    pub fn into_entries(self) -> Vec<(String, T)> {
        self.entries
    }
}

/// Final value of one class, as derived by a concrete parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassValue {
    pub name: String,
    pub value: f64,
    pub element_count: usize,
    /// Per-method values, for metrics measured at method scope.
    pub methods: Vec<(String, f64)>,
}

/// A metric computed from a syntax walk.
///
/// Implementors choose the listener collecting raw data, how that data
/// becomes class values, and the aggregation policy. The provided methods
/// are the same for every metric.
pub trait MetricParser {
    type Listener: Listener + Default;

    fn metric(&self) -> &Metric;

    fn policy(&self) -> AggregationPolicy;

    fn extract(&self, listener: Self::Listener) -> Vec<ClassValue>;

    /// Walk an already built tree and return one class measurement per class.
    fn measure_tree<F: FrontEnd>(
        &self,
        frontend: &F,
        tree: &F::Tree,
    ) -> Result<Vec<Measurement>> {
        let metric = self.metric();
        let mut listener = Self::Listener::default();
        frontend.walk(tree, &mut listener);

        let mut classes = Vec::new();
        for class in self.extract(listener) {
            debug!(
                "{} of {}: {} over {} element(s)",
                metric.name, class.name, class.value, class.element_count
            );
            let mut measurement = Measurement::new(Scope::Class, class.name);
            measurement.insert_metric_value(MetricValue::computed(
                metric.name.clone(),
                class.value,
                class.element_count,
                metric.verify(class.value),
            ))?;
            for (name, value) in class.methods {
                let mut method = Measurement::new(Scope::Method, name);
                method.insert_metric_value(MetricValue::computed(
                    metric.name.clone(),
                    value,
                    1,
                    metric.verify(value),
                ))?;
                measurement.add_or_merge_child(method)?;
            }
            classes.push(measurement);
        }
        Ok(classes)
    }

    /// Build the tree of one unit and measure it. A unit that cannot be
    /// parsed is recorded in `ctx` and yields no classes.
    fn measure<F: FrontEnd>(
        &self,
        ctx: &Context,
        frontend: &F,
        unit: &SourceUnit,
    ) -> Result<Vec<Measurement>> {
        match frontend.build_syntax_tree(unit) {
            Ok(tree) => self.measure_tree(frontend, &tree),
            Err(err) if err.is_parse_failure() => {
                ctx.record_error(&err);
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    /// Fold a final child measurement into `parent`, merging with an
    /// existing child of the same identity.
    fn fold(&self, parent: &mut Measurement, child: Measurement) -> Result<()> {
        let metric = self.metric();
        let policy = self.policy();
        let Some(incoming) = child.metric_value(&metric.name).cloned() else {
            parent.add_or_merge_child(child)?;
            return Ok(());
        };

        let known = parent.child(child.scope, &child.name).is_some();
        let grandchildren = if known {
            child.children().to_vec()
        } else {
            Vec::new()
        };
        let target = parent.add_or_merge_child(child)?;
        if known {
            match target.metric_value_mut(&metric.name) {
                Some(existing) => policy.merge(existing, &incoming, metric)?,
                None => {
                    target.insert_metric_value(incoming.clone())?;
                }
            }
            for grandchild in grandchildren {
                let value = grandchild.metric_value(&metric.name).cloned();
                let slot = target.add_or_merge_child(grandchild)?;
                if let Some(value) = value {
                    match slot.metric_value_mut(&metric.name) {
                        Some(existing) => *existing = value,
                        None => {
                            slot.insert_metric_value(value)?;
                        }
                    }
                }
            }
        }

        self.accumulate_into(parent, &incoming)
    }

    /// Add a final value of this metric to the pending value of `parent`.
    fn accumulate_into(&self, parent: &mut Measurement, incoming: &MetricValue) -> Result<()> {
        let metric = self.metric();
        if parent.metric_value(&metric.name).is_none() {
            parent.insert_metric_value(MetricValue::new(metric.name.clone()))?;
        }
        let name = parent.name.clone();
        let slot = parent
            .metric_value_mut(&metric.name)
            .ok_or_else(|| invariant(format!("`{}` lost its value for `{}`", name, metric.name)))?;
        self.policy().accumulate(slot, incoming)
    }

    /// Materialize the value of `parent` once every child has been folded.
    fn finalize(&self, parent: &mut Measurement) -> Result<()> {
        let metric = self.metric();
        match parent.metric_value_mut(&metric.name) {
            Some(value) => self.policy().finalize(value, metric),
            None => Ok(()),
        }
    }

    /// Measure one unit and fold every class it defines into `package`.
    fn parse<F: FrontEnd>(
        &self,
        ctx: &Context,
        frontend: &F,
        package: &mut Measurement,
        unit: &SourceUnit,
    ) -> Result<Vec<Measurement>> {
        let classes = self.measure(ctx, frontend, unit)?;
        for class in &classes {
            self.fold(package, class.clone())?;
        }
        Ok(classes)
    }
}

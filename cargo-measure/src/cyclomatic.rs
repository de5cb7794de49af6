//! Cyclomatic complexity: one plus the decision points of each method,
//! averaged per class.
use crate::context::Context;
use crate::error::Result;
use crate::frontend::{DecisionPoint, Listener};
use crate::metrics::{Metric, CYCLOMATIC_COMPLEXITY};
use crate::parser::{AggregationPolicy, ClassTable, ClassValue, MetricParser};
use log::debug;

#[derive(Debug, Default)]
pub struct ComplexityListener {
    classes: ClassTable<Vec<(String, u32)>>,
    method: Option<(String, u32)>,
}

impl Listener for ComplexityListener {
    fn enter_class(&mut self, name: &str) {
        self.classes.enter(name);
    }

    fn exit_class(&mut self, _name: &str) {
        self.classes.exit();
    }

    fn enter_method(&mut self, name: &str) {
        self.method = Some((name.to_string(), 1));
    }

    fn exit_method(&mut self, _name: &str) {
        if let Some(method) = self.method.take() {
            if let Some(methods) = self.classes.current_mut() {
                methods.push(method);
            }
        }
    }

    fn decision_point(&mut self, kind: DecisionPoint) {
        if let Some((name, complexity)) = &mut self.method {
            debug!("{:?} in {}", kind, name);
            *complexity += 1;
        }
    }
}

#[derive(Debug, Clone)]
pub struct CyclomaticParser {
    metric: Metric,
}

impl CyclomaticParser {
    pub fn new(ctx: &Context) -> Result<Self> {
        Ok(Self {
            metric: ctx.metric(CYCLOMATIC_COMPLEXITY)?.clone(),
        })
    }
}

impl MetricParser for CyclomaticParser {
    type Listener = ComplexityListener;

    fn metric(&self) -> &Metric {
        &self.metric
    }

    fn policy(&self) -> AggregationPolicy {
        AggregationPolicy::Average
    }

    fn extract(&self, listener: ComplexityListener) -> Vec<ClassValue> {
        listener
            .classes
            .into_entries()
            .into_iter()
            // Types without methods have no paths to count.
            .filter(|(_, methods)| !methods.is_empty())
            .map(|(name, methods)| {
                let total: u32 = methods.iter().map(|(_, c)| c).sum();
                ClassValue {
                    name,
                    value: f64::from(total) / methods.len() as f64,
                    element_count: methods.len(),
                    methods: methods
                        .into_iter()
                        .map(|(m, c)| (m, f64::from(c)))
                        .collect(),
                }
            })
            .collect()
    }
}

//! Response for class: the number of distinct methods that can run in
//! response to a message to the class, i.e. its own methods plus every
//! method they invoke.
use crate::context::Context;
use crate::error::Result;
use crate::frontend::{bare_name, Invocation, Listener, Receiver};
use crate::metrics::{Metric, RESPONSE_FOR_CLASS};
use crate::parser::{AggregationPolicy, ClassTable, ClassValue, MetricParser};
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct ResponseListener {
    classes: ClassTable<ResponseSet>,
    in_method: bool,
}

#[derive(Debug, Default)]
struct ResponseSet {
    methods: usize,
    signatures: BTreeSet<String>,
}

impl Listener for ResponseListener {
    fn enter_class(&mut self, name: &str) {
        self.classes.enter(name);
    }

    fn exit_class(&mut self, _name: &str) {
        self.classes.exit();
    }

    fn enter_method(&mut self, name: &str) {
        self.in_method = true;
        if let Some(set) = self.classes.current_mut() {
            set.methods += 1;
            set.signatures.insert(
                Invocation {
                    receiver: Receiver::OwnType,
                    name: bare_name(name).to_string(),
                }
                .signature(),
            );
        }
    }

    fn exit_method(&mut self, _name: &str) {
        self.in_method = false;
    }

    fn invocation(&mut self, call: &Invocation) {
        if !self.in_method {
            return;
        }
        if let Some(set) = self.classes.current_mut() {
            set.signatures.insert(call.signature());
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseParser {
    metric: Metric,
}

impl ResponseParser {
    pub fn new(ctx: &Context) -> Result<Self> {
        Ok(Self {
            metric: ctx.metric(RESPONSE_FOR_CLASS)?.clone(),
        })
    }
}

impl MetricParser for ResponseParser {
    type Listener = ResponseListener;

    fn metric(&self) -> &Metric {
        &self.metric
    }

    fn policy(&self) -> AggregationPolicy {
        AggregationPolicy::Average
    }

    fn extract(&self, listener: ResponseListener) -> Vec<ClassValue> {
        listener
            .classes
            .into_entries()
            .into_iter()
            .filter(|(_, set)| set.methods > 0)
            .map(|(name, set)| ClassValue {
                name,
                value: set.signatures.len() as f64,
                element_count: 1,
                methods: Vec::new(),
            })
            .collect()
    }
}

use crate::error::{Error, Result};
use crate::metrics::{Config, Metric};
use log::error;
use parking_lot::Mutex;

/// State shared by every parser of one analysis run: the configured metrics
/// and the errors collected from units that could not be analyzed.
#[derive(Debug)]
pub struct Context {
    metrics: Vec<Metric>,
    errors: Mutex<Vec<String>>,
}

impl Context {
    pub fn new(metrics: Vec<Metric>) -> Self {
        Self {
            metrics,
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.resolve()?))
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> Result<&Metric> {
        self.metrics
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| Error::InvalidConfiguration(format!("no metric named `{name}`")))
    }

    /// Record a recoverable error so the run can go on with other units.
    pub fn record_error(&self, err: &Error) {
        error!("{}", err);
        self.errors.lock().push(err.to_string());
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Name of the cyclomatic complexity metric.
pub const CYCLOMATIC_COMPLEXITY: &str = "cyclomatic_complexity";
/// Name of the response-for-class metric.
pub const RESPONSE_FOR_CLASS: &str = "response_for_class";
/// Name of the LCOM4 cohesion metric.
pub const LCOM4: &str = "lcom4";

/// Threshold check applied to a computed metric value.
///
/// `verify` returns `true` when the value violates the configured limit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VerificationAlgorithm {
    /// Violated when the value is greater than `max`.
    Max { max: f64 },
    /// Violated when the value is lower than `min`.
    Min { min: f64 },
    /// Violated when the value falls outside `[min, max]`.
    Range { min: f64, max: f64 },
}

impl VerificationAlgorithm {
    pub fn verify(&self, value: f64) -> bool {
        match *self {
            VerificationAlgorithm::Max { max } => value > max,
            VerificationAlgorithm::Min { min } => value < min,
            VerificationAlgorithm::Range { min, max } => value < min || value > max,
        }
    }
}

/// A configured metric: its name and the threshold check for its values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
    pub verification: VerificationAlgorithm,
}

impl Metric {
    pub fn new(name: impl Into<String>, verification: VerificationAlgorithm) -> Self {
        Self {
            name: name.into(),
            verification,
        }
    }

    pub fn verify(&self, value: f64) -> bool {
        self.verification.verify(value)
    }
}

/// Root structure for configuration files.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct MetricsConfig {
    #[serde(default)]
    pub cyclomatic_complexity: MetricConfig,
    #[serde(default)]
    pub response_for_class: MetricConfig,
    #[serde(default)]
    pub lcom4: MetricConfig,
}

/// Which kind of [`VerificationAlgorithm`] a metric table selects.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VerificationKind {
    #[default]
    Max,
    Min,
    Range,
}

/// Per-metric table. Limits left out fall back to the metric's default limit.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub verification: VerificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

fn default_enabled() -> bool {
    true
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            verification: VerificationKind::default(),
            min: None,
            max: None,
        }
    }
}

fn default_cyclomatic_complexity_max() -> f64 {
    10.0
}

fn default_response_for_class_max() -> f64 {
    50.0
}

fn default_lcom4_max() -> f64 {
    1.0
}

impl MetricConfig {
    fn algorithm(&self, name: &str, default_limit: f64) -> Result<VerificationAlgorithm> {
        Ok(match self.verification {
            VerificationKind::Max => VerificationAlgorithm::Max {
                max: self.max.unwrap_or(default_limit),
            },
            VerificationKind::Min => match self.min {
                Some(min) => VerificationAlgorithm::Min { min },
                None => {
                    return Err(Error::InvalidConfiguration(format!(
                        "{name}: min verification needs a min bound"
                    )))
                }
            },
            VerificationKind::Range => match (self.min, self.max) {
                (Some(min), Some(max)) if min <= max => VerificationAlgorithm::Range { min, max },
                _ => {
                    return Err(Error::InvalidConfiguration(format!(
                        "{name}: range verification needs min <= max"
                    )))
                }
            },
        })
    }
}

impl Config {
    /// Resolve every enabled metric table into a [`Metric`].
    pub fn resolve(&self) -> Result<Vec<Metric>> {
        let tables = [
            (
                CYCLOMATIC_COMPLEXITY,
                &self.metrics.cyclomatic_complexity,
                default_cyclomatic_complexity_max(),
            ),
            (
                RESPONSE_FOR_CLASS,
                &self.metrics.response_for_class,
                default_response_for_class_max(),
            ),
            (LCOM4, &self.metrics.lcom4, default_lcom4_max()),
        ];
        let mut metrics = Vec::new();
        for (name, table, default_limit) in tables {
            if table.enabled {
                metrics.push(Metric::new(name, table.algorithm(name, default_limit)?));
            }
        }
        Ok(metrics)
    }
}

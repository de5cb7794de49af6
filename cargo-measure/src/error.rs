//! Error taxonomy of the measurement engine.
use thiserror::Error;

pub type BoxedCause = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    /// The front-end could not build a syntax tree for a unit.
    #[error("failed to parse {unit}: {message}")]
    ParseFailure {
        unit: String,
        message: String,
        #[source]
        source: Option<BoxedCause>,
    },

    /// A requested metric has no entry in the registry.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Misuse of the aggregation framework. Never a data-quality problem.
    #[error("aggregation invariant violated: {0}")]
    AggregationInvariantViolation(String),
}

impl Error {
    pub fn parse_failure<E>(unit: &str, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::ParseFailure {
            unit: unit.to_string(),
            message: cause.to_string(),
            source: Some(Box::new(cause)),
        }
    }

    pub fn is_parse_failure(&self) -> bool {
        matches!(self, Error::ParseFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

//! Source-code quality measurement for Rust workspaces: cyclomatic
//! complexity, response for class and LCOM4 cohesion.

mod analysis;
pub mod cohesion;
mod context;
mod cyclomatic;
mod error;
pub mod frontend;
mod measurement;
mod metrics;
mod parser;
mod response;
mod utils;
pub use utils::error_with_location;

pub use analysis::{
    analyze_project, analyze_units, analyze_units_parallel, analyze_workspace, read_package,
    AnyParser,
};
pub use cohesion::{CohesionListener, CohesionParser};
pub use context::Context;
pub use cyclomatic::{ComplexityListener, CyclomaticParser};
pub use error::{Error, Result};
pub use frontend::{FrontEnd, Listener, RustFrontEnd, RustTree, SourceUnit};
pub use measurement::{Measurement, MetricValue, Scope};
pub use metrics::{
    Config, Metric, MetricConfig, MetricsConfig, VerificationAlgorithm, VerificationKind,
    CYCLOMATIC_COMPLEXITY, LCOM4, RESPONSE_FOR_CLASS,
};
pub use parser::{AggregationPolicy, ClassTable, ClassValue, MetricParser};
pub use response::{ResponseListener, ResponseParser};

//! Internal telemetry for the session engine: structured logging setup and
//! in-process metrics.

pub mod metrics;
pub mod tracing_setup;

pub use metrics::*;
pub use tracing_setup::*;

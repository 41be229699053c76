//! Prometheus metrics and structured logging for bourse.
//!
//! - Prometheus metrics for trades, price lookups, scheduler rounds and
//!   reconciliation audits
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::{gather_text, Metrics};

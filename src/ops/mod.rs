//! Operations and observability.
//!
//! - [`metrics`] - Write-path counters with Prometheus text export

pub mod metrics;

pub use metrics::{MetricsSnapshot, WritePathMetrics};

//! Observability - access logging and metrics

pub mod access_log;
pub mod metrics;

pub use access_log::{AccessLog, AccessLogEntry, RequestTracker};
pub use metrics::{DispatchMetrics, MetricsSnapshot, Outcome};

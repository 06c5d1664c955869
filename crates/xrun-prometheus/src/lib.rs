//! Prometheus implementation of [`xrun_core::metrics::MetricsBackend`].
//!
//! Exposed series, all prefixed with `xrun_`:
//! - `runs_started_total{invoker}`
//! - `runs_completed_total{invoker, outcome}`
//! - `run_duration_seconds{invoker}`
//! - `invoker_errors_total{invoker, kind}`
//!
//! Serving `/metrics` is left to the host application; [`PrometheusMetrics::render`]
//! produces the text exposition body.
mod metrics;
pub use metrics::PrometheusMetrics;

pub use prometheus::{Registry, TextEncoder};

use std::sync::Arc;

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder, proto::MetricFamily};
use xrun_core::metrics::{MetricsBackend, RunOutcome};

const NAMESPACE: &str = "xrun";

/// Seconds; chef converges may run for an hour.
const DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0];

/// Counters and histograms for run pipelines.
///
/// Label values are bounded: invoker names come from the registry,
/// `outcome` is `finished`/`error` and `kind` is an invoker error category.
#[derive(Clone)]
pub struct PrometheusMetrics {
    started: CounterVec,
    completed: CounterVec,
    duration: HistogramVec,
    invoker_errors: CounterVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Register the run metrics in an existing registry.
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let started = CounterVec::new(
            Opts::new("runs_started_total", "Run pipelines started").namespace(NAMESPACE),
            &["invoker"],
        )?;
        let completed = CounterVec::new(
            Opts::new("runs_completed_total", "Run pipelines that reached a terminal state").namespace(NAMESPACE),
            &["invoker", "outcome"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new("run_duration_seconds", "Wall time from pipeline start to terminal state")
                .namespace(NAMESPACE)
                .buckets(DURATION_BUCKETS.to_vec()),
            &["invoker"],
        )?;
        let invoker_errors = CounterVec::new(
            Opts::new("invoker_errors_total", "Invoker failures by category").namespace(NAMESPACE),
            &["invoker", "kind"],
        )?;

        registry.register(Box::new(started.clone()))?;
        registry.register(Box::new(completed.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(invoker_errors.clone()))?;

        Ok(Self {
            started,
            completed,
            duration,
            invoker_errors,
            registry,
        })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition of every registered family.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_run_started(&self, invoker: &str) {
        self.started.with_label_values(&[invoker]).inc();
    }

    fn record_run_completed(&self, invoker: &str, outcome: RunOutcome, duration_ms: u64) {
        self.completed
            .with_label_values(&[invoker, outcome.as_label()])
            .inc();
        self.duration
            .with_label_values(&[invoker])
            .observe(duration_ms as f64 / 1000.0);
    }

    fn record_invoker_error(&self, invoker: &str, error_kind: &str) {
        self.invoker_errors
            .with_label_values(&[invoker, error_kind])
            .inc();
    }
}

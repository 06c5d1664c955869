use std::sync::Arc;

/// Terminal run outcome for metrics classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Run reached `finished`.
    Finished,
    /// Run reached `error`.
    Error,
}

impl RunOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            RunOutcome::Finished => "finished",
            RunOutcome::Error => "error",
        }
    }
}

/// Backend metrics collection interface.
///
/// Implementations are injected into the orchestrator and shared with every pipeline.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Record a pipeline start for the given invoker.
    fn record_run_started(&self, invoker: &str);

    /// Record a terminal state with the pipeline duration in milliseconds.
    fn record_run_completed(&self, invoker: &str, outcome: RunOutcome, duration_ms: u64);

    /// Record an invoker failure by error category.
    ///
    /// Separate from [`MetricsBackend::record_run_completed`]: a run that failed in mapping
    /// completes with [`RunOutcome::Error`] without an invoker error.
    fn record_invoker_error(&self, invoker: &str, error_kind: &str);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;

use crate::metrics::backend::{MetricsBackend, RunOutcome};

/// No-op metrics backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_run_started(&self, _: &str) {}

    #[inline(always)]
    fn record_run_completed(&self, _: &str, _: RunOutcome, _: u64) {}

    #[inline(always)]
    fn record_invoker_error(&self, _: &str, _: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_metrics_is_zero_size() {
        assert_eq!(std::mem::size_of::<NoOpMetrics>(), 0);
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(RunOutcome::Finished.as_label(), "finished");
        assert_eq!(RunOutcome::Error.as_label(), "error");
    }
}

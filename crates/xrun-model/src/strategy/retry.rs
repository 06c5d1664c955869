use serde::{Deserialize, Serialize};

use crate::domain::{DEFAULT_MAX_RUNS, DEFAULT_MIN_RUNS};

/// What to do after a toolchain attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    Stop,
}

/// Bounded repetition of a toolchain run.
///
/// Attempts continue while the last one failed or fewer than `min_runs` have succeeded,
/// never exceeding `max_runs`. The outcome of the last attempt is the outcome of the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub min_runs: u32,
    pub max_runs: u32,
}

impl RetryPolicy {
    /// `max_runs` is at least one.
    pub fn new(min_runs: u32, max_runs: u32) -> Self {
        Self {
            min_runs,
            max_runs: max_runs.max(1),
        }
    }

    /// Decide after `attempts` runs of which `successes` succeeded.
    pub fn decide(&self, attempts: u32, successes: u32, last_failed: bool) -> RetryDecision {
        if attempts >= self.max_runs {
            RetryDecision::Stop
        } else if last_failed || successes < self.min_runs {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_RUNS, DEFAULT_MAX_RUNS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Drive the policy over a scripted sequence of outcomes (`true` = success).
    fn simulate(policy: RetryPolicy, outcomes: &[bool]) -> (u32, bool) {
        let mut attempts = 0;
        let mut successes = 0;
        let mut last = false;
        for &ok in outcomes {
            attempts += 1;
            if ok {
                successes += 1;
            }
            last = ok;
            if policy.decide(attempts, successes, !ok) == RetryDecision::Stop {
                break;
            }
        }
        (attempts, last)
    }

    #[test]
    fn min_two_recovers_after_initial_failure() {
        let (attempts, ok) = simulate(RetryPolicy::new(2, 3), &[false, true, true]);
        assert_eq!(attempts, 3);
        assert!(ok);
    }

    #[test]
    fn exhausted_attempts_report_last_failure() {
        let (attempts, ok) = simulate(RetryPolicy::new(1, 2), &[false, false, true]);
        assert_eq!(attempts, 2);
        assert!(!ok);
    }

    #[test]
    fn default_stops_after_first_success() {
        let (attempts, ok) = simulate(RetryPolicy::default(), &[true, true, true]);
        assert_eq!(attempts, 1);
        assert!(ok);
    }

    #[test]
    fn zero_max_is_raised_to_one() {
        assert_eq!(RetryPolicy::new(1, 0).max_runs, 1);
        assert_eq!(RetryPolicy::new(1, 0).decide(1, 0, true), RetryDecision::Stop);
    }
}

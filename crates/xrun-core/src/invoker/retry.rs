use std::future::Future;

use tracing::{debug, warn};
use xrun_model::{RetryDecision, RetryPolicy};

use super::InvokerError;

/// Repeat `attempt` according to `policy`.
///
/// `attempt` receives the 1-based attempt number. Returns the number of attempts made and the
/// outcome of the last one.
pub async fn run_with_retry<F, Fut>(
    policy: RetryPolicy,
    mut attempt: F,
) -> (u32, Result<(), InvokerError>)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<(), InvokerError>>,
{
    let mut attempts = 0;
    let mut successes = 0;
    loop {
        attempts += 1;
        let res = attempt(attempts).await;
        let failed = res.is_err();
        if let Err(e) = &res {
            warn!(attempt = attempts, error = %e, "attempt failed");
        } else {
            successes += 1;
        }

        match policy.decide(attempts, successes, failed) {
            RetryDecision::Stop => return (attempts, res),
            RetryDecision::Retry => {
                debug!(attempt = attempts, successes, max = policy.max_runs, "running again");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn scripted(outcomes: &[bool]) -> Mutex<Vec<bool>> {
        let mut v = outcomes.to_vec();
        v.reverse();
        Mutex::new(v)
    }

    async fn drive(policy: RetryPolicy, outcomes: &[bool]) -> (u32, bool) {
        let script = scripted(outcomes);
        let (attempts, res) = run_with_retry(policy, |_| {
            let ok = script.lock().unwrap().pop().unwrap_or(false);
            async move {
                if ok {
                    Ok(())
                } else {
                    Err(InvokerError::Toolchain {
                        step: "run",
                        code: Some(1),
                        stderr: String::new(),
                    })
                }
            }
        })
        .await;
        (attempts, res.is_ok())
    }

    #[tokio::test]
    async fn err_ok_ok_with_min_two_finishes_after_three_attempts() {
        assert_eq!(drive(RetryPolicy::new(2, 3), &[false, true, true]).await, (3, true));
    }

    #[tokio::test]
    async fn err_err_with_max_two_fails_after_two_attempts() {
        assert_eq!(drive(RetryPolicy::new(1, 2), &[false, false]).await, (2, false));
    }

    #[tokio::test]
    async fn first_success_is_enough_by_default() {
        assert_eq!(drive(RetryPolicy::default(), &[true]).await, (1, true));
    }
}

mod retry;
pub use retry::{RetryDecision, RetryPolicy};

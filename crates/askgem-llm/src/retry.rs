//! Backoff loop driven by a [`RetryPolicy`].

use std::future::Future;

use askgem_core::{AgentError, RetryPolicy};
use tracing::warn;

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempts are used up.
///
/// Only [`AgentError::Api`] errors whose status the policy lists are retried.
/// The closure receives the 1-based attempt number. The final error is
/// returned unchanged.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, AgentError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
{
    let mut attempt = 1;

    loop {
        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let retryable = err.status().is_some_and(|status| policy.is_retryable(status));
        if !retryable || attempt >= policy.max_attempts() {
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        warn!(
            "Attempt {}/{} failed ({}), retrying in {:?}",
            attempt,
            policy.max_attempts(),
            err,
            delay
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

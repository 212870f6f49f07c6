//! Retry with exponential backoff.
//!
//! The executor is closure-driven so the policy can be exercised without a
//! live HTTP endpoint: each attempt is an async closure returning the
//! attempt outcome, and only retryable failures consume budget.

use std::future::Future;
use std::time::Duration;

use super::error::CompletionError;

/// Retry budget and backoff shape for one logical request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 3 means 4 total attempts.
    pub max_retries: u32,
    /// Base delay, doubled on every failed attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Total attempts including the first.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before the retry that follows `attempt` (0-based):
    /// `base_delay * 2^attempt` plus up to one second of jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt) + subsecond_jitter()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Jitter from the subsecond fraction of the wall clock.
fn subsecond_jitter() -> Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    Duration::from_nanos(u64::from(nanos))
}

/// Run `attempt_fn` under the policy, sleeping between retryable failures.
///
/// Non-retryable failures are returned immediately. Once the budget is
/// exhausted the last observed failure is wrapped in `RetriesExhausted`.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut attempt_fn: F,
) -> Result<T, CompletionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CompletionError>>,
{
    let total = policy.total_attempts();
    let mut last: Option<CompletionError> = None;

    for attempt in 0..total {
        match attempt_fn(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                tracing::warn!(
                    attempt = attempt + 1,
                    total,
                    error = %err,
                    "transient completion failure"
                );
                if attempt + 1 < total {
                    let delay = policy.backoff_delay(attempt);
                    tracing::debug!(
                        backoff_ms = delay.as_millis() as u64,
                        "backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                last = Some(err);
            }
            Err(err) => return Err(err),
        }
    }

    let last = last.unwrap_or(CompletionError::Transport(
        "retry loop made no attempts".to_string(),
    ));
    Err(CompletionError::RetriesExhausted {
        attempts: total,
        last: Box::new(last),
    })
}

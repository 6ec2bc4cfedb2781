//! Retry executor
//!
//! Wraps a single unit of work with classification-aware retry and
//! exponential backoff with jitter. The executor performs no I/O itself and
//! is agnostic to what the unit of work does; the error classification on
//! `AgentError` decides whether a failure is worth another attempt.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::AgentError;

/// Retry policy for one unit of work
#[derive(Debug, Clone, Copy)]
pub struct RetryOptions {
    /// Total number of attempts (not additional retries)
    pub max_retries: u32,
    /// Base delay for the exponential backoff
    pub base_delay: Duration,
    /// Upper bound for the exponential part of the delay
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

/// Run `operation` up to `options.max_retries` times.
///
/// Non-retryable errors propagate immediately without any delay. Retryable
/// errors sleep `min(base_delay * 2^attempt, max_delay) + jitter(0..1s)`
/// before the next attempt. The final attempt's failure always propagates.
pub async fn retry_with_backoff<T, F, Fut>(
    options: RetryOptions,
    mut operation: F,
) -> Result<T, AgentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
{
    let mut last_error = None;

    for attempt in 0..options.max_retries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.is_retryable() {
                    return Err(error);
                }

                // Last attempt: propagate without waiting
                if attempt + 1 == options.max_retries {
                    return Err(error);
                }

                let exponential = options
                    .base_delay
                    .saturating_mul(2u32.saturating_pow(attempt))
                    .min(options.max_delay);
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..1000));
                let delay = exponential + jitter;

                tracing::warn!(
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retryable failure, backing off"
                );

                last_error = Some(error);
                tokio::time::sleep(delay).await;
            }
        }
    }

    // Only reachable with max_retries == 0
    Err(last_error
        .unwrap_or_else(|| AgentError::Unclassified("retry budget was zero".to_string())))
}

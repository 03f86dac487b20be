//! Timeout and retry around calls to external services.
//!
//! Payment charges and refunds are activities: each attempt runs under a
//! start-to-close timeout and retryable failures are retried with exponential
//! backoff. Process logic never retries on its own.

use std::future::Future;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable as _};

/// Errors that can tell whether another attempt might succeed.
pub trait Retryable: Sized {
    /// Returns true if the failed call may be attempted again.
    fn is_retryable(&self) -> bool;

    /// Builds the error reported when an attempt exceeds its timeout.
    fn timed_out(after: Duration) -> Self;
}

/// Exponential backoff between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_interval: Duration,
    pub backoff_coefficient: f32,
    pub maximum_interval: Duration,
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff for the retries after the first attempt.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_interval)
            .with_factor(self.backoff_coefficient)
            .with_max_delay(self.maximum_interval)
            .with_max_times(self.max_attempts.saturating_sub(1) as usize)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(30),
        }
    }
}

/// Options applied to every activity call.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    pub start_to_close_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            start_to_close_timeout: Duration::from_secs(5 * 60),
            retry: RetryPolicy::default(),
        }
    }
}

/// Runs `call` under the activity options.
///
/// Returns the first success, the first non-retryable error, or the last error
/// once `max_attempts` is used up.
pub async fn execute<T, E, F, Fut>(name: &'static str, options: &ActivityOptions, mut call: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let timeout = options.start_to_close_timeout;
    let mut attempt = 1u32;

    let attempt_once = || {
        let pending = call();
        async move {
            match tokio::time::timeout(timeout, pending).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(timeout)),
            }
        }
    };

    let result = attempt_once
        .retry(options.retry.backoff())
        .when(|error: &E| error.is_retryable())
        .notify(|error: &E, delay: Duration| {
            tracing::warn!(
                activity = name,
                attempt,
                %error,
                delay_ms = delay.as_millis() as u64,
                "activity attempt failed, retrying"
            );
            attempt += 1;
        })
        .await;

    if let Err(error) = &result {
        tracing::warn!(activity = name, %error, "activity failed");
    }
    result
}

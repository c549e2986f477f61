//! Retry with backoff for transient failures
//!
//! This module provides the retry half of the resilience core:
//! - Backoff families: exponential, linear, fixed and custom, capped at `max_delay`
//! - Optional ±25% uniform jitter to avoid synchronized retries
//! - Per-attempt timeout; a timed-out attempt counts against `max_attempts`
//! - Aggregate statistics shared by every invocation of one strategy
//!
//! Strategies are built explicitly with [`RetryBuilder`] or used ad hoc through
//! [`retry_with`].
//!
//! ```rust
//! use aicli_resilience::retry::{retry_with, RetryOptions};
//! use aicli_resilience::Failure;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let options = RetryOptions {
//!     initial_delay: Duration::from_millis(1),
//!     jitter: false,
//!     ..RetryOptions::default()
//! };
//!
//! let mut calls = 0;
//! let value = retry_with(options, || {
//!     calls += 1;
//!     let attempt = calls;
//!     async move {
//!         if attempt < 2 {
//!             Err(Failure::network("connection reset by peer"))
//!         } else {
//!             Ok("done")
//!         }
//!     }
//! })
//! .await;
//!
//! assert_eq!(value.ok(), Some("done"));
//! # }
//! ```

pub mod backoff;
pub mod builder;

pub use backoff::{apply_jitter, Backoff, JITTER_RATIO};
pub use builder::RetryBuilder;

use crate::error::{ResilienceError, ResilienceResult};
use crate::logging::{log_debug, log_warn};
use crate::taxonomy::{is_transient_message, Failure, FailureResult};

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Decides whether a failure is worth another attempt.
pub type RetryPredicate = Arc<dyn Fn(&Failure) -> bool + Send + Sync>;

/// Called before sleeping: `(attempt, failure, delay)`.
pub type OnRetry = Arc<dyn Fn(u32, &Failure, Duration) + Send + Sync>;

/// Called once when an invocation gives up: `(attempt, failure)`.
pub type OnFailure = Arc<dyn Fn(u32, &Failure) + Send + Sync>;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Growth factor for exponential backoff
    pub backoff_multiplier: f64,
    /// Add ±25% uniform jitter to each delay
    pub jitter: bool,
    /// Timeout for each individual attempt
    pub timeout: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(60_000),
            backoff_multiplier: 2.0,
            jitter: true,
            timeout: Duration::from_millis(30_000),
        }
    }
}

impl RetryOptions {
    pub fn validate(&self) -> ResilienceResult<()> {
        if self.max_attempts == 0 {
            return Err(ResilienceError::invalid_retry_options(
                "max_attempts must be at least 1",
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ResilienceError::invalid_retry_options(format!(
                "backoff_multiplier must be >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.max_delay < self.initial_delay {
            return Err(ResilienceError::invalid_retry_options(format!(
                "max_delay ({}ms) is shorter than initial_delay ({}ms)",
                self.max_delay.as_millis(),
                self.initial_delay.as_millis()
            )));
        }
        if self.timeout.is_zero() {
            return Err(ResilienceError::invalid_retry_options(
                "timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Aggregate statistics across every invocation of one strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryStats {
    /// Invocations of `execute`
    pub total_operations: u64,
    /// Attempts across all invocations, timeouts included
    pub total_attempts: u64,
    /// Invocations that ended in success
    pub successful_retries: u64,
    /// Invocations that ended in failure
    pub failed_retries: u64,
    /// Delays slept between attempts
    pub total_retries: u64,
    pub total_delay: Duration,
    /// `total_delay / total_retries`
    pub average_delay: Duration,
}

/// Per-invocation state. Never shared between concurrent invocations.
#[derive(Debug, Default)]
struct RetryState {
    attempt: u32,
    total_delay: Duration,
    last_error: Option<Failure>,
}

/// Default retry predicate: retryable per the registry, or a transient message
pub fn default_is_retryable(failure: &Failure) -> bool {
    failure.is_retryable() || is_transient_message(failure.message())
}

/// A reusable retry policy with its own statistics.
///
/// Shared as `Arc<RetryStrategy>`; concurrent invocations interleave and all
/// feed the same [`RetryStats`].
pub struct RetryStrategy {
    name: Option<String>,
    options: RetryOptions,
    backoff: Backoff,
    is_retryable: RetryPredicate,
    on_retry: Option<OnRetry>,
    on_failure: Option<OnFailure>,
    stats: Mutex<RetryStats>,
}

impl fmt::Debug for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryStrategy")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::exponential(RetryOptions::default())
    }
}

impl RetryStrategy {
    pub fn builder() -> RetryBuilder {
        RetryBuilder::new()
    }

    /// Exponential strategy using `options.backoff_multiplier`.
    pub fn exponential(options: RetryOptions) -> Self {
        let multiplier = options.backoff_multiplier;
        Self::with_backoff(options, Backoff::Exponential { multiplier })
    }

    pub fn linear(options: RetryOptions) -> Self {
        Self::with_backoff(options, Backoff::Linear)
    }

    pub fn fixed(options: RetryOptions) -> Self {
        Self::with_backoff(options, Backoff::Fixed)
    }

    pub fn custom<F>(options: RetryOptions, delay: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self::with_backoff(options, Backoff::custom(delay))
    }

    pub fn with_backoff(options: RetryOptions, backoff: Backoff) -> Self {
        Self {
            name: None,
            options,
            backoff,
            is_retryable: Arc::new(default_is_retryable),
            on_retry: None,
            on_failure: None,
            stats: Mutex::new(RetryStats::default()),
        }
    }

    pub(crate) fn from_parts(
        name: Option<String>,
        options: RetryOptions,
        backoff: Backoff,
        is_retryable: RetryPredicate,
        on_retry: Option<OnRetry>,
        on_failure: Option<OnFailure>,
    ) -> Self {
        Self {
            name,
            options,
            backoff,
            is_retryable,
            on_retry,
            on_failure,
            stats: Mutex::new(RetryStats::default()),
        }
    }

    pub fn options(&self) -> &RetryOptions {
        &self.options
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_retryable(&self, failure: &Failure) -> bool {
        (self.is_retryable)(failure)
    }

    /// Delay to sleep after `attempt` failed, jittered if enabled, never
    /// above `max_delay`.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self
            .backoff
            .base_delay(attempt, self.options.initial_delay, self.options.max_delay);
        if self.options.jitter {
            apply_jitter(base, self.options.max_delay)
        } else {
            base
        }
    }

    pub fn stats(&self) -> RetryStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn reset_stats(&self) {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = RetryStats::default();
    }

    /// Run `operation` until it succeeds, fails with a non-retryable failure,
    /// or runs out of attempts. The last failure is returned unchanged.
    ///
    /// Operation errors are classified into [`Failure`] through `Into`, so
    /// `std::io::Error`, `anyhow::Error` and friends work directly.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> FailureResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        let started = Instant::now();
        let max_attempts = self.options.max_attempts.max(1);
        let mut state = RetryState::default();

        loop {
            state.attempt += 1;
            log_debug!(
                strategy = self.label(),
                attempt = state.attempt,
                max_attempts = max_attempts,
                previous_error = ?state.last_error.as_ref().map(Failure::code),
                "Executing operation with retry"
            );

            let failure = match tokio::time::timeout(self.options.timeout, operation()).await {
                Ok(Ok(value)) => {
                    self.record_outcome(&state, true);
                    log_debug!(
                        strategy = self.label(),
                        attempt = state.attempt,
                        duration_ms = started.elapsed().as_millis(),
                        "Operation succeeded"
                    );
                    return Ok(value);
                }
                Ok(Err(error)) => error.into(),
                Err(_elapsed) => Failure::timeout(self.label(), self.options.timeout)
                    .with_context("attempt", state.attempt),
            };

            if state.attempt >= max_attempts || !self.is_retryable(&failure) {
                if let Some(on_failure) = &self.on_failure {
                    on_failure(state.attempt, &failure);
                }
                self.record_outcome(&state, false);
                log_warn!(
                    strategy = self.label(),
                    attempts = state.attempt,
                    retryable = self.is_retryable(&failure),
                    total_duration_ms = started.elapsed().as_millis(),
                    error_code = failure.code(),
                    error = %failure,
                    "Operation failed, giving up"
                );
                return Err(failure);
            }

            let delay = self.delay_for(state.attempt, &failure);
            if let Some(on_retry) = &self.on_retry {
                on_retry(state.attempt, &failure, delay);
            }
            log_debug!(
                strategy = self.label(),
                attempt = state.attempt,
                delay_ms = delay.as_millis(),
                error_code = failure.code(),
                "Operation failed, retrying after delay"
            );

            state.total_delay += delay;
            state.last_error = Some(failure);
            sleep(delay).await;
        }
    }

    /// Wrap `operation` into a reusable closure that retries through this
    /// strategy on every call.
    pub fn wrap<F, Fut, T, E>(
        self: Arc<Self>,
        operation: F,
    ) -> impl Fn() -> BoxFuture<'static, FailureResult<T>> + Send + Sync
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Into<Failure> + Send + 'static,
    {
        let operation = Arc::new(operation);
        move || {
            let strategy = Arc::clone(&self);
            let operation = Arc::clone(&operation);
            Box::pin(async move { strategy.execute(|| (*operation)()).await })
        }
    }

    /// A server-provided retry-after hint stretches the delay, still capped.
    fn delay_for(&self, attempt: u32, failure: &Failure) -> Duration {
        let delay = self.calculate_delay(attempt);
        match failure.retry_after() {
            Some(hint) => delay.max(hint).min(self.options.max_delay),
            None => delay,
        }
    }

    fn record_outcome(&self, state: &RetryState, succeeded: bool) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.total_operations += 1;
        stats.total_attempts += u64::from(state.attempt);
        stats.total_retries += u64::from(state.attempt.saturating_sub(1));
        stats.total_delay += state.total_delay;
        if succeeded {
            stats.successful_retries += 1;
        } else {
            stats.failed_retries += 1;
        }
        if stats.total_retries > 0 {
            let retries = u32::try_from(stats.total_retries).unwrap_or(u32::MAX);
            stats.average_delay = stats.total_delay / retries;
        }
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(self.backoff.name())
    }
}

/// Retry `operation` with a one-off exponential strategy built from `options`.
///
/// Invalid options are reported as a configuration [`Failure`] without
/// invoking the operation.
pub async fn retry_with<F, Fut, T, E>(options: RetryOptions, operation: F) -> FailureResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<Failure>,
{
    options.validate()?;
    RetryStrategy::exponential(options).execute(operation).await
}

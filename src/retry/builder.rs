//! Fluent construction of [`RetryStrategy`] values.

use super::{
    default_is_retryable, Backoff, OnFailure, OnRetry, RetryOptions, RetryPredicate,
    RetryStrategy,
};
use crate::error::ResilienceResult;
use crate::taxonomy::Failure;
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`RetryStrategy`].
///
/// ```rust
/// use aicli_resilience::retry::RetryBuilder;
/// use std::time::Duration;
///
/// let strategy = RetryBuilder::new()
///     .name("github.issues")
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200))
///     .linear()
///     .jitter(false)
///     .build()
///     .unwrap();
///
/// assert_eq!(strategy.calculate_delay(3), Duration::from_millis(600));
/// ```
#[derive(Default)]
pub struct RetryBuilder {
    name: Option<String>,
    options: RetryOptions,
    backoff: Option<Backoff>,
    is_retryable: Option<RetryPredicate>,
    on_retry: Option<OnRetry>,
    on_failure: Option<OnFailure>,
}

impl RetryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing options instead of the defaults.
    pub fn from_options(options: RetryOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.options.max_attempts = max_attempts;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.options.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.options.max_delay = delay;
        self
    }

    pub fn jitter(mut self, jitter: bool) -> Self {
        self.options.jitter = jitter;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Exponential backoff with the given multiplier.
    pub fn exponential(mut self, multiplier: f64) -> Self {
        self.options.backoff_multiplier = multiplier;
        self.backoff = Some(Backoff::Exponential { multiplier });
        self
    }

    pub fn linear(mut self) -> Self {
        self.backoff = Some(Backoff::Linear);
        self
    }

    pub fn fixed(mut self) -> Self {
        self.backoff = Some(Backoff::Fixed);
        self
    }

    pub fn custom<F>(mut self, delay: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.backoff = Some(Backoff::custom(delay));
        self
    }

    /// Replace the default retry predicate.
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Failure) -> bool + Send + Sync + 'static,
    {
        self.is_retryable = Some(Arc::new(predicate));
        self
    }

    pub fn on_retry<C>(mut self, callback: C) -> Self
    where
        C: Fn(u32, &Failure, Duration) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(callback));
        self
    }

    pub fn on_failure<C>(mut self, callback: C) -> Self
    where
        C: Fn(u32, &Failure) + Send + Sync + 'static,
    {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    /// Validate the options and build the strategy. Exponential backoff with
    /// `backoff_multiplier` is used unless another family was chosen.
    pub fn build(self) -> ResilienceResult<RetryStrategy> {
        self.options.validate()?;
        let backoff = self.backoff.unwrap_or(Backoff::Exponential {
            multiplier: self.options.backoff_multiplier,
        });
        Ok(RetryStrategy::from_parts(
            self.name,
            self.options,
            backoff,
            self.is_retryable
                .unwrap_or_else(|| Arc::new(default_is_retryable)),
            self.on_retry,
            self.on_failure,
        ))
    }
}

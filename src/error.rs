//! Crate-level errors for misuse and misconfiguration of the core.
//!
//! Runtime failures raised by collaborators travel as [`Failure`](crate::Failure)
//! values through the handler pipeline. [`ResilienceError`] is reserved for
//! problems in how the core itself is driven: invalid configuration, invalid
//! retry options, or calling an operation with arguments it cannot accept.
//!
//! # Example
//!
//! ```rust
//! use aicli_resilience::{ResilienceError, ResilienceResult};
//!
//! fn check_attempts(max_attempts: u32) -> ResilienceResult<()> {
//!     if max_attempts == 0 {
//!         return Err(ResilienceError::invalid_retry_options(
//!             "max_attempts must be at least 1",
//!         ));
//!     }
//!     Ok(())
//! }
//!
//! assert!(check_attempts(0).is_err());
//! ```

use crate::logging::{log_error, log_warn};
use crate::taxonomy::{Failure, FailureKind};
use thiserror::Error;

/// Convenient result type for core operations.
pub type ResilienceResult<T> = std::result::Result<T, ResilienceError>;

/// Errors raised by the core when it is configured or called incorrectly.
///
/// | Variant | Meaning |
/// |---------|---------|
/// | `Configuration` | A config value is missing or out of range |
/// | `InvalidRetryOptions` | Retry options violate their invariants |
/// | `InvalidBreakerConfig` | Circuit breaker thresholds are unusable |
/// | `EmptyAggregate` | `aggregate_errors` was given no failures |
/// | `PayloadMismatch` | A recovered value could not be converted to the caller's type |
#[derive(Error, Debug)]
pub enum ResilienceError {
    /// A configuration value is missing or invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// Retry options violate their invariants.
    #[error("Invalid retry options: {message}")]
    InvalidRetryOptions {
        /// Which invariant was violated.
        message: String,
    },

    /// Circuit breaker configuration cannot work.
    #[error("Invalid circuit breaker configuration: {message}")]
    InvalidBreakerConfig {
        /// Which threshold is unusable.
        message: String,
    },

    /// `aggregate_errors` was called with an empty list.
    #[error("Cannot aggregate an empty list of failures")]
    EmptyAggregate,

    /// A recovered payload did not deserialize into the expected type.
    #[error("Recovered payload does not match the expected type: {message}")]
    PayloadMismatch {
        /// Deserializer message.
        message: String,
    },
}

impl ResilienceError {
    pub fn configuration(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(
            error_type = "configuration",
            message = %message,
            "Resilience configuration validation failed"
        );
        Self::Configuration { message }
    }

    pub fn invalid_retry_options(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(
            error_type = "invalid_retry_options",
            message = %message,
            "Retry options rejected"
        );
        Self::InvalidRetryOptions { message }
    }

    pub fn invalid_breaker_config(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(
            error_type = "invalid_breaker_config",
            message = %message,
            "Circuit breaker configuration rejected"
        );
        Self::InvalidBreakerConfig { message }
    }

    /// Create an empty-aggregate error (logs at ERROR level).
    pub fn empty_aggregate() -> Self {
        log_error!(
            error_type = "empty_aggregate",
            "aggregate_errors called with no failures"
        );
        Self::EmptyAggregate
    }

    pub fn payload_mismatch(message: impl Into<String>) -> Self {
        let message = message.into();
        log_warn!(
            error_type = "payload_mismatch",
            message = %message,
            "Recovered payload could not be converted"
        );
        Self::PayloadMismatch { message }
    }
}

impl From<ResilienceError> for Failure {
    fn from(error: ResilienceError) -> Self {
        let kind = match &error {
            ResilienceError::Configuration { .. }
            | ResilienceError::InvalidRetryOptions { .. }
            | ResilienceError::InvalidBreakerConfig { .. } => FailureKind::InvalidConfig,
            ResilienceError::EmptyAggregate | ResilienceError::PayloadMismatch { .. } => {
                FailureKind::Internal
            }
        };
        Failure::new(kind, error.to_string())
    }
}

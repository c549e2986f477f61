//! # aicli-resilience
//!
//! Resilience and error-handling core for the aicli developer-automation tool.
//!
//! ## Key Features
//!
//! - **Failure Taxonomy**: One [`Failure`] type with a kind hierarchy, string codes and a metadata registry
//! - **Error Context**: Correlated, sanitizable context that follows a logical operation across `.await`
//! - **Retry**: Exponential, linear, fixed and custom backoff with jitter and per-attempt timeouts
//! - **Circuit Breaker**: Closed / Open / HalfOpen state machine keyed by dependency or error code
//! - **Error Handler**: Logging, reporting, recovery strategies, type handlers, retry and fallback in one pipeline
//! - **Deduplication**: Identical failures are logged and reported once per window
//!
//! ## Example
//!
//! ```rust,no_run
//! use aicli_resilience::{
//!     run_with_context, ContextOptions, Failure, HandleOptions, ResilienceConfig,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ResilienceConfig::from_env()?;
//! config.init_logging();
//! let handler = config.build_handler()?;
//! let contexts = config.context_manager();
//!
//! let context = contexts.create_context(ContextOptions::default().with_field("command", "sync"));
//! let issues: Result<Vec<String>, _> = run_with_context(context, async {
//!     handler
//!         .wrap(
//!             || async { Err::<Vec<String>, _>(Failure::external("github", "502 Bad Gateway")) },
//!             None,
//!             HandleOptions::default(),
//!         )
//!         .await
//! })
//! .await;
//!
//! if let Err(result) = issues {
//!     eprintln!("{}", handler.format(&result.error, None));
//! }
//! # Ok(())
//! # }
//! ```

// Allow missing errors documentation - errors are self-documenting via type signatures
#![allow(clippy::missing_errors_doc)]

// Logging utilities (re-exports tracing with log_* naming)
pub mod logging;

pub mod circuit_breaker;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod handler;
pub mod reporting;
pub mod retry;
pub mod taxonomy;

#[cfg(test)]
pub mod tests;

// Re-export main types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitBreakerStats,
    CircuitState,
};
pub use config::{ContextConfig, LoggingConfig, ResilienceConfig};
pub use context::{
    bind_current, current_context, run_with_context, spawn_with_context, sync_scope,
    ContextManager, ContextOptions, ErrorContext, PrivacyOptions,
};
pub use error::{ResilienceError, ResilienceResult};
pub use format::{DefaultFormatter, ErrorFormatter, FormatConfig, FormatStyle};
pub use handler::{
    aggregate_errors, ErrorHandler, ErrorHandlerBuilder, ErrorHandlerConfig, ErrorMetrics,
    ErrorResult, FallbackHandler, HandleOptions, HandleOutcome, RecoveryHandler, RecoverySource,
    RecoveryStage,
};
pub use reporting::{
    DedupLogger, DedupReporter, ErrorReporter, ErrorSink, Logger, MemorySink, StderrSink,
    TracingLogger, TracingReporter,
};
pub use retry::{retry_with, Backoff, RetryBuilder, RetryOptions, RetryStats, RetryStrategy};

// Re-export the taxonomy
pub use taxonomy::{
    classify, codes, ErrorCategory, ErrorCodeMetadata, ErrorCodeRegistry, ErrorSeverity, Failure,
    FailureKind, FailureRecord, FailureResult,
};

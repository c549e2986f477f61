//! Outbound adapters: loggers, reporters and sinks.
//!
//! The handler never writes anywhere itself. It talks to three narrow traits:
//! - [`Logger`] - structured log records (`error` / `warn`)
//! - [`ErrorReporter`] - error-tracking services (async `capture_exception`)
//! - [`ErrorSink`] - rendered text for the operator's terminal
//!
//! [`DedupLogger`] and [`DedupReporter`] wrap the first two and suppress
//! identical failures inside a time window.

pub mod dedup;
pub mod reporter;
pub mod sink;

pub use dedup::{DedupLogger, DEFAULT_DEDUP_WINDOW};
pub use reporter::{DedupReporter, ErrorReporter, TracingReporter};
pub use sink::{ErrorSink, MemorySink, StderrSink};

use crate::logging::{log_error, log_warn};
use serde_json::Value;

/// Structured log sink.
#[cfg_attr(test, mockall::automock)]
pub trait Logger: Send + Sync {
    fn error(&self, message: &str, meta: &Value);
    fn warn(&self, message: &str, meta: &Value);
}

/// [`Logger`] backed by `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn error(&self, message: &str, meta: &Value) {
        log_error!(meta = %meta, "{}", message);
    }

    fn warn(&self, message: &str, meta: &Value) {
        log_warn!(meta = %meta, "{}", message);
    }
}

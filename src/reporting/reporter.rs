//! Error-tracking reporters.

use crate::context::ErrorContext;
use crate::logging::{log_info, log_trace};
use crate::taxonomy::{Failure, FailureRecord};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Sends failures to an error-tracking service.
///
/// A returned `Err` is logged as a warning by the caller and never replaces
/// the failure being reported.
#[async_trait]
pub trait ErrorReporter: Send + Sync {
    /// Name used in warnings about this reporter.
    fn name(&self) -> &str {
        "reporter"
    }

    async fn capture_exception(
        &self,
        record: &FailureRecord,
        context: Option<&ErrorContext>,
    ) -> Result<(), Failure>;
}

/// Reporter that records captures as `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

#[async_trait]
impl ErrorReporter for TracingReporter {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn capture_exception(
        &self,
        record: &FailureRecord,
        context: Option<&ErrorContext>,
    ) -> Result<(), Failure> {
        log_info!(
            error_id = %record.id,
            error_code = %record.code,
            severity = %record.severity,
            correlation_id = context.map(|c| c.correlation_id.as_str()),
            "Captured exception"
        );
        Ok(())
    }
}

/// Forwards each distinct failure to the inner reporter at most once per
/// window, using the same key as [`DedupLogger`](super::DedupLogger).
pub struct DedupReporter {
    inner: Arc<dyn ErrorReporter>,
    window: Duration,
    seen: Mutex<HashMap<String, Instant>>,
}

impl DedupReporter {
    pub fn new(inner: Arc<dyn ErrorReporter>, window: Duration) -> Self {
        Self {
            inner,
            window,
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Claims the key if it was not reported within the window.
    fn claim(&self, key: String) -> bool {
        let now = Instant::now();
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let window = self.window;
        seen.retain(|_, at| now.duration_since(*at) < window);
        if seen.contains_key(&key) {
            return false;
        }
        seen.insert(key, now);
        true
    }
}

#[async_trait]
impl ErrorReporter for DedupReporter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn capture_exception(
        &self,
        record: &FailureRecord,
        context: Option<&ErrorContext>,
    ) -> Result<(), Failure> {
        let key = record.dedup_key();
        if !self.claim(key) {
            log_trace!(error_code = %record.code, "Suppressed duplicate report");
            return Ok(());
        }
        self.inner.capture_exception(record, context).await
    }
}

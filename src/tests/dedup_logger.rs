// Unit Tests for Deduplicated Logging and Reporting
//
// UNIT UNDER TEST: DedupLogger, DedupReporter
//
// BUSINESS RESPONSIBILITY:
//   - Keeps logs readable when the same failure repeats in a tight loop
//   - Logs each distinct failure once per window, with an occurrence count
//   - Sends only sanitized context to loggers
//   - Suppresses duplicate reports to error-tracking services
//
// TEST COVERAGE:
//   - Identical failures inside the window are logged once
//   - Window expiry re-logs with incremented occurrences (paused clock)
//   - Distinct messages or codes are logged independently
//   - Logged metadata carries the sanitized context
//   - Warnings are never deduplicated
//   - DedupReporter forwards once per window

use crate::context::{ContextOptions, ErrorContext};
use crate::reporting::{DedupLogger, DedupReporter, ErrorReporter, MockLogger};
use crate::taxonomy::{ContextBag, Failure, FailureRecord};

use async_trait::async_trait;
use mockall::predicate::{always, eq};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[cfg(test)]
mod dedup_logger_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_identical_failures_are_logged_once_per_window() {
        // Arrange
        let mut mock = MockLogger::new();
        mock.expect_error()
            .with(eq("[NETWORK_ERROR] connection reset"), always())
            .times(1)
            .return_const(());
        let logger = DedupLogger::new(Arc::new(mock), Duration::from_secs(60));

        // Act
        let first = logger.log_error(&Failure::network("connection reset"), None, &ContextBag::new());
        let second =
            logger.log_error(&Failure::network("connection reset"), None, &ContextBag::new());

        // Assert
        assert!(first, "First occurrence is emitted");
        assert!(!second, "Duplicate inside the window is suppressed");
        assert_eq!(logger.occurrences(&Failure::network("connection reset")), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_logs_again_with_occurrence_count() {
        // Arrange
        let occurrences = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&occurrences);
        let mut mock = MockLogger::new();
        mock.expect_error()
            .times(2)
            .returning(move |_message: &str, meta: &Value| {
                seen.lock().unwrap().push(meta["occurrences"].clone());
            });
        let logger = DedupLogger::new(Arc::new(mock), Duration::from_millis(500));
        let failure = Failure::timeout("linear.sync", Duration::from_secs(5));

        // Act
        logger.log_error(&failure, None, &ContextBag::new());
        tokio::time::advance(Duration::from_millis(499)).await;
        let inside = logger.log_error(&failure, None, &ContextBag::new());
        tokio::time::advance(Duration::from_millis(1)).await;
        let after = logger.log_error(&failure, None, &ContextBag::new());

        // Assert
        assert!(!inside);
        assert!(after, "Window is measured from the last emission");
        assert_eq!(
            *occurrences.lock().unwrap(),
            vec![serde_json::json!(1), serde_json::json!(2)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_failures_are_logged_independently() {
        // Arrange
        let mut mock = MockLogger::new();
        mock.expect_error().times(3).return_const(());
        let logger = DedupLogger::with_default_window(Arc::new(mock));

        // Act
        logger.log_error(&Failure::network("reset"), None, &ContextBag::new());
        logger.log_error(&Failure::network("refused"), None, &ContextBag::new());
        logger.log_error(
            &Failure::with_code(crate::FailureKind::Network, "NETWORK_PROXY", "reset"),
            None,
            &ContextBag::new(),
        );

        // Assert
        assert_eq!(logger.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_keys_are_evicted() {
        // Arrange
        let mut mock = MockLogger::new();
        mock.expect_error().times(2).return_const(());
        let logger = DedupLogger::new(Arc::new(mock), Duration::from_secs(1));

        // Act
        logger.log_error(&Failure::network("first"), None, &ContextBag::new());
        tokio::time::advance(Duration::from_secs(2)).await;
        logger.log_error(&Failure::network("second"), None, &ContextBag::new());

        // Assert
        assert_eq!(logger.len(), 1, "Expired entries are dropped on the next log");
        assert_eq!(logger.occurrences(&Failure::network("first")), 0);
    }

    #[tokio::test]
    async fn test_logged_metadata_contains_sanitized_context() {
        // Arrange
        let captured = Arc::new(Mutex::new(Value::Null));
        let sink = Arc::clone(&captured);
        let mut mock = MockLogger::new();
        mock.expect_error()
            .times(1)
            .returning(move |_message: &str, meta: &Value| {
                *sink.lock().unwrap() = meta.clone();
            });
        let logger = DedupLogger::with_default_window(Arc::new(mock));
        let context = ErrorContext::new(
            ContextOptions::default()
                .with_field("password", "hunter2")
                .with_field("command", "deploy"),
        );
        let mut metadata = ContextBag::new();
        metadata.insert("source".to_string(), serde_json::json!("cli"));

        // Act
        logger.log_error(&Failure::internal("boom"), Some(&context), &metadata);

        // Assert
        let meta = captured.lock().unwrap().clone();
        assert_eq!(meta["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(meta["context"]["fields"]["command"], "deploy");
        assert!(
            meta["context"]["fields"].get("password").is_none(),
            "Secrets must never reach the logger"
        );
        assert_eq!(meta["metadata"]["source"], "cli");
        assert_eq!(meta["dedup_key"], "InternalError|boom|INTERNAL_ERROR");
    }

    #[test]
    fn test_warnings_are_never_deduplicated() {
        // Arrange
        let mut mock = MockLogger::new();
        mock.expect_warn().times(2).return_const(());
        let logger = DedupLogger::with_default_window(Arc::new(mock));

        // Act
        logger.warn("fallback failed", &Value::Null);
        logger.warn("fallback failed", &Value::Null);

        // Assert
        assert!(logger.is_empty(), "Warnings do not create dedup entries");
    }
}

#[cfg(test)]
mod dedup_reporter_tests {
    use super::*;

    #[derive(Default)]
    struct CountingReporter {
        captured: AtomicU32,
    }

    #[async_trait]
    impl ErrorReporter for CountingReporter {
        fn name(&self) -> &str {
            "counting"
        }

        async fn capture_exception(
            &self,
            _record: &FailureRecord,
            _context: Option<&ErrorContext>,
        ) -> Result<(), Failure> {
            self.captured.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_forwards_once_per_window() {
        // Arrange
        let inner = Arc::new(CountingReporter::default());
        let reporter = DedupReporter::new(inner.clone(), Duration::from_secs(10));
        let record = Failure::network("reset").to_record();

        // Act
        reporter.capture_exception(&record, None).await.unwrap();
        reporter.capture_exception(&record, None).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        reporter.capture_exception(&record, None).await.unwrap();

        // Assert
        assert_eq!(inner.captured.load(Ordering::SeqCst), 2);
        assert_eq!(reporter.name(), "counting");
    }
}

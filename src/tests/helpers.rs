//! Test fixtures shared across unit test modules.
//!
//! IMPORTANT: test-only, never used by production code.

#![allow(dead_code)]

use crate::handler::{ErrorHandler, ErrorHandlerBuilder};
use crate::reporting::{Logger, MemorySink};
use crate::retry::RetryOptions;

use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Logger that records every call for later inspection.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    errors: Mutex<Vec<(String, Value)>>,
    warnings: Mutex<Vec<(String, Value)>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn errors(&self) -> Vec<(String, Value)> {
        self.errors.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<(String, Value)> {
        self.warnings.lock().unwrap().clone()
    }
}

impl Logger for RecordingLogger {
    fn error(&self, message: &str, meta: &Value) {
        self.errors
            .lock()
            .unwrap()
            .push((message.to_string(), meta.clone()));
    }

    fn warn(&self, message: &str, meta: &Value) {
        self.warnings
            .lock()
            .unwrap()
            .push((message.to_string(), meta.clone()));
    }
}

/// Retry options with short, deterministic delays.
pub fn fast_retry_options() -> RetryOptions {
    RetryOptions {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
        backoff_multiplier: 2.0,
        jitter: false,
        timeout: Duration::from_millis(500),
    }
}

/// Builder wired to in-memory logger and sink.
pub fn test_handler_builder(logger: Arc<RecordingLogger>, sink: Arc<MemorySink>) -> ErrorHandlerBuilder {
    ErrorHandler::builder()
        .logger(logger)
        .sink(sink)
        .retry_options(fast_retry_options())
}

/// Handler plus the logger and sink it writes to.
pub fn create_test_handler() -> (ErrorHandler, Arc<RecordingLogger>, Arc<MemorySink>) {
    let logger = RecordingLogger::new();
    let sink = Arc::new(MemorySink::new());
    let handler = test_handler_builder(Arc::clone(&logger), Arc::clone(&sink))
        .build()
        .expect("test handler configuration is valid");
    (handler, logger, sink)
}

//! Test helper utilities for aicli-resilience integration tests
//!
//! IMPORTANT: These helpers are test-only and should NEVER be used in production code.

// Allow dead code in test utilities - functions are used across different test files
#![allow(dead_code)]

use aicli_resilience::{
    ErrorHandler, ErrorHandlerBuilder, Logger, MemorySink, ResilienceConfig, RetryOptions,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Logger that keeps every error and warning it receives.
#[derive(Debug, Default)]
pub struct CapturingLogger {
    pub errors: Mutex<Vec<(String, Value)>>,
    pub warnings: Mutex<Vec<(String, Value)>>,
}

impl CapturingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }

    pub fn last_error_meta(&self) -> Option<Value> {
        self.errors.lock().unwrap().last().map(|(_, meta)| meta.clone())
    }
}

impl Logger for CapturingLogger {
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

/// Retry options with millisecond delays and no jitter.
pub fn quick_retry() -> RetryOptions {
    RetryOptions {
        max_attempts: 3,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(80),
        backoff_multiplier: 2.0,
        jitter: false,
        timeout: Duration::from_secs(1),
    }
}

/// Builder from `config` with capturing logger and in-memory sink attached.
pub fn builder_from(
    config: &ResilienceConfig,
    logger: Arc<CapturingLogger>,
    sink: Arc<MemorySink>,
) -> ErrorHandlerBuilder {
    config.handler_builder().logger(logger).sink(sink)
}

/// Shared handler plus the logger and sink it writes to.
pub fn shared_handler() -> (Arc<ErrorHandler>, Arc<CapturingLogger>, Arc<MemorySink>) {
    let config = ResilienceConfig {
        retry: quick_retry(),
        ..ResilienceConfig::default()
    };
    let logger = CapturingLogger::new();
    let sink = Arc::new(MemorySink::new());
    let handler = builder_from(&config, Arc::clone(&logger), Arc::clone(&sink))
        .build()
        .expect("test configuration is valid");
    (Arc::new(handler), logger, sink)
}

//! The central failure-handling pipeline
//!
//! [`ErrorHandler::handle`] runs one failure through a fixed sequence:
//!
//! 1. metrics (always)
//! 2. context resolution: explicit, else ambient, else none
//! 3. deduplicated log, formatted emission, reporters (unless suppressed)
//! 4. recovery, first success wins: named strategies, type handlers, retry
//!    (only when an operation is available, i.e. from [`ErrorHandler::wrap`]),
//!    fallback
//! 5. exit with status 1 if configured, else return an [`ErrorResult`]
//!
//! Errors raised by recovery strategies, handlers, reporters and the fallback
//! are logged as warnings and never replace the original failure.
//!
//! ```rust
//! use aicli_resilience::handler::{ErrorHandler, HandleOptions};
//! use aicli_resilience::reporting::MemorySink;
//! use aicli_resilience::Failure;
//! use std::sync::Arc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let handler = ErrorHandler::builder()
//!     .sink(Arc::new(MemorySink::new()))
//!     .build()
//!     .unwrap();
//!
//! let result: Result<u32, _> = handler
//!     .wrap(
//!         || async { Err::<u32, _>(Failure::missing_config("OPENAI_API_KEY")) },
//!         None,
//!         HandleOptions::default(),
//!     )
//!     .await;
//!
//! let error = result.unwrap_err();
//! assert_eq!(error.error.code(), "CONFIG_MISSING");
//! assert_eq!(handler.metrics().total_handled, 1);
//! # }
//! ```

pub mod metrics;
pub mod recovery;
pub mod result;

pub use metrics::ErrorMetrics;
pub use recovery::{FallbackHandler, RecoveryHandler};
pub use result::{
    ErrorResult, HandleOptions, HandleOutcome, RecoverySource, RecoveryStage, ResultMetadata,
};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::context::{current_context, ErrorContext};
use crate::error::{ResilienceError, ResilienceResult};
use crate::format::{DefaultFormatter, ErrorFormatter, FormatConfig};
use crate::logging::{log_debug, log_error, log_info};
use crate::reporting::{
    DedupLogger, ErrorReporter, ErrorSink, Logger, StderrSink, TracingLogger,
    DEFAULT_DEDUP_WINDOW,
};
use crate::retry::{RetryOptions, RetryStats, RetryStrategy};
use crate::taxonomy::{
    ContextBag, ErrorCodeRegistry, ErrorSeverity, Failure, FailureKind, FailureResult,
};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Reverse;
use std::future::{Future, Ready};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

/// Failures listed by message in an aggregate's message.
const AGGREGATE_PREVIEW: usize = 3;

/// Handler behavior switches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorHandlerConfig {
    /// Terminate with status 1 when nothing recovers a failure
    pub exit_on_error: bool,
    pub enable_retry: bool,
    pub enable_fallback: bool,
    /// Render failures to the sink when logging is enabled
    pub emit_formatted: bool,
}

impl Default for ErrorHandlerConfig {
    fn default() -> Self {
        Self {
            exit_on_error: false,
            enable_retry: true,
            enable_fallback: true,
            emit_formatted: true,
        }
    }
}

struct TypeHandlerEntry {
    kind: FailureKind,
    priority: i32,
    sequence: u64,
    handler: Arc<dyn RecoveryHandler>,
}

enum Recovered<T> {
    /// From a strategy, type handler or fallback.
    Value(Value),
    /// From re-running the caller's operation.
    Direct(T),
}

struct Recovery<T> {
    payload: Recovered<T>,
    source: RecoverySource,
    metadata: ResultMetadata,
    failure: Failure,
}

/// Stands in for the operation when `handle` is called without one.
type NoOperation = fn() -> Ready<FailureResult<Value>>;

/// Orchestrates logging, reporting and recovery for failures.
///
/// Construct one per application with [`ErrorHandler::builder`] and share it
/// behind an `Arc`. Every method takes `&self`.
pub struct ErrorHandler {
    config: ErrorHandlerConfig,
    format: FormatConfig,
    registry: Option<Arc<ErrorCodeRegistry>>,
    logger: DedupLogger,
    formatter: Arc<dyn ErrorFormatter>,
    sink: Arc<dyn ErrorSink>,
    reporters: Vec<Arc<dyn ErrorReporter>>,
    retry: Arc<RetryStrategy>,
    breakers: CircuitBreakerRegistry,
    strategies: RwLock<Vec<(String, Arc<dyn RecoveryHandler>)>>,
    type_handlers: RwLock<Vec<TypeHandlerEntry>>,
    next_sequence: AtomicU64,
    fallback: RwLock<Option<Arc<dyn FallbackHandler>>>,
    metrics: Mutex<ErrorMetrics>,
}

impl std::fmt::Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("config", &self.config)
            .field("format", &self.format)
            .field("reporters", &self.reporters.len())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl ErrorHandler {
    pub fn builder() -> ErrorHandlerBuilder {
        ErrorHandlerBuilder::default()
    }

    pub fn config(&self) -> &ErrorHandlerConfig {
        &self.config
    }

    /// Registry used for retryability and suggestions.
    pub fn registry(&self) -> &ErrorCodeRegistry {
        match self.registry.as_deref() {
            Some(registry) => registry,
            None => ErrorCodeRegistry::global(),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a handler for `kind` and its descendants. Higher `priority`
    /// runs first within the same match tier.
    pub fn register<H>(&self, kind: FailureKind, handler: H, priority: i32)
    where
        H: RecoveryHandler + 'static,
    {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        write_lock(&self.type_handlers).push(TypeHandlerEntry {
            kind,
            priority,
            sequence,
            handler: Arc::new(handler),
        });
        log_debug!(kind = %kind, priority = priority, "Registered type handler");
    }

    /// Add a named recovery strategy. Re-using a name replaces the strategy
    /// in place, keeping its position.
    pub fn add_recovery_strategy<H>(&self, name: impl Into<String>, handler: H)
    where
        H: RecoveryHandler + 'static,
    {
        let name = name.into();
        let handler: Arc<dyn RecoveryHandler> = Arc::new(handler);
        let mut strategies = write_lock(&self.strategies);
        match strategies.iter().position(|(existing, _)| *existing == name) {
            Some(index) => strategies[index].1 = handler,
            None => strategies.push((name.clone(), handler)),
        }
        log_debug!(strategy = %name, "Registered recovery strategy");
    }

    pub fn remove_recovery_strategy(&self, name: &str) -> bool {
        let mut strategies = write_lock(&self.strategies);
        let before = strategies.len();
        strategies.retain(|(existing, _)| existing != name);
        strategies.len() != before
    }

    pub fn recovery_strategy_names(&self) -> Vec<String> {
        read_lock(&self.strategies)
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Set the fallback, replacing any previous one.
    pub fn set_fallback<H>(&self, handler: H)
    where
        H: FallbackHandler + 'static,
    {
        *write_lock(&self.fallback) = Some(Arc::new(handler));
    }

    pub fn clear_fallback(&self) {
        *write_lock(&self.fallback) = None;
    }

    // =========================================================================
    // Pipeline
    // =========================================================================

    /// Run `failure` through the pipeline. There is no operation to retry
    /// here, so the retry stage is skipped; use [`wrap`](Self::wrap) for that.
    pub async fn handle(
        &self,
        failure: impl Into<Failure>,
        context: Option<Arc<ErrorContext>>,
        options: HandleOptions,
    ) -> HandleOutcome {
        let outcome = self
            .process::<Value, NoOperation, _, _>(failure.into(), context, options, None)
            .await;

        match outcome {
            Ok(recovery) => {
                let value = match recovery.payload {
                    Recovered::Value(value) | Recovered::Direct(value) => value,
                };
                HandleOutcome::Recovered {
                    value,
                    source: recovery.source,
                    metadata: recovery.metadata,
                }
            }
            Err(result) => HandleOutcome::Unrecovered(result),
        }
    }

    /// Call `operation`; on failure route it through the pipeline with the
    /// operation available for retry.
    ///
    /// A value recovered by a strategy, handler or fallback is deserialized
    /// into `T`. Never panics and never returns the raw failure: anything
    /// unrecovered comes back as an [`ErrorResult`].
    pub async fn wrap<T, F, Fut, E>(
        &self,
        mut operation: F,
        context: Option<Arc<ErrorContext>>,
        options: HandleOptions,
    ) -> Result<T, ErrorResult>
    where
        T: DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        let failure: Failure = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error.into(),
        };

        let recovery = self
            .process(failure, context, options, Some(&mut operation))
            .await?;

        match recovery.payload {
            Recovered::Direct(value) => Ok(value),
            Recovered::Value(value) => match serde_json::from_value::<T>(value) {
                Ok(value) => Ok(value),
                Err(error) => {
                    let mismatch = ResilienceError::payload_mismatch(format!(
                        "{} recovery produced an incompatible value: {error}",
                        recovery.source.stage()
                    ));
                    self.warn(
                        recovery.source.stage().as_str(),
                        "payload",
                        &Failure::from(mismatch),
                    );
                    Err(ErrorResult::new(recovery.failure, recovery.metadata))
                }
            },
        }
    }

    async fn process<T, F, Fut, E>(
        &self,
        failure: Failure,
        context: Option<Arc<ErrorContext>>,
        options: HandleOptions,
        operation: Option<&mut F>,
    ) -> Result<Recovery<T>, ErrorResult>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        self.lock_metrics().record_handled(&failure);

        let context = context.or_else(current_context);
        let mut metadata = ResultMetadata {
            handled_at: Utc::now(),
            context_id: context.as_ref().map(|c| c.id.clone()),
            correlation_id: context.as_ref().map(|c| c.correlation_id.clone()),
            attempted: Vec::new(),
            retry_attempts: 0,
        };

        if options.log {
            let mut bag = ContextBag::new();
            bag.insert("handled_at".to_string(), json!(metadata.handled_at));
            self.logger.log_error(&failure, context.as_deref(), &bag);

            if self.config.emit_formatted {
                let rendered = self
                    .formatter
                    .format(&failure, context.as_deref(), self.format.style);
                self.sink.emit(&rendered);
            }
        }

        if options.report && !self.reporters.is_empty() {
            let record = failure.to_record();
            let sanitized = context.as_ref().map(|c| c.sanitized());
            for reporter in &self.reporters {
                if let Err(error) = reporter.capture_exception(&record, sanitized.as_ref()).await {
                    self.warn("reporter", reporter.name(), &error);
                }
            }
        }

        // Recovery strategies, in registration order.
        let strategies = read_lock(&self.strategies).clone();
        if !strategies.is_empty() {
            metadata.attempted.push(RecoveryStage::Strategy);
        }
        for (name, strategy) in strategies {
            match strategy.recover(&failure, context.clone()).await {
                Ok(Some(value)) => {
                    let source = RecoverySource::Strategy { name };
                    return Ok(self.recovered(failure, Recovered::Value(value), source, metadata));
                }
                Ok(None) => {}
                Err(error) => self.warn("recovery strategy", &name, &error),
            }
        }

        // Type handlers: exact kind, then ancestors.
        let handlers = self.matching_handlers(failure.kind());
        if !handlers.is_empty() {
            metadata.attempted.push(RecoveryStage::TypeHandler);
        }
        for (kind, handler) in handlers {
            match handler.recover(&failure, context.clone()).await {
                Ok(Some(value)) => {
                    let source = RecoverySource::TypeHandler { kind };
                    return Ok(self.recovered(failure, Recovered::Value(value), source, metadata));
                }
                Ok(None) => {}
                Err(error) => self.warn("type handler", kind.name(), &error),
            }
        }

        if self.config.enable_retry
            && options.retry
            && self.registry().is_retryable(failure.code())
        {
            if let Some(operation) = operation {
                metadata.attempted.push(RecoveryStage::Retry);
                // The breaker only sees retry-stage attempts; the initial call
                // made by `wrap` is never recorded against it.
                let breaker = self.breakers.get_or_create(failure.code());
                let mut attempts: u32 = 0;

                let retried = self
                    .retry
                    .execute(|| {
                        attempts += 1;
                        // Rejected attempts must not invoke the operation.
                        let admitted = breaker.try_acquire().map(|()| operation());
                        let breaker = Arc::clone(&breaker);
                        async move {
                            match admitted {
                                Ok(attempt) => breaker.observe(attempt).await,
                                Err(rejection) => Err(rejection),
                            }
                        }
                    })
                    .await;

                metadata.retry_attempts = attempts;
                self.lock_metrics().retry_attempts += u64::from(attempts);

                match retried {
                    Ok(value) => {
                        let source = RecoverySource::Retry { attempts };
                        return Ok(self.recovered(failure, Recovered::Direct(value), source, metadata));
                    }
                    Err(last) => log_debug!(
                        error_code = failure.code(),
                        attempts = attempts,
                        last_error_code = last.code(),
                        "Retry did not recover"
                    ),
                }
            }
        }

        if self.config.enable_fallback && options.fallback {
            let fallback = read_lock(&self.fallback).clone();
            if let Some(fallback) = fallback {
                metadata.attempted.push(RecoveryStage::Fallback);
                match fallback.fallback(&failure, context.clone()).await {
                    Ok(value) => {
                        return Ok(self.recovered(
                            failure,
                            Recovered::Value(value),
                            RecoverySource::Fallback,
                            metadata,
                        ));
                    }
                    Err(error) => self.warn("fallback", "fallback", &error),
                }
            }
        }

        self.lock_metrics().unrecovered += 1;

        if self.config.exit_on_error {
            log_error!(
                error_id = %failure.id(),
                error_code = failure.code(),
                error = %failure,
                "Unrecovered error, exiting"
            );
            std::process::exit(1);
        }

        Err(ErrorResult::new(failure, metadata))
    }

    fn recovered<T>(
        &self,
        failure: Failure,
        payload: Recovered<T>,
        source: RecoverySource,
        metadata: ResultMetadata,
    ) -> Recovery<T> {
        self.lock_metrics().record_recovered(source.stage());
        log_info!(
            error_id = %failure.id(),
            error_code = failure.code(),
            stage = %source.stage(),
            "Recovered from error"
        );
        Recovery {
            payload,
            source,
            metadata,
            failure,
        }
    }

    /// Handlers whose kind `kind` is-a, exact matches first, then by
    /// priority (highest first) and registration order.
    fn matching_handlers(&self, kind: FailureKind) -> Vec<(FailureKind, Arc<dyn RecoveryHandler>)> {
        let handlers = read_lock(&self.type_handlers);
        let mut matching: Vec<&TypeHandlerEntry> = handlers
            .iter()
            .filter(|entry| kind.is_a(entry.kind))
            .collect();
        matching.sort_by_key(|entry| (entry.kind != kind, Reverse(entry.priority), entry.sequence));
        matching
            .into_iter()
            .map(|entry| (entry.kind, Arc::clone(&entry.handler)))
            .collect()
    }

    fn warn(&self, stage: &str, name: &str, error: &Failure) {
        self.lock_metrics().handler_warnings += 1;
        self.logger.warn(
            &format!("{stage} '{name}' failed: {error}"),
            &json!({
                "stage": stage,
                "name": name,
                "error": error.to_record(),
            }),
        );
    }

    // =========================================================================
    // Aggregation, metrics and introspection
    // =========================================================================

    /// See [`aggregate_errors`]. Uses this handler's registry.
    pub fn aggregate_errors(&self, failures: Vec<Failure>) -> ResilienceResult<Failure> {
        aggregate_in(failures, self.registry())
    }

    pub fn metrics(&self) -> ErrorMetrics {
        self.lock_metrics().clone()
    }

    pub fn reset_metrics(&self) {
        *self.lock_metrics() = ErrorMetrics::default();
    }

    /// Statistics of the strategy used by the retry stage.
    pub fn retry_stats(&self) -> RetryStats {
        self.retry.stats()
    }

    /// The retry-stage breaker for `code`, if one has been created.
    pub fn breaker(&self, code: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(code)
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn dedup_logger(&self) -> &DedupLogger {
        &self.logger
    }

    /// Render `failure` with the configured formatter and style.
    pub fn format(&self, failure: &Failure, context: Option<&ErrorContext>) -> String {
        self.formatter.format(failure, context, self.format.style)
    }

    fn lock_metrics(&self) -> MutexGuard<'_, ErrorMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Combine failures from a batch into one.
///
/// - none: [`ResilienceError::EmptyAggregate`]
/// - one: that failure, unchanged
/// - several: an `AGGREGATE_ERROR` failure with severity high, the originals'
///   records under `errors` and their number under `count`
pub fn aggregate_errors(failures: Vec<Failure>) -> ResilienceResult<Failure> {
    aggregate_in(failures, ErrorCodeRegistry::global())
}

fn aggregate_in(
    mut failures: Vec<Failure>,
    registry: &ErrorCodeRegistry,
) -> ResilienceResult<Failure> {
    match failures.len() {
        0 => Err(ResilienceError::empty_aggregate()),
        1 => Ok(failures.remove(0)),
        count => {
            let mut message = failures
                .iter()
                .take(AGGREGATE_PREVIEW)
                .map(|failure| failure.message())
                .collect::<Vec<_>>()
                .join("; ");
            if count > AGGREGATE_PREVIEW {
                message.push_str(&format!(" (and {} more)", count - AGGREGATE_PREVIEW));
            }
            let records: Vec<Value> = failures
                .iter()
                .map(|failure| json!(failure.to_record()))
                .collect();

            Ok(Failure::builder(
                FailureKind::Aggregate,
                format!("{count} errors occurred: {message}"),
            )
            .registry(registry)
            .severity(ErrorSeverity::High)
            .context("errors", Value::Array(records))
            .context("count", count)
            .build())
        }
    }
}

/// Builder for [`ErrorHandler`].
pub struct ErrorHandlerBuilder {
    config: ErrorHandlerConfig,
    format: FormatConfig,
    retry: RetryOptions,
    breaker: CircuitBreakerConfig,
    dedup_window: Duration,
    registry: Option<Arc<ErrorCodeRegistry>>,
    logger: Arc<dyn Logger>,
    formatter: Option<Arc<dyn ErrorFormatter>>,
    sink: Arc<dyn ErrorSink>,
    reporters: Vec<Arc<dyn ErrorReporter>>,
}

impl Default for ErrorHandlerBuilder {
    fn default() -> Self {
        Self {
            config: ErrorHandlerConfig::default(),
            format: FormatConfig::default(),
            retry: RetryOptions::default(),
            breaker: CircuitBreakerConfig::default(),
            dedup_window: DEFAULT_DEDUP_WINDOW,
            registry: None,
            logger: Arc::new(TracingLogger),
            formatter: None,
            sink: Arc::new(StderrSink),
            reporters: Vec::new(),
        }
    }
}

impl ErrorHandlerBuilder {
    pub fn config(mut self, config: ErrorHandlerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn exit_on_error(mut self, exit_on_error: bool) -> Self {
        self.config.exit_on_error = exit_on_error;
        self
    }

    pub fn format(mut self, format: FormatConfig) -> Self {
        self.format = format;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.format.verbose = verbose;
        self
    }

    /// Options of the exponential strategy used by the retry stage.
    pub fn retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Template for the per-code breakers of the retry stage.
    pub fn breaker_config(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    pub fn registry(mut self, registry: Arc<ErrorCodeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn formatter(mut self, formatter: Arc<dyn ErrorFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn build(self) -> ResilienceResult<ErrorHandler> {
        self.retry.validate()?;
        self.breaker.validate()?;

        let formatter = self.formatter.unwrap_or_else(|| {
            let formatter = DefaultFormatter::new(self.format.clone());
            Arc::new(match &self.registry {
                Some(registry) => formatter.with_registry(Arc::clone(registry)),
                None => formatter,
            })
        });

        let retry = RetryStrategy::builder()
            .name("error-handler")
            .max_attempts(self.retry.max_attempts)
            .initial_delay(self.retry.initial_delay)
            .max_delay(self.retry.max_delay)
            .jitter(self.retry.jitter)
            .timeout(self.retry.timeout)
            .exponential(self.retry.backoff_multiplier)
            .build()?;

        Ok(ErrorHandler {
            config: self.config,
            format: self.format,
            registry: self.registry,
            logger: DedupLogger::new(self.logger, self.dedup_window),
            formatter,
            sink: self.sink,
            reporters: self.reporters,
            retry: Arc::new(retry),
            breakers: CircuitBreakerRegistry::new(self.breaker),
            strategies: RwLock::new(Vec::new()),
            type_handlers: RwLock::new(Vec::new()),
            next_sequence: AtomicU64::new(0),
            fallback: RwLock::new(None),
            metrics: Mutex::new(ErrorMetrics::default()),
        })
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

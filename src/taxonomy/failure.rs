//! The [`Failure`] type: one classified error instance.

use super::category::{ErrorCategory, ErrorSeverity};
use super::kind::FailureKind;
use super::registry::ErrorCodeRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Opaque key/value bag attached to a failure.
pub type ContextBag = BTreeMap<String, Value>;

/// Convenient result type for operations that fail with a [`Failure`].
pub type FailureResult<T> = std::result::Result<T, Failure>;

/// The previous link in a failure's causal chain.
#[derive(Debug, Clone)]
pub enum Cause {
    /// An earlier classified failure.
    Failure(Box<Failure>),
    /// A foreign error preserved at the classification boundary.
    Foreign(Arc<dyn StdError + Send + Sync + 'static>),
}

impl Cause {
    pub fn foreign<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Foreign(Arc::new(error))
    }

    pub fn message(&self) -> String {
        match self {
            Self::Failure(failure) => failure.message().to_string(),
            Self::Foreign(error) => error.to_string(),
        }
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Self::Failure(failure) => Some(&**failure),
            Self::Foreign(_) => None,
        }
    }
}

impl From<Failure> for Cause {
    fn from(failure: Failure) -> Self {
        Self::Failure(Box::new(failure))
    }
}

/// Result of [`Failure::root_cause`].
#[derive(Debug, Clone, Copy)]
pub enum RootCause<'a> {
    /// The chain ends in a classified failure.
    Failure(&'a Failure),
    /// The chain ends in a foreign error.
    Foreign(&'a (dyn StdError + Send + Sync + 'static)),
}

impl RootCause<'_> {
    pub fn message(&self) -> String {
        match self {
            Self::Failure(failure) => failure.message().to_string(),
            Self::Foreign(error) => error.to_string(),
        }
    }

    pub fn as_failure(&self) -> Option<&Failure> {
        match self {
            Self::Failure(failure) => Some(*failure),
            Self::Foreign(_) => None,
        }
    }
}

/// One classified failure.
///
/// `kind`, `code` and `category` are fixed at construction. Enrichment
/// methods such as [`with_context`](Self::with_context) consume the value and
/// return a new one, so a failure that has been handed to a logger or
/// reporter is never mutated behind its back.
///
/// # Example
///
/// ```rust
/// use aicli_resilience::{Failure, FailureKind, ErrorSeverity};
/// use std::time::Duration;
///
/// let failure = Failure::timeout("openai.chat", Duration::from_secs(30))
///     .with_context("model", "gpt-4");
///
/// assert!(failure.kind().is_a(FailureKind::Network));
/// assert!(failure.is_retryable());
/// assert_eq!(failure.severity(), ErrorSeverity::Medium);
/// ```
#[derive(Debug, Clone)]
pub struct Failure {
    id: Uuid,
    kind: FailureKind,
    code: String,
    category: ErrorCategory,
    severity: ErrorSeverity,
    message: String,
    user_message: String,
    context: ContextBag,
    retryable: bool,
    cause: Option<Cause>,
    timestamp: DateTime<Utc>,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.cause {
            Some(Cause::Failure(failure)) => Some(&**failure),
            Some(Cause::Foreign(error)) => Some(error.as_ref()),
            None => None,
        }
    }
}

/// Builder for [`Failure`] values with explicit overrides.
///
/// Anything not set explicitly is resolved from the registry by code.
#[derive(Debug)]
pub struct FailureBuilder<'r> {
    kind: FailureKind,
    message: String,
    code: Option<String>,
    category: Option<ErrorCategory>,
    severity: Option<ErrorSeverity>,
    retryable: Option<bool>,
    user_message: Option<String>,
    context: ContextBag,
    cause: Option<Cause>,
    registry: &'r ErrorCodeRegistry,
}

impl<'r> FailureBuilder<'r> {
    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn category(mut self, category: ErrorCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }

    pub fn user_message(mut self, user_message: impl Into<String>) -> Self {
        self.user_message = Some(user_message.into());
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn cause(mut self, cause: impl Into<Cause>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn foreign_cause<E>(mut self, error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.cause = Some(Cause::foreign(error));
        self
    }

    /// Resolve defaults against `registry` instead of the global one.
    pub fn registry<'b>(self, registry: &'b ErrorCodeRegistry) -> FailureBuilder<'b> {
        FailureBuilder {
            kind: self.kind,
            message: self.message,
            code: self.code,
            category: self.category,
            severity: self.severity,
            retryable: self.retryable,
            user_message: self.user_message,
            context: self.context,
            cause: self.cause,
            registry,
        }
    }

    pub fn build(self) -> Failure {
        let code = self
            .code
            .unwrap_or_else(|| self.kind.default_code().to_string());
        let metadata = self.registry.get(&code);

        let category = self
            .category
            .or_else(|| metadata.as_ref().map(|m| m.category))
            .unwrap_or_else(|| self.kind.category());
        let severity = self
            .severity
            .or_else(|| metadata.as_ref().map(|m| m.severity))
            .unwrap_or_default();
        let retryable = self
            .retryable
            .or_else(|| metadata.as_ref().map(|m| m.is_retryable))
            .unwrap_or(false);
        let user_message = self
            .user_message
            .or_else(|| metadata.map(|m| m.user_message))
            .unwrap_or_else(|| category.default_user_message().to_string());

        Failure {
            id: Uuid::new_v4(),
            kind: self.kind,
            code,
            category,
            severity,
            message: self.message,
            user_message,
            context: self.context,
            retryable,
            cause: self.cause,
            timestamp: Utc::now(),
        }
    }
}

impl Failure {
    /// Start building a failure resolved against the global registry.
    pub fn builder(kind: FailureKind, message: impl Into<String>) -> FailureBuilder<'static> {
        FailureBuilder {
            kind,
            message: message.into(),
            code: None,
            category: None,
            severity: None,
            retryable: None,
            user_message: None,
            context: ContextBag::new(),
            cause: None,
            registry: ErrorCodeRegistry::global(),
        }
    }

    /// Failure of `kind` with its default code and registry defaults.
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::builder(kind, message).build()
    }

    /// Failure of `kind` with an explicit code.
    pub fn with_code(kind: FailureKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::builder(kind, message).code(code).build()
    }

    // =========================================================================
    // Constructors per kind
    // =========================================================================

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Authentication, message)
    }

    pub fn invalid_api_key(provider: impl Into<String>) -> Self {
        let provider = provider.into();
        Self::builder(
            FailureKind::InvalidApiKey,
            format!("API key rejected by provider {provider}"),
        )
        .context("provider", provider)
        .build()
    }

    pub fn token_expired(service: impl Into<String>) -> Self {
        let service = service.into();
        Self::builder(
            FailureKind::TokenExpired,
            format!("Access token for {service} has expired"),
        )
        .context("service", service)
        .build()
    }

    pub fn authorization(resource: impl Into<String>, action: impl Into<String>) -> Self {
        let resource = resource.into();
        let action = action.into();
        Self::builder(
            FailureKind::Authorization,
            format!("Not allowed to {action} {resource}"),
        )
        .context("resource", resource)
        .context("action", action)
        .build()
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Configuration, message)
    }

    pub fn missing_config(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::builder(
            FailureKind::MissingConfig,
            format!("Missing required configuration value: {key}"),
        )
        .context("config_key", key)
        .build()
    }

    pub fn invalid_config(key: impl Into<String>, reason: impl Into<String>) -> Self {
        let key = key.into();
        let reason = reason.into();
        Self::builder(
            FailureKind::InvalidConfig,
            format!("Invalid configuration value for {key}: {reason}"),
        )
        .context("config_key", key)
        .build()
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::builder(
            FailureKind::Validation,
            format!("Validation failed for {field}: {message}"),
        )
        .context("field", field)
        .build()
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        let operation = operation.into();
        Self::builder(
            FailureKind::Timeout,
            format!("Operation {operation} timed out after {}ms", after.as_millis()),
        )
        .context("operation", operation)
        .context("timeout_ms", duration_millis(after))
        .build()
    }

    pub fn connection_refused(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self::builder(
            FailureKind::ConnectionRefused,
            format!("Connection refused by {endpoint}"),
        )
        .context("endpoint", endpoint)
        .build()
    }

    pub fn file_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::builder(FailureKind::FileNotFound, format!("File not found: {path}"))
            .context("path", path)
            .build()
    }

    pub fn permission_denied(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::builder(
            FailureKind::PermissionDenied,
            format!("Permission denied: {path}"),
        )
        .context("path", path)
        .build()
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        Self::builder(FailureKind::Provider, format!("{provider}: {message}"))
            .context("provider", provider)
            .build()
    }

    pub fn rate_limited(provider: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let provider = provider.into();
        let mut builder = Self::builder(
            FailureKind::RateLimit,
            format!("Rate limit exceeded for {provider}"),
        )
        .context("provider", provider);
        if let Some(after) = retry_after {
            builder = builder.context("retry_after_ms", duration_millis(after));
        }
        builder.build()
    }

    pub fn provider_unavailable(provider: impl Into<String>, status: Option<u16>) -> Self {
        let provider = provider.into();
        let mut builder = Self::builder(
            FailureKind::ProviderUnavailable,
            format!("Provider {provider} is unavailable"),
        )
        .context("provider", provider);
        if let Some(status) = status {
            builder = builder.context("status", status);
        }
        builder.build()
    }

    pub fn model_not_found(provider: impl Into<String>, model: impl Into<String>) -> Self {
        let provider = provider.into();
        let model = model.into();
        Self::builder(
            FailureKind::ModelNotFound,
            format!("Model {model} not found for provider {provider}"),
        )
        .context("provider", provider)
        .context("model", model)
        .build()
    }

    pub fn agent(agent: impl Into<String>, message: impl Into<String>) -> Self {
        let agent = agent.into();
        let message = message.into();
        Self::builder(
            FailureKind::AgentExecution,
            format!("Agent {agent} failed: {message}"),
        )
        .context("agent", agent)
        .build()
    }

    pub fn cli(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Cli, message)
    }

    pub fn command_not_found(command: impl Into<String>) -> Self {
        let command = command.into();
        Self::builder(
            FailureKind::CommandNotFound,
            format!("Unknown command: {command}"),
        )
        .context("command", command)
        .build()
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Internal, message)
    }

    pub fn external(service: impl Into<String>, message: impl Into<String>) -> Self {
        let service = service.into();
        let message = message.into();
        let kind = match service.to_ascii_lowercase().as_str() {
            "github" => FailureKind::GithubApi,
            "linear" => FailureKind::LinearApi,
            _ => FailureKind::External,
        };
        Self::builder(kind, format!("{service}: {message}"))
            .context("service", service)
            .build()
    }

    /// Rejection raised by an open circuit breaker.
    pub fn circuit_open(breaker: impl Into<String>, retry_in: Duration) -> Self {
        let breaker = breaker.into();
        Self::builder(
            FailureKind::CircuitOpen,
            format!("Circuit breaker {breaker} is open"),
        )
        .context("breaker", breaker)
        .context("retry_after_ms", duration_millis(retry_in))
        .build()
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unknown, message)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Human-facing message, safe to show to end users.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    pub fn context(&self) -> &ContextBag {
        &self.context
    }

    pub fn context_value(&self, key: &str) -> Option<&Value> {
        self.context.get(key)
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Provider-suggested wait, if the failure carries one.
    pub fn retry_after(&self) -> Option<Duration> {
        self.context
            .get("retry_after_ms")
            .and_then(Value::as_u64)
            .map(Duration::from_millis)
    }

    // =========================================================================
    // Enrichment (consumes self)
    // =========================================================================

    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_context_entries<I, K>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        for (key, value) in entries {
            self.context.insert(key.into(), value);
        }
        self
    }

    // =========================================================================
    // Causal chain
    // =========================================================================

    /// Iterate over this failure and every failure in its cause chain.
    pub fn chain(&self) -> FailureChain<'_> {
        FailureChain {
            next: Some(self),
        }
    }

    /// Deepest cause in the chain.
    ///
    /// A foreign error terminates the chain and is returned as
    /// [`RootCause::Foreign`]. A chain made only of failures returns the last
    /// one, which is `self` when there is no cause at all.
    pub fn root_cause(&self) -> RootCause<'_> {
        let mut current = self;
        loop {
            match &current.cause {
                None => return RootCause::Failure(current),
                Some(Cause::Failure(next)) => current = &**next,
                Some(Cause::Foreign(error)) => return RootCause::Foreign(error.as_ref()),
            }
        }
    }

    /// Whether any failure in the chain (self included) is-a `kind`.
    pub fn is_caused_by(&self, kind: FailureKind) -> bool {
        self.chain().any(|failure| failure.kind.is_a(kind))
    }

    pub fn is_kind(&self, kind: FailureKind) -> bool {
        self.kind.is_a(kind)
    }

    // =========================================================================
    // Registry lookups and serialization
    // =========================================================================

    pub fn recovery_suggestions(&self) -> Vec<String> {
        self.recovery_suggestions_in(ErrorCodeRegistry::global())
    }

    pub fn recovery_suggestions_in(&self, registry: &ErrorCodeRegistry) -> Vec<String> {
        registry.recovery_suggestions(&self.code)
    }

    /// Key used to suppress repeated identical failures.
    pub fn dedup_key(&self) -> String {
        dedup_key(self.kind, &self.message, &self.code)
    }

    pub fn to_record(&self) -> FailureRecord {
        let mut causes = Vec::new();
        let mut next = self.cause.as_ref();
        while let Some(cause) = next {
            match cause {
                Cause::Failure(failure) => {
                    causes.push(CauseRecord {
                        kind: Some(failure.kind),
                        code: Some(failure.code.clone()),
                        message: failure.message.clone(),
                    });
                    next = failure.cause.as_ref();
                }
                Cause::Foreign(error) => {
                    causes.push(CauseRecord {
                        kind: None,
                        code: None,
                        message: error.to_string(),
                    });
                    next = None;
                }
            }
        }

        FailureRecord {
            id: self.id,
            kind: self.kind,
            code: self.code.clone(),
            category: self.category,
            severity: self.severity,
            message: self.message.clone(),
            user_message: self.user_message.clone(),
            retryable: self.retryable,
            context: self.context.clone(),
            timestamp: self.timestamp,
            causes,
        }
    }
}

fn dedup_key(kind: FailureKind, message: &str, code: &str) -> String {
    format!("{}|{}|{}", kind.name(), message, code)
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Iterator returned by [`Failure::chain`].
#[derive(Debug, Clone)]
pub struct FailureChain<'a> {
    next: Option<&'a Failure>,
}

impl<'a> Iterator for FailureChain<'a> {
    type Item = &'a Failure;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = match &current.cause {
            Some(Cause::Failure(failure)) => Some(&**failure),
            _ => None,
        };
        Some(current)
    }
}

/// Serializable snapshot of a failure, used by loggers, reporters and the
/// JSON formatter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub id: Uuid,
    pub kind: FailureKind,
    pub code: String,
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub message: String,
    pub user_message: String,
    pub retryable: bool,
    pub context: ContextBag,
    pub timestamp: DateTime<Utc>,
    /// Cause chain, nearest first.
    pub causes: Vec<CauseRecord>,
}

impl FailureRecord {
    /// Same key as [`Failure::dedup_key`].
    pub fn dedup_key(&self) -> String {
        dedup_key(self.kind, &self.message, &self.code)
    }
}

/// One link of a serialized cause chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CauseRecord {
    /// `None` for foreign errors.
    pub kind: Option<FailureKind>,
    pub code: Option<String>,
    pub message: String,
}

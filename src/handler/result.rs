//! Inputs and outputs of [`ErrorHandler::handle`](super::ErrorHandler::handle).

use crate::taxonomy::{Failure, FailureKind};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Per-call switches. Everything is enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleOptions {
    pub retry: bool,
    pub fallback: bool,
    pub report: bool,
    /// Also controls formatted emission to the sink.
    pub log: bool,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self {
            retry: true,
            fallback: true,
            report: true,
            log: true,
        }
    }
}

impl HandleOptions {
    /// Recovery only: no logging, emission or reporting.
    pub fn quiet() -> Self {
        Self {
            report: false,
            log: false,
            ..Self::default()
        }
    }

    pub fn without_retry(mut self) -> Self {
        self.retry = false;
        self
    }

    pub fn without_fallback(mut self) -> Self {
        self.fallback = false;
        self
    }
}

/// Recovery stage, in the order the handler tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStage {
    Strategy,
    TypeHandler,
    Retry,
    Fallback,
}

impl RecoveryStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoveryStage::Strategy => "strategy",
            RecoveryStage::TypeHandler => "type_handler",
            RecoveryStage::Retry => "retry",
            RecoveryStage::Fallback => "fallback",
        }
    }
}

impl fmt::Display for RecoveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What produced a recovered value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum RecoverySource {
    Strategy { name: String },
    TypeHandler { kind: FailureKind },
    Retry { attempts: u32 },
    Fallback,
}

impl RecoverySource {
    pub fn stage(&self) -> RecoveryStage {
        match self {
            RecoverySource::Strategy { .. } => RecoveryStage::Strategy,
            RecoverySource::TypeHandler { .. } => RecoveryStage::TypeHandler,
            RecoverySource::Retry { .. } => RecoveryStage::Retry,
            RecoverySource::Fallback => RecoveryStage::Fallback,
        }
    }
}

/// Facts about one `handle` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    pub handled_at: DateTime<Utc>,
    pub context_id: Option<String>,
    pub correlation_id: Option<String>,
    /// Stages that were actually tried, in order.
    pub attempted: Vec<RecoveryStage>,
    /// Operation attempts made by the retry stage, 0 if it did not run.
    pub retry_attempts: u32,
}

/// An unrecovered failure, handed back to the caller instead of a value.
#[derive(Debug, Clone)]
pub struct ErrorResult {
    /// Always `false`.
    pub success: bool,
    /// The original failure, never replaced by recovery errors.
    pub error: Failure,
    pub metadata: ResultMetadata,
}

impl ErrorResult {
    pub fn new(error: Failure, metadata: ResultMetadata) -> Self {
        Self {
            success: false,
            error,
            metadata,
        }
    }

    pub fn into_failure(self) -> Failure {
        self.error
    }

    pub fn to_value(&self) -> Value {
        json!({
            "success": self.success,
            "error": self.error.to_record(),
            "metadata": self.metadata,
        })
    }
}

impl fmt::Display for ErrorResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.error.code(), self.error.message())
    }
}

impl std::error::Error for ErrorResult {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<ErrorResult> for Failure {
    fn from(result: ErrorResult) -> Self {
        result.error
    }
}

/// Result of [`ErrorHandler::handle`](super::ErrorHandler::handle).
#[derive(Debug, Clone)]
pub enum HandleOutcome {
    Recovered {
        value: Value,
        source: RecoverySource,
        metadata: ResultMetadata,
    },
    Unrecovered(ErrorResult),
}

impl HandleOutcome {
    pub fn is_recovered(&self) -> bool {
        matches!(self, HandleOutcome::Recovered { .. })
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            HandleOutcome::Recovered { value, .. } => Some(value),
            HandleOutcome::Unrecovered(_) => None,
        }
    }

    pub fn source(&self) -> Option<&RecoverySource> {
        match self {
            HandleOutcome::Recovered { source, .. } => Some(source),
            HandleOutcome::Unrecovered(_) => None,
        }
    }

    pub fn metadata(&self) -> &ResultMetadata {
        match self {
            HandleOutcome::Recovered { metadata, .. } => metadata,
            HandleOutcome::Unrecovered(result) => &result.metadata,
        }
    }

    pub fn into_result(self) -> Result<Value, ErrorResult> {
        match self {
            HandleOutcome::Recovered { value, .. } => Ok(value),
            HandleOutcome::Unrecovered(result) => Err(result),
        }
    }
}

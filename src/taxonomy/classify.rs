//! Boundary classification of foreign errors into [`Failure`] values.
//!
//! Errors raised by collaborators (HTTP clients, SDKs, the file system) are
//! wrapped here before they reach retry or circuit-breaker logic. The original
//! error is always preserved as the failure's cause.

use super::failure::{Cause, Failure};
use super::kind::FailureKind;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error as StdError;
use std::io;
use std::sync::Arc;

/// Message patterns mapped to kinds, checked in order.
static MESSAGE_PATTERNS: Lazy<Vec<(Regex, FailureKind)>> = Lazy::new(|| {
    [
        (r"(?i)\b429\b|rate.?limit|too many requests", FailureKind::RateLimit),
        (
            r"(?i)quota|insufficient.?credit|billing",
            FailureKind::QuotaExceeded,
        ),
        (
            r"(?i)context.?length|maximum context|too many tokens",
            FailureKind::ContextLengthExceeded,
        ),
        (
            r"(?i)\b401\b|unauthori[sz]ed|invalid.?api.?key|incorrect api key",
            FailureKind::InvalidApiKey,
        ),
        (r"(?i)token.{0,16}expired", FailureKind::TokenExpired),
        (r"(?i)\b403\b|forbidden", FailureKind::Authorization),
        (
            r"(?i)\b50[34]\b|service unavailable|gateway time-?out|overloaded",
            FailureKind::ProviderUnavailable,
        ),
        (r"(?i)timed? ?out|timeout|etimedout", FailureKind::Timeout),
        (
            r"(?i)econnrefused|connection refused",
            FailureKind::ConnectionRefused,
        ),
        (
            r"(?i)econnreset|connection reset|socket hang up|broken pipe",
            FailureKind::ConnectionReset,
        ),
        (
            r"(?i)enotfound|getaddrinfo|dns|name resolution",
            FailureKind::DnsResolution,
        ),
        (r"(?i)model.{0,32}not found|unknown model", FailureKind::ModelNotFound),
        (r"(?i)enoent|no such file", FailureKind::FileNotFound),
        (r"(?i)eacces|eperm|permission denied", FailureKind::PermissionDenied),
        (r"(?i)enospc|no space left", FailureKind::DiskFull),
    ]
    .into_iter()
    .filter_map(|(pattern, kind)| Regex::new(pattern).ok().map(|regex| (regex, kind)))
    .collect()
});

/// Messages that indicate a transient condition worth retrying.
static TRANSIENT_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)timed? ?out|timeout|etimedout|econnreset|connection reset|econnrefused|connection refused|socket hang up|rate.?limit|too many requests|\b429\b|\b503\b|\b504\b|service unavailable|gateway time-?out",
    )
    .ok()
});

/// Whether `message` matches a known transient pattern (timeouts, reset or
/// refused connections, rate limits, HTTP 429/503/504).
pub fn is_transient_message(message: &str) -> bool {
    TRANSIENT_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(message))
}

/// Best-effort kind for a free-form error message.
pub fn classify_message(message: &str) -> FailureKind {
    MESSAGE_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(message))
        .map(|(_, kind)| *kind)
        .unwrap_or(FailureKind::Unknown)
}

/// Kind for an I/O error, falling back to its message for unmapped kinds.
pub fn classify_io(error: &io::Error) -> FailureKind {
    match error.kind() {
        io::ErrorKind::NotFound => FailureKind::FileNotFound,
        io::ErrorKind::PermissionDenied => FailureKind::PermissionDenied,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => FailureKind::Timeout,
        io::ErrorKind::ConnectionRefused => FailureKind::ConnectionRefused,
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected => FailureKind::ConnectionReset,
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => FailureKind::InvalidInput,
        _ => match classify_message(&error.to_string()) {
            FailureKind::Unknown => FailureKind::FileSystem,
            kind => kind,
        },
    }
}

/// Classify any error into a [`Failure`], preserving it as the cause.
///
/// A `Failure` passed in (directly or as the first link of the source chain)
/// is returned as-is instead of being wrapped again.
pub fn classify<E>(error: E) -> Failure
where
    E: StdError + Send + Sync + 'static,
{
    let dynamic: &(dyn StdError + 'static) = &error;
    if let Some(failure) = dynamic.downcast_ref::<Failure>() {
        return failure.clone();
    }
    let kind = classify_dyn(dynamic);
    Failure::builder(kind, error.to_string())
        .foreign_cause(error)
        .build()
}

/// Classify an error that is already shared behind an `Arc`.
pub fn classify_shared(error: Arc<dyn StdError + Send + Sync + 'static>) -> Failure {
    let dynamic: &(dyn StdError + 'static) = error.as_ref();
    if let Some(failure) = dynamic.downcast_ref::<Failure>() {
        return failure.clone();
    }
    let kind = classify_dyn(dynamic);
    Failure::builder(kind, error.to_string())
        .cause(Cause::Foreign(error))
        .build()
}

fn classify_dyn(error: &(dyn StdError + 'static)) -> FailureKind {
    if let Some(io_error) = error.downcast_ref::<io::Error>() {
        return classify_io(io_error);
    }
    if error.downcast_ref::<serde_json::Error>().is_some() {
        return FailureKind::InvalidInput;
    }
    if error.downcast_ref::<tokio::time::error::Elapsed>().is_some() {
        return FailureKind::Timeout;
    }

    // Walk the source chain so wrapped transport errors still classify.
    let mut current = Some(error);
    while let Some(link) = current {
        if let Some(io_error) = link.downcast_ref::<io::Error>() {
            return classify_io(io_error);
        }
        let kind = classify_message(&link.to_string());
        if kind != FailureKind::Unknown {
            return kind;
        }
        current = link.source();
    }
    FailureKind::Unknown
}

impl From<io::Error> for Failure {
    fn from(error: io::Error) -> Self {
        classify(error)
    }
}

impl From<serde_json::Error> for Failure {
    fn from(error: serde_json::Error) -> Self {
        classify(error)
    }
}

impl From<tokio::time::error::Elapsed> for Failure {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        classify(error)
    }
}

impl From<anyhow::Error> for Failure {
    fn from(error: anyhow::Error) -> Self {
        if let Some(failure) = error.downcast_ref::<Failure>() {
            return failure.clone();
        }
        let boxed: Box<dyn StdError + Send + Sync + 'static> = error.into();
        classify_shared(Arc::from(boxed))
    }
}

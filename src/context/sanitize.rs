//! Redaction rules for [`ErrorContext`](super::ErrorContext).
//!
//! - Fields whose name contains (case-insensitively) `password`, `token`,
//!   `key`, `secret`, `auth`, `credential`, `credit` or `card` are dropped.
//! - Sensitive request headers keep their name, their value becomes
//!   [`REDACTED`].
//! - Body keys `password`, `token`, `apiKey` and `secret` are redacted at any
//!   nesting depth.
//!
//! All three rules are skipped when `privacy.include_sensitive` is set.

use super::ErrorContext;
use crate::taxonomy::ContextBag;
use serde_json::Value;

pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_FIELD_MARKERS: [&str; 8] = [
    "password",
    "token",
    "key",
    "secret",
    "auth",
    "credential",
    "credit",
    "card",
];

const SENSITIVE_HEADERS: [&str; 6] = [
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
];

const SENSITIVE_BODY_KEYS: [&str; 4] = ["password", "token", "apikey", "secret"];

pub fn is_sensitive_field(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    SENSITIVE_FIELD_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

pub fn is_sensitive_header(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    SENSITIVE_HEADERS.contains(&lowered.as_str())
}

fn is_sensitive_body_key(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    SENSITIVE_BODY_KEYS.contains(&lowered.as_str())
}

/// Drop sensitive keys from a field bag.
pub fn filter_fields(fields: &ContextBag) -> ContextBag {
    fields
        .iter()
        .filter(|(name, _)| !is_sensitive_field(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Redact sensitive body keys, recursing into objects and arrays.
pub fn redact_body(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    if is_sensitive_body_key(key) {
                        (key.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (key.clone(), redact_body(inner))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_body).collect()),
        other => other.clone(),
    }
}

pub(crate) fn sanitize_context(context: &ErrorContext) -> ErrorContext {
    let mut sanitized = context.clone();
    let privacy = context.privacy;

    if !privacy.include_sensitive {
        sanitized.fields = filter_fields(&context.fields);
        for breadcrumb in &mut sanitized.breadcrumbs {
            breadcrumb.data = filter_fields(&breadcrumb.data);
        }
    }

    if let Some(request) = sanitized.request.as_mut() {
        if !privacy.include_sensitive {
            for (name, value) in request.headers.iter_mut() {
                if is_sensitive_header(name) {
                    *value = REDACTED.to_string();
                }
            }
        }
        if !privacy.include_request_body {
            request.body = None;
        } else if !privacy.include_sensitive {
            request.body = request.body.as_ref().map(redact_body);
        }
    }

    if !privacy.include_user {
        sanitized.user = None;
    } else if !privacy.include_sensitive {
        if let Some(user) = sanitized.user.as_mut() {
            if user.email.is_some() {
                user.email = Some(REDACTED.to_string());
            }
        }
    }

    if !privacy.include_system {
        sanitized.system = None;
    }

    sanitized
}

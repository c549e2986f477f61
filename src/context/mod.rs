//! Error context: who/what/where data attached to failures as they propagate.
//!
//! ## Organization
//! - this module - [`ErrorContext`] and its snapshots
//! - `sanitize` - redaction of sensitive fields, headers and body keys
//! - `scope` - ambient ("current") context that survives `.await` points
//! - `manager` - [`ContextManager`], the constructed factory for contexts

pub mod manager;
pub mod sanitize;
pub mod scope;

pub use manager::ContextManager;
pub use sanitize::REDACTED;
pub use scope::{bind_current, current_context, run_with_context, spawn_with_context, sync_scope};

use crate::taxonomy::ContextBag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Maximum breadcrumbs kept per context; the oldest are dropped first.
pub const MAX_BREADCRUMBS: usize = 50;

/// Snapshot of an outbound or inbound HTTP request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<Value>,
}

/// Snapshot of the acting user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// Snapshot of the host process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub app_name: String,
    pub app_version: String,
    pub os: String,
    pub arch: String,
    pub pid: u32,
    #[serde(default)]
    pub hostname: Option<String>,
}

/// Position of a context in its tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncContext {
    /// Id of the parent context, never an owning reference.
    pub parent_context_id: Option<String>,
    /// Root contexts have depth 0.
    pub depth: u32,
}

/// Controls what [`ErrorContext::sanitized`] keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyOptions {
    /// Keep fields, headers and body keys that look like secrets.
    pub include_sensitive: bool,
    pub include_request_body: bool,
    pub include_system: bool,
    pub include_user: bool,
}

impl Default for PrivacyOptions {
    fn default() -> Self {
        Self {
            include_sensitive: false,
            include_request_body: true,
            include_system: true,
            include_user: true,
        }
    }
}

/// A timestamped marker of something that happened before a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub message: String,
    #[serde(default)]
    pub data: ContextBag,
}

/// Options for creating a root context.
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub correlation_id: Option<String>,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub fields: ContextBag,
    pub request: Option<RequestSnapshot>,
    pub user: Option<UserSnapshot>,
    pub system: Option<SystemSnapshot>,
    pub privacy: Option<PrivacyOptions>,
}

impl ContextOptions {
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_request(mut self, request: RequestSnapshot) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_user(mut self, user: UserSnapshot) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_privacy(mut self, privacy: PrivacyOptions) -> Self {
        self.privacy = Some(privacy);
        self
    }
}

/// Context attached to failures while they propagate.
///
/// Contexts form a tree: [`child`](Self::child) creates a descendant that
/// shares the correlation, request, user and session ids of its parent and
/// records the parent's `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub id: String,
    pub correlation_id: String,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub fields: ContextBag,
    #[serde(default)]
    pub request: Option<RequestSnapshot>,
    #[serde(default)]
    pub user: Option<UserSnapshot>,
    #[serde(default)]
    pub system: Option<SystemSnapshot>,
    #[serde(default)]
    pub async_context: AsyncContext,
    #[serde(default)]
    pub privacy: PrivacyOptions,
    #[serde(default)]
    pub breadcrumbs: Vec<Breadcrumb>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new(ContextOptions::default())
    }
}

impl ErrorContext {
    /// Root context with a fresh `id`, and a fresh `correlation_id` unless
    /// one is supplied.
    pub fn new(options: ContextOptions) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            correlation_id: options
                .correlation_id
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            request_id: options.request_id,
            user_id: options.user_id,
            session_id: options.session_id,
            timestamp: Utc::now(),
            fields: options.fields,
            request: options.request,
            user: options.user,
            system: options.system,
            async_context: AsyncContext::default(),
            privacy: options.privacy.unwrap_or_default(),
            breadcrumbs: Vec::new(),
        }
    }

    /// Descendant context. `extra_fields` override inherited fields on key
    /// collision.
    pub fn child<I, K>(&self, extra_fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut fields = self.fields.clone();
        for (key, value) in extra_fields {
            fields.insert(key.into(), value);
        }

        Self {
            id: Uuid::new_v4().to_string(),
            correlation_id: self.correlation_id.clone(),
            request_id: self.request_id.clone(),
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            timestamp: Utc::now(),
            fields,
            request: self.request.clone(),
            user: self.user.clone(),
            system: self.system.clone(),
            async_context: AsyncContext {
                parent_context_id: Some(self.id.clone()),
                depth: self.async_context.depth.saturating_add(1),
            },
            privacy: self.privacy,
            breadcrumbs: self.breadcrumbs.clone(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_root(&self) -> bool {
        self.async_context.parent_context_id.is_none()
    }

    pub fn add_breadcrumb(&mut self, category: impl Into<String>, message: impl Into<String>) {
        self.push_breadcrumb(Breadcrumb {
            timestamp: Utc::now(),
            category: category.into(),
            message: message.into(),
            data: ContextBag::new(),
        });
    }

    pub fn push_breadcrumb(&mut self, breadcrumb: Breadcrumb) {
        self.breadcrumbs.push(breadcrumb);
        if self.breadcrumbs.len() > MAX_BREADCRUMBS {
            let overflow = self.breadcrumbs.len() - MAX_BREADCRUMBS;
            self.breadcrumbs.drain(..overflow);
        }
    }

    /// Redacted copy according to `privacy`. See [`sanitize`] for the rules.
    pub fn sanitized(&self) -> Self {
        sanitize::sanitize_context(self)
    }

    /// Sanitized context as JSON, the form handed to loggers and reporters.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self.sanitized()).unwrap_or_default()
    }
}

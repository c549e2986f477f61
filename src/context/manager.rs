//! [`ContextManager`]: the constructed factory for error contexts.
//!
//! One manager is created by the application's composition root and passed to
//! whatever needs to create contexts. It owns the defaults (privacy, system
//! snapshot) so call sites only describe what is specific to them.

use super::scope;
use super::{ContextOptions, ErrorContext, PrivacyOptions, SystemSnapshot};
use crate::logging::log_trace;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct ContextManager {
    app_name: String,
    app_version: String,
    default_privacy: PrivacyOptions,
    capture_system: bool,
    hostname: Option<String>,
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::new("aicli", env!("CARGO_PKG_VERSION"))
    }
}

impl ContextManager {
    pub fn new(app_name: impl Into<String>, app_version: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            app_version: app_version.into(),
            default_privacy: PrivacyOptions::default(),
            capture_system: true,
            hostname: None,
        }
    }

    pub fn with_privacy(mut self, privacy: PrivacyOptions) -> Self {
        self.default_privacy = privacy;
        self
    }

    pub fn with_system_capture(mut self, capture: bool) -> Self {
        self.capture_system = capture;
        self
    }

    /// Host name recorded in system snapshots. The manager never looks it up
    /// itself.
    pub fn with_hostname(mut self, hostname: Option<String>) -> Self {
        self.hostname = hostname;
        self
    }

    pub fn default_privacy(&self) -> PrivacyOptions {
        self.default_privacy
    }

    /// Root context with the manager's defaults applied where `options`
    /// leaves gaps.
    pub fn create_context(&self, mut options: ContextOptions) -> ErrorContext {
        if options.privacy.is_none() {
            options.privacy = Some(self.default_privacy);
        }
        if options.system.is_none() && self.capture_system {
            options.system = Some(self.system_snapshot());
        }
        let context = ErrorContext::new(options);
        log_trace!(
            context_id = %context.id,
            correlation_id = %context.correlation_id,
            "Created error context"
        );
        context
    }

    pub fn child<I, K>(&self, parent: &ErrorContext, extra_fields: I) -> ErrorContext
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        parent.child(extra_fields)
    }

    /// Child of the current context, or a fresh root if there is none.
    pub fn child_of_current<I, K>(&self, extra_fields: I) -> ErrorContext
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        match scope::current_context() {
            Some(parent) => parent.child(extra_fields),
            None => {
                let mut options = ContextOptions::default();
                for (key, value) in extra_fields {
                    options.fields.insert(key.into(), value);
                }
                self.create_context(options)
            }
        }
    }

    pub async fn run<C, F>(&self, context: C, future: F) -> F::Output
    where
        C: Into<Arc<ErrorContext>>,
        F: Future,
    {
        scope::run_with_context(context, future).await
    }

    pub fn current(&self) -> Option<Arc<ErrorContext>> {
        scope::current_context()
    }

    pub fn system_snapshot(&self) -> SystemSnapshot {
        SystemSnapshot {
            app_name: self.app_name.clone(),
            app_version: self.app_version.clone(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            pid: std::process::id(),
            hostname: self.hostname.clone(),
        }
    }
}

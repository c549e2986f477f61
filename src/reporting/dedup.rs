//! Deduplicating logger.

use super::Logger;
use crate::context::ErrorContext;
use crate::logging::log_trace;
use crate::taxonomy::{ContextBag, Failure};

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(60_000);

#[derive(Debug, Clone, Copy)]
struct DedupEntry {
    last_logged: Instant,
    occurrences: u64,
}

/// Logs each distinct failure at most once per window.
///
/// Failures are identical when kind, message and code match. A repeat inside
/// the window is a no-op; after the window it is logged again with its
/// occurrence count.
pub struct DedupLogger {
    inner: Arc<dyn Logger>,
    window: Duration,
    entries: Mutex<HashMap<String, DedupEntry>>,
}

impl std::fmt::Debug for DedupLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupLogger")
            .field("window", &self.window)
            .field("entries", &self.len())
            .finish()
    }
}

impl DedupLogger {
    pub fn new(inner: Arc<dyn Logger>, window: Duration) -> Self {
        Self {
            inner,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_default_window(inner: Arc<dyn Logger>) -> Self {
        Self::new(inner, DEFAULT_DEDUP_WINDOW)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Log `failure` unless an identical one was logged within the window.
    ///
    /// Returns `true` when a record was emitted.
    pub fn log_error(
        &self,
        failure: &Failure,
        context: Option<&ErrorContext>,
        metadata: &ContextBag,
    ) -> bool {
        let key = failure.dedup_key();
        let now = Instant::now();

        let occurrences = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = entries.get(&key) {
                if now.duration_since(entry.last_logged) < self.window {
                    log_trace!(dedup_key = %key, "Suppressed duplicate error log");
                    return false;
                }
            }

            let window = self.window;
            entries.retain(|k, entry| k == &key || now.duration_since(entry.last_logged) < window);

            let entry = entries.entry(key.clone()).or_insert(DedupEntry {
                last_logged: now,
                occurrences: 0,
            });
            entry.last_logged = now;
            entry.occurrences += 1;
            entry.occurrences
        };

        let meta = json!({
            "error": failure.to_record(),
            "context": context.map(ErrorContext::to_value),
            "metadata": metadata,
            "occurrences": occurrences,
            "dedup_key": key,
        });
        self.inner
            .error(&format!("[{}] {}", failure.code(), failure.message()), &meta);
        true
    }

    /// Warnings are never deduplicated.
    pub fn warn(&self, message: &str, meta: &Value) {
        self.inner.warn(message, meta);
    }

    /// Times `failure`'s key has been emitted, 0 if unknown or evicted.
    pub fn occurrences(&self, failure: &Failure) -> u64 {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&failure.dedup_key())
            .map_or(0, |entry| entry.occurrences)
    }

    /// Tracked keys, including any not yet evicted.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

//! Destinations for rendered error text.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Receives formatted errors for operator display.
pub trait ErrorSink: Send + Sync {
    fn emit(&self, rendered: &str);
}

/// Writes to stderr, keeping stdout clean for command output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl ErrorSink for StderrSink {
    fn emit(&self, rendered: &str) {
        let stderr = std::io::stderr();
        let mut handle = stderr.lock();
        // Nothing sensible to do if stderr is gone.
        let _ = writeln!(handle, "{rendered}");
    }
}

/// Collects rendered output in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorSink for MemorySink {
    fn emit(&self, rendered: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(rendered.to_string());
    }
}

//! Logging utilities for aicli-resilience
//!
//! Re-exports tracing macros with log_* naming convention for consistency,
//! and offers a subscriber installer for binaries embedding the core.

// Re-export tracing macros with log_* naming
pub use tracing::{
    debug as log_debug,
    error as log_error,
    info as log_info,
    trace as log_trace,
    warn as log_warn,
};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global tracing subscriber.
///
/// Reads `RUST_LOG` first and falls back to `default_filter` (use `"warn"`
/// when unsure). Output goes to stderr in compact format so it never mixes
/// with command output on stdout.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
        .is_ok()
}

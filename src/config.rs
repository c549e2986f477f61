//! Configuration for the resilience core
//!
//! [`ResilienceConfig`] bundles the settings of every component. It can be
//! built from defaults, from a parsed config-file section, or from the
//! environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `AICLI_EXIT_ON_ERROR` | `handler.exit_on_error` |
//! | `AICLI_VERBOSE_ERRORS` | `format.verbose` |
//! | `AICLI_ERROR_FORMAT` | `format.style` |
//! | `AICLI_DEDUP_WINDOW_MS` | `logging.dedup_window` |
//! | `AICLI_RETRY_MAX_ATTEMPTS` | `retry.max_attempts` |
//! | `AICLI_RETRY_INITIAL_DELAY_MS` | `retry.initial_delay` |
//! | `AICLI_BREAKER_FAILURE_THRESHOLD` | `breaker.failure_threshold` |
//! | `AICLI_BREAKER_RECOVERY_TIMEOUT_MS` | `breaker.recovery_timeout` |

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::context::{ContextManager, PrivacyOptions};
use crate::error::{ResilienceError, ResilienceResult};
use crate::format::{FormatConfig, FormatStyle};
use crate::handler::{ErrorHandler, ErrorHandlerBuilder, ErrorHandlerConfig};
use crate::logging::{log_debug, log_warn};
use crate::reporting::DEFAULT_DEDUP_WINDOW;
use crate::retry::RetryOptions;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

/// Environment variables and the section keys they map to.
const ENV_KEYS: [(&str, &str); 8] = [
    ("AICLI_EXIT_ON_ERROR", "exit_on_error"),
    ("AICLI_VERBOSE_ERRORS", "verbose"),
    ("AICLI_ERROR_FORMAT", "format"),
    ("AICLI_DEDUP_WINDOW_MS", "dedup_window_ms"),
    ("AICLI_RETRY_MAX_ATTEMPTS", "retry_max_attempts"),
    ("AICLI_RETRY_INITIAL_DELAY_MS", "retry_initial_delay_ms"),
    ("AICLI_BREAKER_FAILURE_THRESHOLD", "breaker_failure_threshold"),
    ("AICLI_BREAKER_RECOVERY_TIMEOUT_MS", "breaker_recovery_timeout_ms"),
];

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Identical failures inside this window are logged once
    pub dedup_window: Duration,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dedup_window: DEFAULT_DEDUP_WINDOW,
            filter: "warn".to_string(),
        }
    }
}

/// Defaults for contexts created by the [`ContextManager`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub app_name: String,
    pub app_version: String,
    pub privacy: PrivacyOptions,
    /// Attach a host snapshot to new root contexts
    pub capture_system: bool,
    /// Resolved by [`ResilienceConfig::from_env`] from `HOSTNAME` or `COMPUTERNAME`
    pub hostname: Option<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            app_name: "aicli".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            privacy: PrivacyOptions::default(),
            capture_system: true,
            hostname: None,
        }
    }
}

/// Settings for every component of the core
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub handler: ErrorHandlerConfig,
    pub retry: RetryOptions,
    pub breaker: CircuitBreakerConfig,
    pub logging: LoggingConfig,
    pub format: FormatConfig,
    pub context: ContextConfig,
}

impl ResilienceConfig {
    /// Defaults overridden by `AICLI_*` environment variables. The host name
    /// for system snapshots is read here too.
    ///
    /// # Errors
    ///
    /// Returns [`ResilienceError::Configuration`] if the resulting
    /// configuration fails [`validate`](Self::validate).
    pub fn from_env() -> ResilienceResult<Self> {
        let section: HashMap<String, String> = ENV_KEYS
            .iter()
            .filter_map(|(var, key)| {
                std::env::var(var)
                    .ok()
                    .map(|value| ((*key).to_string(), value))
            })
            .collect();

        log_debug!(
            overrides = section.len(),
            "Loading resilience configuration from environment"
        );

        let mut config = Self::from_section(&section)?;
        config.context.hostname = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .ok();
        Ok(config)
    }

    /// Defaults overridden by a parsed config-file section.
    ///
    /// Recognized keys: `exit_on_error`, `enable_retry`, `enable_fallback`,
    /// `verbose`, `color`, `format`, `include_sensitive`, `dedup_window_ms`, `log_filter`,
    /// `retry_max_attempts`, `retry_initial_delay_ms`, `retry_max_delay_ms`,
    /// `retry_multiplier`, `retry_jitter`, `retry_timeout_ms`,
    /// `breaker_enabled`, `breaker_failure_threshold`,
    /// `breaker_success_threshold`, `breaker_recovery_timeout_ms`.
    /// Unparseable values are ignored with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`ResilienceError::Configuration`] if the resulting
    /// configuration fails [`validate`](Self::validate).
    pub fn from_section(section: &HashMap<String, String>) -> ResilienceResult<Self> {
        let mut config = Self::default();
        config.apply_section(section);
        config.validate()?;
        Ok(config)
    }

    fn apply_section(&mut self, section: &HashMap<String, String>) {
        if let Some(value) = parse_flag(section, "exit_on_error") {
            self.handler.exit_on_error = value;
        }
        if let Some(value) = parse_flag(section, "enable_retry") {
            self.handler.enable_retry = value;
        }
        if let Some(value) = parse_flag(section, "enable_fallback") {
            self.handler.enable_fallback = value;
        }

        if let Some(value) = parse_flag(section, "verbose") {
            self.format.verbose = value;
        }
        if let Some(value) = parse_flag(section, "color") {
            self.format.color = value;
        }
        if let Some(style) = parse_param::<FormatStyle>(section, "format") {
            self.format.style = style;
        }

        if let Some(value) = parse_flag(section, "include_sensitive") {
            self.context.privacy.include_sensitive = value;
        }

        if let Some(window) = parse_millis(section, "dedup_window_ms") {
            self.logging.dedup_window = window;
        }
        if let Some(filter) = section.get("log_filter") {
            self.logging.filter = filter.clone();
        }

        if let Some(attempts) = parse_param::<u32>(section, "retry_max_attempts") {
            self.retry.max_attempts = attempts;
        }
        if let Some(delay) = parse_millis(section, "retry_initial_delay_ms") {
            self.retry.initial_delay = delay;
        }
        if let Some(delay) = parse_millis(section, "retry_max_delay_ms") {
            self.retry.max_delay = delay;
        }
        if let Some(multiplier) = parse_param::<f64>(section, "retry_multiplier") {
            self.retry.backoff_multiplier = multiplier;
        }
        if let Some(jitter) = parse_flag(section, "retry_jitter") {
            self.retry.jitter = jitter;
        }
        if let Some(timeout) = parse_millis(section, "retry_timeout_ms") {
            self.retry.timeout = timeout;
        }

        if let Some(enabled) = parse_flag(section, "breaker_enabled") {
            self.breaker.enabled = enabled;
        }
        if let Some(threshold) = parse_param::<u32>(section, "breaker_failure_threshold") {
            self.breaker.failure_threshold = threshold;
        }
        if let Some(threshold) = parse_param::<u32>(section, "breaker_success_threshold") {
            self.breaker.success_threshold = threshold;
        }
        if let Some(timeout) = parse_millis(section, "breaker_recovery_timeout_ms") {
            self.breaker.recovery_timeout = timeout;
        }
    }

    /// Check every component's invariants.
    pub fn validate(&self) -> ResilienceResult<()> {
        self.retry
            .validate()
            .map_err(|e| ResilienceError::configuration(format!("retry: {e}")))?;
        self.breaker
            .validate()
            .map_err(|e| ResilienceError::configuration(format!("breaker: {e}")))?;
        if self.logging.dedup_window.is_zero() {
            return Err(ResilienceError::configuration(
                "logging: dedup_window must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Handler builder preloaded with this configuration. Add loggers,
    /// reporters and sinks before building.
    pub fn handler_builder(&self) -> ErrorHandlerBuilder {
        ErrorHandler::builder()
            .config(self.handler.clone())
            .format(self.format.clone())
            .retry_options(self.retry.clone())
            .breaker_config(self.breaker.clone())
            .dedup_window(self.logging.dedup_window)
    }

    /// Handler with the default logger, formatter and stderr sink.
    pub fn build_handler(&self) -> ResilienceResult<ErrorHandler> {
        self.validate()?;
        self.handler_builder().build()
    }

    /// Install the global `tracing` subscriber with `logging.filter` as the
    /// fallback when `RUST_LOG` is unset. Returns `false` if one was already
    /// installed.
    pub fn init_logging(&self) -> bool {
        crate::logging::init(&self.logging.filter)
    }

    pub fn context_manager(&self) -> ContextManager {
        ContextManager::new(&self.context.app_name, &self.context.app_version)
            .with_privacy(self.context.privacy)
            .with_system_capture(self.context.capture_system)
            .with_hostname(self.context.hostname.clone())
    }
}

fn parse_param<T: FromStr>(section: &HashMap<String, String>, key: &str) -> Option<T> {
    let raw = section.get(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            log_warn!(key = key, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}

fn parse_millis(section: &HashMap<String, String>, key: &str) -> Option<Duration> {
    parse_param::<u64>(section, key).map(Duration::from_millis)
}

/// Accepts `true/false`, `1/0`, `yes/no` and `on/off`.
fn parse_flag(section: &HashMap<String, String>, key: &str) -> Option<bool> {
    let raw = section.get(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => {
            log_warn!(key = key, value = %raw, "Ignoring unparseable configuration flag");
            None
        }
    }
}

// Unit Tests for Resilience Configuration
//
// UNIT UNDER TEST: ResilienceConfig
//
// BUSINESS RESPONSIBILITY:
//   - Loads handler, retry, breaker, logging and format settings
//   - Reads AICLI_* environment overrides and config-file sections
//   - Ignores unparseable values instead of failing startup
//   - Rejects settings that would break retry, breaker or dedup invariants
//   - Builds the handler and context manager the application shares
//
// TEST COVERAGE:
//   - Defaults for every component
//   - Section parsing: flags, numbers, durations, format aliases
//   - Invalid values are ignored
//   - Validation errors are wrapped as Configuration errors
//   - Environment variable loading (serialized, env is process-global)
//   - Handler and context manager construction

use crate::config::ResilienceConfig;
use crate::context::ContextOptions;
use crate::error::ResilienceError;
use crate::format::FormatStyle;
use crate::reporting::DEFAULT_DEDUP_WINDOW;

use std::collections::HashMap;
use std::time::Duration;

fn section(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod resilience_config_tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        // Arrange
        let config = ResilienceConfig::default();

        // Act
        let result = config.validate();

        // Assert
        assert!(result.is_ok(), "Default configuration must validate");
        assert!(!config.handler.exit_on_error);
        assert!(config.handler.enable_retry);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.logging.dedup_window, DEFAULT_DEDUP_WINDOW);
        assert_eq!(config.context.app_name, "aicli");
        assert!(!config.format.verbose);
    }

    #[test]
    fn test_section_overrides_every_component() {
        // Arrange
        let values = section(&[
            ("exit_on_error", "yes"),
            ("enable_fallback", "off"),
            ("verbose", "1"),
            ("color", "false"),
            ("format", "md"),
            ("include_sensitive", "on"),
            ("dedup_window_ms", "2500"),
            ("log_filter", "aicli=debug"),
            ("retry_max_attempts", "5"),
            ("retry_initial_delay_ms", "250"),
            ("retry_max_delay_ms", "4000"),
            ("retry_multiplier", "1.5"),
            ("retry_jitter", "no"),
            ("breaker_failure_threshold", "8"),
            ("breaker_success_threshold", "3"),
            ("breaker_recovery_timeout_ms", "15000"),
        ]);

        // Act
        let config = ResilienceConfig::from_section(&values).unwrap();

        // Assert
        assert!(config.handler.exit_on_error);
        assert!(!config.handler.enable_fallback);
        assert!(config.format.verbose);
        assert!(!config.format.color);
        assert_eq!(config.format.style, FormatStyle::Markdown);
        assert!(config.context.privacy.include_sensitive);
        assert_eq!(config.logging.dedup_window, Duration::from_millis(2500));
        assert_eq!(config.logging.filter, "aicli=debug");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(config.retry.max_delay, Duration::from_millis(4000));
        assert_eq!(config.retry.backoff_multiplier, 1.5);
        assert!(!config.retry.jitter);
        assert_eq!(config.breaker.failure_threshold, 8);
        assert_eq!(config.breaker.success_threshold, 3);
        assert_eq!(config.breaker.recovery_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_unparseable_values_are_ignored() {
        // Arrange
        let values = section(&[
            ("verbose", "maybe"),
            ("format", "yaml"),
            ("retry_max_attempts", "many"),
            ("dedup_window_ms", "-5"),
        ]);

        // Act
        let config = ResilienceConfig::from_section(&values).unwrap();

        // Assert
        let defaults = ResilienceConfig::default();
        assert_eq!(config.format, defaults.format, "Invalid format values keep defaults");
        assert_eq!(config.retry.max_attempts, defaults.retry.max_attempts);
        assert_eq!(config.logging.dedup_window, defaults.logging.dedup_window);
    }

    #[test]
    fn test_invalid_retry_settings_are_configuration_errors() {
        // Arrange
        let values = section(&[("retry_max_attempts", "0")]);

        // Act
        let result = ResilienceConfig::from_section(&values);

        // Assert
        match result {
            Err(ResilienceError::Configuration { message }) => {
                assert!(message.starts_with("retry: "), "Got: {message}");
                assert!(message.contains("max_attempts"));
            }
            other => panic!("Expected a configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_breaker_settings_are_configuration_errors() {
        // Arrange
        let values = section(&[("breaker_failure_threshold", "0")]);

        // Act
        let result = ResilienceConfig::from_section(&values);

        // Assert
        assert!(matches!(
            result,
            Err(ResilienceError::Configuration { ref message }) if message.starts_with("breaker: ")
        ));
    }

    #[test]
    fn test_zero_dedup_window_is_rejected() {
        // Arrange
        let values = section(&[("dedup_window_ms", "0")]);

        // Act
        let result = ResilienceConfig::from_section(&values);

        // Assert
        assert!(matches!(result, Err(ResilienceError::Configuration { .. })));
    }

    #[test]
    fn test_build_handler_applies_configuration() {
        // Arrange
        let mut config = ResilienceConfig::default();
        config.handler.enable_fallback = false;
        config.logging.dedup_window = Duration::from_secs(5);

        // Act
        let handler = config.build_handler().unwrap();

        // Assert
        assert!(!handler.config().enable_fallback);
        assert_eq!(handler.dedup_logger().window(), Duration::from_secs(5));
    }

    #[test]
    fn test_build_handler_revalidates() {
        // Arrange
        let mut config = ResilienceConfig::default();
        config.retry.backoff_multiplier = 0.5;

        // Act
        let result = config.build_handler();

        // Assert
        assert!(matches!(result, Err(ResilienceError::Configuration { .. })));
    }

    #[test]
    fn test_logging_subscriber_installs_once() {
        // Arrange
        let config = ResilienceConfig::default();

        // Act
        let _ = config.init_logging();
        let second = config.init_logging();

        // Assert
        assert!(!second, "A global subscriber can only be installed once");
    }

    #[test]
    fn test_context_manager_uses_context_settings() {
        // Arrange
        let mut config = ResilienceConfig::default();
        config.context.privacy.include_sensitive = true;
        config.context.capture_system = false;

        // Act
        let manager = config.context_manager();
        let context = manager.create_context(ContextOptions::default());

        // Assert
        assert!(manager.default_privacy().include_sensitive);
        assert!(context.privacy.include_sensitive);
        assert!(context.system.is_none(), "System capture was disabled");
    }
}

#[cfg(test)]
mod env_config_tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 10] = [
        "HOSTNAME",
        "COMPUTERNAME",
        "AICLI_EXIT_ON_ERROR",
        "AICLI_VERBOSE_ERRORS",
        "AICLI_ERROR_FORMAT",
        "AICLI_DEDUP_WINDOW_MS",
        "AICLI_RETRY_MAX_ATTEMPTS",
        "AICLI_RETRY_INITIAL_DELAY_MS",
        "AICLI_BREAKER_FAILURE_THRESHOLD",
        "AICLI_BREAKER_RECOVERY_TIMEOUT_MS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_from_env_without_variables_gives_defaults() {
        // Arrange
        clear_env();

        // Act
        let config = ResilienceConfig::from_env().unwrap();

        // Assert
        assert_eq!(config, ResilienceConfig::default());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        // Arrange
        clear_env();
        std::env::set_var("AICLI_VERBOSE_ERRORS", "true");
        std::env::set_var("AICLI_ERROR_FORMAT", "json");
        std::env::set_var("AICLI_RETRY_MAX_ATTEMPTS", "7");
        std::env::set_var("AICLI_RETRY_INITIAL_DELAY_MS", "50");
        std::env::set_var("AICLI_BREAKER_RECOVERY_TIMEOUT_MS", "1000");

        // Act
        let config = ResilienceConfig::from_env();
        clear_env();

        // Assert
        let config = config.unwrap();
        assert!(config.format.verbose);
        assert_eq!(config.format.style, FormatStyle::Json);
        assert_eq!(config.retry.max_attempts, 7);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(50));
        assert_eq!(config.breaker.recovery_timeout, Duration::from_secs(1));
    }

    #[test]
    #[serial]
    fn test_from_env_resolves_hostname_for_snapshots() {
        // Arrange
        clear_env();
        std::env::set_var("COMPUTERNAME", "WIN-BUILD");

        // Act
        let fallback = ResilienceConfig::from_env();
        std::env::set_var("HOSTNAME", "linux-build");
        let preferred = ResilienceConfig::from_env();
        clear_env();

        // Assert
        let fallback = fallback.unwrap();
        assert_eq!(fallback.context.hostname.as_deref(), Some("WIN-BUILD"));
        let preferred = preferred.unwrap();
        assert_eq!(preferred.context.hostname.as_deref(), Some("linux-build"));
        let snapshot = preferred
            .context_manager()
            .create_context(ContextOptions::default())
            .system
            .expect("system capture is on by default");
        assert_eq!(snapshot.hostname.as_deref(), Some("linux-build"));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_invalid_combination() {
        // Arrange
        clear_env();
        std::env::set_var("AICLI_DEDUP_WINDOW_MS", "0");

        // Act
        let result = ResilienceConfig::from_env();
        clear_env();

        // Assert
        assert!(matches!(result, Err(ResilienceError::Configuration { .. })));
    }
}

use crate::error::ResilienceError;
use crate::retry::backoff::{apply_jitter, JITTER_RATIO};
use crate::retry::{retry_with, Backoff, RetryOptions, RetryStrategy};
use crate::taxonomy::{Failure, FailureKind};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[cfg(test)]
mod tests {
    use super::*;

    fn options(initial_ms: u64, max_ms: u64) -> RetryOptions {
        RetryOptions {
            max_attempts: 3,
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            backoff_multiplier: 2.0,
            jitter: false,
            timeout: Duration::from_secs(5),
        }
    }

    // Unit Tests for RetryOptions
    //
    // UNIT UNDER TEST: RetryOptions (concrete implementation)
    //
    // BUSINESS RESPONSIBILITY:
    //   - Defines how often and how patiently failed operations are retried
    //   - Rejects configurations that could never work
    //
    // TEST COVERAGE:
    //   - Production defaults
    //   - Validation of attempts, multiplier, delay bounds and timeout

    #[test]
    fn test_retry_options_defaults() {
        // Arrange
        let options = RetryOptions::default();

        // Act & Assert
        assert_eq!(options.max_attempts, 3, "Should try three times in total");
        assert_eq!(options.initial_delay, Duration::from_millis(1000));
        assert_eq!(options.max_delay, Duration::from_millis(60_000));
        assert_eq!(options.backoff_multiplier, 2.0);
        assert!(options.jitter, "Jitter is on by default to spread load");
        assert_eq!(options.timeout, Duration::from_millis(30_000));
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_retry_options_validation_rejects_unusable_values() {
        // Arrange
        let zero_attempts = RetryOptions {
            max_attempts: 0,
            ..RetryOptions::default()
        };
        let shrinking = RetryOptions {
            backoff_multiplier: 0.5,
            ..RetryOptions::default()
        };
        let inverted = RetryOptions {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(1),
            ..RetryOptions::default()
        };
        let no_timeout = RetryOptions {
            timeout: Duration::ZERO,
            ..RetryOptions::default()
        };

        // Act & Assert
        for invalid in [zero_attempts, shrinking, inverted, no_timeout] {
            assert!(
                matches!(
                    invalid.validate(),
                    Err(ResilienceError::InvalidRetryOptions { .. })
                ),
                "Options {invalid:?} should be rejected"
            );
        }
    }

    // Unit Tests for Backoff
    //
    // UNIT UNDER TEST: Backoff, RetryStrategy::calculate_delay
    //
    // BUSINESS RESPONSIBILITY:
    //   - Spaces retries out so struggling dependencies can recover
    //   - Never waits longer than max_delay
    //
    // TEST COVERAGE:
    //   - Exponential, linear, fixed and custom progressions
    //   - max_delay cap
    //   - Jitter envelope

    #[test]
    fn test_exponential_delays_double_until_capped() {
        // Arrange
        let strategy = RetryStrategy::exponential(options(1000, 5000));

        // Act
        let delays: Vec<u128> = (1..=5)
            .map(|attempt| strategy.calculate_delay(attempt).as_millis())
            .collect();

        // Assert
        assert_eq!(delays, vec![1000, 2000, 4000, 5000, 5000]);
    }

    #[test]
    fn test_linear_and_fixed_delays() {
        // Arrange
        let linear = RetryStrategy::linear(options(1000, 2500));
        let fixed = RetryStrategy::fixed(options(1000, 2500));

        // Act & Assert
        assert_eq!(linear.calculate_delay(1), Duration::from_millis(1000));
        assert_eq!(linear.calculate_delay(2), Duration::from_millis(2000));
        assert_eq!(linear.calculate_delay(3), Duration::from_millis(2500), "Capped");
        assert_eq!(fixed.calculate_delay(1), Duration::from_millis(1000));
        assert_eq!(fixed.calculate_delay(7), Duration::from_millis(1000));
    }

    #[test]
    fn test_custom_delay_function_is_capped() {
        // Arrange
        let strategy = RetryStrategy::custom(options(1000, 3000), |attempt| {
            Duration::from_millis(u64::from(attempt) * 1500)
        });

        // Act & Assert
        assert_eq!(strategy.backoff().name(), "custom");
        assert_eq!(strategy.calculate_delay(1), Duration::from_millis(1500));
        assert_eq!(strategy.calculate_delay(4), Duration::from_millis(3000));
    }

    #[test]
    fn test_huge_attempt_numbers_do_not_overflow() {
        // Arrange
        let strategy = RetryStrategy::exponential(options(1000, 60_000));

        // Act
        let delay = strategy.calculate_delay(u32::MAX);

        // Assert
        assert_eq!(delay, Duration::from_millis(60_000));
    }

    #[test]
    fn test_jitter_stays_within_envelope_and_cap() {
        // Arrange
        let base = Duration::from_millis(1000);
        let low = base.as_secs_f64() * (1.0 - JITTER_RATIO);
        let high = base.as_secs_f64() * (1.0 + JITTER_RATIO);

        // Act & Assert
        for _ in 0..200 {
            let jittered = apply_jitter(base, Duration::from_secs(60)).as_secs_f64();
            assert!(
                jittered >= low - 1e-9 && jittered <= high + 1e-9,
                "Jittered delay {jittered} outside ±25% of 1s"
            );
            let capped = apply_jitter(base, Duration::from_millis(1100));
            assert!(capped <= Duration::from_millis(1100), "Jitter never exceeds max_delay");
        }
    }

    #[test]
    fn test_default_backoff_is_exponential_doubling() {
        // Arrange & Act
        let backoff = Backoff::default();

        // Assert
        assert_eq!(backoff.name(), "exponential");
        assert_eq!(
            backoff.base_delay(3, Duration::from_millis(100), Duration::from_secs(10)),
            Duration::from_millis(400)
        );
    }

    // Unit Tests for RetryStrategy::execute
    //
    // UNIT UNDER TEST: RetryStrategy (concrete implementation)
    //
    // BUSINESS RESPONSIBILITY:
    //   - Re-runs operations that fail transiently
    //   - Gives up immediately on permanent failures
    //   - Bounds each attempt with a timeout
    //   - Keeps statistics for diagnostics
    //
    // TEST COVERAGE:
    //   - Success after transient failures, with exact sleep durations
    //   - Non-retryable failures stop after one attempt
    //   - Exhaustion returns the last failure
    //   - Per-attempt timeouts count as attempts
    //   - Callbacks and custom predicates
    //   - Provider retry-after hints

    #[tokio::test(start_paused = true)]
    async fn test_execute_retries_transient_failures_with_backoff() {
        // Test verifies two transient failures are retried after 100ms and 200ms

        // Arrange
        let strategy = RetryStrategy::exponential(options(100, 10_000));
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        // Act
        let result = strategy
            .execute(|| {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if call < 3 {
                        Err(Failure::connection_refused("api.github.com:443"))
                    } else {
                        Ok("issues")
                    }
                }
            })
            .await;

        // Assert
        assert_eq!(result.unwrap(), "issues");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            started.elapsed(),
            Duration::from_millis(300),
            "Should sleep exactly 100ms then 200ms"
        );

        let stats = strategy.stats();
        assert_eq!(stats.total_operations, 1);
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.successful_retries, 1);
        assert_eq!(stats.failed_retries, 0);
        assert_eq!(stats.total_delay, Duration::from_millis(300));
        assert_eq!(stats.average_delay, Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_first_attempt_success_counts_as_successful_invocation() {
        // Arrange
        let strategy = RetryStrategy::exponential(options(100, 1000));

        // Act
        let value = strategy.execute(|| async { Ok::<_, Failure>(5) }).await;

        // Assert
        assert_eq!(value.unwrap(), 5);
        let stats = strategy.stats();
        assert_eq!(stats.successful_retries, 1, "Counted without any retry");
        assert_eq!(stats.total_retries, 0);
        assert_eq!(stats.total_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_stops_on_non_retryable_failure() {
        // Arrange
        let strategy = RetryStrategy::exponential(options(100, 1000));
        let calls = AtomicU32::new(0);

        // Act
        let result: Result<(), Failure> = strategy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Failure::missing_config("OPENAI_API_KEY")) }
            })
            .await;

        // Assert
        let failure = result.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::MissingConfig);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "Permanent failures are not retried");
        assert_eq!(strategy.stats().total_retries, 0, "No retry happened");
        assert_eq!(strategy.stats().failed_retries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_returns_last_failure_when_exhausted() {
        // Arrange
        let strategy = RetryStrategy::fixed(options(50, 1000));
        let calls = AtomicU32::new(0);

        // Act
        let result: Result<(), Failure> = strategy
            .execute(|| {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move { Err(Failure::network(format!("reset #{call}"))) }
            })
            .await;

        // Assert
        assert_eq!(result.unwrap_err().message(), "reset #3");
        let stats = strategy.stats();
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.failed_retries, 1);
        assert_eq!(stats.total_delay, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_attempt() {
        // Arrange
        let strategy = RetryStrategy::builder()
            .name("slow-provider")
            .max_attempts(2)
            .initial_delay(Duration::from_millis(10))
            .timeout(Duration::from_millis(50))
            .jitter(false)
            .fixed()
            .build()
            .unwrap();
        let calls = AtomicU32::new(0);

        // Act
        let result: Result<(), Failure> = strategy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    Ok::<(), Failure>(())
                }
            })
            .await;

        // Assert
        let failure = result.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 2, "Timed out attempts are retried");
        assert_eq!(failure.context_value("attempt"), Some(&serde_json::json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_callbacks_and_custom_predicate() {
        // Arrange
        let retries = Arc::new(Mutex::new(Vec::new()));
        let gave_up = Arc::new(AtomicU32::new(0));
        let retries_seen = Arc::clone(&retries);
        let gave_up_seen = Arc::clone(&gave_up);
        let strategy = RetryStrategy::builder()
            .max_attempts(4)
            .initial_delay(Duration::from_millis(10))
            .jitter(false)
            .linear()
            .retry_if(|failure| failure.kind() == FailureKind::Validation)
            .on_retry(move |attempt, _failure, delay| {
                retries_seen.lock().unwrap().push((attempt, delay));
            })
            .on_failure(move |attempt, _failure| {
                gave_up_seen.store(attempt, Ordering::SeqCst);
            })
            .build()
            .unwrap();

        // Act
        let result: Result<(), Failure> = strategy
            .execute(|| async { Err(Failure::validation("title", "must not be empty")) })
            .await;

        // Assert
        assert!(result.is_err());
        assert_eq!(
            *retries.lock().unwrap(),
            vec![
                (1, Duration::from_millis(10)),
                (2, Duration::from_millis(20)),
                (3, Duration::from_millis(30)),
            ],
            "Predicate made validation failures retryable"
        );
        assert_eq!(gave_up.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_hint_overrides_backoff() {
        // Arrange
        let strategy = RetryStrategy::exponential(options(100, 10_000));
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        // Act
        let result = strategy
            .execute(|| {
                let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if call == 1 {
                        Err(Failure::rate_limited("openai", Some(Duration::from_secs(2))))
                    } else {
                        Ok(call)
                    }
                }
            })
            .await;

        // Assert
        assert_eq!(result.unwrap(), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_with_validates_options_first() {
        // Arrange
        let invalid = RetryOptions {
            max_attempts: 0,
            ..RetryOptions::default()
        };
        let calls = AtomicU32::new(0);

        // Act
        let result: Result<(), Failure> = retry_with(invalid, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<(), Failure>(()) }
        })
        .await;

        // Assert
        let failure = result.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::InvalidConfig);
        assert_eq!(calls.load(Ordering::SeqCst), 0, "Operation never runs");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrap_produces_reusable_retrying_closure() {
        // Arrange
        let strategy = Arc::new(RetryStrategy::fixed(options(10, 100)));
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let fetch = Arc::clone(&strategy).wrap(move || {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call % 2 == 1 {
                    Err(Failure::network("flaky"))
                } else {
                    Ok(call)
                }
            }
        });

        // Act
        let first = fetch().await;
        let second = fetch().await;

        // Assert
        assert_eq!(first.unwrap(), 2);
        assert_eq!(second.unwrap(), 4);
        assert_eq!(strategy.stats().total_operations, 2);
    }
}

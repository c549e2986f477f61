// Unit Tests for CircuitBreaker
//
// UNIT UNDER TEST: CircuitBreaker, CircuitBreakerRegistry
//
// BUSINESS RESPONSIBILITY:
//   - Stops calling a dependency that keeps failing
//   - Fails fast with CIRCUIT_OPEN while the dependency cools down
//   - Probes recovery in HalfOpen and closes after enough successes
//   - Isolates breakers per dependency or error code
//
// TEST COVERAGE:
//   - Closed -> Open at the failure threshold
//   - Rejection without invoking the operation while Open
//   - Open -> HalfOpen after the recovery timeout (paused clock)
//   - HalfOpen -> Closed after success_threshold successes
//   - HalfOpen -> Open on any failure
//   - Success in Closed resets the failure count
//   - Disabled breakers pass everything through
//   - Observed calls dropped by a timeout count as failures
//   - Registry isolation, reset and stats

use crate::circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState,
};
use crate::error::ResilienceError;
use crate::taxonomy::{codes, Failure, FailureKind};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

#[cfg(test)]
mod circuit_breaker_tests {
    use super::*;

    fn breaker(failure_threshold: u32, success_threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold,
            success_threshold,
            recovery_timeout: Duration::from_secs(30),
            ..CircuitBreakerConfig::named("openai")
        })
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), Failure> {
        breaker
            .execute(|| async { Err(Failure::provider_unavailable("openai", Some(503))) })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<u32, Failure> {
        breaker.execute(|| async { Ok::<_, Failure>(7) }).await
    }

    #[test]
    fn test_default_config_values() {
        // Arrange
        let config = CircuitBreakerConfig::default();

        // Act & Assert
        assert!(config.enabled);
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 2);
        assert_eq!(config.recovery_timeout, Duration::from_millis(60_000));
        assert_eq!(config.name, "default");
        assert_eq!(CircuitState::HalfOpen.to_string(), "half-open");
    }

    #[test]
    fn test_zero_thresholds_are_rejected() {
        // Arrange
        let config = CircuitBreakerConfig {
            failure_threshold: 0,
            ..CircuitBreakerConfig::default()
        };

        // Act
        let result = config.validate();

        // Assert
        assert!(matches!(result, Err(ResilienceError::InvalidBreakerConfig { .. })));
    }

    #[tokio::test]
    async fn test_opens_after_failure_threshold() {
        // Arrange
        let breaker = breaker(3, 2);

        // Act
        for _ in 0..2 {
            let _ = fail(&breaker).await;
        }
        let state_before_threshold = breaker.state();
        let _ = fail(&breaker).await;

        // Assert
        assert_eq!(state_before_threshold, CircuitState::Closed);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.failure_count(), 3);
    }

    #[tokio::test]
    async fn test_open_circuit_rejects_without_calling_operation() {
        // Arrange
        let breaker = breaker(1, 1);
        let _ = fail(&breaker).await;
        let calls = AtomicU32::new(0);

        // Act
        let result: Result<(), Failure> = breaker
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), Failure>(()) }
            })
            .await;

        // Assert
        let failure = result.unwrap_err();
        assert_eq!(failure.kind(), FailureKind::CircuitOpen);
        assert_eq!(failure.code(), codes::CIRCUIT_OPEN);
        assert!(!failure.is_retryable(), "Rejections are not retried");
        assert_eq!(calls.load(Ordering::SeqCst), 0, "Operation must not run");
        assert!(failure.retry_after().is_some(), "Rejection carries remaining cooldown");
        assert_eq!(breaker.stats().rejected_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_recovery_timeout_then_closes() {
        // Arrange
        let breaker = breaker(1, 2);
        let _ = fail(&breaker).await;

        // Act & Assert
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!breaker.should_allow_request(), "Still cooling down at 29s");
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        assert_eq!(breaker.state(), CircuitState::HalfOpen, "One success is not enough");
        assert_eq!(breaker.success_count(), 1);

        succeed(&breaker).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.failure_count(), 0);
        assert_eq!(breaker.success_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_circuit() {
        // Arrange
        let breaker = breaker(1, 2);
        let _ = fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        // Act
        succeed(&breaker).await.unwrap();
        let _ = fail(&breaker).await;

        // Assert
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.success_count(), 0, "Probe successes are discarded");
        assert!(
            !breaker.should_allow_request(),
            "Cooldown restarts from the probe failure"
        );
    }

    #[tokio::test]
    async fn test_success_in_closed_resets_failure_count() {
        // Arrange
        let breaker = breaker(3, 1);
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;

        // Act
        succeed(&breaker).await.unwrap();
        let _ = fail(&breaker).await;

        // Assert
        assert_eq!(breaker.failure_count(), 1, "Only consecutive failures count");
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_disabled_breaker_passes_everything_through() {
        // Arrange
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            enabled: false,
            failure_threshold: 1,
            ..CircuitBreakerConfig::default()
        });

        // Act
        for _ in 0..5 {
            let _ = fail(&breaker).await;
        }

        // Assert
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.should_allow_request());
        assert_eq!(succeed(&breaker).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_reset_forces_closed_and_zeroes_stats() {
        // Arrange
        let breaker = breaker(1, 1);
        let _ = fail(&breaker).await;
        let _ = succeed(&breaker).await;

        // Act
        breaker.reset();

        // Assert
        let stats = breaker.stats();
        assert_eq!(stats.state, CircuitState::Closed);
        assert_eq!(stats.total_calls, 0);
        assert_eq!(stats.rejected_calls, 0);
        assert_eq!(stats.failed_calls, 0);
    }

    #[tokio::test]
    async fn test_try_acquire_and_observe_match_execute() {
        // Arrange
        let breaker = breaker(1, 1);

        // Act
        breaker.try_acquire().unwrap();
        let observed = breaker
            .observe(async { Err::<(), _>(Failure::network("reset")) })
            .await;
        let rejected = breaker.try_acquire();

        // Assert
        assert!(observed.is_err());
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(rejected.unwrap_err().code(), codes::CIRCUIT_OPEN);
        let stats = breaker.stats();
        assert_eq!(stats.total_calls, 2);
        assert_eq!(stats.rejected_calls, 1);
        assert_eq!(stats.failed_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observed_call_cut_off_by_timeout_counts_as_failure() {
        // Arrange
        let breaker = breaker(1, 1);
        breaker.try_acquire().unwrap();

        // Act
        let hung = breaker.observe(std::future::pending::<Result<(), Failure>>());
        let outcome = tokio::time::timeout(Duration::from_millis(50), hung).await;

        // Assert
        assert!(outcome.is_err(), "The call never settles on its own");
        assert_eq!(breaker.state(), CircuitState::Open);
        let stats = breaker.stats();
        assert_eq!(stats.failed_calls, 1);
        assert_eq!(stats.successful_calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_half_open_probe_reopens_circuit() {
        // Arrange
        let breaker = breaker(1, 1);
        let _ = fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(30)).await;
        breaker.try_acquire().unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // Act
        let probe = breaker.observe(std::future::pending::<Result<(), Failure>>());
        let _ = tokio::time::timeout(Duration::from_millis(50), probe).await;

        // Assert
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.should_allow_request(), "Cooldown restarts from the timeout");
    }

    #[tokio::test]
    async fn test_operation_errors_are_returned_unchanged() {
        // Arrange
        let breaker = breaker(5, 1);

        // Act
        let failure = fail(&breaker).await.unwrap_err();

        // Assert
        assert_eq!(failure.kind(), FailureKind::ProviderUnavailable);
        assert_eq!(failure.context_value("status"), Some(&serde_json::json!(503)));
    }
}

#[cfg(test)]
mod circuit_breaker_registry_tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_isolates_breakers_by_key() {
        // Arrange
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..CircuitBreakerConfig::default()
        });

        // Act
        let github = registry.get_or_create("github");
        let _: Result<(), Failure> = github
            .execute(|| async { Err(Failure::external("github", "502")) })
            .await;
        let linear = registry.get_or_create("linear");

        // Assert
        assert_eq!(github.name(), "github", "Breakers are named after their key");
        assert_eq!(github.state(), CircuitState::Open);
        assert_eq!(linear.state(), CircuitState::Closed);
        assert_eq!(registry.len(), 2);
        assert!(std::sync::Arc::ptr_eq(&github, &registry.get_or_create("github")));
    }

    #[tokio::test]
    async fn test_registry_reset_all_and_stats() {
        // Arrange
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..CircuitBreakerConfig::default()
        });
        for key in ["b", "a"] {
            let _: Result<(), Failure> = registry
                .get_or_create(key)
                .execute(|| async { Err(Failure::network("down")) })
                .await;
        }

        // Act
        let states_before = registry.states();
        registry.reset_all();

        // Assert
        assert!(states_before.values().all(|state| *state == CircuitState::Open));
        assert!(registry
            .states()
            .values()
            .all(|state| *state == CircuitState::Closed));
        let names: Vec<_> = registry.stats().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()], "Stats are sorted");
        assert!(registry.get("missing").is_none());
    }
}

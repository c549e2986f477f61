//! Circuit breaker for failing dependencies
//!
//! A breaker stops invoking a dependency that keeps failing, for a cooldown
//! period, so callers fail fast instead of piling up timeouts.
//!
//! ## States
//!
//! - **Closed**: calls pass through; consecutive failures are counted and
//!   reaching `failure_threshold` opens the circuit
//! - **Open**: calls are rejected with a `CIRCUIT_OPEN` failure without
//!   invoking the operation, until `recovery_timeout` has elapsed since the
//!   last failure
//! - **HalfOpen**: calls are let through as probes; `success_threshold`
//!   successes close the circuit, any failure reopens it
//!
//! ```rust
//! use aicli_resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
//! use aicli_resilience::Failure;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let breaker = CircuitBreaker::new(CircuitBreakerConfig {
//!     failure_threshold: 1,
//!     ..CircuitBreakerConfig::named("linear-api")
//! });
//!
//! let first: Result<(), Failure> = breaker
//!     .execute(|| async { Err(Failure::network("connection refused")) })
//!     .await;
//! assert!(first.is_err());
//! assert_eq!(breaker.state(), CircuitState::Open);
//!
//! let rejected: Result<(), Failure> = breaker.execute(|| async { Ok::<(), Failure>(()) }).await;
//! assert_eq!(rejected.unwrap_err().code(), "CIRCUIT_OPEN");
//! # }
//! ```

use crate::error::{ResilienceError, ResilienceResult};
use crate::logging::{log_debug, log_info, log_warn};
use crate::taxonomy::{Failure, FailureResult};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Disabled breakers pass every call straight through
    pub enabled: bool,
    /// Consecutive failures in Closed before opening
    pub failure_threshold: u32,
    /// Successes in HalfOpen before closing
    pub success_threshold: u32,
    /// Time after the last failure before a probe is allowed
    pub recovery_timeout: Duration,
    /// Name used in logs and circuit-open failures
    pub name: String,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: Duration::from_millis(60_000),
            name: "default".to_string(),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ResilienceResult<()> {
        if self.failure_threshold == 0 {
            return Err(ResilienceError::invalid_breaker_config(
                "failure_threshold must be at least 1",
            ));
        }
        if self.success_threshold == 0 {
            return Err(ResilienceError::invalid_breaker_config(
                "success_threshold must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Point-in-time view of a breaker's state and counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub total_calls: u64,
    /// Calls rejected while Open
    pub rejected_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    /// Time since the last state transition (or since creation)
    pub time_in_state: Duration,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
    last_state_change: Instant,
}

impl BreakerState {
    fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            success_count: 0,
            last_failure_time: None,
            last_state_change: Instant::now(),
        }
    }
}

/// Circuit breaker protecting one dependency (or one error code).
///
/// Shared as `Arc<CircuitBreaker>`. The state lock is never held while the
/// protected operation runs, so concurrent calls interleave freely.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    total_calls: AtomicU64,
    rejected_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState::closed()),
            total_calls: AtomicU64::new(0),
            rejected_calls: AtomicU64::new(0),
            successful_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `operation` through the breaker.
    ///
    /// While Open the operation is not invoked and a `CIRCUIT_OPEN` failure is
    /// returned instead. Operation errors are converted to [`Failure`] and
    /// returned unchanged otherwise.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> FailureResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        self.try_acquire()?;
        self.observe(operation()).await
    }

    /// Admit one call or reject it with `CIRCUIT_OPEN`.
    ///
    /// Split from [`execute`](Self::execute) for callers that must decide
    /// admission before building the future. Pair every `Ok` with
    /// [`observe`](Self::observe) or an explicit `record_*` call.
    pub fn try_acquire(&self) -> FailureResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.admit().map_err(|retry_in| {
            self.rejected_calls.fetch_add(1, Ordering::Relaxed);
            log_debug!(
                circuit_breaker = %self.config.name,
                retry_in_ms = retry_in.as_millis(),
                "Circuit breaker rejected call"
            );
            Failure::circuit_open(&self.config.name, retry_in)
        })
    }

    /// Await an admitted call and record its outcome.
    ///
    /// A call dropped before it settles, such as one cut off by a timeout,
    /// is recorded as a failure.
    pub async fn observe<Fut, T, E>(&self, call: Fut) -> FailureResult<T>
    where
        Fut: Future<Output = Result<T, E>>,
        E: Into<Failure>,
    {
        let mut pending = PendingCall {
            breaker: self,
            settled: false,
        };
        let outcome = call.await;
        pending.settled = true;

        match outcome {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(error) => {
                self.record_failure();
                Err(error.into())
            }
        }
    }

    /// Whether a call would be let through right now. Moves Open to HalfOpen
    /// once the recovery timeout has elapsed.
    pub fn should_allow_request(&self) -> bool {
        !self.config.enabled || self.admit().is_ok()
    }

    /// `Err(remaining cooldown)` while the circuit is Open.
    fn admit(&self) -> Result<(), Duration> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_time
                    .map(|at| at.elapsed())
                    .unwrap_or(self.config.recovery_timeout);
                if elapsed >= self.config.recovery_timeout {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.success_count = 0;
                    Ok(())
                } else {
                    Err(self.config.recovery_timeout - elapsed)
                }
            }
        }
    }

    pub fn record_success(&self) {
        if !self.config.enabled {
            return;
        }
        self.successful_calls.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                inner.success_count += 1;
                if inner.success_count >= self.config.success_threshold {
                    self.transition(&mut inner, CircuitState::Closed);
                    inner.failure_count = 0;
                    inner.success_count = 0;
                    inner.last_failure_time = None;
                }
            }
            // A call admitted before the circuit opened; it does not close it.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        if !self.config.enabled {
            return;
        }
        self.failed_calls.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.lock();
        inner.last_failure_time = Some(Instant::now());
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                if inner.failure_count >= self.config.failure_threshold {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                inner.success_count = 0;
                self.transition(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    /// Force Closed with every counter zeroed.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            log_info!(
                circuit_breaker = %self.config.name,
                from = %inner.state,
                "Circuit breaker reset"
            );
        }
        *inner = BreakerState::closed();
        drop(inner);

        self.total_calls.store(0, Ordering::Relaxed);
        self.rejected_calls.store(0, Ordering::Relaxed);
        self.successful_calls.store(0, Ordering::Relaxed);
        self.failed_calls.store(0, Ordering::Relaxed);
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    pub fn success_count(&self) -> u32 {
        self.lock().success_count
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let inner = self.lock();
        CircuitBreakerStats {
            name: self.config.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            total_calls: self.total_calls.load(Ordering::Relaxed),
            rejected_calls: self.rejected_calls.load(Ordering::Relaxed),
            successful_calls: self.successful_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            time_in_state: inner.last_state_change.elapsed(),
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState) {
        let from = inner.state;
        if from == to {
            return;
        }
        inner.state = to;
        inner.last_state_change = Instant::now();

        match to {
            CircuitState::Open => log_warn!(
                circuit_breaker = %self.config.name,
                from = %from,
                failure_count = inner.failure_count,
                failure_threshold = self.config.failure_threshold,
                recovery_timeout_ms = self.config.recovery_timeout.as_millis(),
                "Circuit breaker opened"
            ),
            CircuitState::HalfOpen => log_debug!(
                circuit_breaker = %self.config.name,
                "Circuit breaker attempting recovery"
            ),
            CircuitState::Closed => log_info!(
                circuit_breaker = %self.config.name,
                "Circuit breaker recovered, returning to closed state"
            ),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Outstanding observed call. Dropping it unsettled counts as a failure.
struct PendingCall<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if !self.settled {
            log_debug!(
                circuit_breaker = %self.breaker.config.name,
                "Admitted call dropped before completion"
            );
            self.breaker.record_failure();
        }
    }
}

/// Breakers keyed by an arbitrary string: an error code, a host, an API name.
#[derive(Debug, Default)]
pub struct CircuitBreakerRegistry {
    template: CircuitBreakerConfig,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    /// New breakers copy `template`, with `name` set to their key.
    pub fn new(template: CircuitBreakerConfig) -> Self {
        Self {
            template,
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, key: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.get(key) {
            return breaker;
        }

        let mut breakers = self
            .breakers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(breakers.entry(key.to_string()).or_insert_with(|| {
            log_debug!(circuit_breaker = key, "Creating circuit breaker");
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
                name: key.to_string(),
                ..self.template.clone()
            }))
        }))
    }

    pub fn get(&self, key: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn reset_all(&self) {
        for breaker in self.snapshot() {
            breaker.reset();
        }
    }

    pub fn states(&self) -> BTreeMap<String, CircuitState> {
        self.snapshot()
            .into_iter()
            .map(|breaker| (breaker.name().to_string(), breaker.state()))
            .collect()
    }

    pub fn stats(&self) -> Vec<CircuitBreakerStats> {
        let mut stats: Vec<_> = self.snapshot().iter().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    pub fn len(&self) -> usize {
        self.breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<CircuitBreaker>> {
        self.breakers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

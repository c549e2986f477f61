//! Delay families and jitter.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Fraction of the computed delay that jitter may add or remove.
pub const JITTER_RATIO: f64 = 0.25;

/// How the delay before a retry grows with the attempt number.
///
/// `attempt` is the 1-based number of the attempt that just failed.
#[derive(Clone)]
pub enum Backoff {
    /// `initial * multiplier^(attempt - 1)`
    Exponential { multiplier: f64 },
    /// `initial * attempt`
    Linear,
    /// Always `initial`.
    Fixed,
    /// Caller-supplied delay function.
    Custom(Arc<dyn Fn(u32) -> Duration + Send + Sync>),
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Exponential { multiplier: 2.0 }
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backoff::Exponential { multiplier } => f
                .debug_struct("Exponential")
                .field("multiplier", multiplier)
                .finish(),
            Backoff::Linear => f.write_str("Linear"),
            Backoff::Fixed => f.write_str("Fixed"),
            Backoff::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Backoff {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Backoff::Custom(Arc::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backoff::Exponential { .. } => "exponential",
            Backoff::Linear => "linear",
            Backoff::Fixed => "fixed",
            Backoff::Custom(_) => "custom",
        }
    }

    /// Un-jittered delay after `attempt`, capped at `max_delay`.
    pub fn base_delay(&self, attempt: u32, initial_delay: Duration, max_delay: Duration) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self {
            Backoff::Exponential { multiplier } => {
                let factor = multiplier.powi(attempt.saturating_sub(1).min(i32::MAX as u32) as i32);
                scale(initial_delay, factor, max_delay)
            }
            Backoff::Linear => initial_delay.saturating_mul(attempt),
            Backoff::Fixed => initial_delay,
            Backoff::Custom(f) => f(attempt),
        };
        delay.min(max_delay)
    }
}

/// `delay * factor`, saturating at `ceiling` instead of overflowing.
fn scale(delay: Duration, factor: f64, ceiling: Duration) -> Duration {
    let secs = delay.as_secs_f64() * factor;
    if !secs.is_finite() || secs >= ceiling.as_secs_f64() {
        ceiling
    } else {
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Uniform jitter within ±[`JITTER_RATIO`] of `delay`, clamped to `max_delay`.
pub fn apply_jitter(delay: Duration, max_delay: Duration) -> Duration {
    let offset = (fastrand::f64() * 2.0 - 1.0) * JITTER_RATIO;
    scale(delay, 1.0 + offset, max_delay)
}

//! Pluggable recovery: named strategies, type-specific handlers and the
//! fallback.
//!
//! Async closures work directly:
//!
//! ```rust
//! use aicli_resilience::handler::{ErrorHandler, RecoveryHandler};
//! use aicli_resilience::{ErrorContext, Failure, FailureKind};
//! use serde_json::{json, Value};
//! use std::sync::Arc;
//!
//! let handler = ErrorHandler::builder().build().unwrap();
//! handler.register(
//!     FailureKind::RateLimit,
//!     |_failure: Failure, _context: Option<Arc<ErrorContext>>| async move {
//!         Ok::<_, Failure>(Some(json!({ "queued": true })))
//!     },
//!     10,
//! );
//! ```

use crate::context::ErrorContext;
use crate::taxonomy::Failure;

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Tries to recover from a failure.
///
/// `Ok(Some(value))` recovers, `Ok(None)` passes, `Err` is logged as a
/// warning and treated as a pass.
#[async_trait]
pub trait RecoveryHandler: Send + Sync {
    async fn recover(
        &self,
        failure: &Failure,
        context: Option<Arc<ErrorContext>>,
    ) -> Result<Option<Value>, Failure>;
}

#[async_trait]
impl<F, Fut> RecoveryHandler for F
where
    F: Fn(Failure, Option<Arc<ErrorContext>>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Value>, Failure>> + Send,
{
    async fn recover(
        &self,
        failure: &Failure,
        context: Option<Arc<ErrorContext>>,
    ) -> Result<Option<Value>, Failure> {
        (self)(failure.clone(), context).await
    }
}

/// Last-resort handler. Its `Ok` value always counts as recovered.
#[async_trait]
pub trait FallbackHandler: Send + Sync {
    async fn fallback(
        &self,
        failure: &Failure,
        context: Option<Arc<ErrorContext>>,
    ) -> Result<Value, Failure>;
}

#[async_trait]
impl<F, Fut> FallbackHandler for F
where
    F: Fn(Failure, Option<Arc<ErrorContext>>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, Failure>> + Send,
{
    async fn fallback(
        &self,
        failure: &Failure,
        context: Option<Arc<ErrorContext>>,
    ) -> Result<Value, Failure> {
        (self)(failure.clone(), context).await
    }
}

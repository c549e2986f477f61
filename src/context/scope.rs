//! Ambient ("current") error context.
//!
//! The current context lives in tokio task-local storage, so it stays visible
//! across every `.await` inside [`run_with_context`], including retry sleeps
//! and timeouts. Tokio does not copy task-locals into spawned tasks; use
//! [`spawn_with_context`] or [`bind_current`] to hand the context over.
//!
//! ```rust
//! use aicli_resilience::context::{current_context, run_with_context, ErrorContext};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let context = ErrorContext::default();
//! let id = context.id.clone();
//!
//! run_with_context(context, async move {
//!     tokio::time::sleep(Duration::from_millis(1)).await;
//!     assert_eq!(current_context().map(|c| c.id.clone()), Some(id));
//! })
//! .await;
//!
//! assert!(current_context().is_none());
//! # }
//! ```

use super::ErrorContext;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

tokio::task_local! {
    static CURRENT_CONTEXT: Arc<ErrorContext>;
}

/// Run `future` with `context` as the current context for its whole
/// asynchronous extent. Nested calls shadow the outer context until they
/// complete.
pub async fn run_with_context<C, F>(context: C, future: F) -> F::Output
where
    C: Into<Arc<ErrorContext>>,
    F: Future,
{
    let context = context.into();
    let span = tracing::debug_span!(
        "error_context",
        context_id = %context.id,
        correlation_id = %context.correlation_id,
        depth = context.async_context.depth,
    );
    CURRENT_CONTEXT
        .scope(context, future.instrument(span))
        .await
}

/// Synchronous counterpart of [`run_with_context`].
pub fn sync_scope<C, F, R>(context: C, f: F) -> R
where
    C: Into<Arc<ErrorContext>>,
    F: FnOnce() -> R,
{
    CURRENT_CONTEXT.sync_scope(context.into(), f)
}

/// The current context, or `None` outside any scope.
pub fn current_context() -> Option<Arc<ErrorContext>> {
    CURRENT_CONTEXT.try_with(Arc::clone).ok()
}

/// Capture the current context now and re-enter it whenever `future` is
/// polled, wherever that happens.
pub fn bind_current<F>(future: F) -> impl Future<Output = F::Output>
where
    F: Future,
{
    let captured = current_context();
    async move {
        match captured {
            Some(context) => CURRENT_CONTEXT.scope(context, future).await,
            None => future.await,
        }
    }
}

/// `tokio::spawn` that carries the current context into the new task.
pub fn spawn_with_context<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match current_context() {
        Some(context) => tokio::spawn(CURRENT_CONTEXT.scope(context, future)),
        None => tokio::spawn(future),
    }
}

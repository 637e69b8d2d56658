//! Queued units of work and the default error type they fail with.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// The boxed future produced by invoking an [`Action`].
pub type ActionFuture<E> = Pin<Box<dyn Future<Output = Result<(), E>> + Send + 'static>>;

/// A deferred, zero-argument unit of asynchronous work.
///
/// Any `FnOnce() -> impl Future<Output = Result<(), E>> + Send` that is also
/// `Send + 'static` implements this trait automatically via the blanket impl
/// below, so callers hand closures straight to
/// [`TaskQueue::enqueue`](crate::queue::TaskQueue::enqueue) and never name this
/// trait themselves. The queue stores actions as `Box<dyn Action<E>>` and
/// treats them as opaque.
pub trait Action<E>: Send + 'static {
    /// Consume the action and start its asynchronous operation.
    fn invoke(self: Box<Self>) -> ActionFuture<E>;
}

impl<T, F, E> Action<E> for T
where
    T: FnOnce() -> F + Send + 'static,
    F: Future<Output = Result<(), E>> + Send + 'static,
{
    fn invoke(self: Box<Self>) -> ActionFuture<E> {
        Box::pin((*self)())
    }
}

/// Default error type for queued actions.
///
/// The queue never produces one of these itself. It exists so callers that do
/// not have a domain error handy still get a real [`std::error::Error`] with
/// `?` conversions from I/O and boxed errors.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task failed: {0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl TaskError {
    /// Shorthand for [`TaskError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closure_invokes_through_box() {
        let action: Box<dyn Action<TaskError>> = Box::new(|| async { Ok::<(), TaskError>(()) });
        assert!(action.invoke().await.is_ok());
    }

    #[tokio::test]
    async fn invoke_propagates_error_unchanged() {
        let action: Box<dyn Action<TaskError>> =
            Box::new(|| async { Err::<(), _>(TaskError::failed("boom")) });
        match action.invoke().await {
            Err(TaskError::Failed(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn closure_body_runs_only_when_polled() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let action: Box<dyn Action<TaskError>> = Box::new(move || async move {
            flag.store(true, Ordering::SeqCst);
            Ok::<(), TaskError>(())
        });

        let fut = action.invoke();
        assert!(!ran.load(Ordering::SeqCst));
        fut.await.unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn error_display() {
        assert_eq!(TaskError::failed("nope").to_string(), "task failed: nope");

        let io = std::io::Error::other("disk gone");
        assert_eq!(TaskError::from(io).to_string(), "I/O error: disk gone");

        let boxed: Box<dyn std::error::Error + Send + Sync> = "opaque".into();
        assert_eq!(TaskError::from(boxed).to_string(), "opaque");
    }
}

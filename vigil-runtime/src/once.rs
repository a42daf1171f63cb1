//! Run a fallible operation to success at most once.
//!
//! [`ExecOnce`] wraps a blocking `Fn(T) -> Result<(), E>`, [`AsyncExecOnce`]
//! an async one. Both use the same double-checked discipline: an atomic fast
//! path that never takes the lock once the operation has succeeded, and a
//! locked slow path that re-checks before invoking the operation. Failed
//! attempts leave the instance retryable.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Blocking guarded operation, parameterized over its input `T`
pub struct ExecOnce<T, E> {
    succeeded: AtomicBool,
    guard: Mutex<()>,
    operation: Box<dyn Fn(T) -> Result<(), E> + Send + Sync>,
}

impl<T, E> ExecOnce<T, E> {
    pub fn new<F>(operation: F) -> Self
    where
        F: Fn(T) -> Result<(), E> + Send + Sync + 'static,
    {
        Self {
            succeeded: AtomicBool::new(false),
            guard: Mutex::new(()),
            operation: Box::new(operation),
        }
    }

    /// Run the operation with `param` unless it already succeeded.
    ///
    /// Returns the operation's error on failure; the next call will try again.
    /// Attempts never overlap.
    pub fn exec(&self, param: T) -> Result<(), E> {
        // false -> true only, a stale read just sends us to the slow path
        if self.succeeded.load(Ordering::Acquire) {
            return Ok(());
        }

        // A panicking operation poisons the lock but `succeeded` is still false
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);

        if self.succeeded.load(Ordering::Acquire) {
            return Ok(());
        }

        (self.operation)(param)?;
        self.succeeded.store(true, Ordering::Release);

        Ok(())
    }

    pub fn has_succeeded(&self) -> bool {
        self.succeeded.load(Ordering::Acquire)
    }
}

impl<T, E> std::fmt::Debug for ExecOnce<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecOnce")
            .field("succeeded", &self.has_succeeded())
            .finish_non_exhaustive()
    }
}

/// Wrap `operation` in a fresh [`ExecOnce`] shared by every call of the
/// returned closure.
///
/// Useful for setup code reached from many places: whichever caller gets
/// there first does the work, the rest see `Ok(())`.
pub fn exec_once_wrap<T, E, F>(operation: F) -> impl Fn(T) -> Result<(), E> + Send + Sync
where
    F: Fn(T) -> Result<(), E> + Send + Sync + 'static,
{
    let once = ExecOnce::new(operation);
    move |param| once.exec(param)
}

type BoxFuture<E> = std::pin::Pin<Box<dyn Future<Output = Result<(), E>> + Send>>;

/// Async counterpart of [`ExecOnce`]; attempts are serialised by a tokio mutex
pub struct AsyncExecOnce<T, E> {
    succeeded: AtomicBool,
    guard: tokio::sync::Mutex<()>,
    operation: Box<dyn Fn(T) -> BoxFuture<E> + Send + Sync>,
}

impl<T, E> AsyncExecOnce<T, E> {
    pub fn new<F, Fut>(operation: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        Self {
            succeeded: AtomicBool::new(false),
            guard: tokio::sync::Mutex::new(()),
            operation: Box::new(move |param| -> BoxFuture<E> { Box::pin(operation(param)) }),
        }
    }

    pub async fn exec(&self, param: T) -> Result<(), E> {
        if self.succeeded.load(Ordering::Acquire) {
            return Ok(());
        }

        let _guard = self.guard.lock().await;

        if self.succeeded.load(Ordering::Acquire) {
            return Ok(());
        }

        (self.operation)(param).await?;
        self.succeeded.store(true, Ordering::Release);

        Ok(())
    }

    pub fn has_succeeded(&self) -> bool {
        self.succeeded.load(Ordering::Acquire)
    }
}

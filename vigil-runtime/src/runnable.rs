use std::future::Future;
use std::pin::Pin;

/// Trait for tasks driven by a [`Daemon`](crate::Daemon)
///
/// Any `Fn() -> impl Future<Output = ()>` closure implements it, so most
/// callers never name this trait. Implement it directly when the task owns
/// state it wants to borrow across runs.
///
/// # Example
///
/// ```rust
/// use vigil_runtime::Runnable;
/// use std::pin::Pin;
/// use std::future::Future;
///
/// struct Sweeper {
///     name: String,
/// }
///
/// impl Runnable for Sweeper {
///     fn run(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
///         Box::pin(async move {
///             println!("sweeper {} is running", self.name);
///         })
///     }
/// }
/// ```
pub trait Runnable: Send + Sync {
    /// Execute one run of the task. Errors are the task's own business.
    fn run(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

impl<F, Fut> Runnable for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn run(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self())
    }
}

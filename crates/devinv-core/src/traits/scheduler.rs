// # Scheduler Trait
//
// The inventory does not own a timer. It hands its refresh cycle to a
// scheduler that runs it periodically on one worker at a time.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Future returned by a scheduled task invocation
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A periodic job: called once per tick, the returned future is awaited
/// before the next delay starts
pub type PeriodicTask = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Handle to a scheduled periodic job
pub trait ScheduledTask: Send + Sync {
    /// Stop scheduling new runs
    ///
    /// A run that is already executing is allowed to complete.
    fn cancel(&self);

    /// Whether `cancel()` has been called
    fn is_cancelled(&self) -> bool;
}

/// Trait for scheduler implementations
///
/// Implementations must use fixed-delay semantics: the next run starts
/// `period` after the previous run finished, so runs never overlap.
pub trait Scheduler: Send + Sync {
    /// Schedule `task` to run after `initial_delay`, then repeatedly with
    /// `period` between the end of one run and the start of the next
    fn schedule_with_fixed_delay(
        &self,
        task: PeriodicTask,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<Box<dyn ScheduledTask>, crate::Error>;
}

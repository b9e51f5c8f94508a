// # Tokio Scheduler
//
// Fixed-delay scheduler backed by one Tokio task per schedule.
//
// ## Semantics
//
// - Waits `initial_delay`, then runs the task, awaits it to completion,
//   waits `period`, and repeats. Runs of one schedule never overlap.
// - Cancellation is observed before each run and during every wait. A run
//   that already started is never interrupted.
// - Dropping the returned `ScheduledTask` cancels the schedule as well.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::{PeriodicTask, ScheduledTask, Scheduler};

/// Scheduler that runs periodic tasks on a Tokio runtime
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    runtime: Option<Handle>,
}

impl TokioScheduler {
    /// Create a scheduler that spawns onto the runtime current at schedule time
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scheduler bound to an explicit runtime
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
        }
    }

    fn runtime(&self) -> Result<Handle> {
        match &self.runtime {
            Some(handle) => Ok(handle.clone()),
            None => Handle::try_current()
                .map_err(|e| Error::scheduler(format!("No Tokio runtime available: {}", e))),
        }
    }
}

/// Handle to a schedule created by [`TokioScheduler`]
#[derive(Debug)]
pub struct TokioScheduledTask {
    cancel_tx: watch::Sender<bool>,
}

impl ScheduledTask for TokioScheduledTask {
    fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }
}

/// Sleep for `delay` unless cancelled first
///
/// Returns `true` if the schedule was cancelled (or its handle dropped).
async fn wait_or_cancel(cancel_rx: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    if *cancel_rx.borrow() {
        return true;
    }

    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = cancel_rx.wait_for(|cancelled| *cancelled) => return true,
    }

    *cancel_rx.borrow()
}

impl Scheduler for TokioScheduler {
    fn schedule_with_fixed_delay(
        &self,
        task: PeriodicTask,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<Box<dyn ScheduledTask>> {
        if period.is_zero() {
            return Err(Error::scheduler("Period must be > 0"));
        }

        let runtime = self.runtime()?;
        let (cancel_tx, mut cancel_rx) = watch::channel(false);

        runtime.spawn(async move {
            if wait_or_cancel(&mut cancel_rx, initial_delay).await {
                debug!("Schedule cancelled before first run");
                return;
            }

            loop {
                task().await;

                if wait_or_cancel(&mut cancel_rx, period).await {
                    break;
                }
            }

            debug!("Schedule cancelled");
        });

        Ok(Box::new(TokioScheduledTask { cancel_tx }))
    }
}

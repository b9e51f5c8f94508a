// # Scheduler Implementations
//
// This module provides implementations of the Scheduler trait.

pub mod fixed_delay;

pub use fixed_delay::{TokioScheduler, TokioScheduledTask};

//! Recurring-task scheduler.
//!
//! This module provides the loop that fires registered tasks when their
//! timers come due, plus the handle used to control it.

mod engine;
mod handle;
mod types;

pub use engine::Scheduler;
pub use handle::SchedulerHandle;
pub use types::{OverlapPolicy, SchedulerError, SchedulerState, TaskStatus};

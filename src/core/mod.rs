//! Core abstractions: timers, tasks and identifiers.

pub mod task;
pub mod timer;
pub mod types;

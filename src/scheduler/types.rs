//! Scheduler type definitions.
//!
//! Error types, state enums and command types for the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::core::types::FireId;

/// Errors that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No task registered under this name.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// A task with this name is already registered.
    #[error("task already registered: {0}")]
    DuplicateTask(String),

    /// The task is still running and overlap is not allowed.
    #[error("task already running: {0}")]
    AlreadyRunning(String),

    /// Channel error.
    #[error("channel error: {0}")]
    ChannelError(String),
}

/// State of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// Scheduler is stopped.
    Stopped,
    /// Scheduler is running.
    Running,
    /// Scheduler is paused.
    Paused,
}

/// What to do when a task's timer fires while its previous fire is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapPolicy {
    /// Drop the new fire and emit `FireSkipped`.
    #[default]
    Skip,
    /// Run both fires concurrently.
    Allow,
}

/// Point-in-time view of one registered task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatus {
    pub name: String,
    pub timer: String,
    pub next_fire: Option<DateTime<Utc>>,
    pub in_flight: usize,
}

/// Commands that can be sent to the scheduler.
pub(crate) enum SchedulerCommand {
    /// Fire a task now.
    Trigger {
        task: String,
        response: oneshot::Sender<Result<FireId, SchedulerError>>,
    },
    /// List registered tasks.
    Tasks {
        response: oneshot::Sender<Vec<TaskStatus>>,
    },
    /// Pause the scheduler.
    Pause { response: oneshot::Sender<()> },
    /// Resume the scheduler.
    Resume { response: oneshot::Sender<()> },
    /// Shutdown the scheduler.
    Shutdown { response: oneshot::Sender<()> },
}

//! Task trait and error types.
//!
//! A `Task` is a named unit of work the scheduler invokes once per timer
//! fire. Implement this trait to add a recurring duty to the sidecar.

use async_trait::async_trait;
use thiserror::Error;

/// Errors a task can report back to the scheduler.
///
/// The scheduler logs these and keeps the task registered; returning an
/// error never stops future fires.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Task execution failed with a message.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// Generic error wrapper.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// The core trait for recurring duties.
///
/// # Example
///
/// ```ignore
/// use ringside::{Task, TaskError};
/// use async_trait::async_trait;
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Task for Heartbeat {
///     fn name(&self) -> &str {
///         "heartbeat"
///     }
///
///     async fn execute(&self) -> Result<(), TaskError> {
///         tracing::info!("still here");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync {
    /// Stable identifier used for registration and logging.
    fn name(&self) -> &str;

    /// Run one fire of the task.
    ///
    /// Implementations should absorb their own transient failures. An `Err`
    /// is logged by the scheduler and does not deregister the task.
    async fn execute(&self) -> Result<(), TaskError>;

    /// Optional description for display/logging purposes.
    fn description(&self) -> Option<&str> {
        None
    }
}

//! Cloneable control surface for a running scheduler.

use std::sync::Arc;

use tokio::sync::{RwLock, mpsc, oneshot};

use crate::core::types::FireId;

use super::types::{SchedulerCommand, SchedulerError, SchedulerState, TaskStatus};

/// Buffer size for the command channel between SchedulerHandle and Scheduler.
pub(crate) const COMMAND_CHANNEL_BUFFER: usize = 32;

/// Handle for controlling the scheduler.
///
/// Every command is a request/reply over the scheduler's command channel.
/// Once the loop has exited, commands fail with `ChannelError`; `state()`
/// keeps working because it reads shared state directly.
#[derive(Clone)]
pub struct SchedulerHandle {
    pub(crate) command_tx: mpsc::Sender<SchedulerCommand>,
    pub(crate) state: Arc<RwLock<SchedulerState>>,
}

impl SchedulerHandle {
    async fn request<R>(
        &self,
        operation: &'static str,
        command: impl FnOnce(oneshot::Sender<R>) -> SchedulerCommand,
    ) -> Result<R, SchedulerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.command_tx.send(command(reply_tx)).await.is_err() {
            return Err(SchedulerError::ChannelError(format!(
                "scheduler loop has stopped, cannot {operation}"
            )));
        }
        reply_rx.await.map_err(|_| {
            SchedulerError::ChannelError(format!("scheduler loop dropped the {operation} reply"))
        })
    }

    /// Fire a task now, outside its timer.
    ///
    /// Works while paused. With `OverlapPolicy::Skip` a task that is still
    /// running yields `AlreadyRunning`.
    pub async fn trigger(&self, task: impl Into<String>) -> Result<FireId, SchedulerError> {
        let task = task.into();
        self.request("trigger", |response| SchedulerCommand::Trigger { task, response })
            .await?
    }

    /// Registered tasks with their next fire times.
    pub async fn tasks(&self) -> Result<Vec<TaskStatus>, SchedulerError> {
        self.request("list tasks", |response| SchedulerCommand::Tasks { response })
            .await
    }

    /// Stop dispatching fires. Timers keep advancing.
    pub async fn pause(&self) -> Result<(), SchedulerError> {
        self.request("pause", |response| SchedulerCommand::Pause { response })
            .await
    }

    pub async fn resume(&self) -> Result<(), SchedulerError> {
        self.request("resume", |response| SchedulerCommand::Resume { response })
            .await
    }

    /// Stop the loop, waiting for in-flight fires up to the shutdown timeout.
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.request("shut down", |response| SchedulerCommand::Shutdown { response })
            .await
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    pub async fn is_running(&self) -> bool {
        self.state().await == SchedulerState::Running
    }

    pub async fn is_paused(&self) -> bool {
        self.state().await == SchedulerState::Paused
    }
}

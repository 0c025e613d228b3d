//! Liveness monitoring for the managed data-store process.
//!
//! [`HealthMonitor`] is a [`Task`] that probes for the process on every fire
//! and publishes the result through a shared [`HealthState`]. Any number of
//! readers may hold a clone of the state; only the monitor writes it.

mod probe;

pub use probe::{CommandProbe, ProbeError, ProcessProbe};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::core::task::{Task, TaskError};
use crate::core::timer::{Timer, TimerError};

/// Shared "is the managed process running" flag.
///
/// Cloning hands out another view of the same cell. Starts as not running.
#[derive(Debug, Clone, Default)]
pub struct HealthState {
    running: Arc<AtomicBool>,
}

impl HealthState {
    /// Create a new state in the not-running position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last probe found the process.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Force the flag to running.
    ///
    /// For test harnesses that need a healthy node without a real process.
    pub fn force_running(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Move to `running`, returning true if the value changed.
    fn transition(&self, running: bool) -> bool {
        self.running
            .compare_exchange(!running, running, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Task that polls process liveness and updates [`HealthState`].
pub struct HealthMonitor {
    name: String,
    pattern: String,
    probe: Arc<dyn ProcessProbe>,
    state: HealthState,
}

impl HealthMonitor {
    /// Task name used when none is given.
    pub const NAME: &'static str = "process-monitor";

    /// Default polling interval.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

    /// Create a monitor for processes matching `pattern`.
    pub fn new(pattern: impl Into<String>, probe: Arc<dyn ProcessProbe>, state: HealthState) -> Self {
        Self {
            name: Self::NAME.to_string(),
            pattern: pattern.into(),
            probe,
            state,
        }
    }

    /// Override the task name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The default timer: every 10 seconds, starting immediately.
    pub fn default_timer() -> Result<Timer, TimerError> {
        Timer::interval(Self::DEFAULT_INTERVAL)
    }

    /// The process pattern being probed.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// A reader for the published state.
    pub fn state(&self) -> HealthState {
        self.state.clone()
    }

    /// Probe once and publish the result.
    pub async fn check(&self) -> bool {
        let running = match self.probe.list(&self.pattern).await {
            Ok(output) => probe::first_line(&output).is_some(),
            Err(e) => {
                tracing::warn!(
                    pattern = %self.pattern,
                    error = %e,
                    "Process probe failed, marking process as not running"
                );
                false
            }
        };

        if self.state.transition(running) {
            if running {
                tracing::info!(pattern = %self.pattern, "Managed process is running");
            } else {
                tracing::info!(pattern = %self.pattern, "Managed process is not running");
            }
        }

        running
    }
}

#[async_trait]
impl Task for HealthMonitor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<(), TaskError> {
        self.check().await;
        Ok(())
    }

    fn description(&self) -> Option<&str> {
        Some("polls local process liveness")
    }
}

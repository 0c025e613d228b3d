//! Scheduler engine implementation.
//!
//! The scheduler is responsible for:
//! - Firing registered tasks when their timers come due
//! - Manual fires through the handle
//! - Pause and resume
//! - Keeping one failing or panicking task from affecting the rest
//! - Event emission

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, mpsc};
use tokio::task::{JoinError, JoinHandle};

use crate::core::task::Task;
use crate::core::timer::Timer;
use crate::core::types::FireId;
use crate::events::{Event, EventBus, FireSource};

use super::handle::{COMMAND_CHANNEL_BUFFER, SchedulerHandle};
use super::types::{OverlapPolicy, SchedulerCommand, SchedulerError, SchedulerState, TaskStatus};

struct Registration {
    task: Arc<dyn Task>,
    timer: Timer,
    next_fire: Option<DateTime<Utc>>,
}

const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

type RunningFires = Arc<RwLock<HashMap<FireId, (String, JoinHandle<()>)>>>;

/// Recurring-task scheduler.
///
/// Each fire runs on its own Tokio task, so registered tasks run
/// concurrently with each other. A task returning an error or panicking is
/// logged, reported as `TaskFailed`, and keeps its timer.
pub struct Scheduler {
    /// Registered tasks by name.
    tasks: BTreeMap<String, Registration>,
    /// Event bus for emitting events.
    event_bus: Arc<EventBus>,
    /// Same-task overlap handling.
    overlap: OverlapPolicy,
    /// How often due timers are checked.
    tick_interval: Duration,
    /// In-flight fires.
    running: RunningFires,
    /// Graceful shutdown timeout (default: 30 seconds).
    shutdown_timeout: Duration,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
            event_bus: Arc::new(EventBus::new()),
            overlap: OverlapPolicy::default(),
            tick_interval: Duration::from_millis(250),
            running: Arc::new(RwLock::new(HashMap::new())),
            shutdown_timeout: Duration::from_secs(30),
        }
    }

    /// Set the event bus.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Arc::new(event_bus);
        self
    }

    /// Set the same-task overlap policy.
    pub fn with_overlap_policy(mut self, policy: OverlapPolicy) -> Self {
        self.overlap = policy;
        self
    }

    /// Set the tick interval. Values below 1ms are raised to 1ms.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(MIN_TICK_INTERVAL);
        self
    }

    /// Set the graceful shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Register a task to fire on `timer`.
    pub fn register(&mut self, task: Arc<dyn Task>, timer: Timer) -> Result<(), SchedulerError> {
        let name = task.name().to_string();
        if self.tasks.contains_key(&name) {
            return Err(SchedulerError::DuplicateTask(name));
        }
        tracing::info!(task = %name, timer = %timer, "Registered task");
        self.tasks.insert(
            name,
            Registration {
                task,
                timer,
                next_fire: None,
            },
        );
        Ok(())
    }

    /// Names of registered tasks, sorted.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(String::as_str)
    }

    /// Get the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Start the scheduler and return a handle for controlling it.
    ///
    /// Interval timers fire on the first tick; cron timers at their next
    /// matching instant.
    pub fn start(mut self) -> (SchedulerHandle, JoinHandle<()>) {
        let now = Utc::now();
        for registration in self.tasks.values_mut() {
            registration.next_fire = registration.timer.first_fire(now);
        }

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
        let state = Arc::new(RwLock::new(SchedulerState::Running));

        let handle = SchedulerHandle {
            command_tx,
            state: Arc::clone(&state),
        };

        tracing::info!(tasks = self.tasks.len(), overlap = ?self.overlap, "Scheduler started");
        let scheduler_task = tokio::spawn(async move {
            self.run(command_rx, state).await;
        });

        (handle, scheduler_task)
    }

    async fn run(
        mut self,
        mut command_rx: mpsc::Receiver<SchedulerCommand>,
        state: Arc<RwLock<SchedulerState>>,
    ) {
        let mut interval = tokio::time::interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let due = self.advance_due(Utc::now());
                    let current_state = *state.read().await;
                    for name in due {
                        if current_state != SchedulerState::Running {
                            tracing::debug!(task = %name, "Scheduler paused, fire not dispatched");
                            continue;
                        }
                        if let Err(e) = self.dispatch(&name, FireSource::Timer).await {
                            tracing::debug!(task = %name, error = %e, "Timer fire not dispatched");
                        }
                    }

                    self.cleanup_finished().await;
                }

                Some(command) = command_rx.recv() => {
                    match command {
                        SchedulerCommand::Trigger { task, response } => {
                            let result = self.dispatch(&task, FireSource::Manual).await;
                            let _ = response.send(result);
                        }
                        SchedulerCommand::Tasks { response } => {
                            let _ = response.send(self.statuses().await);
                        }
                        SchedulerCommand::Pause { response } => {
                            *state.write().await = SchedulerState::Paused;
                            tracing::info!("Scheduler paused");
                            let _ = response.send(());
                        }
                        SchedulerCommand::Resume { response } => {
                            *state.write().await = SchedulerState::Running;
                            tracing::info!("Scheduler resumed");
                            let _ = response.send(());
                        }
                        SchedulerCommand::Shutdown { response } => {
                            let mut s = state.write().await;
                            *s = SchedulerState::Stopped;
                            drop(s);

                            self.await_running().await;

                            let _ = response.send(());
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Collect tasks due at `now` and move their timers past `now`.
    ///
    /// Fires missed while the loop was busy collapse into one.
    fn advance_due(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut due = Vec::new();
        for (name, registration) in self.tasks.iter_mut() {
            let Some(scheduled) = registration.next_fire else {
                continue;
            };
            if scheduled > now {
                continue;
            }
            due.push(name.clone());

            let mut next = registration.timer.next_after(scheduled);
            let mut missed = 0u32;
            while let Some(at) = next {
                if at > now {
                    break;
                }
                missed += 1;
                next = registration.timer.next_after(at);
            }
            if missed > 0 {
                tracing::debug!(task = %name, missed, "Coalesced missed fires");
            }
            registration.next_fire = next;
        }
        due
    }

    async fn dispatch(&self, name: &str, source: FireSource) -> Result<FireId, SchedulerError> {
        let registration = self
            .tasks
            .get(name)
            .ok_or_else(|| SchedulerError::TaskNotFound(name.to_string()))?;

        if self.overlap == OverlapPolicy::Skip && self.in_flight(name).await > 0 {
            if source == FireSource::Timer {
                tracing::warn!(task = %name, "Previous fire still running, skipping");
                self.event_bus.emit(Event::fire_skipped(name)).await;
            }
            return Err(SchedulerError::AlreadyRunning(name.to_string()));
        }

        let fire_id = FireId::new();
        tracing::debug!(task = %name, fire_id = %fire_id, source = ?source, "Dispatching fire");
        self.event_bus
            .emit(Event::task_fired(name, fire_id, source))
            .await;

        let task = Arc::clone(&registration.task);
        let event_bus = Arc::clone(&self.event_bus);
        let task_name = name.to_string();

        let handle = tokio::spawn(async move {
            let start = Instant::now();
            // Inner spawn so a panic surfaces as a JoinError instead of
            // unwinding through this bookkeeping.
            let execution = tokio::spawn(async move { task.execute().await });

            let event = match execution.await {
                Ok(Ok(())) => {
                    tracing::debug!(task = %task_name, fire_id = %fire_id, "Task completed");
                    Event::task_completed(task_name.as_str(), fire_id, start.elapsed())
                }
                Ok(Err(e)) => {
                    tracing::warn!(task = %task_name, fire_id = %fire_id, error = %e, "Task failed");
                    Event::task_failed(task_name.as_str(), fire_id, e.to_string())
                }
                Err(e) => {
                    let message = join_error_message(e);
                    tracing::warn!(task = %task_name, fire_id = %fire_id, error = %message, "Task aborted");
                    Event::task_failed(task_name.as_str(), fire_id, message)
                }
            };
            event_bus.emit(event).await;
        });

        self.running
            .write()
            .await
            .insert(fire_id, (name.to_string(), handle));

        Ok(fire_id)
    }

    /// Number of unfinished fires of `name`.
    async fn in_flight(&self, name: &str) -> usize {
        let running = self.running.read().await;
        running
            .values()
            .filter(|(task, handle)| task == name && !handle.is_finished())
            .count()
    }

    async fn statuses(&self) -> Vec<TaskStatus> {
        let running = self.running.read().await;
        self.tasks
            .iter()
            .map(|(name, registration)| TaskStatus {
                name: name.clone(),
                timer: registration.timer.to_string(),
                next_fire: registration.next_fire,
                in_flight: running
                    .values()
                    .filter(|(task, handle)| task == name && !handle.is_finished())
                    .count(),
            })
            .collect()
    }

    /// Clean up finished fire handles.
    async fn cleanup_finished(&self) {
        let mut running = self.running.write().await;
        running.retain(|_, (_, handle)| !handle.is_finished());
    }

    /// Wait for all in-flight fires to complete with a timeout.
    async fn await_running(&self) {
        let running_count = self.running.read().await.len();

        if running_count == 0 {
            tracing::info!("No running tasks to wait for during shutdown");
            return;
        }

        tracing::info!(
            "Graceful shutdown: waiting for {} running fire(s) to complete (timeout: {:?})",
            running_count,
            self.shutdown_timeout
        );

        let start = tokio::time::Instant::now();
        let deadline = start + self.shutdown_timeout;

        loop {
            let mut running = self.running.write().await;
            running.retain(|_, (_, handle)| !handle.is_finished());
            let remaining = running.len();
            drop(running);

            if remaining == 0 {
                tracing::info!("All running fires completed gracefully in {:?}", start.elapsed());
                break;
            }

            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    "Graceful shutdown timeout ({:?}) exceeded with {} fire(s) still running",
                    self.shutdown_timeout,
                    remaining
                );
                break;
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

//! Test doubles for code built on ringside.
//!
//! - [`ScriptedProbe`]: a process probe that replays canned listings
//! - [`RecordingHandler`]: an event handler that keeps every event
//! - [`CountingTask`]: a task that counts fires and can fail, panic or stall

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::core::task::{Task, TaskError};
use crate::events::{Event, EventHandler};
use crate::health::{ProbeError, ProcessProbe};

#[derive(Debug, Clone)]
enum ProbeResponse {
    Output(String),
    Failure(String),
}

/// A probe that replays scripted responses.
///
/// Responses are consumed in order; the last one repeats once the script
/// runs out. An empty script always answers with empty output.
///
/// # Example
///
/// ```
/// use ringside::testing::ScriptedProbe;
///
/// // Running on the first check, gone on the second and after
/// let probe = ScriptedProbe::new().output("4242\n").output("");
/// ```
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<ProbeResponse>>,
    patterns: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listing.
    pub fn output(self, output: impl Into<String>) -> Self {
        self.push(ProbeResponse::Output(output.into()));
        self
    }

    /// Append a launch failure.
    pub fn failure(self, message: impl Into<String>) -> Self {
        self.push(ProbeResponse::Failure(message.into()));
        self
    }

    /// Patterns the probe was asked about, in call order.
    pub fn patterns(&self) -> Vec<String> {
        self.patterns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn push(&self, response: ProbeResponse) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    fn next_response(&self) -> Option<ProbeResponse> {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

#[async_trait]
impl ProcessProbe for ScriptedProbe {
    async fn list(&self, pattern: &str) -> Result<String, ProbeError> {
        self.patterns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pattern.to_string());

        match self.next_response() {
            None => Ok(String::new()),
            Some(ProbeResponse::Output(output)) => Ok(output),
            Some(ProbeResponse::Failure(message)) => Err(ProbeError::Launch {
                program: "scripted".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, message),
            }),
        }
    }
}

/// Event handler that records every event it sees.
#[derive(Default)]
pub struct RecordingHandler {
    events: tokio::sync::Mutex<Vec<Event>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the events seen so far.
    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }

    /// Number of recorded events matching `predicate`.
    pub async fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().await.iter().filter(|e| predicate(e)).count()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) {
        self.events.lock().await.push(event.clone());
    }
}

#[derive(Debug, Clone)]
enum Outcome {
    Succeed,
    Fail(String),
    Panic,
}

/// A task that counts its executions.
///
/// ```
/// use ringside::testing::CountingTask;
/// use std::time::Duration;
///
/// let slow = CountingTask::new("slow").with_delay(Duration::from_millis(200));
/// let broken = CountingTask::new("broken").failing("disk full");
/// assert_eq!(slow.calls(), 0);
/// ```
pub struct CountingTask {
    name: String,
    outcome: Outcome,
    delay: Option<Duration>,
    calls: AtomicU32,
    running: AtomicU32,
    max_running: AtomicU32,
}

impl CountingTask {
    /// A task that succeeds immediately.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcome: Outcome::Succeed,
            delay: None,
            calls: AtomicU32::new(0),
            running: AtomicU32::new(0),
            max_running: AtomicU32::new(0),
        }
    }

    /// Return `ExecutionFailed(message)` from every fire.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.outcome = Outcome::Fail(message.into());
        self
    }

    /// Panic on every fire.
    pub fn panicking(mut self) -> Self {
        self.outcome = Outcome::Panic;
        self
    }

    /// Sleep for `delay` before finishing each fire.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fires started so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of fires that were in flight at once.
    pub fn max_concurrent(&self) -> u32 {
        self.max_running.load(Ordering::SeqCst)
    }

    /// Poll until at least `calls` fires have started or `timeout` passes.
    pub async fn wait_for_calls(&self, calls: u32, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.calls() < calls {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }
}

struct RunningGuard<'a>(&'a AtomicU32);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Task for CountingTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self) -> Result<(), TaskError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now_running, Ordering::SeqCst);
        let _guard = RunningGuard(&self.running);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.outcome {
            Outcome::Succeed => Ok(()),
            Outcome::Fail(message) => Err(TaskError::ExecutionFailed(message.clone())),
            Outcome::Panic => panic!("task '{}' panicked", self.name),
        }
    }
}

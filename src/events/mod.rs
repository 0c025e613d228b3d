//! Scheduler lifecycle events.
//!
//! The scheduler emits an [`Event`] for every fire, completion, failure and
//! skipped fire. Handlers registered on the [`EventBus`] receive them in
//! emission order.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::core::types::FireId;

/// What caused a fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireSource {
    /// The task's timer came due.
    Timer,
    /// An explicit trigger through the scheduler handle.
    Manual,
}

/// Lifecycle events emitted by the scheduler.
#[derive(Debug, Clone)]
pub enum Event {
    /// A fire was dispatched.
    TaskFired {
        task: String,
        fire_id: FireId,
        source: FireSource,
        timestamp: Instant,
    },

    /// A fire finished without error.
    TaskCompleted {
        task: String,
        fire_id: FireId,
        duration: Duration,
        timestamp: Instant,
    },

    /// A fire returned an error or panicked.
    TaskFailed {
        task: String,
        fire_id: FireId,
        error: String,
        timestamp: Instant,
    },

    /// A timer fire was dropped because the previous one was still running.
    FireSkipped { task: String, timestamp: Instant },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::TaskFired { timestamp, .. } => *timestamp,
            Event::TaskCompleted { timestamp, .. } => *timestamp,
            Event::TaskFailed { timestamp, .. } => *timestamp,
            Event::FireSkipped { timestamp, .. } => *timestamp,
        }
    }

    /// Name of the task the event is about.
    pub fn task(&self) -> &str {
        match self {
            Event::TaskFired { task, .. }
            | Event::TaskCompleted { task, .. }
            | Event::TaskFailed { task, .. }
            | Event::FireSkipped { task, .. } => task,
        }
    }

    pub fn task_fired(task: impl Into<String>, fire_id: FireId, source: FireSource) -> Self {
        Event::TaskFired {
            task: task.into(),
            fire_id,
            source,
            timestamp: Instant::now(),
        }
    }

    pub fn task_completed(task: impl Into<String>, fire_id: FireId, duration: Duration) -> Self {
        Event::TaskCompleted {
            task: task.into(),
            fire_id,
            duration,
            timestamp: Instant::now(),
        }
    }

    pub fn task_failed(task: impl Into<String>, fire_id: FireId, error: impl Into<String>) -> Self {
        Event::TaskFailed {
            task: task.into(),
            fire_id,
            error: error.into(),
            timestamp: Instant::now(),
        }
    }

    pub fn fire_skipped(task: impl Into<String>) -> Self {
        Event::FireSkipped {
            task: task.into(),
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

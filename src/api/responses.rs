//! API response types.

use serde::Serialize;

use crate::scheduler::{SchedulerState, TaskStatus};

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Managed process liveness.
#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub process_name: String,
    pub running: bool,
}

/// Ring membership summary.
#[derive(Debug, Serialize)]
pub struct RingResponse {
    pub ring_name: String,
    pub members: Vec<String>,
    pub member_count: usize,
    pub capacity: u32,
    pub zone_count: usize,
}

/// CIDRs allowed on one port range.
#[derive(Debug, Serialize)]
pub struct AclResponse {
    pub from_port: u16,
    pub to_port: u16,
    pub cidrs: Vec<String>,
}

/// Scheduler state response.
#[derive(Debug, Serialize)]
pub struct SchedulerStateResponse {
    pub state: SchedulerState,
    pub is_running: bool,
    pub is_paused: bool,
}

impl From<SchedulerState> for SchedulerStateResponse {
    fn from(state: SchedulerState) -> Self {
        Self {
            state,
            is_running: state == SchedulerState::Running,
            is_paused: state == SchedulerState::Paused,
        }
    }
}

/// Registered tasks.
#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskStatus>,
    pub count: usize,
}

/// Manual trigger response.
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub task: String,
    pub fire_id: String,
    pub message: String,
}

/// Generic message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

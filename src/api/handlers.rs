//! API request handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::health::HealthState;
use crate::membership::MembershipCoordinator;
use crate::scheduler::SchedulerHandle;

use super::errors::ApiError;
use super::responses::{
    AclResponse, HealthResponse, MessageResponse, ProcessResponse, RingResponse,
    SchedulerStateResponse, TaskListResponse, TriggerResponse,
};

/// Shared application state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub handle: SchedulerHandle,
    pub health: HealthState,
    pub coordinator: Arc<MembershipCoordinator>,
    pub process_name: Arc<str>,
}

/// Query parameters for the ACL endpoint.
#[derive(Debug, Deserialize)]
pub struct AclQuery {
    pub from_port: u16,
    pub to_port: u16,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Managed process liveness as last observed by the monitor.
pub async fn process_status(State(state): State<ApiState>) -> Json<ProcessResponse> {
    Json(ProcessResponse {
        process_name: state.process_name.to_string(),
        running: state.health.is_running(),
    })
}

/// Live ring membership against capacity.
pub async fn ring_status(State(state): State<ApiState>) -> Result<Json<RingResponse>, ApiError> {
    let snapshot = state.coordinator.snapshot().await?;
    Ok(Json(RingResponse {
        ring_name: state.coordinator.settings().ring_name.clone(),
        member_count: snapshot.member_count(),
        members: snapshot.members,
        capacity: snapshot.capacity,
        zone_count: state.coordinator.zone_count(),
    }))
}

/// CIDRs allowed on a port range.
pub async fn list_acl(
    State(state): State<ApiState>,
    Query(query): Query<AclQuery>,
) -> Result<Json<AclResponse>, ApiError> {
    if query.from_port > query.to_port {
        return Err(ApiError::BadRequest(format!(
            "from_port {} is greater than to_port {}",
            query.from_port, query.to_port
        )));
    }
    let cidrs = state
        .coordinator
        .list_ingress(query.from_port, query.to_port)
        .await?;
    Ok(Json(AclResponse {
        from_port: query.from_port,
        to_port: query.to_port,
        cidrs: cidrs.into_iter().collect(),
    }))
}

/// Get scheduler state.
pub async fn get_scheduler_state(State(state): State<ApiState>) -> Json<SchedulerStateResponse> {
    let scheduler_state = state.handle.state().await;
    Json(SchedulerStateResponse::from(scheduler_state))
}

/// Pause the scheduler.
pub async fn pause_scheduler(
    State(state): State<ApiState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.handle.pause().await?;
    Ok(Json(MessageResponse {
        message: "scheduler paused".to_string(),
    }))
}

/// Resume the scheduler.
pub async fn resume_scheduler(
    State(state): State<ApiState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.handle.resume().await?;
    Ok(Json(MessageResponse {
        message: "scheduler resumed".to_string(),
    }))
}

/// List registered tasks.
pub async fn list_tasks(State(state): State<ApiState>) -> Result<Json<TaskListResponse>, ApiError> {
    let tasks = state.handle.tasks().await?;
    let count = tasks.len();
    Ok(Json(TaskListResponse { tasks, count }))
}

/// Fire a task now.
pub async fn trigger_task(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> Result<Json<TriggerResponse>, ApiError> {
    let fire_id = state.handle.trigger(name.as_str()).await?;
    Ok(Json(TriggerResponse {
        fire_id: fire_id.to_string(),
        message: format!("task '{}' triggered", name),
        task: name,
    }))
}

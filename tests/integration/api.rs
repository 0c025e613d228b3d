//! HTTP API integration tests.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use ringside::testing::CountingTask;
use ringside::{ApiState, HealthState, Scheduler, SchedulerHandle, Timer, build_router};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use crate::common::{coordinator, sample_cloud};

/// Timer that never fires during a test run.
fn manual_only() -> Timer {
    Timer::cron("0 0 0 1 1 ?").unwrap()
}

fn start_scheduler(tasks: Vec<Arc<CountingTask>>) -> SchedulerHandle {
    let mut scheduler = Scheduler::new().with_tick_interval(Duration::from_millis(10));
    for task in tasks {
        scheduler.register(task, manual_only()).unwrap();
    }
    let (handle, _join) = scheduler.start();
    handle
}

fn state_with(handle: SchedulerHandle, health: HealthState) -> ApiState {
    ApiState {
        handle,
        health,
        coordinator: coordinator(&sample_cloud()),
        process_name: Arc::from("cassandra"),
    }
}

async fn send(state: ApiState, method: &str, uri: &str) -> (StatusCode, Value) {
    let router = build_router(state);
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = state_with(start_scheduler(vec![]), HealthState::new());
    let (status, json) = send(state, "GET", "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_process_endpoint_reflects_health_state() {
    let health = HealthState::new();
    let handle = start_scheduler(vec![]);

    let (_, json) = send(state_with(handle.clone(), health.clone()), "GET", "/api/process").await;
    assert_eq!(json["process_name"], "cassandra");
    assert_eq!(json["running"], false);

    health.force_running();
    let (status, json) = send(state_with(handle, health), "GET", "/api/process").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["running"], true);
}

#[tokio::test]
async fn test_ring_endpoint() {
    let state = state_with(start_scheduler(vec![]), HealthState::new());
    let (status, json) = send(state, "GET", "/api/ring").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ring_name"], "cass_prod-useast1a");
    assert_eq!(json["members"], serde_json::json!(["i-1", "i-2"]));
    assert_eq!(json["member_count"], 2);
    assert_eq!(json["capacity"], 6);
    assert_eq!(json["zone_count"], 3);
}

#[tokio::test]
async fn test_ring_endpoint_without_group_reports_empty() {
    let handle = start_scheduler(vec![]);
    let cloud = ringside::InMemoryCloud::new();
    let state = ApiState {
        handle,
        health: HealthState::new(),
        coordinator: coordinator(&cloud),
        process_name: Arc::from("cassandra"),
    };

    // An empty describe result reports zero members rather than an error.
    let (status, json) = send(state, "GET", "/api/ring").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["member_count"], 0);
    assert_eq!(json["capacity"], 0);
}

#[tokio::test]
async fn test_acl_endpoint() {
    let state = state_with(start_scheduler(vec![]), HealthState::new());
    let (status, json) = send(state, "GET", "/api/acl?from_port=7000&to_port=7001").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["from_port"], 7000);
    assert_eq!(json["to_port"], 7001);
    assert_eq!(json["cidrs"], serde_json::json!(["10.0.0.1/32"]));
}

#[tokio::test]
async fn test_acl_endpoint_other_range_is_empty() {
    let state = state_with(start_scheduler(vec![]), HealthState::new());
    let (status, json) = send(state, "GET", "/api/acl?from_port=9042&to_port=9042").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["cidrs"], serde_json::json!([]));
}

#[tokio::test]
async fn test_acl_endpoint_rejects_inverted_range() {
    let state = state_with(start_scheduler(vec![]), HealthState::new());
    let (status, json) = send(state, "GET", "/api/acl?from_port=7001&to_port=7000").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_acl_endpoint_missing_security_group() {
    let handle = start_scheduler(vec![]);
    let state = ApiState {
        handle,
        health: HealthState::new(),
        coordinator: coordinator(&ringside::InMemoryCloud::new()),
        process_name: Arc::from("cassandra"),
    };

    let (status, _) = send(state, "GET", "/api/acl?from_port=7000&to_port=7001").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_scheduler_state_pause_resume() {
    let handle = start_scheduler(vec![]);
    let health = HealthState::new();

    let (status, json) = send(state_with(handle.clone(), health.clone()), "GET", "/api/scheduler/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "running");
    assert_eq!(json["is_running"], true);

    let (status, _) = send(state_with(handle.clone(), health.clone()), "POST", "/api/scheduler/pause").await;
    assert_eq!(status, StatusCode::OK);
    assert!(handle.is_paused().await);

    let (_, json) = send(state_with(handle.clone(), health.clone()), "GET", "/api/scheduler/state").await;
    assert_eq!(json["state"], "paused");
    assert_eq!(json["is_paused"], true);

    let (status, _) = send(state_with(handle.clone(), health), "POST", "/api/scheduler/resume").await;
    assert_eq!(status, StatusCode::OK);
    assert!(handle.is_running().await);
}

#[tokio::test]
async fn test_list_tasks() {
    let handle = start_scheduler(vec![
        Arc::new(CountingTask::new("alpha")),
        Arc::new(CountingTask::new("beta")),
    ]);
    let (status, json) = send(state_with(handle, HealthState::new()), "GET", "/api/tasks").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    assert_eq!(json["tasks"][0]["name"], "alpha");
    assert_eq!(json["tasks"][1]["name"], "beta");
    assert_eq!(json["tasks"][0]["in_flight"], 0);
}

#[tokio::test]
async fn test_trigger_task() {
    let task = Arc::new(CountingTask::new("alpha"));
    let handle = start_scheduler(vec![task.clone()]);

    let (status, json) = send(state_with(handle, HealthState::new()), "POST", "/api/tasks/alpha/trigger").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["task"], "alpha");
    assert!(json["fire_id"].is_string());

    assert!(task.wait_for_calls(1, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_trigger_unknown_task_is_not_found() {
    let handle = start_scheduler(vec![]);
    let (status, json) = send(state_with(handle, HealthState::new()), "POST", "/api/tasks/missing/trigger").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_trigger_while_in_flight_is_conflict() {
    let task = Arc::new(CountingTask::new("slow").with_delay(Duration::from_millis(500)));
    let handle = start_scheduler(vec![task.clone()]);

    let (status, _) = send(state_with(handle.clone(), HealthState::new()), "POST", "/api/tasks/slow/trigger").await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(state_with(handle, HealthState::new()), "POST", "/api/tasks/slow/trigger").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

//! End-to-end sidecar tests: configured tasks running on the scheduler.

use ringside::testing::{RecordingHandler, ScriptedProbe};
use ringside::{
    CloudError, Event, EventBus, HealthMonitor, HealthState, RingAuditTask, Scheduler,
};
use std::sync::Arc;
use std::time::Duration;

use crate::common::{coordinator, sample_cloud, sample_config, wait_until};

const WAIT: Duration = Duration::from_secs(3);

/// Test: the monitor publishes liveness changes while scheduled.
#[tokio::test]
async fn test_monitor_tracks_process_through_scheduler() {
    let config = sample_config();
    let health = HealthState::new();
    let probe = Arc::new(
        ScriptedProbe::new()
            .output("4242\n")
            .output("4242\n")
            .output(""),
    );
    let monitor = HealthMonitor::new(config.process_name.clone(), probe.clone(), health.clone());

    let mut scheduler = Scheduler::new()
        .with_tick_interval(config.scheduler.tick_interval())
        .with_shutdown_timeout(config.scheduler.shutdown_timeout());
    scheduler
        .register(Arc::new(monitor), config.health_timer().unwrap())
        .unwrap();
    let (handle, join) = scheduler.start();

    let reader = health.clone();
    wait_until("process to be seen running", WAIT, || reader.is_running()).await;
    let reader = health.clone();
    wait_until("process to be seen gone", WAIT, || !reader.is_running()).await;

    handle.shutdown().await.unwrap();
    join.await.unwrap();

    assert!(probe.patterns().iter().all(|p| p == "cassandra"));
    assert!(probe.patterns().len() >= 3);
}

/// Test: a failing probe never stops the monitor from firing.
#[tokio::test]
async fn test_probe_failures_keep_monitor_scheduled() {
    let config = sample_config();
    let health = HealthState::new();
    health.force_running();
    let probe = Arc::new(ScriptedProbe::new().failure("pgrep not installed"));
    let monitor = HealthMonitor::new("cassandra", probe.clone(), health.clone());

    let handler = Arc::new(RecordingHandler::new());
    let bus = EventBus::new();
    bus.register(handler.clone()).await;

    let mut scheduler = Scheduler::new()
        .with_event_bus(bus)
        .with_tick_interval(config.scheduler.tick_interval());
    scheduler
        .register(Arc::new(monitor), config.health_timer().unwrap())
        .unwrap();
    let (handle, join) = scheduler.start();

    let calls = probe.clone();
    wait_until("three probe attempts", WAIT, move || calls.patterns().len() >= 3).await;
    handle.shutdown().await.unwrap();
    join.await.unwrap();

    assert!(!health.is_running());
    let failures = handler
        .count(|e| matches!(e, Event::TaskFailed { .. }))
        .await;
    assert_eq!(failures, 0, "monitor must absorb probe errors");
}

/// Test: ring audit runs alongside the monitor and survives cloud errors.
#[tokio::test]
async fn test_audit_and_monitor_run_together() {
    let config = sample_config();
    let cloud = sample_cloud();
    cloud.fail_next_call(CloudError::Transport("connection reset".into()));

    let handler = Arc::new(RecordingHandler::new());
    let bus = EventBus::new();
    bus.register(handler.clone()).await;

    let health = HealthState::new();
    let monitor = HealthMonitor::new(
        "cassandra",
        Arc::new(ScriptedProbe::new().output("1\n")),
        health.clone(),
    );
    let audit = RingAuditTask::new(coordinator(&cloud));

    let mut scheduler = Scheduler::new()
        .with_event_bus(bus)
        .with_tick_interval(config.scheduler.tick_interval());
    scheduler
        .register(Arc::new(monitor), config.health_timer().unwrap())
        .unwrap();
    scheduler
        .register(Arc::new(audit), config.audit_timer().unwrap().unwrap())
        .unwrap();
    let (handle, join) = scheduler.start();

    let audits = cloud.clone();
    wait_until("three audits", WAIT, move || audits.clients_acquired() >= 3).await;
    handle.shutdown().await.unwrap();
    join.await.unwrap();

    assert!(health.is_running());
    assert_eq!(cloud.open_clients(), 0);

    let audit_failures = handler
        .count(|e| matches!(e, Event::TaskFailed { task, .. } if task == RingAuditTask::NAME))
        .await;
    let audit_successes = handler
        .count(|e| matches!(e, Event::TaskCompleted { task, .. } if task == RingAuditTask::NAME))
        .await;
    assert_eq!(audit_failures, 0, "audit must absorb cloud errors");
    assert!(audit_successes >= 3);
}

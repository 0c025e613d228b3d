//! Graceful shutdown integration tests.
//!
//! Tests that verify the scheduler gracefully handles shutdown by
//! waiting for in-flight fires to complete before exiting.

use ringside::testing::{CountingTask, RecordingHandler};
use ringside::{Event, EventBus, Scheduler, SchedulerError, SchedulerState, Timer};
use std::sync::Arc;
use std::time::Duration;

fn manual_only() -> Timer {
    Timer::cron("0 0 0 1 1 ?").unwrap()
}

/// Test: Graceful shutdown waits for in-flight fires to complete.
#[tokio::test]
async fn test_graceful_shutdown_waits_for_fires() {
    let event_bus = EventBus::new();
    let handler = Arc::new(RecordingHandler::new());
    event_bus.register(handler.clone()).await;

    let slow = Arc::new(CountingTask::new("slow").with_delay(Duration::from_millis(300)));

    let mut scheduler = Scheduler::new()
        .with_event_bus(event_bus)
        .with_tick_interval(Duration::from_millis(10))
        .with_shutdown_timeout(Duration::from_secs(5));
    scheduler.register(slow.clone(), manual_only()).unwrap();
    let (handle, scheduler_task) = scheduler.start();

    handle.trigger("slow").await.unwrap();
    assert!(slow.wait_for_calls(1, Duration::from_secs(1)).await);

    let shutdown_start = std::time::Instant::now();
    handle.shutdown().await.unwrap();
    let shutdown_duration = shutdown_start.elapsed();
    let _ = scheduler_task.await;

    assert!(
        shutdown_duration >= Duration::from_millis(200),
        "Shutdown should have waited for the fire. Duration: {:?}",
        shutdown_duration
    );
    assert_eq!(
        handler
            .count(|e| matches!(e, Event::TaskCompleted { .. }))
            .await,
        1,
        "Fire should have completed"
    );
}

/// Test: Graceful shutdown gives up once the timeout passes.
#[tokio::test]
async fn test_graceful_shutdown_timeout_exceeded() {
    let very_slow = Arc::new(CountingTask::new("very_slow").with_delay(Duration::from_secs(2)));

    let mut scheduler = Scheduler::new()
        .with_tick_interval(Duration::from_millis(10))
        .with_shutdown_timeout(Duration::from_millis(200));
    scheduler.register(very_slow.clone(), manual_only()).unwrap();
    let (handle, scheduler_task) = scheduler.start();

    handle.trigger("very_slow").await.unwrap();
    assert!(very_slow.wait_for_calls(1, Duration::from_secs(1)).await);

    let shutdown_start = std::time::Instant::now();
    handle.shutdown().await.unwrap();
    let shutdown_duration = shutdown_start.elapsed();
    let _ = scheduler_task.await;

    assert!(
        shutdown_duration >= Duration::from_millis(150),
        "Shutdown should have waited near the timeout. Duration: {:?}",
        shutdown_duration
    );
    assert!(
        shutdown_duration < Duration::from_millis(1500),
        "Shutdown should not wait for the full fire. Duration: {:?}",
        shutdown_duration
    );
}

/// Test: Shutdown with nothing in flight returns promptly.
#[tokio::test]
async fn test_shutdown_without_fires() {
    let mut scheduler = Scheduler::new().with_tick_interval(Duration::from_millis(10));
    scheduler
        .register(Arc::new(CountingTask::new("idle")), manual_only())
        .unwrap();
    let (handle, scheduler_task) = scheduler.start();

    let shutdown_start = std::time::Instant::now();
    handle.shutdown().await.unwrap();
    let _ = scheduler_task.await;

    assert!(shutdown_start.elapsed() < Duration::from_millis(500));
    assert_eq!(handle.state().await, SchedulerState::Stopped);
}

/// Test: Commands after shutdown report a closed channel.
#[tokio::test]
async fn test_commands_after_shutdown_fail() {
    let mut scheduler = Scheduler::new().with_tick_interval(Duration::from_millis(10));
    scheduler
        .register(Arc::new(CountingTask::new("idle")), manual_only())
        .unwrap();
    let (handle, scheduler_task) = scheduler.start();

    handle.shutdown().await.unwrap();
    let _ = scheduler_task.await;

    let err = handle.trigger("idle").await.unwrap_err();
    assert!(matches!(err, SchedulerError::ChannelError(_)));
}

/// Test: Fires started by the timer are also awaited on shutdown.
#[tokio::test]
async fn test_shutdown_waits_for_timer_fires() {
    let ticking = Arc::new(CountingTask::new("ticking").with_delay(Duration::from_millis(200)));

    let mut scheduler = Scheduler::new()
        .with_tick_interval(Duration::from_millis(10))
        .with_shutdown_timeout(Duration::from_secs(5));
    scheduler
        .register(ticking.clone(), Timer::every_millis(20).unwrap())
        .unwrap();
    let (handle, scheduler_task) = scheduler.start();

    assert!(ticking.wait_for_calls(1, Duration::from_secs(1)).await);
    handle.shutdown().await.unwrap();
    let _ = scheduler_task.await;

    // Skip overlap policy keeps one fire in flight at a time.
    assert_eq!(ticking.max_concurrent(), 1);
}

//! # ringside
//!
//! A per-node sidecar for a clustered data store. It watches the local
//! data-store process, reads ring membership from the cloud autoscaling
//! group, keeps the ring's security-group ingress rules in sync, and writes
//! backup manifests, all driven by a small recurring-task scheduler.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ringside::{CommandProbe, HealthMonitor, HealthState, Scheduler};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let health = HealthState::new();
//!     let monitor = HealthMonitor::new("cassandra", Arc::new(CommandProbe::pgrep()), health.clone());
//!
//!     let mut scheduler = Scheduler::new();
//!     scheduler.register(Arc::new(monitor), HealthMonitor::default_timer()?)?;
//!
//!     let (handle, _task) = scheduler.start();
//!     // ... later
//!     println!("running: {}", health.is_running());
//!     handle.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod backup;
pub mod config;
pub mod core;
pub mod events;
pub mod health;
pub mod membership;
pub mod scheduler;
pub mod testing;

pub use api::{ApiError, ApiState, build_router};
pub use backup::{ManifestError, ManifestMaterializer};
pub use config::{ConfigError, SidecarConfig, TimerConfig, YamlLoader};
pub use crate::core::task::{Task, TaskError};
pub use crate::core::timer::{DayOfWeek, Timer, TimerError};
pub use crate::core::types::FireId;
pub use events::{Event, EventBus, EventHandler, FireSource};
pub use health::{CommandProbe, HealthMonitor, HealthState, ProbeError, ProcessProbe};
pub use membership::{
    AutoScalingGroup, CloudError, CloudProvider, GroupInstance, InMemoryCloud, IngressRule,
    MembershipCoordinator, MembershipError, MembershipSettings, MembershipSnapshot,
    RingAuditTask, SecurityGroup,
};
pub use scheduler::{
    OverlapPolicy, Scheduler, SchedulerError, SchedulerHandle, SchedulerState, TaskStatus,
};

//! Scheduled ring audit.
//!
//! Compares the ring's live members with its capacity on every fire. Cloud
//! failures are logged and absorbed; the next fire retries.

use async_trait::async_trait;
use std::sync::Arc;

use super::{MembershipCoordinator, MembershipSnapshot};
use crate::core::task::{Task, TaskError};

/// Periodic check of live ring members against ring capacity.
pub struct RingAuditTask {
    coordinator: Arc<MembershipCoordinator>,
}

impl RingAuditTask {
    pub const NAME: &'static str = "ring-audit";

    pub fn new(coordinator: Arc<MembershipCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Take one snapshot and log it against capacity.
    ///
    /// Returns `None` when the cloud call failed.
    pub async fn audit(&self) -> Option<MembershipSnapshot> {
        let ring = &self.coordinator.settings().ring_name;
        let snapshot = match self.coordinator.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(ring = %ring, error = %e, "Ring audit failed, retrying on next fire");
                return None;
            }
        };

        if snapshot.below_capacity() {
            tracing::warn!(
                ring = %ring,
                members = snapshot.member_count(),
                capacity = snapshot.capacity,
                "Ring is below capacity"
            );
        } else {
            tracing::info!(
                ring = %ring,
                members = snapshot.member_count(),
                capacity = snapshot.capacity,
                "Ring at capacity"
            );
        }
        Some(snapshot)
    }
}

#[async_trait]
impl Task for RingAuditTask {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn execute(&self) -> Result<(), TaskError> {
        self.audit().await;
        Ok(())
    }

    fn description(&self) -> Option<&str> {
        Some("compares live ring members with ring capacity")
    }
}

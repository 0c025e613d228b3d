//! Ring membership and ACL coordination.
//!
//! The cloud autoscaling group is the source of truth for which instances
//! belong to this node's ring, and a named security group carries the
//! ingress rules that let peers reach each other. [`MembershipCoordinator`]
//! reads and mutates both through a [`CloudProvider`], acquiring a fresh
//! client per operation.

mod audit;
mod coordinator;
mod memory;
mod provider;

pub use audit::RingAuditTask;
pub use coordinator::{MembershipCoordinator, MembershipSettings};
pub use memory::InMemoryCloud;
pub use provider::{AutoScalingApi, ClientLease, CloudProvider, ProviderClient, SecurityGroupApi};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Lifecycle states that mean an instance is leaving or gone.
const TERMINAL_STATES: [&str; 3] = ["terminating", "shutting-down", "terminated"];

/// Errors reported by a cloud provider client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    /// The ingress rule being authorized already exists.
    #[error("duplicate permission: {0}")]
    DuplicatePermission(String),

    /// The ingress rule being revoked does not exist.
    #[error("permission not found: {0}")]
    PermissionNotFound(String),

    /// The named group does not exist.
    #[error("group not found: {0}")]
    GroupNotFound(String),

    /// Provider-side error with its code.
    #[error("{code}: {message}")]
    Api { code: String, message: String },

    /// Request never reached the provider.
    #[error("transport error: {0}")]
    Transport(String),

    /// Provider state lock was poisoned.
    #[error("provider lock poisoned")]
    LockPoisoned,
}

/// Errors returned by the membership coordinator.
#[derive(Debug, Error)]
pub enum MembershipError {
    /// Underlying provider call failed.
    #[error("cloud provider error: {0}")]
    Cloud(#[from] CloudError),

    /// No autoscaling group matches the configured ring name.
    #[error("autoscaling group not found: {0}")]
    GroupNotFound(String),
}

/// One instance as reported by the autoscaling API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInstance {
    pub instance_id: String,
    pub lifecycle_state: String,
}

impl GroupInstance {
    pub fn new(instance_id: impl Into<String>, lifecycle_state: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            lifecycle_state: lifecycle_state.into(),
        }
    }

    /// Whether the instance is terminating or already gone.
    pub fn is_terminal(&self) -> bool {
        TERMINAL_STATES
            .iter()
            .any(|state| self.lifecycle_state.eq_ignore_ascii_case(state))
    }
}

/// An autoscaling group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoScalingGroup {
    pub name: String,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
    #[serde(default)]
    pub instances: Vec<GroupInstance>,
}

/// New capacity bounds for a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityUpdate {
    pub group_name: String,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
}

/// An ingress permission on a security group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRule {
    #[serde(default = "default_protocol")]
    pub protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    pub cidrs: BTreeSet<String>,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

impl IngressRule {
    /// A TCP rule for `cidrs` on `from_port..=to_port`.
    pub fn tcp<I, S>(cidrs: I, from_port: u16, to_port: u16) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protocol: default_protocol(),
            from_port,
            to_port,
            cidrs: cidrs.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the rule covers exactly this port range.
    pub fn matches_range(&self, from_port: u16, to_port: u16) -> bool {
        self.from_port == from_port && self.to_port == to_port
    }
}

/// A security group and its ingress permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<IngressRule>,
}

/// Live members and capacity from a single describe round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipSnapshot {
    /// Non-terminal instance ids, in provider order.
    pub members: Vec<String>,
    /// Sum of max sizes. Not a live count.
    pub capacity: u32,
}

impl MembershipSnapshot {
    /// Number of live members.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Whether fewer members are live than the group can hold.
    pub fn below_capacity(&self) -> bool {
        self.members.len() < self.capacity as usize
    }
}

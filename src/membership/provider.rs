//! Cloud provider seam.
//!
//! A [`CloudProvider`] hands out short-lived clients for the autoscaling and
//! security-group APIs. Every client is wrapped in a [`ClientLease`] that
//! releases it exactly once, on success, on failure, or on drop.

use async_trait::async_trait;
use std::fmt::Display;
use std::ops::Deref;

use super::{AutoScalingGroup, CapacityUpdate, CloudError, IngressRule, SecurityGroup};

/// Release hook shared by every provider client.
pub trait ProviderClient: Send + Sync {
    /// Release the client's resources.
    fn shutdown(&self) -> Result<(), CloudError>;
}

/// Autoscaling API surface.
#[async_trait]
pub trait AutoScalingApi: ProviderClient {
    /// Describe the groups with the given names.
    async fn describe_groups(&self, names: &[String]) -> Result<Vec<AutoScalingGroup>, CloudError>;

    /// Set a group's min, max and desired capacity.
    async fn update_group(&self, update: &CapacityUpdate) -> Result<(), CloudError>;
}

/// Security-group API surface.
#[async_trait]
pub trait SecurityGroupApi: ProviderClient {
    /// Add an ingress permission to the named group.
    async fn authorize_ingress(&self, group_name: &str, rule: &IngressRule) -> Result<(), CloudError>;

    /// Remove an ingress permission from the named group.
    async fn revoke_ingress(&self, group_name: &str, rule: &IngressRule) -> Result<(), CloudError>;

    /// Describe the security groups with the given names.
    async fn describe_security_groups(
        &self,
        names: &[String],
    ) -> Result<Vec<SecurityGroup>, CloudError>;
}

/// Factory for per-call provider clients.
pub trait CloudProvider: Send + Sync {
    /// Open an autoscaling client against `endpoint`.
    fn autoscaling_client(&self, endpoint: &str) -> Result<Box<dyn AutoScalingApi>, CloudError>;

    /// Open a security-group client against `endpoint`.
    fn ec2_client(&self, endpoint: &str) -> Result<Box<dyn SecurityGroupApi>, CloudError>;
}

/// Scoped ownership of one provider client.
///
/// Call [`finish`](ClientLease::finish) with the operation's result to
/// release the client. A release failure is logged and never replaces the
/// operation's own result. A lease dropped without `finish` (cancelled
/// future, panic) releases in `Drop`.
pub struct ClientLease<C: ?Sized + ProviderClient> {
    client: Box<C>,
    endpoint: String,
    released: bool,
}

impl<C: ?Sized + ProviderClient> ClientLease<C> {
    /// Take ownership of a freshly opened client.
    pub fn new(client: Box<C>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            released: false,
        }
    }

    /// The endpoint the client talks to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Release the client and hand back `result` unchanged.
    pub fn finish<T, E: Display>(mut self, result: Result<T, E>) -> Result<T, E> {
        if let Err(release_err) = self.release() {
            match &result {
                Err(primary) => tracing::warn!(
                    endpoint = %self.endpoint,
                    error = %release_err,
                    primary_error = %primary,
                    "Failed to release provider client after failed call"
                ),
                Ok(_) => tracing::warn!(
                    endpoint = %self.endpoint,
                    error = %release_err,
                    "Failed to release provider client"
                ),
            }
        }
        result
    }

    fn release(&mut self) -> Result<(), CloudError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.client.shutdown()
    }
}

impl<C: ?Sized + ProviderClient> Deref for ClientLease<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.client
    }
}

impl<C: ?Sized + ProviderClient> Drop for ClientLease<C> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.release() {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    error = %e,
                    "Failed to release provider client on drop"
                );
            }
        }
    }
}

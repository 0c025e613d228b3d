//! Membership queries and ACL mutations against the cloud provider.

use std::collections::BTreeSet;
use std::sync::Arc;

use super::provider::{AutoScalingApi, ClientLease, CloudProvider, SecurityGroupApi};
use super::{
    AutoScalingGroup, CapacityUpdate, CloudError, IngressRule, MembershipError, MembershipSnapshot,
};

/// Identity of the ring this node belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipSettings {
    /// Autoscaling group name for this node's ring.
    pub ring_name: String,
    /// This node's rac (availability zone), if known.
    pub rac: Option<String>,
    /// All racs the cluster spans.
    pub racs: Vec<String>,
    /// Security group carrying the ring's ingress rules.
    pub acl_group_name: String,
    /// Data-center region used to derive endpoints.
    pub dc: String,
}

impl MembershipSettings {
    pub fn new(
        ring_name: impl Into<String>,
        acl_group_name: impl Into<String>,
        dc: impl Into<String>,
    ) -> Self {
        Self {
            ring_name: ring_name.into(),
            rac: None,
            racs: Vec::new(),
            acl_group_name: acl_group_name.into(),
            dc: dc.into(),
        }
    }

    pub fn with_rac(mut self, rac: impl Into<String>) -> Self {
        self.rac = Some(rac.into());
        self
    }

    pub fn with_racs<I, S>(mut self, racs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.racs = racs.into_iter().map(Into::into).collect();
        self
    }

    /// `autoscaling.<dc>.amazonaws.com`
    pub fn autoscaling_endpoint(&self) -> String {
        format!("autoscaling.{}.amazonaws.com", self.dc)
    }

    /// `ec2.<dc>.amazonaws.com`
    pub fn ec2_endpoint(&self) -> String {
        format!("ec2.{}.amazonaws.com", self.dc)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IngressChange {
    Authorize,
    Revoke,
}

impl IngressChange {
    async fn apply(
        self,
        client: &dyn SecurityGroupApi,
        group: &str,
        rule: &IngressRule,
    ) -> Result<(), CloudError> {
        match self {
            Self::Authorize => client.authorize_ingress(group, rule).await,
            Self::Revoke => client.revoke_ingress(group, rule).await,
        }
    }

    /// Whether `err` means the rule is already in the requested state.
    fn already_settled(self, err: &CloudError) -> bool {
        matches!(
            (self, err),
            (Self::Authorize, CloudError::DuplicatePermission(_))
                | (Self::Revoke, CloudError::PermissionNotFound(_))
        )
    }

    fn verb(self) -> &'static str {
        match self {
            Self::Authorize => "add",
            Self::Revoke => "remove",
        }
    }
}

/// Reads ring membership and maintains the ring's ingress rules.
///
/// Holds no cached state: every call goes to the provider through a freshly
/// acquired client.
pub struct MembershipCoordinator {
    settings: MembershipSettings,
    provider: Arc<dyn CloudProvider>,
}

impl MembershipCoordinator {
    pub fn new(settings: MembershipSettings, provider: Arc<dyn CloudProvider>) -> Self {
        Self { settings, provider }
    }

    pub fn settings(&self) -> &MembershipSettings {
        &self.settings
    }

    /// Instance ids of the ring's live instances, in provider order.
    pub async fn membership(&self) -> Result<Vec<String>, MembershipError> {
        let groups = self.describe_ring().await?;
        let members = live_members(&groups);
        tracing::info!(
            ring = %self.settings.ring_name,
            rac = ?self.settings.rac,
            count = members.len(),
            members = %members.join(","),
            "Queried ring membership"
        );
        Ok(members)
    }

    /// Sum of max sizes over the ring's groups.
    pub async fn membership_capacity(&self) -> Result<u32, MembershipError> {
        let groups = self.describe_ring().await?;
        let capacity = total_capacity(&groups);
        tracing::debug!(ring = %self.settings.ring_name, capacity, "Queried ring capacity");
        Ok(capacity)
    }

    /// Members and capacity from a single describe call.
    pub async fn snapshot(&self) -> Result<MembershipSnapshot, MembershipError> {
        let groups = self.describe_ring().await?;
        Ok(MembershipSnapshot {
            members: live_members(&groups),
            capacity: total_capacity(&groups),
        })
    }

    /// Number of configured racs.
    pub fn zone_count(&self) -> usize {
        self.settings.racs.len()
    }

    /// Allow TCP ingress from `cidrs` on `from_port..=to_port`.
    pub async fn add_ingress<I, S>(
        &self,
        cidrs: I,
        from_port: u16,
        to_port: u16,
    ) -> Result<(), MembershipError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cidrs = cidrs.into_iter().map(Into::into).collect();
        self.change_ingress(IngressChange::Authorize, cidrs, from_port, to_port)
            .await
    }

    /// Revoke TCP ingress from `cidrs` on `from_port..=to_port`.
    pub async fn remove_ingress<I, S>(
        &self,
        cidrs: I,
        from_port: u16,
        to_port: u16,
    ) -> Result<(), MembershipError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cidrs = cidrs.into_iter().map(Into::into).collect();
        self.change_ingress(IngressChange::Revoke, cidrs, from_port, to_port)
            .await
    }

    /// CIDRs allowed on exactly `from_port..=to_port`.
    pub async fn list_ingress(
        &self,
        from_port: u16,
        to_port: u16,
    ) -> Result<BTreeSet<String>, MembershipError> {
        let client = self.ec2()?;
        let names = [self.settings.acl_group_name.clone()];
        let result = client
            .describe_security_groups(&names)
            .await
            .map_err(MembershipError::from);
        let groups = client.finish(result)?;

        Ok(groups
            .iter()
            .flat_map(|group| &group.permissions)
            .filter(|rule| rule.matches_range(from_port, to_port))
            .flat_map(|rule| rule.cidrs.iter().cloned())
            .collect())
    }

    /// Grow the ring's first group by `count` instances.
    pub async fn expand_by(&self, count: u32) -> Result<(), MembershipError> {
        if count == 0 {
            tracing::debug!(ring = %self.settings.ring_name, "Expand by zero requested, nothing to do");
            return Ok(());
        }

        let client = self.autoscaling()?;
        let result = self.expand_with(&*client, count).await;
        client.finish(result)
    }

    async fn expand_with(&self, client: &dyn AutoScalingApi, count: u32) -> Result<(), MembershipError> {
        let ring = &self.settings.ring_name;
        let group = client
            .describe_groups(std::slice::from_ref(ring))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MembershipError::GroupNotFound(ring.clone()))?;

        let update = CapacityUpdate {
            group_name: group.name,
            min_size: group.min_size.saturating_add(count),
            max_size: group.max_size.saturating_add(count),
            desired_capacity: group.desired_capacity.saturating_add(count),
        };
        client.update_group(&update).await?;

        tracing::info!(
            ring = %update.group_name,
            min = update.min_size,
            max = update.max_size,
            desired = update.desired_capacity,
            "Expanded ring capacity"
        );
        Ok(())
    }

    async fn describe_ring(&self) -> Result<Vec<AutoScalingGroup>, MembershipError> {
        let client = self.autoscaling()?;
        let result = client
            .describe_groups(std::slice::from_ref(&self.settings.ring_name))
            .await
            .map_err(MembershipError::from);
        client.finish(result)
    }

    async fn change_ingress(
        &self,
        change: IngressChange,
        cidrs: BTreeSet<String>,
        from_port: u16,
        to_port: u16,
    ) -> Result<(), MembershipError> {
        if cidrs.is_empty() {
            tracing::debug!(action = change.verb(), "No CIDRs given, skipping ACL change");
            return Ok(());
        }

        let client = self.ec2()?;
        let result = self
            .change_ingress_with(&*client, change, &cidrs, from_port, to_port)
            .await;
        let result = client.finish(result);

        if result.is_ok() {
            tracing::info!(
                group = %self.settings.acl_group_name,
                action = change.verb(),
                cidrs = ?cidrs,
                from_port,
                to_port,
                "Updated ACL"
            );
        }
        result
    }

    async fn change_ingress_with(
        &self,
        client: &dyn SecurityGroupApi,
        change: IngressChange,
        cidrs: &BTreeSet<String>,
        from_port: u16,
        to_port: u16,
    ) -> Result<(), MembershipError> {
        let group = &self.settings.acl_group_name;
        let rule = IngressRule::tcp(cidrs.iter().cloned(), from_port, to_port);

        match change.apply(client, group, &rule).await {
            Ok(()) => Ok(()),
            Err(e) if change.already_settled(&e) && cidrs.len() > 1 => {
                tracing::debug!(
                    group = %group,
                    action = change.verb(),
                    error = %e,
                    "Batch partially settled, applying per CIDR"
                );
                for cidr in cidrs {
                    let single = IngressRule::tcp([cidr.as_str()], from_port, to_port);
                    match change.apply(client, group, &single).await {
                        Ok(()) => {}
                        Err(e) if change.already_settled(&e) => {
                            tracing::debug!(cidr = %cidr, error = %e, "CIDR already settled");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                Ok(())
            }
            Err(e) if change.already_settled(&e) => {
                tracing::info!(
                    group = %group,
                    action = change.verb(),
                    error = %e,
                    "ACL already in requested state"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn autoscaling(&self) -> Result<ClientLease<dyn AutoScalingApi>, MembershipError> {
        let endpoint = self.settings.autoscaling_endpoint();
        let client = self.provider.autoscaling_client(&endpoint)?;
        Ok(ClientLease::new(client, endpoint))
    }

    fn ec2(&self) -> Result<ClientLease<dyn SecurityGroupApi>, MembershipError> {
        let endpoint = self.settings.ec2_endpoint();
        let client = self.provider.ec2_client(&endpoint)?;
        Ok(ClientLease::new(client, endpoint))
    }
}

fn live_members(groups: &[AutoScalingGroup]) -> Vec<String> {
    groups
        .iter()
        .flat_map(|group| &group.instances)
        .filter(|instance| !instance.is_terminal())
        .map(|instance| instance.instance_id.clone())
        .collect()
}

fn total_capacity(groups: &[AutoScalingGroup]) -> u32 {
    groups
        .iter()
        .fold(0u32, |sum, group| sum.saturating_add(group.max_size))
}

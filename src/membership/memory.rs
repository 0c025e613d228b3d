//! In-memory cloud provider.
//!
//! Backs the sidecar when no real cloud is configured and serves as the
//! fake in tests. Duplicate-authorize and missing-revoke fail the whole
//! request, the same way the hosted API does.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::provider::{AutoScalingApi, CloudProvider, ProviderClient, SecurityGroupApi};
use super::{AutoScalingGroup, CapacityUpdate, CloudError, IngressRule, SecurityGroup};

#[derive(Debug, Default)]
struct CloudState {
    groups: Vec<AutoScalingGroup>,
    security_groups: Vec<SecurityGroup>,
}

#[derive(Debug, Default)]
struct Inner {
    state: RwLock<CloudState>,
    open_clients: AtomicUsize,
    acquired: AtomicUsize,
    endpoints: Mutex<Vec<String>>,
    fail_next: Mutex<Option<CloudError>>,
    fail_release: AtomicBool,
}

/// Cloud provider holding groups and security groups in memory.
///
/// Clones share state, so a test can keep one handle for inspection while
/// the coordinator owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCloud {
    inner: Arc<Inner>,
}

impl InMemoryCloud {
    /// Create an empty cloud.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cloud seeded with the given groups.
    pub fn from_parts(groups: Vec<AutoScalingGroup>, security_groups: Vec<SecurityGroup>) -> Self {
        let cloud = Self::new();
        {
            let mut state = cloud.write_state();
            state.groups = groups;
            state.security_groups = security_groups;
        }
        cloud
    }

    /// Add an autoscaling group.
    pub fn with_group(self, group: AutoScalingGroup) -> Self {
        self.write_state().groups.push(group);
        self
    }

    /// Add a security group.
    pub fn with_security_group(self, group: SecurityGroup) -> Self {
        self.write_state().security_groups.push(group);
        self
    }

    /// Current copy of a group.
    pub fn group(&self, name: &str) -> Option<AutoScalingGroup> {
        self.read_state()
            .groups
            .iter()
            .find(|g| g.name == name)
            .cloned()
    }

    /// Current copy of a security group.
    pub fn security_group(&self, name: &str) -> Option<SecurityGroup> {
        self.read_state()
            .security_groups
            .iter()
            .find(|g| g.name == name)
            .cloned()
    }

    /// Clients acquired and not yet released.
    pub fn open_clients(&self) -> usize {
        self.inner.open_clients.load(Ordering::SeqCst)
    }

    /// Clients acquired over the cloud's lifetime.
    pub fn clients_acquired(&self) -> usize {
        self.inner.acquired.load(Ordering::SeqCst)
    }

    /// Endpoints clients were opened against, in order.
    pub fn endpoints(&self) -> Vec<String> {
        self.inner
            .endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Fail the next API call with `error`.
    pub fn fail_next_call(&self, error: CloudError) {
        *self
            .inner
            .fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(error);
    }

    /// Make every client release report a failure.
    pub fn fail_releases(&self, fail: bool) {
        self.inner.fail_release.store(fail, Ordering::SeqCst);
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, CloudState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, CloudState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self, endpoint: &str) -> Result<MemoryClient, CloudError> {
        self.inner
            .endpoints
            .lock()
            .map_err(|_| CloudError::LockPoisoned)?
            .push(endpoint.to_string());
        self.inner.acquired.fetch_add(1, Ordering::SeqCst);
        self.inner.open_clients.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryClient {
            inner: Arc::clone(&self.inner),
            released: AtomicBool::new(false),
        })
    }
}

impl CloudProvider for InMemoryCloud {
    fn autoscaling_client(&self, endpoint: &str) -> Result<Box<dyn AutoScalingApi>, CloudError> {
        Ok(Box::new(self.open(endpoint)?))
    }

    fn ec2_client(&self, endpoint: &str) -> Result<Box<dyn SecurityGroupApi>, CloudError> {
        Ok(Box::new(self.open(endpoint)?))
    }
}

struct MemoryClient {
    inner: Arc<Inner>,
    released: AtomicBool,
}

impl MemoryClient {
    fn injected_failure(&self) -> Result<(), CloudError> {
        let mut slot = self
            .inner
            .fail_next
            .lock()
            .map_err(|_| CloudError::LockPoisoned)?;
        match slot.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl ProviderClient for MemoryClient {
    fn shutdown(&self) -> Result<(), CloudError> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.open_clients.fetch_sub(1, Ordering::SeqCst);
        if self.inner.fail_release.load(Ordering::SeqCst) {
            return Err(CloudError::Transport("client shutdown failed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AutoScalingApi for MemoryClient {
    async fn describe_groups(&self, names: &[String]) -> Result<Vec<AutoScalingGroup>, CloudError> {
        self.injected_failure()?;
        let state = self.inner.state.read().map_err(|_| CloudError::LockPoisoned)?;
        Ok(state
            .groups
            .iter()
            .filter(|g| names.contains(&g.name))
            .cloned()
            .collect())
    }

    async fn update_group(&self, update: &CapacityUpdate) -> Result<(), CloudError> {
        self.injected_failure()?;
        let mut state = self.inner.state.write().map_err(|_| CloudError::LockPoisoned)?;
        let group = state
            .groups
            .iter_mut()
            .find(|g| g.name == update.group_name)
            .ok_or_else(|| CloudError::GroupNotFound(update.group_name.clone()))?;
        group.min_size = update.min_size;
        group.max_size = update.max_size;
        group.desired_capacity = update.desired_capacity;
        Ok(())
    }
}

#[async_trait]
impl SecurityGroupApi for MemoryClient {
    async fn authorize_ingress(&self, group_name: &str, rule: &IngressRule) -> Result<(), CloudError> {
        self.injected_failure()?;
        let mut state = self.inner.state.write().map_err(|_| CloudError::LockPoisoned)?;
        let group = find_security_group(&mut state, group_name)?;

        let existing = group.permissions.iter().find(|p| same_slot(p, rule));
        if let Some(dup) = existing.and_then(|p| rule.cidrs.iter().find(|c| p.cidrs.contains(*c))) {
            return Err(CloudError::DuplicatePermission(format!(
                "{dup} {}-{}",
                rule.from_port, rule.to_port
            )));
        }

        match group.permissions.iter_mut().find(|p| same_slot(p, rule)) {
            Some(permission) => permission.cidrs.extend(rule.cidrs.iter().cloned()),
            None => group.permissions.push(rule.clone()),
        }
        Ok(())
    }

    async fn revoke_ingress(&self, group_name: &str, rule: &IngressRule) -> Result<(), CloudError> {
        self.injected_failure()?;
        let mut state = self.inner.state.write().map_err(|_| CloudError::LockPoisoned)?;
        let group = find_security_group(&mut state, group_name)?;

        let not_found = || {
            CloudError::PermissionNotFound(format!("{}-{}", rule.from_port, rule.to_port))
        };
        let index = group
            .permissions
            .iter()
            .position(|p| same_slot(p, rule))
            .ok_or_else(not_found)?;
        if !rule.cidrs.iter().all(|c| group.permissions[index].cidrs.contains(c)) {
            return Err(not_found());
        }

        let permission = &mut group.permissions[index];
        permission.cidrs.retain(|c| !rule.cidrs.contains(c));
        if permission.cidrs.is_empty() {
            group.permissions.remove(index);
        }
        Ok(())
    }

    async fn describe_security_groups(
        &self,
        names: &[String],
    ) -> Result<Vec<SecurityGroup>, CloudError> {
        self.injected_failure()?;
        let state = self.inner.state.read().map_err(|_| CloudError::LockPoisoned)?;
        // Unlike autoscaling, an unknown security group name is an error.
        names
            .iter()
            .map(|name| {
                state
                    .security_groups
                    .iter()
                    .find(|g| &g.name == name)
                    .cloned()
                    .ok_or_else(|| CloudError::GroupNotFound(name.clone()))
            })
            .collect()
    }
}

fn find_security_group<'a>(
    state: &'a mut CloudState,
    name: &str,
) -> Result<&'a mut SecurityGroup, CloudError> {
    state
        .security_groups
        .iter_mut()
        .find(|g| g.name == name)
        .ok_or_else(|| CloudError::GroupNotFound(name.to_string()))
}

fn same_slot(a: &IngressRule, b: &IngressRule) -> bool {
    a.protocol == b.protocol && a.matches_range(b.from_port, b.to_port)
}

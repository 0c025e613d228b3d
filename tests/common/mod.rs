//! Common test utilities shared across integration tests.

use ringside::{InMemoryCloud, MembershipCoordinator, SidecarConfig, YamlLoader};
use std::sync::Arc;
use std::time::Duration;

pub const RING: &str = "cass_prod-useast1a";
pub const ACL: &str = "cass_prod";

/// A full configuration with a seeded in-memory cloud.
pub const SAMPLE_CONFIG: &str = r#"
process_name: cassandra
ring_name: cass_prod-useast1a
rac: us-east-1a
racs: [us-east-1a, us-east-1b, us-east-1c]
acl_group_name: cass_prod
dc: us-east-1
health:
  timer: { interval_ms: 50 }
audit:
  timer: { interval_ms: 50 }
scheduler:
  tick_ms: 10
  shutdown_timeout_secs: 5
api:
  enabled: false
cloud:
  type: memory
  groups:
    - name: cass_prod-useast1a
      min_size: 3
      max_size: 6
      desired_capacity: 3
      instances:
        - { instance_id: i-1, lifecycle_state: InService }
        - { instance_id: i-2, lifecycle_state: InService }
        - { instance_id: i-3, lifecycle_state: Terminating }
  security_groups:
    - name: cass_prod
      permissions:
        - { from_port: 7000, to_port: 7001, cidrs: [10.0.0.1/32] }
"#;

pub fn sample_config() -> SidecarConfig {
    YamlLoader::parse(SAMPLE_CONFIG).unwrap()
}

/// Cloud seeded from the sample config, kept for inspection.
pub fn sample_cloud() -> InMemoryCloud {
    match sample_config().cloud {
        ringside::config::CloudConfig::Memory {
            groups,
            security_groups,
        } => InMemoryCloud::from_parts(groups, security_groups),
    }
}

pub fn coordinator(cloud: &InMemoryCloud) -> Arc<MembershipCoordinator> {
    Arc::new(MembershipCoordinator::new(
        sample_config().membership_settings(),
        Arc::new(cloud.clone()),
    ))
}

/// Poll `condition` every 10ms until it holds.
///
/// # Panics
///
/// Panics if the timeout is reached first.
pub async fn wait_until(what: &str, timeout: Duration, condition: impl Fn() -> bool) {
    let start = tokio::time::Instant::now();
    while !condition() {
        if start.elapsed() > timeout {
            panic!("Timeout waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

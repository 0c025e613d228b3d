//! Membership and ACL maintenance against a config-seeded cloud.

use ringside::{CloudError, IngressRule, MembershipError};
use std::collections::BTreeSet;

use crate::common::{ACL, RING, coordinator, sample_cloud};

fn set(cidrs: &[&str]) -> BTreeSet<String> {
    cidrs.iter().map(|c| c.to_string()).collect()
}

#[tokio::test]
async fn test_membership_from_config() {
    let cloud = sample_cloud();
    let coordinator = coordinator(&cloud);

    let members = coordinator.membership().await.unwrap();
    assert_eq!(members, vec!["i-1".to_string(), "i-2".to_string()]);
    assert_eq!(coordinator.membership_capacity().await.unwrap(), 6);
    assert_eq!(coordinator.zone_count(), 3);
    assert_eq!(cloud.open_clients(), 0);
}

#[tokio::test]
async fn test_acl_sync_cycle() {
    let cloud = sample_cloud();
    let coordinator = coordinator(&cloud);

    // Seeded peer plus two new nodes, one of which is already allowed.
    coordinator
        .add_ingress(["10.0.0.1/32", "10.0.0.2/32", "10.0.0.3/32"], 7000, 7001)
        .await
        .unwrap();
    assert_eq!(
        coordinator.list_ingress(7000, 7001).await.unwrap(),
        set(&["10.0.0.1/32", "10.0.0.2/32", "10.0.0.3/32"])
    );

    // A node leaves; removing it twice is still fine.
    coordinator.remove_ingress(["10.0.0.2/32"], 7000, 7001).await.unwrap();
    coordinator.remove_ingress(["10.0.0.2/32"], 7000, 7001).await.unwrap();
    assert_eq!(
        coordinator.list_ingress(7000, 7001).await.unwrap(),
        set(&["10.0.0.1/32", "10.0.0.3/32"])
    );

    let group = cloud.security_group(ACL).unwrap();
    assert_eq!(
        group.permissions,
        vec![IngressRule::tcp(["10.0.0.1/32", "10.0.0.3/32"], 7000, 7001)]
    );
    assert_eq!(cloud.open_clients(), 0);
}

#[tokio::test]
async fn test_ranges_are_independent() {
    let cloud = sample_cloud();
    let coordinator = coordinator(&cloud);

    coordinator.add_ingress(["10.0.0.5/32"], 9042, 9042).await.unwrap();

    assert_eq!(
        coordinator.list_ingress(9042, 9042).await.unwrap(),
        set(&["10.0.0.5/32"])
    );
    assert_eq!(
        coordinator.list_ingress(7000, 7001).await.unwrap(),
        set(&["10.0.0.1/32"])
    );
}

#[tokio::test]
async fn test_expand_ring() {
    let cloud = sample_cloud();
    let coordinator = coordinator(&cloud);

    coordinator.expand_by(2).await.unwrap();

    let group = cloud.group(RING).unwrap();
    assert_eq!(group.min_size, 5);
    assert_eq!(group.max_size, 8);
    assert_eq!(group.desired_capacity, 5);
    assert_eq!(coordinator.membership_capacity().await.unwrap(), 8);
}

#[tokio::test]
async fn test_cloud_failure_still_releases_client() {
    let cloud = sample_cloud();
    let coordinator = coordinator(&cloud);
    cloud.fail_next_call(CloudError::Api {
        code: "Throttling".into(),
        message: "Rate exceeded".into(),
    });

    let err = coordinator
        .add_ingress(["10.0.0.7/32"], 7000, 7001)
        .await
        .unwrap_err();

    assert!(matches!(err, MembershipError::Cloud(CloudError::Api { .. })));
    assert_eq!(cloud.open_clients(), 0);
    assert_eq!(
        coordinator.list_ingress(7000, 7001).await.unwrap(),
        set(&["10.0.0.1/32"])
    );
}

#[tokio::test]
async fn test_release_failure_does_not_mask_result() {
    let cloud = sample_cloud();
    cloud.fail_releases(true);
    let coordinator = coordinator(&cloud);

    let members = coordinator.membership().await.unwrap();
    assert_eq!(members.len(), 2);
}

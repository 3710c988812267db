//! Network and subnet reconciliation against the fake cloud.

use std::sync::Arc;

use capo_infra::client::CloudError;
use capo_infra::controller::naming::OWNER_TAG;
use capo_infra::controller::{Error, reconcile_network, reconcile_subnet};
use capo_infra::crd::{LoadBalancer, Network, Subnet};
use capo_infra::metrics::Metrics;

use crate::common::fixtures::{CLUSTER, ClusterBuilder};
use crate::{FakeCloud, context};

const NETWORK_NAME: &str = "k8s-clusterapi-cluster-demo";

#[tokio::test]
async fn test_creates_and_tags_network_and_subnet() {
    let ctx = context(FakeCloud::new());
    let mut cluster = ClusterBuilder::new()
        .dns_nameservers(&["8.8.8.8"])
        .build();

    reconcile_network(&ctx, CLUSTER, &mut cluster).await.unwrap();
    reconcile_subnet(&ctx, CLUSTER, &mut cluster).await.unwrap();

    let network = cluster.status.network.as_ref().unwrap();
    assert_eq!(network.name, NETWORK_NAME);
    let subnet = network.subnet.as_ref().unwrap();
    assert_eq!(subnet.name, NETWORK_NAME);
    assert_eq!(subnet.cidr, "10.6.0.0/24");

    assert_eq!(
        ctx.client.mutations(),
        vec![
            format!("create_network {}", NETWORK_NAME),
            format!("replace_all_tags networks/{}", network.id),
            format!("create_subnet {}", NETWORK_NAME),
            format!("replace_all_tags subnets/{}", subnet.id),
        ]
    );

    let state = ctx.client.state();
    let tags = vec![OWNER_TAG.to_string(), CLUSTER.to_string()];
    assert_eq!(state.networks[0].tags, tags);
    assert_eq!(state.subnets[0].tags, tags);
}

#[tokio::test]
async fn test_adopts_tagged_network_and_subnet_without_mutation() {
    let cloud = FakeCloud::new();
    let network_id = cloud.seed_network(NETWORK_NAME, &[OWNER_TAG, CLUSTER]);
    let subnet_id = cloud.seed_subnet(&network_id, NETWORK_NAME, "10.6.0.0/24");
    cloud.state().subnets[0].tags = vec![CLUSTER.to_string(), OWNER_TAG.to_string()];
    let ctx = context(cloud);
    let mut cluster = ClusterBuilder::new().build();

    reconcile_network(&ctx, CLUSTER, &mut cluster).await.unwrap();
    reconcile_subnet(&ctx, CLUSTER, &mut cluster).await.unwrap();

    assert!(ctx.client.mutations().is_empty());
    let network = cluster.status.network.unwrap();
    assert_eq!(network.id, network_id);
    assert_eq!(network.subnet.unwrap().id, subnet_id);
}

#[tokio::test]
async fn test_adopted_untagged_subnet_is_tagged_once() {
    let cloud = FakeCloud::new();
    let network_id = cloud.seed_network(NETWORK_NAME, &[OWNER_TAG, CLUSTER]);
    let subnet_id = cloud.seed_subnet(&network_id, "operator-subnet", "10.6.0.0/24");
    let ctx = context(cloud);
    let mut cluster = ClusterBuilder::new().build();

    reconcile_network(&ctx, CLUSTER, &mut cluster).await.unwrap();
    reconcile_subnet(&ctx, CLUSTER, &mut cluster).await.unwrap();
    assert_eq!(
        ctx.client.mutations(),
        vec![format!("replace_all_tags subnets/{}", subnet_id)]
    );

    ctx.client.take_calls();
    reconcile_subnet(&ctx, CLUSTER, &mut cluster).await.unwrap();
    assert!(ctx.client.mutations().is_empty());
}

#[tokio::test]
async fn test_ambiguous_subnet_is_an_error_without_side_effects() {
    let cloud = FakeCloud::new();
    let network_id = cloud.seed_network(NETWORK_NAME, &[OWNER_TAG, CLUSTER]);
    cloud.seed_subnet(&network_id, "a", "10.6.0.0/24");
    cloud.seed_subnet(&network_id, "b", "10.6.0.0/24");
    let metrics = Arc::new(Metrics::new());
    let ctx = context(cloud).with_metrics(metrics.clone());
    let mut cluster = ClusterBuilder::new().build();

    reconcile_network(&ctx, CLUSTER, &mut cluster).await.unwrap();
    let err = reconcile_subnet(&ctx, CLUSTER, &mut cluster).await.unwrap_err();

    match &err {
        Error::Ambiguous { count, .. } => assert_eq!(*count, 2),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!err.is_retryable());
    assert_eq!(ctx.client.count("create_subnet"), 0);
    assert_eq!(ctx.client.count("replace_all_tags"), 0);
    assert!(cluster.status.network.unwrap().subnet.is_none());
    assert!(
        metrics
            .encode()
            .contains(r#"capo_reconcile_errors_total{kind="subnet"} 1"#)
    );
}

#[tokio::test]
async fn test_subnet_with_other_cidr_is_ignored() {
    let cloud = FakeCloud::new();
    let network_id = cloud.seed_network(NETWORK_NAME, &[OWNER_TAG, CLUSTER]);
    cloud.seed_subnet(&network_id, "old", "10.5.0.0/24");
    let ctx = context(cloud);
    let mut cluster = ClusterBuilder::new().node_cidr("10.6.0.0/24").build();

    reconcile_network(&ctx, CLUSTER, &mut cluster).await.unwrap();
    reconcile_subnet(&ctx, CLUSTER, &mut cluster).await.unwrap();

    assert_eq!(ctx.client.count("create_subnet"), 1);
    assert_eq!(ctx.client.state().subnets.len(), 2);
}

#[tokio::test]
async fn test_subnet_skipped_without_network() {
    let ctx = context(FakeCloud::new());
    let mut cluster = ClusterBuilder::new().build();

    reconcile_subnet(&ctx, CLUSTER, &mut cluster).await.unwrap();

    assert!(ctx.client.calls().is_empty());
    assert!(cluster.status.network.is_none());
}

#[tokio::test]
async fn test_ambiguous_network_is_an_error() {
    let cloud = FakeCloud::new();
    cloud.seed_network(NETWORK_NAME, &[]);
    cloud.seed_network(NETWORK_NAME, &[]);
    let ctx = context(cloud);
    let mut cluster = ClusterBuilder::new().build();

    let err = reconcile_network(&ctx, CLUSTER, &mut cluster).await.unwrap_err();

    assert!(matches!(err, Error::Ambiguous { count: 2, .. }));
    assert_eq!(ctx.client.count("create_network"), 0);
}

#[tokio::test]
async fn test_readopting_same_network_keeps_recorded_children() {
    let cloud = FakeCloud::new();
    let network_id = cloud.seed_network(NETWORK_NAME, &[OWNER_TAG, CLUSTER]);
    let ctx = context(cloud);
    let mut cluster = ClusterBuilder::new().build();
    let subnet = Subnet {
        name: NETWORK_NAME.to_string(),
        id: "subnet-9".to_string(),
        cidr: "10.6.0.0/24".to_string(),
    };
    let lb = LoadBalancer {
        name: "lb".to_string(),
        id: "lb-9".to_string(),
        ip: "203.0.113.10".to_string(),
        internal_ip: "10.6.0.10".to_string(),
    };
    cluster.status.network = Some(Network {
        name: NETWORK_NAME.to_string(),
        id: network_id,
        subnet: Some(subnet.clone()),
        router: None,
        api_server_load_balancer: Some(lb.clone()),
    });

    reconcile_network(&ctx, CLUSTER, &mut cluster).await.unwrap();

    let network = cluster.status.network.unwrap();
    assert_eq!(network.subnet, Some(subnet));
    assert_eq!(network.api_server_load_balancer, Some(lb));
}

#[tokio::test]
async fn test_network_replaced_in_status_when_id_changes() {
    let cloud = FakeCloud::new();
    let network_id = cloud.seed_network(NETWORK_NAME, &[OWNER_TAG, CLUSTER]);
    let ctx = context(cloud);
    let mut cluster = ClusterBuilder::new().build();
    cluster.status.network = Some(Network {
        name: NETWORK_NAME.to_string(),
        id: "net-gone".to_string(),
        subnet: Some(Subnet::default()),
        ..Default::default()
    });

    reconcile_network(&ctx, CLUSTER, &mut cluster).await.unwrap();

    let network = cluster.status.network.unwrap();
    assert_eq!(network.id, network_id);
    assert!(network.subnet.is_none());
}

#[tokio::test]
async fn test_create_failure_is_wrapped_with_operation() {
    let cloud = FakeCloud::new();
    cloud.fail_next(
        "create_network",
        CloudError::Transport("connection reset".to_string()),
    );
    let ctx = context(cloud);
    let mut cluster = ClusterBuilder::new().build();

    let err = reconcile_network(&ctx, CLUSTER, &mut cluster).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        format!(
            "create network {}: transport error: connection reset",
            NETWORK_NAME
        )
    );
    assert!(err.is_retryable());
    assert!(cluster.status.network.is_none());

    // The next pass starts over and succeeds
    reconcile_network(&ctx, CLUSTER, &mut cluster).await.unwrap();
    assert!(cluster.status.network.is_some());
}

#[tokio::test]
async fn test_adopted_network_keeps_foreign_tags() {
    let cloud = FakeCloud::new();
    let network_id = cloud.seed_network(NETWORK_NAME, &["team-a"]);
    let ctx = context(cloud);
    let mut cluster = ClusterBuilder::new().build();

    reconcile_network(&ctx, CLUSTER, &mut cluster).await.unwrap();

    assert!(ctx.client.mutations().is_empty());
    assert_eq!(ctx.client.state().networks[0].tags, vec!["team-a".to_string()]);
    assert_eq!(cluster.status.network.unwrap().id, network_id);
}

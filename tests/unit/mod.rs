// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Unit tests for capo-infra.
//!
//! These tests run without any cloud and test individual components in
//! isolation.

mod crd_tests {
    use capo_infra::crd::{OpenStackCluster, OpenStackClusterSpec, SecurityGroupRule};

    #[test]
    fn test_cluster_from_json() {
        let cluster: OpenStackCluster = serde_json::from_value(serde_json::json!({
            "spec": {
                "nodeCidr": "10.8.0.0/24",
                "dnsNameservers": ["8.8.8.8", "1.1.1.1"],
                "managedSecurityGroups": true,
                "externalNetworkId": "ext-net",
                "apiServerLoadBalancerFloatingIp": "203.0.113.10",
                "apiServerLoadBalancerPort": 6443,
                "apiServerLoadBalancerAdditionalPorts": [22],
                "useOctavia": true
            }
        }))
        .unwrap();

        assert_eq!(cluster.spec.node_cidr, "10.8.0.0/24");
        assert_eq!(cluster.spec.dns_nameservers.len(), 2);
        assert!(cluster.spec.load_balancer_enabled());
        assert_eq!(cluster.spec.load_balancer_ports(), vec![6443, 22]);
        assert!(cluster.status.network.is_none());
    }

    #[test]
    fn test_load_balancer_needs_external_network() {
        let spec = OpenStackClusterSpec {
            api_server_load_balancer_floating_ip: Some("203.0.113.10".to_string()),
            api_server_load_balancer_port: Some(6443),
            ..Default::default()
        };
        assert!(!spec.load_balancer_enabled());
        // Ports are still known, they are just not acted upon
        assert_eq!(spec.primary_port(), Some(6443));
    }

    #[test]
    fn test_status_round_trip_keeps_field_names() {
        let json = serde_json::json!({
            "network": {
                "name": "k8s-clusterapi-cluster-demo",
                "id": "net-1",
                "subnet": {"name": "k8s-clusterapi-cluster-demo", "id": "subnet-1", "cidr": "10.6.0.0/24"},
                "apiServerLoadBalancer": {
                    "name": "k8s-clusterapi-cluster-demo-kubeapi",
                    "id": "lb-1",
                    "ip": "203.0.113.10",
                    "internalIP": "10.6.0.10"
                }
            },
            "controlPlaneSecurityGroup": {
                "name": "k8s-cluster-demo-secgroup-controlplane",
                "id": "sg-1",
                "rules": [{
                    "id": "rule-1",
                    "direction": "ingress",
                    "etherType": "IPv4",
                    "securityGroupID": "sg-1",
                    "portRangeMin": 443,
                    "portRangeMax": 443,
                    "protocol": "tcp",
                    "remoteIPPrefix": "0.0.0.0/0"
                }]
            }
        });

        let cluster: OpenStackCluster =
            serde_json::from_value(serde_json::json!({ "status": json.clone() })).unwrap();
        let lb = cluster
            .status
            .network
            .as_ref()
            .unwrap()
            .api_server_load_balancer
            .as_ref()
            .unwrap();
        assert_eq!(lb.internal_ip, "10.6.0.10");
        let rule: &SecurityGroupRule =
            &cluster.status.control_plane_security_group.as_ref().unwrap().rules[0];
        assert_eq!(rule.remote_ip_prefix.as_deref(), Some("0.0.0.0/0"));
        assert!(rule.remote_group_id.is_none());

        assert_eq!(serde_json::to_value(&cluster.status).unwrap(), json);
    }

    #[test]
    fn test_schema_lists_spec_and_status() {
        let schema = schemars::schema_for!(OpenStackCluster);
        let value = serde_json::to_value(&schema).unwrap();
        let properties = value["properties"].as_object().unwrap();
        assert!(properties.contains_key("spec"));
        assert!(properties.contains_key("status"));
    }
}

mod config_tests {
    use std::time::Duration;

    use capo_infra::ReconcilerConfig;
    use capo_infra::controller::Backoff;

    #[test]
    fn test_defaults() {
        let config = ReconcilerConfig::default();
        assert_eq!(config.network_name("demo"), "k8s-clusterapi-cluster-demo");
        assert_eq!(
            config.load_balancer_name("demo"),
            "k8s-clusterapi-cluster-demo-kubeapi"
        );
        assert_eq!(config.backoff, Backoff::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: ReconcilerConfig =
            serde_json::from_str(r#"{"networkPrefix": "capo"}"#).unwrap();
        assert_eq!(config.network_name("demo"), "capo-cluster-demo");
        assert_eq!(config.load_balancer_name("demo"), "capo-cluster-demo-kubeapi");
        assert_eq!(config.backoff.attempts(), 10);
    }

    #[test]
    fn test_backoff_from_config() {
        let config: ReconcilerConfig = serde_json::from_value(serde_json::json!({
            "kubeapiLbSuffix": "api",
            "backoff": {
                "steps": 5,
                "duration": {"secs": 2, "nanos": 0},
                "factor": 2.0,
                "jitter": 0.0,
                "cap": {"secs": 10, "nanos": 0}
            }
        }))
        .unwrap();

        assert_eq!(config.load_balancer_name("demo"), "k8s-clusterapi-cluster-demo-api");
        let backoff = &config.backoff;
        assert_eq!(backoff.attempts(), 5);
        assert_eq!(backoff.delay(0), Duration::from_secs(2));
        assert_eq!(backoff.delay(1), Duration::from_secs(4));
        assert_eq!(backoff.delay(3), Duration::from_secs(10));
    }

    #[test]
    fn test_shrinking_factor_is_constant() {
        let backoff = Backoff::new(3, Duration::from_secs(30)).with_factor(0.5);
        assert_eq!(backoff.base_delay(0), Duration::from_secs(30));
        assert_eq!(backoff.base_delay(2), Duration::from_secs(30));
    }
}

mod security_group_definition_tests {
    use capo_infra::controller::match_groups;
    use capo_infra::controller::security_groups::{control_plane_group, global_group};
    use capo_infra::crd::{Direction, RemoteGroup, SecurityGroup};

    #[test]
    fn test_control_plane_group_rules() {
        let group = control_plane_group("demo");
        assert_eq!(group.name, "k8s-cluster-demo-secgroup-controlplane");
        assert_eq!(group.rules.len(), 4);

        let ports: Vec<(Option<u16>, Option<u16>)> = group
            .rules
            .iter()
            .filter(|r| r.direction == Direction::Ingress)
            .map(|r| (r.port_range_min, r.port_range_max))
            .collect();
        assert_eq!(ports, vec![(Some(443), Some(443)), (Some(22), Some(22))]);
    }

    #[test]
    fn test_global_group_references_itself() {
        let group = global_group("demo");
        assert_eq!(group.name, "k8s-cluster-demo-secgroup-all");
        assert_eq!(group.rules.len(), 5);

        let ingress: Vec<_> = group
            .rules
            .iter()
            .filter(|r| r.direction == Direction::Ingress)
            .collect();
        assert_eq!(ingress.len(), 3);
        assert!(ingress.iter().all(|r| r.remote_group == Some(RemoteGroup::SelfGroup)));
        let icmp = ingress
            .iter()
            .find(|r| r.protocol.as_deref() == Some("icmp"))
            .unwrap();
        assert!(icmp.port_range_min.is_none());
    }

    #[test]
    fn test_empty_group_does_not_match() {
        let observed = SecurityGroup {
            name: "k8s-cluster-demo-secgroup-all".to_string(),
            id: "sg-1".to_string(),
            rules: Vec::new(),
        };
        assert!(!match_groups(&global_group("demo"), &observed));
    }

    #[test]
    fn test_self_reference_must_point_at_observed_group() {
        let spec = global_group("demo");
        let observed = SecurityGroup {
            name: spec.name.clone(),
            id: "sg-1".to_string(),
            // Rules built for a different group id
            rules: spec.rules.iter().map(|r| r.resolve("sg-2")).collect(),
        };
        assert!(!match_groups(&spec, &observed));

        let observed = SecurityGroup {
            rules: spec.rules.iter().map(|r| r.resolve("sg-1")).collect(),
            ..observed
        };
        assert!(match_groups(&spec, &observed));
    }
}

mod error_tests {
    use std::time::Duration;

    use capo_infra::Error;
    use capo_infra::client::{CloudError, ResourceKind};

    #[test]
    fn test_backend_error_classification() {
        let conflict = CloudError::Api {
            status: 409,
            message: "immutable".to_string(),
        };
        assert!(conflict.is_transient());
        assert!(!conflict.is_not_found());

        let gone = CloudError::Api {
            status: 404,
            message: "gone".to_string(),
        };
        assert!(gone.is_not_found());
        assert!(!gone.is_transient());

        assert!(!CloudError::Unsupported("cascade".to_string()).is_transient());
        assert!(
            !CloudError::Api {
                status: 400,
                message: "bad request".to_string()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_requeue_follows_retryability() {
        let transient = Error::cloud("create pool")(CloudError::Api {
            status: 503,
            message: "unavailable".to_string(),
        });
        assert_eq!(transient.requeue_after(), Duration::from_secs(30));

        let precondition = Error::PreconditionMissing("subnet".to_string());
        assert!(!precondition.is_retryable());
        assert_eq!(precondition.requeue_after(), Duration::from_secs(3600));
    }

    #[test]
    fn test_error_keeps_source() {
        use std::error::Error as _;

        let err = Error::cloud("delete listener l-1")(CloudError::NotFound {
            kind: ResourceKind::Listener,
            id: "l-1".to_string(),
        });
        assert_eq!(err.source().unwrap().to_string(), "listener l-1 not found");
    }
}

mod metrics_tests {
    use capo_infra::Metrics;
    use capo_infra::client::ResourceKind;

    #[test]
    fn test_encode_has_help_and_type() {
        let metrics = Metrics::new();
        metrics.record_error(ResourceKind::FloatingIp);

        let encoded = metrics.encode();
        assert!(encoded.contains("# HELP capo_reconcile_errors"));
        assert!(encoded.contains("# TYPE capo_reconcile_errors counter"));
        assert!(encoded.contains(r#"capo_reconcile_errors_total{kind="floating_ip"} 1"#));
        assert!(encoded.ends_with("# EOF\n"));
    }
}

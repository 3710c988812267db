//! OpenStackCluster spec and status value types.
//!
//! The spec carries the network topology the reconcilers converge towards.
//! The status records the identifiers and addresses observed in the cloud
//! after each pass. Both are owned by the calling controller; the
//! reconcilers only read the spec and write the status.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A cluster as seen by the infrastructure reconcilers.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenStackCluster {
    /// Desired infrastructure.
    #[serde(default)]
    pub spec: OpenStackClusterSpec,

    /// Observed infrastructure.
    #[serde(default)]
    pub status: OpenStackClusterStatus,
}

impl OpenStackCluster {
    /// Create a cluster with the given spec and an empty status.
    pub fn new(spec: OpenStackClusterSpec) -> Self {
        Self {
            spec,
            status: OpenStackClusterStatus::default(),
        }
    }
}

/// Desired network topology for a cluster.
///
/// Example:
/// ```yaml
/// spec:
///   nodeCidr: 10.6.0.0/24
///   dnsNameservers: ["8.8.8.8"]
///   managedSecurityGroups: true
///   externalNetworkId: 1b5ea2a7-...
///   apiServerLoadBalancerFloatingIp: 203.0.113.10
///   apiServerLoadBalancerPort: 6443
///   apiServerLoadBalancerAdditionalPorts: [22]
///   useOctavia: true
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenStackClusterSpec {
    /// CIDR of the cluster subnet.
    #[serde(default = "default_node_cidr")]
    pub node_cidr: String,

    /// DNS nameservers handed out on the cluster subnet.
    #[serde(default)]
    pub dns_nameservers: Vec<String>,

    /// Create and converge the control plane and global security groups.
    #[serde(default)]
    pub managed_security_groups: bool,

    /// Create the cluster network with port security disabled.
    #[serde(default)]
    pub disable_port_security: bool,

    /// External network the API server floating IP is allocated from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_network_id: Option<String>,

    /// Floating IP address fronting the API server load balancer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_load_balancer_floating_ip: Option<String>,

    /// Primary API server port exposed by the load balancer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_load_balancer_port: Option<u16>,

    /// Extra ports exposed by the load balancer next to the primary one.
    #[serde(default)]
    pub api_server_load_balancer_additional_ports: Vec<u16>,

    /// The load balancer service supports cascading delete (Octavia).
    #[serde(default)]
    pub use_octavia: bool,
}

impl Default for OpenStackClusterSpec {
    fn default() -> Self {
        Self {
            node_cidr: default_node_cidr(),
            dns_nameservers: Vec::new(),
            managed_security_groups: false,
            disable_port_security: false,
            external_network_id: None,
            api_server_load_balancer_floating_ip: None,
            api_server_load_balancer_port: None,
            api_server_load_balancer_additional_ports: Vec::new(),
            use_octavia: false,
        }
    }
}

fn default_node_cidr() -> String {
    "10.6.0.0/24".to_string()
}

impl OpenStackClusterSpec {
    /// Whether the API server load balancer has everything it needs to be
    /// provisioned. Load balancing is opt-in per cluster.
    pub fn load_balancer_enabled(&self) -> bool {
        non_empty(self.external_network_id.as_deref()).is_some()
            && non_empty(self.api_server_load_balancer_floating_ip.as_deref()).is_some()
            && self.primary_port().is_some()
    }

    /// The primary API server port, ignoring an explicit zero.
    pub fn primary_port(&self) -> Option<u16> {
        self.api_server_load_balancer_port.filter(|p| *p != 0)
    }

    /// All load balancer ports: the primary one first, then the additional
    /// ones in configured order.
    pub fn load_balancer_ports(&self) -> Vec<u16> {
        self.primary_port()
            .into_iter()
            .chain(self.api_server_load_balancer_additional_ports.iter().copied())
            .collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Observed infrastructure, written back for the owning controller.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OpenStackClusterStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Network>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_security_group: Option<SecurityGroup>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_security_group: Option<SecurityGroup>,
}

/// The cluster network and the resources hanging off it.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Network {
    pub name: String,
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<Subnet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router: Option<Router>,

    /// Only set when load balancing is enabled for the cluster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_server_load_balancer: Option<LoadBalancer>,
}

/// The cluster subnet.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub name: String,
    pub id: String,
    pub cidr: String,
}

/// A router attached to the cluster network.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Router {
    pub name: String,
    pub id: String,
}

/// The API server load balancer.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancer {
    pub name: String,
    pub id: String,
    /// Floating address clients reach the API server on.
    pub ip: String,
    /// VIP address inside the cluster subnet.
    #[serde(rename = "internalIP")]
    pub internal_ip: String,
}

/// An observed security group.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroup {
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub rules: Vec<SecurityGroupRule>,
}

/// Traffic direction of a security group rule.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ingress,
    Egress,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Ingress => write!(f, "ingress"),
            Direction::Egress => write!(f, "egress"),
        }
    }
}

/// IP family of a security group rule.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum EtherType {
    IPv4,
    IPv6,
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EtherType::IPv4 => write!(f, "IPv4"),
            EtherType::IPv6 => write!(f, "IPv6"),
        }
    }
}

/// An observed security group rule.
///
/// `id` and `security_group_id` are assigned by the cloud and take no part
/// in [`SecurityGroupRule::matches`].
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupRule {
    #[serde(default)]
    pub id: String,
    pub direction: Direction,
    pub ether_type: EtherType,
    #[serde(default, rename = "securityGroupID")]
    pub security_group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range_min: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range_max: Option<u16>,
    /// `None` matches any protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, rename = "remoteGroupID", skip_serializing_if = "Option::is_none")]
    pub remote_group_id: Option<String>,
    #[serde(default, rename = "remoteIPPrefix", skip_serializing_if = "Option::is_none")]
    pub remote_ip_prefix: Option<String>,
}

impl SecurityGroupRule {
    /// Whether two rules describe the same traffic, ignoring cloud-assigned
    /// identifiers.
    pub fn matches(&self, other: &SecurityGroupRule) -> bool {
        self.direction == other.direction
            && self.ether_type == other.ether_type
            && self.port_range_min == other.port_range_min
            && self.port_range_max == other.port_range_max
            && self.protocol == other.protocol
            && self.remote_group_id == other.remote_group_id
            && self.remote_ip_prefix == other.remote_ip_prefix
    }
}

/// Source of traffic for a desired rule.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RemoteGroup {
    /// The group the rule belongs to.
    SelfGroup,
    /// Another group, by id.
    Id(String),
}

impl RemoteGroup {
    /// Resolve to a concrete group id given the id of the owning group.
    pub fn resolve(&self, own_group_id: &str) -> String {
        match self {
            RemoteGroup::SelfGroup => own_group_id.to_string(),
            RemoteGroup::Id(id) => id.clone(),
        }
    }
}

/// A desired security group rule.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupRuleSpec {
    pub direction: Direction,
    pub ether_type: EtherType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range_min: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_range_max: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_group: Option<RemoteGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_ip_prefix: Option<String>,
}

impl SecurityGroupRuleSpec {
    /// Ingress rule for a single protocol over a port range.
    pub fn ingress(protocol: &str, port_range: Option<(u16, u16)>) -> Self {
        Self {
            direction: Direction::Ingress,
            ether_type: EtherType::IPv4,
            port_range_min: port_range.map(|(min, _)| min),
            port_range_max: port_range.map(|(_, max)| max),
            protocol: Some(protocol.to_string()),
            remote_group: None,
            remote_ip_prefix: None,
        }
    }

    /// Unrestricted egress for one IP family.
    pub fn egress_any(ether_type: EtherType) -> Self {
        Self {
            direction: Direction::Egress,
            ether_type,
            port_range_min: None,
            port_range_max: None,
            protocol: None,
            remote_group: None,
            remote_ip_prefix: None,
        }
    }

    /// Restrict the rule to sources in the given prefix.
    pub fn from_prefix(mut self, prefix: &str) -> Self {
        self.remote_ip_prefix = Some(prefix.to_string());
        self
    }

    /// Restrict the rule to sources in the given group.
    pub fn from_group(mut self, group: RemoteGroup) -> Self {
        self.remote_group = Some(group);
        self
    }

    /// Turn the desired rule into the concrete rule it would become inside
    /// the group with id `group_id`.
    pub fn resolve(&self, group_id: &str) -> SecurityGroupRule {
        SecurityGroupRule {
            id: String::new(),
            direction: self.direction,
            ether_type: self.ether_type,
            security_group_id: group_id.to_string(),
            port_range_min: self.port_range_min,
            port_range_max: self.port_range_max,
            protocol: self.protocol.clone(),
            remote_group_id: self.remote_group.as_ref().map(|g| g.resolve(group_id)),
            remote_ip_prefix: self.remote_ip_prefix.clone(),
        }
    }
}

/// A desired security group.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecurityGroupSpec {
    pub name: String,
    pub rules: Vec<SecurityGroupRuleSpec>,
}

/// The machine a load balancer membership operation is about.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MachineRef {
    pub name: String,
    #[serde(default)]
    pub control_plane: bool,
}

impl MachineRef {
    pub fn control_plane(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            control_plane: true,
        }
    }

    pub fn worker(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            control_plane: false,
        }
    }
}

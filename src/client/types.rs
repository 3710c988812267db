//! Records and request options exchanged with the networking backend.
//!
//! Records mirror what Neutron and Octavia return; options mirror what they
//! accept. Every list call takes a filter whose unset fields do not
//! constrain the result.

use std::fmt;

use crate::crd::{Direction, EtherType};

/// Kinds of cloud resources the reconcilers manage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Network,
    Subnet,
    SecurityGroup,
    SecurityGroupRule,
    LoadBalancer,
    Listener,
    Pool,
    Monitor,
    Member,
    FloatingIp,
}

impl ResourceKind {
    /// Stable lowercase name used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Network => "network",
            ResourceKind::Subnet => "subnet",
            ResourceKind::SecurityGroup => "security_group",
            ResourceKind::SecurityGroupRule => "security_group_rule",
            ResourceKind::LoadBalancer => "load_balancer",
            ResourceKind::Listener => "listener",
            ResourceKind::Pool => "pool",
            ResourceKind::Monitor => "monitor",
            ResourceKind::Member => "member",
            ResourceKind::FloatingIp => "floating_ip",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource collections that carry Neutron tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaggedCollection {
    Networks,
    Subnets,
    FloatingIps,
}

impl TaggedCollection {
    /// URL segment of the collection.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaggedCollection::Networks => "networks",
            TaggedCollection::Subnets => "subnets",
            TaggedCollection::FloatingIps => "floatingips",
        }
    }
}

impl fmt::Display for TaggedCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a load-balancer-family object.
///
/// See <https://docs.openstack.org/api-ref/load-balancer/v2/#provisioning-status-codes>.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProvisioningStatus {
    Active,
    PendingCreate,
    PendingUpdate,
    PendingDelete,
    Deleted,
    Error,
    Other(String),
}

impl ProvisioningStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "ACTIVE" => ProvisioningStatus::Active,
            "PENDING_CREATE" => ProvisioningStatus::PendingCreate,
            "PENDING_UPDATE" => ProvisioningStatus::PendingUpdate,
            "PENDING_DELETE" => ProvisioningStatus::PendingDelete,
            "DELETED" => ProvisioningStatus::Deleted,
            "ERROR" => ProvisioningStatus::Error,
            other => ProvisioningStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ProvisioningStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisioningStatus::Active => write!(f, "ACTIVE"),
            ProvisioningStatus::PendingCreate => write!(f, "PENDING_CREATE"),
            ProvisioningStatus::PendingUpdate => write!(f, "PENDING_UPDATE"),
            ProvisioningStatus::PendingDelete => write!(f, "PENDING_DELETE"),
            ProvisioningStatus::Deleted => write!(f, "DELETED"),
            ProvisioningStatus::Error => write!(f, "ERROR"),
            ProvisioningStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Status of a floating IP.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FloatingIpStatus {
    Active,
    Down,
    Error,
    Other(String),
}

impl FloatingIpStatus {
    pub fn parse(value: &str) -> Self {
        match value {
            "ACTIVE" => FloatingIpStatus::Active,
            "DOWN" => FloatingIpStatus::Down,
            "ERROR" => FloatingIpStatus::Error,
            other => FloatingIpStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FloatingIpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FloatingIpStatus::Active => write!(f, "ACTIVE"),
            FloatingIpStatus::Down => write!(f, "DOWN"),
            FloatingIpStatus::Error => write!(f, "ERROR"),
            FloatingIpStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

// ============================================================================
// Networking (Neutron)
// ============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkRecord {
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NetworkFilter {
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkCreateOpts {
    pub name: String,
    pub admin_state_up: bool,
    pub port_security_enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubnetRecord {
    pub id: String,
    pub name: String,
    pub network_id: String,
    pub cidr: String,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubnetFilter {
    pub network_id: Option<String>,
    pub cidr: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubnetCreateOpts {
    pub network_id: String,
    pub name: String,
    pub ip_version: u8,
    pub cidr: String,
    pub dns_nameservers: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityGroupRecord {
    pub id: String,
    pub name: String,
    pub rules: Vec<SecurityGroupRuleRecord>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SecurityGroupFilter {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityGroupCreateOpts {
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityGroupRuleRecord {
    pub id: String,
    pub security_group_id: String,
    pub direction: Direction,
    pub ether_type: EtherType,
    pub port_range_min: Option<u16>,
    pub port_range_max: Option<u16>,
    pub protocol: Option<String>,
    pub remote_group_id: Option<String>,
    pub remote_ip_prefix: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SecurityGroupRuleCreateOpts {
    pub security_group_id: String,
    pub direction: Direction,
    pub ether_type: EtherType,
    pub port_range_min: Option<u16>,
    pub port_range_max: Option<u16>,
    pub protocol: Option<String>,
    pub remote_group_id: Option<String>,
    pub remote_ip_prefix: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FloatingIpRecord {
    pub id: String,
    pub floating_ip: String,
    pub floating_network_id: String,
    pub status: FloatingIpStatus,
    pub port_id: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FloatingIpFilter {
    pub floating_ip: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FloatingIpCreateOpts {
    pub floating_ip: String,
    pub floating_network_id: String,
}

// ============================================================================
// Load balancing (Octavia)
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadBalancerRecord {
    pub id: String,
    pub name: String,
    pub provisioning_status: ProvisioningStatus,
    pub vip_subnet_id: String,
    pub vip_port_id: String,
    pub vip_address: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadBalancerFilter {
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadBalancerCreateOpts {
    pub name: String,
    pub vip_subnet_id: String,
}

/// Listener records expose no provisioning status the reconcilers rely on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListenerRecord {
    pub id: String,
    pub name: String,
    pub load_balancer_id: String,
    pub protocol_port: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListenerFilter {
    pub name: Option<String>,
    pub load_balancer_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerCreateOpts {
    pub name: String,
    pub protocol: LbProtocol,
    pub protocol_port: u16,
    pub load_balancer_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LbProtocol {
    Tcp,
}

impl fmt::Display for LbProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LbProtocol::Tcp => write!(f, "TCP"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LbMethod {
    RoundRobin,
}

impl fmt::Display for LbMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LbMethod::RoundRobin => write!(f, "ROUND_ROBIN"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolRecord {
    pub id: String,
    pub name: String,
    pub listener_id: Option<String>,
    pub load_balancer_id: String,
    /// Health monitor attached to the pool, if any.
    pub monitor_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolFilter {
    pub name: Option<String>,
    pub load_balancer_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolCreateOpts {
    pub name: String,
    pub protocol: LbProtocol,
    pub lb_method: LbMethod,
    pub listener_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitorRecord {
    pub id: String,
    pub name: String,
    pub pool_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MonitorFilter {
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorCreateOpts {
    pub name: String,
    pub pool_id: String,
    pub monitor_type: LbProtocol,
    /// Seconds between probes.
    pub delay: u32,
    /// Seconds a probe may take.
    pub timeout: u32,
    pub max_retries: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemberRecord {
    pub id: String,
    pub name: String,
    pub address: String,
    pub protocol_port: u16,
    pub subnet_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemberFilter {
    pub name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberCreateOpts {
    pub name: String,
    pub address: String,
    pub protocol_port: u16,
    pub subnet_id: String,
}

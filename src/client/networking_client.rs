//! The networking backend seam.
//!
//! `NetworkingClient` is implemented by the calling controller on top of its
//! authenticated cloud session. The reconcilers only ever talk to the cloud
//! through it, which keeps session handling out of this crate and lets the
//! tests substitute an in-memory cloud.

use std::future::Future;

use thiserror::Error;

use super::types::*;

/// Errors reported by a networking backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CloudError {
    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("operation not supported: {0}")]
    Unsupported(String),
}

impl CloudError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound { .. } | CloudError::Api { status: 404, .. })
    }

    /// Server-side or connectivity failures that may clear up on their own.
    pub fn is_transient(&self) -> bool {
        match self {
            CloudError::Api { status, .. } => *status >= 500 || *status == 429 || *status == 409,
            CloudError::Transport(_) => true,
            CloudError::NotFound { .. } | CloudError::Unsupported(_) => false,
        }
    }
}

/// Result type for backend calls.
pub type CloudResult<T> = std::result::Result<T, CloudError>;

/// Operations the reconcilers need from Neutron and Octavia.
///
/// List calls return every object matching the filter (all pages); an empty
/// list is the not-found signal. Get calls fail with
/// [`CloudError::NotFound`] when the id is unknown.
pub trait NetworkingClient: Send + Sync {
    // --- networks -----------------------------------------------------------

    fn list_networks(
        &self,
        filter: &NetworkFilter,
    ) -> impl Future<Output = CloudResult<Vec<NetworkRecord>>> + Send;

    fn create_network(
        &self,
        opts: &NetworkCreateOpts,
    ) -> impl Future<Output = CloudResult<NetworkRecord>> + Send;

    /// Replace every tag on a Neutron object.
    fn replace_all_tags(
        &self,
        collection: TaggedCollection,
        id: &str,
        tags: &[String],
    ) -> impl Future<Output = CloudResult<Vec<String>>> + Send;

    // --- subnets ------------------------------------------------------------

    fn list_subnets(
        &self,
        filter: &SubnetFilter,
    ) -> impl Future<Output = CloudResult<Vec<SubnetRecord>>> + Send;

    fn create_subnet(
        &self,
        opts: &SubnetCreateOpts,
    ) -> impl Future<Output = CloudResult<SubnetRecord>> + Send;

    // --- security groups ----------------------------------------------------

    fn list_security_groups(
        &self,
        filter: &SecurityGroupFilter,
    ) -> impl Future<Output = CloudResult<Vec<SecurityGroupRecord>>> + Send;

    fn create_security_group(
        &self,
        opts: &SecurityGroupCreateOpts,
    ) -> impl Future<Output = CloudResult<SecurityGroupRecord>> + Send;

    fn delete_security_group(&self, id: &str) -> impl Future<Output = CloudResult<()>> + Send;

    fn create_security_group_rule(
        &self,
        opts: &SecurityGroupRuleCreateOpts,
    ) -> impl Future<Output = CloudResult<SecurityGroupRuleRecord>> + Send;

    fn delete_security_group_rule(&self, id: &str)
    -> impl Future<Output = CloudResult<()>> + Send;

    // --- floating IPs -------------------------------------------------------

    fn list_floating_ips(
        &self,
        filter: &FloatingIpFilter,
    ) -> impl Future<Output = CloudResult<Vec<FloatingIpRecord>>> + Send;

    fn get_floating_ip(&self, id: &str)
    -> impl Future<Output = CloudResult<FloatingIpRecord>> + Send;

    fn create_floating_ip(
        &self,
        opts: &FloatingIpCreateOpts,
    ) -> impl Future<Output = CloudResult<FloatingIpRecord>> + Send;

    /// Associate the floating IP with a port.
    fn update_floating_ip(
        &self,
        id: &str,
        port_id: &str,
    ) -> impl Future<Output = CloudResult<FloatingIpRecord>> + Send;

    fn delete_floating_ip(&self, id: &str) -> impl Future<Output = CloudResult<()>> + Send;

    // --- load balancers -----------------------------------------------------

    fn list_load_balancers(
        &self,
        filter: &LoadBalancerFilter,
    ) -> impl Future<Output = CloudResult<Vec<LoadBalancerRecord>>> + Send;

    fn get_load_balancer(
        &self,
        id: &str,
    ) -> impl Future<Output = CloudResult<LoadBalancerRecord>> + Send;

    fn create_load_balancer(
        &self,
        opts: &LoadBalancerCreateOpts,
    ) -> impl Future<Output = CloudResult<LoadBalancerRecord>> + Send;

    /// Delete a load balancer. With `cascade` the backend removes every
    /// listener, pool, monitor and member as well; backends without that
    /// capability answer [`CloudError::Unsupported`].
    fn delete_load_balancer(
        &self,
        id: &str,
        cascade: bool,
    ) -> impl Future<Output = CloudResult<()>> + Send;

    // --- listeners ----------------------------------------------------------

    fn list_listeners(
        &self,
        filter: &ListenerFilter,
    ) -> impl Future<Output = CloudResult<Vec<ListenerRecord>>> + Send;

    fn get_listener(&self, id: &str) -> impl Future<Output = CloudResult<ListenerRecord>> + Send;

    fn create_listener(
        &self,
        opts: &ListenerCreateOpts,
    ) -> impl Future<Output = CloudResult<ListenerRecord>> + Send;

    fn delete_listener(&self, id: &str) -> impl Future<Output = CloudResult<()>> + Send;

    // --- pools --------------------------------------------------------------

    fn list_pools(
        &self,
        filter: &PoolFilter,
    ) -> impl Future<Output = CloudResult<Vec<PoolRecord>>> + Send;

    fn create_pool(
        &self,
        opts: &PoolCreateOpts,
    ) -> impl Future<Output = CloudResult<PoolRecord>> + Send;

    fn delete_pool(&self, id: &str) -> impl Future<Output = CloudResult<()>> + Send;

    // --- health monitors ----------------------------------------------------

    fn list_monitors(
        &self,
        filter: &MonitorFilter,
    ) -> impl Future<Output = CloudResult<Vec<MonitorRecord>>> + Send;

    fn create_monitor(
        &self,
        opts: &MonitorCreateOpts,
    ) -> impl Future<Output = CloudResult<MonitorRecord>> + Send;

    fn delete_monitor(&self, id: &str) -> impl Future<Output = CloudResult<()>> + Send;

    // --- pool members -------------------------------------------------------

    fn list_members(
        &self,
        pool_id: &str,
        filter: &MemberFilter,
    ) -> impl Future<Output = CloudResult<Vec<MemberRecord>>> + Send;

    fn create_member(
        &self,
        pool_id: &str,
        opts: &MemberCreateOpts,
    ) -> impl Future<Output = CloudResult<MemberRecord>> + Send;

    fn delete_member(
        &self,
        pool_id: &str,
        member_id: &str,
    ) -> impl Future<Output = CloudResult<()>> + Send;
}

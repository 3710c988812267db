//! Read-only lookups of remote state.
//!
//! Each lookup answers "does this object exist" for one collection. No
//! match is `Ok(None)`; more than one match is [`Error::Ambiguous`] since
//! names are deterministic and duplicates mean someone raced us.

use tracing::debug;

use crate::client::*;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};

/// Reduce a lookup result to at most one item.
pub fn expect_unique<T>(kind: ResourceKind, filter: &str, mut items: Vec<T>) -> Result<Option<T>> {
    match items.len() {
        0 => {
            debug!(%kind, filter, "No matching resource");
            Ok(None)
        }
        1 => Ok(items.pop()),
        count => Err(Error::Ambiguous {
            kind,
            filter: filter.to_string(),
            count,
        }),
    }
}

pub async fn find_network<C: NetworkingClient>(
    ctx: &Context<C>,
    name: &str,
) -> Result<Option<NetworkRecord>> {
    let filter = NetworkFilter {
        name: Some(name.to_string()),
    };
    let networks = ctx
        .client
        .list_networks(&filter)
        .await
        .map_err(Error::cloud(format!("list networks named {}", name)))?;
    expect_unique(ResourceKind::Network, &format!("name={}", name), networks)
}

pub async fn find_subnet<C: NetworkingClient>(
    ctx: &Context<C>,
    network_id: &str,
    cidr: &str,
) -> Result<Option<SubnetRecord>> {
    let filter = SubnetFilter {
        network_id: Some(network_id.to_string()),
        cidr: Some(cidr.to_string()),
    };
    let subnets = ctx
        .client
        .list_subnets(&filter)
        .await
        .map_err(Error::cloud(format!("list subnets of network {}", network_id)))?;
    expect_unique(
        ResourceKind::Subnet,
        &format!("network={} cidr={}", network_id, cidr),
        subnets,
    )
}

pub async fn find_security_group<C: NetworkingClient>(
    ctx: &Context<C>,
    name: &str,
) -> Result<Option<SecurityGroupRecord>> {
    let filter = SecurityGroupFilter {
        id: None,
        name: Some(name.to_string()),
    };
    let groups = ctx
        .client
        .list_security_groups(&filter)
        .await
        .map_err(Error::cloud(format!("list security groups named {}", name)))?;
    expect_unique(ResourceKind::SecurityGroup, &format!("name={}", name), groups)
}

pub async fn find_security_group_by_id<C: NetworkingClient>(
    ctx: &Context<C>,
    id: &str,
) -> Result<Option<SecurityGroupRecord>> {
    let filter = SecurityGroupFilter {
        id: Some(id.to_string()),
        name: None,
    };
    let groups = ctx
        .client
        .list_security_groups(&filter)
        .await
        .map_err(Error::cloud(format!("list security groups with id {}", id)))?;
    expect_unique(ResourceKind::SecurityGroup, &format!("id={}", id), groups)
}

pub async fn find_load_balancer<C: NetworkingClient>(
    ctx: &Context<C>,
    name: &str,
) -> Result<Option<LoadBalancerRecord>> {
    let filter = LoadBalancerFilter {
        name: Some(name.to_string()),
    };
    let lbs = ctx
        .client
        .list_load_balancers(&filter)
        .await
        .map_err(Error::cloud(format!("list load balancers named {}", name)))?;
    expect_unique(ResourceKind::LoadBalancer, &format!("name={}", name), lbs)
}

pub async fn find_floating_ip<C: NetworkingClient>(
    ctx: &Context<C>,
    address: &str,
) -> Result<Option<FloatingIpRecord>> {
    let filter = FloatingIpFilter {
        floating_ip: Some(address.to_string()),
    };
    let fips = ctx
        .client
        .list_floating_ips(&filter)
        .await
        .map_err(Error::cloud(format!("list floating IPs with address {}", address)))?;
    expect_unique(ResourceKind::FloatingIp, &format!("address={}", address), fips)
}

pub async fn find_listener<C: NetworkingClient>(
    ctx: &Context<C>,
    name: &str,
    load_balancer_id: &str,
) -> Result<Option<ListenerRecord>> {
    let filter = ListenerFilter {
        name: Some(name.to_string()),
        load_balancer_id: Some(load_balancer_id.to_string()),
    };
    let listeners = ctx
        .client
        .list_listeners(&filter)
        .await
        .map_err(Error::cloud(format!("list listeners named {}", name)))?;
    expect_unique(ResourceKind::Listener, &format!("name={}", name), listeners)
}

pub async fn find_pool<C: NetworkingClient>(
    ctx: &Context<C>,
    name: &str,
) -> Result<Option<PoolRecord>> {
    let filter = PoolFilter {
        name: Some(name.to_string()),
        load_balancer_id: None,
    };
    let pools = ctx
        .client
        .list_pools(&filter)
        .await
        .map_err(Error::cloud(format!("list pools named {}", name)))?;
    expect_unique(ResourceKind::Pool, &format!("name={}", name), pools)
}

pub async fn find_monitor<C: NetworkingClient>(
    ctx: &Context<C>,
    name: &str,
) -> Result<Option<MonitorRecord>> {
    let filter = MonitorFilter {
        name: Some(name.to_string()),
    };
    let monitors = ctx
        .client
        .list_monitors(&filter)
        .await
        .map_err(Error::cloud(format!("list monitors named {}", name)))?;
    expect_unique(ResourceKind::Monitor, &format!("name={}", name), monitors)
}

pub async fn find_member<C: NetworkingClient>(
    ctx: &Context<C>,
    pool_id: &str,
    name: &str,
) -> Result<Option<MemberRecord>> {
    let filter = MemberFilter {
        name: Some(name.to_string()),
    };
    let members = ctx
        .client
        .list_members(pool_id, &filter)
        .await
        .map_err(Error::cloud(format!("list members of pool {}", pool_id)))?;
    expect_unique(
        ResourceKind::Member,
        &format!("pool={} name={}", pool_id, name),
        members,
    )
}

//! Destructive operations run when a cluster or control plane node goes
//! away.
//!
//! Load balancer children must be removed before their parents: members and
//! monitors before pools, pools before listeners, listeners before the load
//! balancer. Backends with cascading delete do this themselves.

use tracing::{debug, info, instrument, warn};

use crate::client::*;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::naming;
use crate::controller::probe;
use crate::controller::wait::wait_for_load_balancer;
use crate::crd::{MachineRef, OpenStackCluster, SecurityGroup};
use crate::metrics::MutationAction;

/// Delete the API server load balancer with all its children, and release
/// the floating IP if this cluster allocated it.
#[instrument(skip(ctx, cluster))]
pub async fn delete_load_balancer<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    cluster: &mut OpenStackCluster,
) -> Result<()> {
    remove_load_balancer(ctx, cluster_name, cluster)
        .await
        .inspect_err(|_| ctx.record_error(ResourceKind::LoadBalancer))
}

async fn remove_load_balancer<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    cluster: &mut OpenStackCluster,
) -> Result<()> {
    let lb_name = ctx.config.load_balancer_name(cluster_name);

    match probe::find_load_balancer(ctx, &lb_name).await? {
        Some(lb) if cluster.spec.use_octavia => {
            info!(load_balancer = %lb_name, id = %lb.id, "Deleting load balancer with cascade");
            match ctx.client.delete_load_balancer(&lb.id, true).await {
                Ok(()) => {
                    ctx.record_mutation(ResourceKind::LoadBalancer, MutationAction::Delete);
                }
                Err(CloudError::Unsupported(reason)) => {
                    warn!(
                        load_balancer = %lb_name,
                        %reason,
                        "Cascading delete unsupported, deleting children one by one"
                    );
                    delete_load_balancer_manually(ctx, &lb).await?;
                }
                Err(e) => {
                    return Err(Error::cloud(format!("delete load balancer {}", lb_name))(e));
                }
            }
        }
        Some(lb) => delete_load_balancer_manually(ctx, &lb).await?,
        None => {
            debug!(load_balancer = %lb_name, "Load balancer already gone");
        }
    }

    release_floating_ip(ctx, cluster_name, cluster).await?;

    if let Some(network) = cluster.status.network.as_mut() {
        network.api_server_load_balancer = None;
    }
    Ok(())
}

async fn delete_load_balancer_manually<C: NetworkingClient>(
    ctx: &Context<C>,
    lb: &LoadBalancerRecord,
) -> Result<()> {
    let listeners = ctx
        .client
        .list_listeners(&ListenerFilter {
            name: None,
            load_balancer_id: Some(lb.id.clone()),
        })
        .await
        .map_err(Error::cloud(format!("list listeners of load balancer {}", lb.id)))?;
    let pools = ctx
        .client
        .list_pools(&PoolFilter {
            name: None,
            load_balancer_id: Some(lb.id.clone()),
        })
        .await
        .map_err(Error::cloud(format!("list pools of load balancer {}", lb.id)))?;

    // Empty every pool before deleting any of them
    for pool in &pools {
        if let Some(monitor_id) = &pool.monitor_id {
            info!(monitor = %monitor_id, pool = %pool.name, "Deleting health monitor");
            ctx.client
                .delete_monitor(monitor_id)
                .await
                .map_err(Error::cloud(format!("delete monitor {}", monitor_id)))?;
            ctx.record_mutation(ResourceKind::Monitor, MutationAction::Delete);
            wait_for_load_balancer(ctx, &lb.id).await?;
        }

        let members = ctx
            .client
            .list_members(&pool.id, &MemberFilter::default())
            .await
            .map_err(Error::cloud(format!("list members of pool {}", pool.id)))?;
        for member in members {
            info!(member = %member.name, id = %member.id, "Deleting member");
            ctx.client
                .delete_member(&pool.id, &member.id)
                .await
                .map_err(Error::cloud(format!(
                    "delete member {} of pool {}",
                    member.id, pool.id
                )))?;
            ctx.record_mutation(ResourceKind::Member, MutationAction::Delete);
            wait_for_load_balancer(ctx, &lb.id).await?;
        }
    }

    for pool in &pools {
        info!(pool = %pool.name, id = %pool.id, "Deleting pool");
        ctx.client
            .delete_pool(&pool.id)
            .await
            .map_err(Error::cloud(format!("delete pool {}", pool.id)))?;
        ctx.record_mutation(ResourceKind::Pool, MutationAction::Delete);
        wait_for_load_balancer(ctx, &lb.id).await?;
    }

    for listener in &listeners {
        info!(listener = %listener.name, id = %listener.id, "Deleting listener");
        ctx.client
            .delete_listener(&listener.id)
            .await
            .map_err(Error::cloud(format!("delete listener {}", listener.id)))?;
        ctx.record_mutation(ResourceKind::Listener, MutationAction::Delete);
        wait_for_load_balancer(ctx, &lb.id).await?;
    }

    info!(load_balancer = %lb.name, id = %lb.id, "Deleting load balancer");
    ctx.client
        .delete_load_balancer(&lb.id, false)
        .await
        .map_err(Error::cloud(format!("delete load balancer {}", lb.id)))?;
    ctx.record_mutation(ResourceKind::LoadBalancer, MutationAction::Delete);
    Ok(())
}

/// Delete the configured floating IP only when it carries this cluster's
/// ownership tags.
async fn release_floating_ip<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    cluster: &OpenStackCluster,
) -> Result<()> {
    let Some(address) = cluster
        .spec
        .api_server_load_balancer_floating_ip
        .as_deref()
        .filter(|a| !a.is_empty())
    else {
        return Ok(());
    };

    let Some(fip) = probe::find_floating_ip(ctx, address).await? else {
        return Ok(());
    };

    if !naming::is_owned_by(&fip.tags, cluster_name) {
        debug!(floating_ip = %address, "Floating IP not allocated by this cluster, keeping it");
        return Ok(());
    }

    info!(floating_ip = %address, id = %fip.id, "Releasing floating IP");
    ctx.client
        .delete_floating_ip(&fip.id)
        .await
        .map_err(Error::cloud(format!("delete floating IP {}", address)))?;
    ctx.record_mutation(ResourceKind::FloatingIp, MutationAction::Delete);
    Ok(())
}

/// Remove a control plane node from every pool.
///
/// Missing pools and members are skipped, so this can run on a partially
/// built load balancer.
#[instrument(skip(ctx, machine, cluster), fields(machine = %machine.name))]
pub async fn delete_load_balancer_member<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    machine: &MachineRef,
    cluster: &OpenStackCluster,
) -> Result<()> {
    remove_member(ctx, cluster_name, machine, cluster)
        .await
        .inspect_err(|_| ctx.record_error(ResourceKind::Member))
}

async fn remove_member<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    machine: &MachineRef,
    cluster: &OpenStackCluster,
) -> Result<()> {
    if !machine.control_plane {
        return Ok(());
    }

    let Some(lb) = cluster
        .status
        .network
        .as_ref()
        .and_then(|n| n.api_server_load_balancer.as_ref())
    else {
        debug!("No load balancer recorded, nothing to remove");
        return Ok(());
    };

    let lb_name = ctx.config.load_balancer_name(cluster_name);

    for port in cluster.spec.load_balancer_ports() {
        let pool_name = naming::port_objects_name(&lb_name, port);
        let member_name = naming::member_name(&pool_name, &machine.name);

        let Some(pool) = probe::find_pool(ctx, &pool_name).await? else {
            debug!(pool = %pool_name, "Pool does not exist");
            continue;
        };

        let Some(member) = probe::find_member(ctx, &pool.id, &member_name).await? else {
            continue;
        };

        wait_for_load_balancer(ctx, &lb.id).await?;
        info!(member = %member_name, id = %member.id, "Deleting member");
        ctx.client
            .delete_member(&pool.id, &member.id)
            .await
            .map_err(Error::cloud(format!("delete member {}", member_name)))?;
        ctx.record_mutation(ResourceKind::Member, MutationAction::Delete);
        wait_for_load_balancer(ctx, &lb.id).await?;
    }

    Ok(())
}

/// Delete a security group if it still exists.
#[instrument(skip(ctx, group), fields(group = %group.name, id = %group.id))]
pub async fn delete_security_group<C: NetworkingClient>(
    ctx: &Context<C>,
    group: &SecurityGroup,
) -> Result<()> {
    remove_security_group(ctx, group)
        .await
        .inspect_err(|_| ctx.record_error(ResourceKind::SecurityGroup))
}

async fn remove_security_group<C: NetworkingClient>(
    ctx: &Context<C>,
    group: &SecurityGroup,
) -> Result<()> {
    if probe::find_security_group_by_id(ctx, &group.id).await?.is_none() {
        debug!("Security group already gone");
        return Ok(());
    }

    ctx.client
        .delete_security_group(&group.id)
        .await
        .map_err(Error::cloud(format!("delete security group {}", group.name)))?;
    ctx.record_mutation(ResourceKind::SecurityGroup, MutationAction::Delete);
    info!("Deleted security group");
    Ok(())
}

/// Delete the security groups recorded for the cluster and forget them.
#[instrument(skip(ctx, cluster))]
pub async fn delete_security_groups<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster: &mut OpenStackCluster,
) -> Result<()> {
    if let Some(group) = cluster.status.control_plane_security_group.as_ref() {
        delete_security_group(ctx, group).await?;
        cluster.status.control_plane_security_group = None;
    }
    if let Some(group) = cluster.status.global_security_group.as_ref() {
        delete_security_group(ctx, group).await?;
        cluster.status.global_security_group = None;
    }
    Ok(())
}

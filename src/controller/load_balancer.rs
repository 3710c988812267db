//! API server load balancer orchestration.
//!
//! The load balancer fronts the control plane. Every configured port gets
//! its own listener, pool and health monitor, all sharing one name, and
//! every control plane node is a member of each pool. The backend refuses
//! mutations while the load balancer is not ACTIVE, so each mutation is
//! bracketed by waits.

use tracing::{debug, info, instrument, warn};

use crate::client::*;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::naming;
use crate::controller::network::ensure_tags;
use crate::controller::probe;
use crate::controller::wait::{wait_for_floating_ip, wait_for_listener, wait_for_load_balancer};
use crate::crd::{LoadBalancer, MachineRef, OpenStackCluster};
use crate::metrics::MutationAction;

/// Health monitor settings applied to every pool.
const MONITOR_DELAY_SECS: u32 = 30;
const MONITOR_TIMEOUT_SECS: u32 = 5;
const MONITOR_MAX_RETRIES: u32 = 3;

/// Ensure the API server load balancer and everything hanging off it.
///
/// Skipped unless the cluster has an external network, a floating IP and a
/// primary port configured. Requires the cluster subnet to be recorded.
#[instrument(skip(ctx, cluster))]
pub async fn reconcile_load_balancer<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    cluster: &mut OpenStackCluster,
) -> Result<()> {
    ensure_load_balancer(ctx, cluster_name, cluster)
        .await
        .inspect_err(|_| ctx.record_error(ResourceKind::LoadBalancer))
}

async fn ensure_load_balancer<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    cluster: &mut OpenStackCluster,
) -> Result<()> {
    if !cluster.spec.load_balancer_enabled() {
        debug!("Load balancer not configured, skipping");
        return Ok(());
    }

    let subnet_id = cluster
        .status
        .network
        .as_ref()
        .and_then(|n| n.subnet.as_ref())
        .map(|s| s.id.clone())
        .ok_or_else(|| {
            Error::PreconditionMissing("network subnet is not yet recorded in status".to_string())
        })?;

    let lb_name = ctx.config.load_balancer_name(cluster_name);
    info!(load_balancer = %lb_name, "Reconciling load balancer");

    let lb = match probe::find_load_balancer(ctx, &lb_name).await? {
        Some(existing) => {
            debug!(load_balancer = %lb_name, id = %existing.id, "Reusing existing load balancer");
            existing
        }
        None => {
            let opts = LoadBalancerCreateOpts {
                name: lb_name.clone(),
                vip_subnet_id: subnet_id,
            };
            let created = ctx
                .client
                .create_load_balancer(&opts)
                .await
                .map_err(Error::cloud(format!("create load balancer {}", lb_name)))?;
            ctx.record_mutation(ResourceKind::LoadBalancer, MutationAction::Create);
            info!(load_balancer = %lb_name, id = %created.id, "Created load balancer");
            created
        }
    };
    wait_for_load_balancer(ctx, &lb.id).await?;

    let floating_ip = ensure_floating_ip(ctx, cluster_name, cluster, &lb).await?;

    for port in cluster.spec.load_balancer_ports() {
        ensure_port_objects(ctx, &lb, &lb_name, port).await?;
    }

    if let Some(network) = cluster.status.network.as_mut() {
        network.api_server_load_balancer = Some(LoadBalancer {
            name: lb.name,
            id: lb.id,
            ip: floating_ip.floating_ip,
            internal_ip: lb.vip_address,
        });
    }

    Ok(())
}

async fn ensure_floating_ip<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    cluster: &OpenStackCluster,
    lb: &LoadBalancerRecord,
) -> Result<FloatingIpRecord> {
    let (Some(address), Some(external_network_id)) = (
        cluster.spec.api_server_load_balancer_floating_ip.as_deref(),
        cluster.spec.external_network_id.as_deref(),
    ) else {
        return Err(Error::PreconditionMissing(
            "floating IP and external network must be configured".to_string(),
        ));
    };

    let fip = match probe::find_floating_ip(ctx, address).await? {
        Some(existing) => {
            debug!(floating_ip = %address, id = %existing.id, "Reusing existing floating IP");
            existing
        }
        None => {
            let opts = FloatingIpCreateOpts {
                floating_ip: address.to_string(),
                floating_network_id: external_network_id.to_string(),
            };
            let created = ctx
                .client
                .create_floating_ip(&opts)
                .await
                .map_err(Error::cloud(format!("create floating IP {}", address)))?;
            ctx.record_mutation(ResourceKind::FloatingIp, MutationAction::Create);
            info!(floating_ip = %address, id = %created.id, "Created floating IP");

            // Only addresses we allocated carry ownership tags, so teardown
            // can tell them apart from operator supplied ones. An untagged
            // allocation would be adopted as foreign on the next pass.
            if let Err(err) = ensure_tags(
                ctx,
                TaggedCollection::FloatingIps,
                ResourceKind::FloatingIp,
                &created.id,
                &created.tags,
                cluster_name,
            )
            .await
            {
                warn!(
                    floating_ip = %address,
                    id = %created.id,
                    error = %err,
                    "Tagging failed, releasing floating IP"
                );
                ctx.client
                    .delete_floating_ip(&created.id)
                    .await
                    .map_err(Error::cloud(format!("release untagged floating IP {}", address)))?;
                ctx.record_mutation(ResourceKind::FloatingIp, MutationAction::Delete);
                return Err(err);
            }
            created
        }
    };

    let fip = if fip.port_id.as_deref() == Some(lb.vip_port_id.as_str()) {
        debug!(floating_ip = %address, port = %lb.vip_port_id, "Floating IP already associated");
        fip
    } else {
        let updated = ctx
            .client
            .update_floating_ip(&fip.id, &lb.vip_port_id)
            .await
            .map_err(Error::cloud(format!("associate floating IP {}", address)))?;
        ctx.record_mutation(ResourceKind::FloatingIp, MutationAction::Update);
        info!(floating_ip = %address, port = %lb.vip_port_id, "Associated floating IP");
        updated
    };

    wait_for_floating_ip(ctx, &fip.id).await?;
    Ok(fip)
}

/// Listener, pool and monitor for one port.
async fn ensure_port_objects<C: NetworkingClient>(
    ctx: &Context<C>,
    lb: &LoadBalancerRecord,
    lb_name: &str,
    port: u16,
) -> Result<()> {
    let name = naming::port_objects_name(lb_name, port);

    let listener = match probe::find_listener(ctx, &name, &lb.id).await? {
        Some(existing) => existing,
        None => {
            wait_for_load_balancer(ctx, &lb.id).await?;
            let opts = ListenerCreateOpts {
                name: name.clone(),
                protocol: LbProtocol::Tcp,
                protocol_port: port,
                load_balancer_id: lb.id.clone(),
            };
            let created = ctx
                .client
                .create_listener(&opts)
                .await
                .map_err(Error::cloud(format!("create listener {}", name)))?;
            ctx.record_mutation(ResourceKind::Listener, MutationAction::Create);
            info!(listener = %name, id = %created.id, port, "Created listener");
            wait_for_load_balancer(ctx, &lb.id).await?;
            wait_for_listener(ctx, &created.id).await?;
            created
        }
    };

    let pool = match probe::find_pool(ctx, &name).await? {
        Some(existing) => existing,
        None => {
            wait_for_load_balancer(ctx, &lb.id).await?;
            let opts = PoolCreateOpts {
                name: name.clone(),
                protocol: LbProtocol::Tcp,
                lb_method: LbMethod::RoundRobin,
                listener_id: listener.id.clone(),
            };
            let created = ctx
                .client
                .create_pool(&opts)
                .await
                .map_err(Error::cloud(format!("create pool {}", name)))?;
            ctx.record_mutation(ResourceKind::Pool, MutationAction::Create);
            info!(pool = %name, id = %created.id, "Created pool");
            wait_for_load_balancer(ctx, &lb.id).await?;
            created
        }
    };

    if probe::find_monitor(ctx, &name).await?.is_none() {
        wait_for_load_balancer(ctx, &lb.id).await?;
        let opts = MonitorCreateOpts {
            name: name.clone(),
            pool_id: pool.id.clone(),
            monitor_type: LbProtocol::Tcp,
            delay: MONITOR_DELAY_SECS,
            timeout: MONITOR_TIMEOUT_SECS,
            max_retries: MONITOR_MAX_RETRIES,
        };
        let created = ctx
            .client
            .create_monitor(&opts)
            .await
            .map_err(Error::cloud(format!("create monitor {}", name)))?;
        ctx.record_mutation(ResourceKind::Monitor, MutationAction::Create);
        info!(monitor = %name, id = %created.id, "Created health monitor");
        wait_for_load_balancer(ctx, &lb.id).await?;
    }

    Ok(())
}

/// Ensure a control plane node is a member of every pool at `ip`.
///
/// A member whose address changed is deleted and created again; members
/// are never updated in place.
#[instrument(skip(ctx, machine, cluster), fields(machine = %machine.name))]
pub async fn reconcile_load_balancer_member<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    machine: &MachineRef,
    cluster: &OpenStackCluster,
    ip: &str,
) -> Result<()> {
    ensure_member(ctx, cluster_name, machine, cluster, ip)
        .await
        .inspect_err(|_| ctx.record_error(ResourceKind::Member))
}

async fn ensure_member<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    machine: &MachineRef,
    cluster: &OpenStackCluster,
    ip: &str,
) -> Result<()> {
    if !machine.control_plane {
        return Ok(());
    }

    let network = cluster.status.network.as_ref().ok_or_else(|| {
        Error::PreconditionMissing("network is not yet recorded in status".to_string())
    })?;
    let subnet = network.subnet.as_ref().ok_or_else(|| {
        Error::PreconditionMissing("network subnet is not yet recorded in status".to_string())
    })?;
    let lb = network.api_server_load_balancer.as_ref().ok_or_else(|| {
        Error::PreconditionMissing(
            "API server load balancer is not yet recorded in status".to_string(),
        )
    })?;
    if cluster.spec.primary_port().is_none() {
        return Err(Error::PreconditionMissing(
            "API server load balancer port is not configured".to_string(),
        ));
    }

    let lb_name = ctx.config.load_balancer_name(cluster_name);
    info!(load_balancer = %lb_name, member = %machine.name, "Reconciling load balancer member");

    for port in cluster.spec.load_balancer_ports() {
        let pool_name = naming::port_objects_name(&lb_name, port);
        let member_name = naming::member_name(&pool_name, &machine.name);

        let pool = probe::find_pool(ctx, &pool_name)
            .await?
            .ok_or_else(|| {
                Error::PreconditionMissing(format!("pool {} does not exist yet", pool_name))
            })?;

        if let Some(member) = probe::find_member(ctx, &pool.id, &member_name).await? {
            if member.address == ip {
                debug!(member = %member_name, address = %ip, "Member is up to date");
                continue;
            }

            info!(
                member = %member_name,
                old = %member.address,
                new = %ip,
                "Member address changed, replacing it"
            );
            wait_for_load_balancer(ctx, &lb.id).await?;
            ctx.client
                .delete_member(&pool.id, &member.id)
                .await
                .map_err(Error::cloud(format!("delete member {}", member_name)))?;
            ctx.record_mutation(ResourceKind::Member, MutationAction::Delete);
            wait_for_load_balancer(ctx, &lb.id).await?;
        }

        let opts = MemberCreateOpts {
            name: member_name.clone(),
            address: ip.to_string(),
            protocol_port: port,
            subnet_id: subnet.id.clone(),
        };
        wait_for_load_balancer(ctx, &lb.id).await?;
        let created = ctx
            .client
            .create_member(&pool.id, &opts)
            .await
            .map_err(Error::cloud(format!("create member {}", member_name)))?;
        ctx.record_mutation(ResourceKind::Member, MutationAction::Create);
        info!(member = %member_name, id = %created.id, address = %ip, port, "Created member");
        wait_for_load_balancer(ctx, &lb.id).await?;
    }

    Ok(())
}

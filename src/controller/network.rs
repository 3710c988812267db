//! Cluster network and subnet reconciliation.

use tracing::{debug, info, instrument};

use crate::client::*;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::naming;
use crate::controller::probe;
use crate::crd::{Network, OpenStackCluster, Subnet};
use crate::metrics::MutationAction;

/// Ensure the cluster network exists and record it in status.
///
/// An existing network with the cluster's name is adopted as is, tags
/// included. Only a network created here gets ownership tags. When the
/// recorded network keeps its id, the subnet and load balancer recorded
/// under it are kept too.
#[instrument(skip(ctx, cluster))]
pub async fn reconcile_network<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    cluster: &mut OpenStackCluster,
) -> Result<()> {
    ensure_network(ctx, cluster_name, cluster)
        .await
        .inspect_err(|_| ctx.record_error(ResourceKind::Network))
}

async fn ensure_network<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    cluster: &mut OpenStackCluster,
) -> Result<()> {
    let name = ctx.config.network_name(cluster_name);

    let network = match probe::find_network(ctx, &name).await? {
        Some(existing) => {
            debug!(network = %name, id = %existing.id, "Reusing existing network");
            existing
        }
        None => {
            let opts = NetworkCreateOpts {
                name: name.clone(),
                admin_state_up: true,
                port_security_enabled: !cluster.spec.disable_port_security,
            };
            let created = ctx
                .client
                .create_network(&opts)
                .await
                .map_err(Error::cloud(format!("create network {}", name)))?;
            ctx.record_mutation(ResourceKind::Network, MutationAction::Create);
            info!(network = %name, id = %created.id, "Created network");

            ensure_tags(
                ctx,
                TaggedCollection::Networks,
                ResourceKind::Network,
                &created.id,
                &created.tags,
                cluster_name,
            )
            .await?;
            created
        }
    };

    match cluster.status.network.as_mut() {
        Some(recorded) if recorded.id == network.id => {
            recorded.name = network.name;
        }
        _ => {
            cluster.status.network = Some(Network {
                name: network.name,
                id: network.id,
                ..Default::default()
            });
        }
    }

    Ok(())
}

/// Ensure the cluster subnet exists inside the recorded network.
///
/// Skipped until a network is recorded. More than one subnet with the
/// cluster CIDR is an error and nothing is created or tagged.
#[instrument(skip(ctx, cluster))]
pub async fn reconcile_subnet<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    cluster: &mut OpenStackCluster,
) -> Result<()> {
    ensure_subnet(ctx, cluster_name, cluster)
        .await
        .inspect_err(|_| ctx.record_error(ResourceKind::Subnet))
}

async fn ensure_subnet<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    cluster: &mut OpenStackCluster,
) -> Result<()> {
    let Some(network_id) = cluster.status.network.as_ref().map(|n| n.id.clone()) else {
        debug!("No network recorded yet, skipping subnet");
        return Ok(());
    };

    let name = ctx.config.network_name(cluster_name);
    let cidr = cluster.spec.node_cidr.clone();

    let subnet = match probe::find_subnet(ctx, &network_id, &cidr).await? {
        Some(existing) => {
            debug!(subnet = %existing.name, id = %existing.id, "Reusing existing subnet");
            existing
        }
        None => {
            let opts = SubnetCreateOpts {
                network_id: network_id.clone(),
                name: name.clone(),
                ip_version: 4,
                cidr: cidr.clone(),
                dns_nameservers: cluster.spec.dns_nameservers.clone(),
            };
            let created = ctx
                .client
                .create_subnet(&opts)
                .await
                .map_err(Error::cloud(format!("create subnet {}", name)))?;
            ctx.record_mutation(ResourceKind::Subnet, MutationAction::Create);
            info!(subnet = %name, id = %created.id, %cidr, "Created subnet");
            created
        }
    };

    ensure_tags(
        ctx,
        TaggedCollection::Subnets,
        ResourceKind::Subnet,
        &subnet.id,
        &subnet.tags,
        cluster_name,
    )
    .await?;

    if let Some(network) = cluster.status.network.as_mut() {
        network.subnet = Some(Subnet {
            name: subnet.name,
            id: subnet.id,
            cidr: subnet.cidr,
        });
    }

    Ok(())
}

/// Replace the tags of an object with the cluster's ownership tags unless
/// it already carries exactly those.
pub(crate) async fn ensure_tags<C: NetworkingClient>(
    ctx: &Context<C>,
    collection: TaggedCollection,
    kind: ResourceKind,
    id: &str,
    current: &[String],
    cluster_name: &str,
) -> Result<()> {
    if naming::has_exact_tags(current, cluster_name) {
        return Ok(());
    }

    let tags = naming::cluster_tags(cluster_name);
    ctx.client
        .replace_all_tags(collection, id, &tags)
        .await
        .map_err(Error::cloud(format!("tag {} {}", kind, id)))?;
    ctx.record_mutation(kind, MutationAction::Tag);
    debug!(%kind, %id, "Applied ownership tags");
    Ok(())
}

//! Managed security group reconciliation.
//!
//! A cluster gets two groups: one for control plane nodes and one shared by
//! every node. Observed rules are compared to the desired ones as sets; a
//! group that differs in any way has all its rules dropped and recreated.

use tracing::{debug, info, instrument};

use crate::client::*;
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::controller::naming;
use crate::controller::probe;
use crate::crd::{
    EtherType, OpenStackCluster, RemoteGroup, SecurityGroup, SecurityGroupRule,
    SecurityGroupRuleSpec, SecurityGroupSpec,
};
use crate::metrics::MutationAction;

const ANY_IPV4: &str = "0.0.0.0/0";

/// Egress rules every managed group carries.
pub fn default_egress_rules() -> Vec<SecurityGroupRuleSpec> {
    vec![
        SecurityGroupRuleSpec::egress_any(EtherType::IPv4),
        SecurityGroupRuleSpec::egress_any(EtherType::IPv6),
    ]
}

/// HTTPS and SSH from anywhere.
pub fn control_plane_group(cluster_name: &str) -> SecurityGroupSpec {
    let mut rules = vec![
        SecurityGroupRuleSpec::ingress("tcp", Some((443, 443))).from_prefix(ANY_IPV4),
        SecurityGroupRuleSpec::ingress("tcp", Some((22, 22))).from_prefix(ANY_IPV4),
    ];
    rules.extend(default_egress_rules());
    SecurityGroupSpec {
        name: naming::control_plane_group_name(cluster_name),
        rules,
    }
}

/// All TCP, UDP and ICMP traffic between members of the group.
pub fn global_group(cluster_name: &str) -> SecurityGroupSpec {
    let mut rules = vec![
        SecurityGroupRuleSpec::ingress("tcp", Some((1, 65535))).from_group(RemoteGroup::SelfGroup),
        SecurityGroupRuleSpec::ingress("udp", Some((1, 65535))).from_group(RemoteGroup::SelfGroup),
        SecurityGroupRuleSpec::ingress("icmp", None).from_group(RemoteGroup::SelfGroup),
    ];
    rules.extend(default_egress_rules());
    SecurityGroupSpec {
        name: naming::global_group_name(cluster_name),
        rules,
    }
}

/// Whether an observed group already carries exactly the desired rules.
///
/// Rules are compared as multisets: order is irrelevant but repeats count.
/// Self references in the desired rules resolve to the observed group's id.
pub fn match_groups(desired: &SecurityGroupSpec, observed: &SecurityGroup) -> bool {
    if desired.rules.len() != observed.rules.len() {
        return false;
    }

    let resolved: Vec<SecurityGroupRule> = desired
        .rules
        .iter()
        .map(|r| r.resolve(&observed.id))
        .collect();

    // Pair every observed rule with a distinct desired one, so duplicates
    // on either side are counted
    let mut unpaired: Vec<&SecurityGroupRule> = resolved.iter().collect();
    observed.rules.iter().all(|have| {
        match unpaired.iter().position(|want| want.matches(have)) {
            Some(i) => {
                unpaired.swap_remove(i);
                true
            }
            None => false,
        }
    })
}

/// Converge the cluster's managed security groups and record them.
///
/// Does nothing unless the cluster asks for managed groups.
#[instrument(skip(ctx, cluster))]
pub async fn reconcile_security_groups<C: NetworkingClient>(
    ctx: &Context<C>,
    cluster_name: &str,
    cluster: &mut OpenStackCluster,
) -> Result<()> {
    if !cluster.spec.managed_security_groups {
        debug!("Security groups are not managed for this cluster");
        return Ok(());
    }

    let control_plane = reconcile_group(ctx, &control_plane_group(cluster_name))
        .await
        .inspect_err(|_| ctx.record_error(ResourceKind::SecurityGroup))?;
    cluster.status.control_plane_security_group = Some(control_plane);

    let global = reconcile_group(ctx, &global_group(cluster_name))
        .await
        .inspect_err(|_| ctx.record_error(ResourceKind::SecurityGroup))?;
    cluster.status.global_security_group = Some(global);

    Ok(())
}

async fn reconcile_group<C: NetworkingClient>(
    ctx: &Context<C>,
    desired: &SecurityGroupSpec,
) -> Result<SecurityGroup> {
    let Some(record) = probe::find_security_group(ctx, &desired.name).await? else {
        return create_group(ctx, desired).await;
    };

    let observed = SecurityGroup::from(record);
    if match_groups(desired, &observed) {
        debug!(group = %observed.name, id = %observed.id, "Security group is up to date");
        return Ok(observed);
    }

    info!(
        group = %observed.name,
        id = %observed.id,
        observed = observed.rules.len(),
        desired = desired.rules.len(),
        "Security group rules drifted, recreating them"
    );

    // Drop everything and start over rather than diffing rule by rule
    for rule in &observed.rules {
        ctx.client
            .delete_security_group_rule(&rule.id)
            .await
            .map_err(Error::cloud(format!(
                "delete rule {} of security group {}",
                rule.id, observed.name
            )))?;
        ctx.record_mutation(ResourceKind::SecurityGroupRule, MutationAction::Delete);
    }

    let rules = create_rules(ctx, desired, &observed.id).await?;
    Ok(SecurityGroup {
        name: observed.name,
        id: observed.id,
        rules,
    })
}

async fn create_group<C: NetworkingClient>(
    ctx: &Context<C>,
    desired: &SecurityGroupSpec,
) -> Result<SecurityGroup> {
    let opts = SecurityGroupCreateOpts {
        name: desired.name.clone(),
        description: naming::SECURITY_GROUP_DESCRIPTION.to_string(),
    };
    let created = ctx
        .client
        .create_security_group(&opts)
        .await
        .map_err(Error::cloud(format!("create security group {}", desired.name)))?;
    ctx.record_mutation(ResourceKind::SecurityGroup, MutationAction::Create);
    info!(group = %created.name, id = %created.id, "Created security group");

    let rules = create_rules(ctx, desired, &created.id).await?;
    Ok(SecurityGroup {
        name: created.name,
        id: created.id,
        rules,
    })
}

async fn create_rules<C: NetworkingClient>(
    ctx: &Context<C>,
    desired: &SecurityGroupSpec,
    group_id: &str,
) -> Result<Vec<SecurityGroupRule>> {
    let mut rules = Vec::with_capacity(desired.rules.len());
    for spec in &desired.rules {
        let rule = spec.resolve(group_id);
        let created = ctx
            .client
            .create_security_group_rule(&rule_create_opts(&rule))
            .await
            .map_err(Error::cloud(format!(
                "create {} rule in security group {}",
                rule.direction, desired.name
            )))?;
        ctx.record_mutation(ResourceKind::SecurityGroupRule, MutationAction::Create);
        rules.push(SecurityGroupRule::from(created));
    }
    debug!(group = %desired.name, count = rules.len(), "Created security group rules");
    Ok(rules)
}

fn rule_create_opts(rule: &SecurityGroupRule) -> SecurityGroupRuleCreateOpts {
    SecurityGroupRuleCreateOpts {
        security_group_id: rule.security_group_id.clone(),
        direction: rule.direction,
        ether_type: rule.ether_type,
        port_range_min: rule.port_range_min,
        port_range_max: rule.port_range_max,
        protocol: rule.protocol.clone(),
        remote_group_id: rule.remote_group_id.clone(),
        remote_ip_prefix: rule.remote_ip_prefix.clone(),
    }
}

impl From<SecurityGroupRecord> for SecurityGroup {
    fn from(record: SecurityGroupRecord) -> Self {
        Self {
            name: record.name,
            id: record.id,
            rules: record.rules.into_iter().map(SecurityGroupRule::from).collect(),
        }
    }
}

impl From<SecurityGroupRuleRecord> for SecurityGroupRule {
    fn from(record: SecurityGroupRuleRecord) -> Self {
        Self {
            id: record.id,
            direction: record.direction,
            ether_type: record.ether_type,
            security_group_id: record.security_group_id,
            port_range_min: record.port_range_min,
            port_range_max: record.port_range_max,
            protocol: record.protocol,
            remote_group_id: record.remote_group_id,
            remote_ip_prefix: record.remote_ip_prefix,
        }
    }
}

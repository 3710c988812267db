//! Deterministic resource names and ownership tags.
//!
//! Every cloud object is found again by its name, so these functions are
//! the only place names are built.

/// Tag marking objects created by this controller.
pub const OWNER_TAG: &str = "cluster-api-provider-openstack";

/// Description given to every managed security group.
pub const SECURITY_GROUP_DESCRIPTION: &str = "Cluster API managed group";

const CONTROL_PLANE_GROUP_SUFFIX: &str = "controlplane";
const GLOBAL_GROUP_SUFFIX: &str = "all";

/// `<prefix>-cluster-<cluster>`
pub fn network_name(prefix: &str, cluster_name: &str) -> String {
    format!("{}-cluster-{}", prefix, cluster_name)
}

/// `<prefix>-cluster-<cluster>-<suffix>`
pub fn load_balancer_name(prefix: &str, cluster_name: &str, suffix: &str) -> String {
    format!("{}-{}", network_name(prefix, cluster_name), suffix)
}

/// Name shared by the listener, pool and monitor of one port.
pub fn port_objects_name(load_balancer_name: &str, port: u16) -> String {
    format!("{}-{}", load_balancer_name, port)
}

/// Name of a node's membership in one port's pool.
pub fn member_name(port_objects_name: &str, node_name: &str) -> String {
    format!("{}-{}", port_objects_name, node_name)
}

pub fn control_plane_group_name(cluster_name: &str) -> String {
    security_group_name(cluster_name, CONTROL_PLANE_GROUP_SUFFIX)
}

pub fn global_group_name(cluster_name: &str) -> String {
    security_group_name(cluster_name, GLOBAL_GROUP_SUFFIX)
}

fn security_group_name(cluster_name: &str, suffix: &str) -> String {
    format!("k8s-cluster-{}-secgroup-{}", cluster_name, suffix)
}

/// Ownership tags for objects belonging to `cluster_name`.
pub fn cluster_tags(cluster_name: &str) -> Vec<String> {
    vec![OWNER_TAG.to_string(), cluster_name.to_string()]
}

/// Whether `tags` mark an object as owned by `cluster_name`.
pub fn is_owned_by(tags: &[String], cluster_name: &str) -> bool {
    tags.iter().any(|t| t == OWNER_TAG) && tags.iter().any(|t| t == cluster_name)
}

/// Whether `tags` already equal the ownership tags, ignoring order.
pub fn has_exact_tags(tags: &[String], cluster_name: &str) -> bool {
    let mut current: Vec<&str> = tags.iter().map(String::as_str).collect();
    let mut wanted = vec![OWNER_TAG, cluster_name];
    current.sort_unstable();
    current.dedup();
    wanted.sort_unstable();
    wanted.dedup();
    current == wanted
}

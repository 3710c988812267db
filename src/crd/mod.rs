//! Cluster spec and status types consumed and produced by the reconcilers.
//!
//! - `OpenStackCluster`: desired topology plus the observed status

mod openstack_cluster;

pub use openstack_cluster::*;

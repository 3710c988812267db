//! capo-infra library crate
//!
//! Converges OpenStack networking (Neutron and Octavia) towards the network
//! topology declared for a cluster: network, subnet, security groups and the
//! API server load balancer. The cloud session is supplied by the caller
//! through [`client::NetworkingClient`].

pub mod client;
pub mod controller;
pub mod crd;
pub mod metrics;

pub use controller::{Context, Error, ReconcilerConfig, Result};
pub use metrics::Metrics;

//! Reconcilers for cluster infrastructure.
//!
//! The owning controller calls, on every pass and in this order:
//! [`reconcile_network`], [`reconcile_subnet`], [`reconcile_security_groups`]
//! and [`reconcile_load_balancer`]. Once a control plane node has an address
//! it calls [`reconcile_load_balancer_member`] for it. The `delete_*`
//! operations run during teardown.
//!
//! Every operation re-reads remote state, adopts what already exists under
//! the deterministic names and only mutates what differs.

// Shared modules
pub mod context;
pub mod error;
pub mod naming;
pub mod probe;
pub mod wait;

// Reconcilers
pub mod load_balancer;
pub mod network;
pub mod security_groups;
pub mod teardown;

pub use context::{Context, ReconcilerConfig};
pub use error::{Error, Result};
pub use load_balancer::{reconcile_load_balancer, reconcile_load_balancer_member};
pub use network::{reconcile_network, reconcile_subnet};
pub use security_groups::{match_groups, reconcile_security_groups};
pub use teardown::{
    delete_load_balancer, delete_load_balancer_member, delete_security_group,
    delete_security_groups,
};
pub use wait::Backoff;

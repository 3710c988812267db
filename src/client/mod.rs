//! Networking backend client module.
//!
//! This module defines the seam between the reconcilers and the cloud. The
//! concrete client (authentication, endpoints, paging) lives with the
//! calling controller; this crate only describes what it needs.
//!
//! ## Architecture
//!
//! - `networking_client`: the `NetworkingClient` trait and `CloudError`
//! - `types`: backend records, create options and list filters
//!
//! ## Example
//!
//! ```rust,ignore
//! use capo_infra::client::{NetworkingClient, NetworkFilter};
//!
//! let networks = client
//!     .list_networks(&NetworkFilter { name: Some(name) })
//!     .await?;
//! ```

pub mod networking_client;
pub mod types;

pub use networking_client::{CloudError, CloudResult, NetworkingClient};
pub use types::*;

//! Shared context for the reconcilers.
//!
//! The Context struct holds what every reconcile operation needs: the
//! networking client, the reconciler configuration and the optional metrics
//! registry. It is passed explicitly to each operation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::{NetworkingClient, ResourceKind};
use crate::controller::naming;
use crate::controller::wait::Backoff;
use crate::metrics::{Metrics, MutationAction};

/// Settings that shape naming and waiting.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilerConfig {
    /// Prefix of network, subnet and load balancer names.
    #[serde(default = "default_network_prefix")]
    pub network_prefix: String,

    /// Suffix of the API server load balancer name.
    #[serde(default = "default_kubeapi_lb_suffix")]
    pub kubeapi_lb_suffix: String,

    /// Backoff used for every wait.
    #[serde(default)]
    pub backoff: Backoff,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            network_prefix: default_network_prefix(),
            kubeapi_lb_suffix: default_kubeapi_lb_suffix(),
            backoff: Backoff::default(),
        }
    }
}

fn default_network_prefix() -> String {
    "k8s-clusterapi".to_string()
}

fn default_kubeapi_lb_suffix() -> String {
    "kubeapi".to_string()
}

impl ReconcilerConfig {
    /// Name of the cluster network and subnet.
    pub fn network_name(&self, cluster_name: &str) -> String {
        naming::network_name(&self.network_prefix, cluster_name)
    }

    /// Name of the API server load balancer.
    pub fn load_balancer_name(&self, cluster_name: &str) -> String {
        naming::load_balancer_name(&self.network_prefix, cluster_name, &self.kubeapi_lb_suffix)
    }
}

/// Shared context for the reconcilers
pub struct Context<C> {
    /// Networking backend
    pub client: C,
    /// Naming and wait settings
    pub config: ReconcilerConfig,
    /// Optional metrics registry
    pub metrics: Option<Arc<Metrics>>,
}

impl<C: NetworkingClient> Context<C> {
    /// Create a new context without metrics
    pub fn new(client: C, config: ReconcilerConfig) -> Self {
        Self {
            client,
            config,
            metrics: None,
        }
    }

    /// Attach a metrics registry
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_deref()
    }

    pub(crate) fn record_mutation(&self, kind: ResourceKind, action: MutationAction) {
        if let Some(metrics) = &self.metrics {
            metrics.record_mutation(kind, action);
        }
    }

    pub(crate) fn record_error(&self, kind: ResourceKind) {
        if let Some(metrics) = &self.metrics {
            metrics.record_error(kind);
        }
    }
}

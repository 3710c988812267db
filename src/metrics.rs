//! Prometheus metrics for infrastructure reconciliation.
//!
//! The calling controller owns the HTTP endpoint; this module only keeps the
//! registry and renders it in the text exposition format.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

use crate::client::ResourceKind;

/// What a mutating backend call did.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum MutationAction {
    Create,
    Update,
    Delete,
    Tag,
}

impl MutationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationAction::Create => "create",
            MutationAction::Update => "update",
            MutationAction::Delete => "delete",
            MutationAction::Tag => "tag",
        }
    }
}

/// Labels for backend mutation metrics (resource kind + action)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct MutationLabels {
    pub kind: ResourceKind,
    pub action: MutationAction,
}

impl EncodeLabelSet for MutationLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        ("action", self.action.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for per-kind metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct KindLabels {
    pub kind: ResourceKind,
}

impl EncodeLabelSet for KindLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the reconcilers
pub struct Metrics {
    /// Mutating backend calls issued
    pub backend_mutations_total: Family<MutationLabels, Counter>,
    /// Status probes issued while waiting
    pub wait_attempts_total: Family<KindLabels, Counter>,
    /// Reconcile units that ended in an error
    pub reconcile_errors_total: Family<KindLabels, Counter>,
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let backend_mutations_total = Family::<MutationLabels, Counter>::default();
        registry.register(
            "capo_backend_mutations",
            "Total number of mutating calls issued to the networking backend",
            backend_mutations_total.clone(),
        );

        let wait_attempts_total = Family::<KindLabels, Counter>::default();
        registry.register(
            "capo_wait_attempts",
            "Total number of status probes issued while waiting on a resource",
            wait_attempts_total.clone(),
        );

        let reconcile_errors_total = Family::<KindLabels, Counter>::default();
        registry.register(
            "capo_reconcile_errors",
            "Total number of reconcile units that failed",
            reconcile_errors_total.clone(),
        );

        Self {
            backend_mutations_total,
            wait_attempts_total,
            reconcile_errors_total,
            registry,
        }
    }

    pub fn record_mutation(&self, kind: ResourceKind, action: MutationAction) {
        self.backend_mutations_total
            .get_or_create(&MutationLabels { kind, action })
            .inc();
    }

    pub fn record_wait_attempt(&self, kind: ResourceKind) {
        self.wait_attempts_total
            .get_or_create(&KindLabels { kind })
            .inc();
    }

    pub fn record_error(&self, kind: ResourceKind) {
        self.reconcile_errors_total
            .get_or_create(&KindLabels { kind })
            .inc();
    }

    /// Number of mutations recorded for a kind and action.
    pub fn mutations(&self, kind: ResourceKind, action: MutationAction) -> u64 {
        self.backend_mutations_total
            .get_or_create(&MutationLabels { kind, action })
            .get()
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

//! Bounded polling of remote resource state.
//!
//! Load balancer objects and floating IPs move through intermediate states
//! after every mutation, and the backend rejects further mutations until
//! they settle. The reconcilers gate each mutation on these waits.
//!
//! Only a status mismatch is retried. A failing probe ends the wait at once
//! with the probe's error.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::client::{FloatingIpStatus, NetworkingClient, ProvisioningStatus, ResourceKind};
use crate::controller::context::Context;
use crate::controller::error::{Error, Result};
use crate::metrics::Metrics;

/// Exponential backoff with jitter.
///
/// The delay after the n-th failed attempt is `duration * factor^n`, capped
/// at `cap` when set, plus a random extra of up to `jitter` times that delay.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Backoff {
    /// Number of probes before giving up (0 is treated as 1).
    pub steps: u32,
    /// Delay after the first failed probe.
    pub duration: Duration,
    /// Growth factor per attempt (values below 1.0 are treated as 1.0).
    pub factor: f64,
    /// Maximum random extra as a fraction of the delay, clamped to `[0, 1]`.
    pub jitter: f64,
    /// Upper bound for the delay before jitter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<Duration>,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            steps: 10,
            duration: Duration::from_secs(30),
            factor: 1.0,
            jitter: 0.1,
            cap: None,
        }
    }
}

impl Backoff {
    /// Constant delay without jitter.
    pub fn new(steps: u32, duration: Duration) -> Self {
        Self {
            steps,
            duration,
            factor: 1.0,
            jitter: 0.0,
            cap: None,
        }
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = Some(cap);
        self
    }

    /// Total number of probes a wait makes.
    pub fn attempts(&self) -> u32 {
        self.steps.max(1)
    }

    /// Delay after failed attempt `retry` (zero-based), before jitter.
    pub fn base_delay(&self, retry: u32) -> Duration {
        let factor = self.factor.max(1.0);
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.duration.as_secs_f64() * factor.powi(exponent);
        let delay = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.cap {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }

    /// Jitter clamped to `[0, 1]`; NaN counts as no jitter.
    fn effective_jitter(&self) -> f64 {
        if self.jitter.is_nan() {
            0.0
        } else {
            self.jitter.clamp(0.0, 1.0)
        }
    }

    /// Delay after failed attempt `retry` (zero-based), with jitter applied.
    pub fn delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        let jitter = self.effective_jitter();
        if jitter <= 0.0 || base.is_zero() {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0.0..jitter);
        let jittered = base.as_secs_f64() * (1.0 + extra);
        Duration::try_from_secs_f64(jittered).unwrap_or(base)
    }
}

/// Poll `probe` until it reports `target` or the backoff budget runs out.
///
/// Makes exactly [`Backoff::attempts`] probes when the target is never
/// reached and sleeps only between probes.
pub async fn wait_for_status<S, F, Fut>(
    backoff: &Backoff,
    metrics: Option<&Metrics>,
    kind: ResourceKind,
    id: &str,
    target: &S,
    mut probe: F,
) -> Result<()>
where
    S: PartialEq + fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S>>,
{
    let attempts = backoff.attempts();
    info!(%kind, %id, %target, "Waiting for resource to reach target status");

    for attempt in 1..=attempts {
        if let Some(metrics) = metrics {
            metrics.record_wait_attempt(kind);
        }

        let observed = probe().await?;
        if observed == *target {
            debug!(%kind, %id, %target, attempt, "Resource reached target status");
            return Ok(());
        }

        debug!(
            %kind,
            %id,
            %observed,
            %target,
            attempt,
            "Resource not yet in target status"
        );

        if attempt < attempts {
            tokio::time::sleep(backoff.delay(attempt - 1)).await;
        }
    }

    Err(Error::WaitTimeout {
        kind,
        id: id.to_string(),
        target: target.to_string(),
        attempts,
    })
}

/// Wait on a resource that exposes no status: a successful probe is the
/// completion signal, so there is nothing to poll for.
pub async fn wait_for_existence<T, Fut>(
    metrics: Option<&Metrics>,
    kind: ResourceKind,
    id: &str,
    probe: Fut,
) -> Result<()>
where
    Fut: Future<Output = Result<T>>,
{
    if let Some(metrics) = metrics {
        metrics.record_wait_attempt(kind);
    }
    probe.await?;
    debug!(%kind, %id, "Resource exists");
    Ok(())
}

/// Wait for a load balancer to return to ACTIVE.
#[instrument(skip(ctx))]
pub async fn wait_for_load_balancer<C: NetworkingClient>(ctx: &Context<C>, id: &str) -> Result<()> {
    wait_for_status(
        &ctx.config.backoff,
        ctx.metrics(),
        ResourceKind::LoadBalancer,
        id,
        &ProvisioningStatus::Active,
        || async move {
            ctx.client
                .get_load_balancer(id)
                .await
                .map(|lb| lb.provisioning_status)
                .map_err(Error::cloud(format!("get load balancer {}", id)))
        },
    )
    .await
}

/// Wait for a floating IP to become ACTIVE.
#[instrument(skip(ctx))]
pub async fn wait_for_floating_ip<C: NetworkingClient>(ctx: &Context<C>, id: &str) -> Result<()> {
    wait_for_status(
        &ctx.config.backoff,
        ctx.metrics(),
        ResourceKind::FloatingIp,
        id,
        &FloatingIpStatus::Active,
        || async move {
            ctx.client
                .get_floating_ip(id)
                .await
                .map(|fip| fip.status)
                .map_err(Error::cloud(format!("get floating IP {}", id)))
        },
    )
    .await
}

/// Wait for a listener to be readable.
#[instrument(skip(ctx))]
pub async fn wait_for_listener<C: NetworkingClient>(ctx: &Context<C>, id: &str) -> Result<()> {
    wait_for_existence(ctx.metrics(), ResourceKind::Listener, id, async {
        ctx.client
            .get_listener(id)
            .await
            .map_err(Error::cloud(format!("get listener {}", id)))
    })
    .await
}

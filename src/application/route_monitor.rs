//! Route Health Monitor
//!
//! Periodically quotes a small buy for each open position. A token whose
//! route keeps failing is treated as rugged or unsellable and exited.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::domain::RouteHealth;
use crate::ports::{RouterError, RouterPort};

use super::deadline::bounded;

/// Route probe settings
#[derive(Debug, Clone)]
pub struct RouteMonitorConfig {
    /// Minimum time between probes of the same token
    pub probe_interval: Duration,
    /// Consecutive failures that count as a broken route
    pub fail_threshold: u32,
    /// Notional quoted by each probe
    pub probe_usd: f64,
    pub request_timeout: Duration,
}

impl Default for RouteMonitorConfig {
    fn default() -> Self {
        Self {
            probe_interval: Duration::from_secs(10),
            fail_threshold: 2,
            probe_usd: 8.0,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Outcome of a (possibly throttled) probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteProbe {
    /// Interval not elapsed, nothing was sent
    Skipped,
    Healthy,
    Failed { streak: u32 },
}

pub struct RouteHealthMonitor {
    router: Arc<dyn RouterPort>,
    config: RouteMonitorConfig,
}

impl RouteHealthMonitor {
    pub fn new(router: Arc<dyn RouterPort>, config: RouteMonitorConfig) -> Self {
        Self { router, config }
    }

    /// Quote the probe notional if the token is due, updating its streak
    pub async fn probe_if_due(&self, token: &str, health: &mut RouteHealth, now: Instant) -> RouteProbe {
        if !health.is_due(now, self.config.probe_interval) {
            return RouteProbe::Skipped;
        }

        let secs = self.config.request_timeout.as_secs();
        let result = bounded(
            self.config.request_timeout,
            self.router.quote(token, self.config.probe_usd),
            || RouterError::Timeout(secs),
        )
        .await;

        match result {
            Ok(_) => {
                health.record(now, true);
                RouteProbe::Healthy
            }
            Err(e) => {
                let streak = health.record(now, false);
                tracing::debug!("Route probe failed for {} ({}x): {}", token, streak, e);
                RouteProbe::Failed { streak }
            }
        }
    }

    /// Streak when the route counts as broken
    ///
    /// Standing condition: it holds on throttled ticks too, until a probe
    /// succeeds.
    pub fn is_broken(&self, health: &RouteHealth) -> Option<u32> {
        health
            .is_failing(self.config.fail_threshold)
            .then(|| health.fail_streak())
    }
}

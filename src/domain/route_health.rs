//! Route Health
//!
//! Per-token bookkeeping for execution-route probes: when the last probe
//! ran and how many probes in a row have failed.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Probe throttle and consecutive-failure streak for one token
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteHealth {
    /// When the last probe ran (never serialized, process-local)
    #[serde(skip)]
    last_check: Option<Instant>,
    /// Consecutive failed probes
    fail_streak: u32,
}

impl RouteHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// A probe is due if none ran yet or the interval has elapsed
    pub fn is_due(&self, now: Instant, interval: Duration) -> bool {
        match self.last_check {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= interval,
        }
    }

    /// Record a probe outcome, returns the updated streak
    pub fn record(&mut self, now: Instant, ok: bool) -> u32 {
        self.last_check = Some(now);
        if ok {
            self.fail_streak = 0;
        } else {
            self.fail_streak = self.fail_streak.saturating_add(1);
        }
        self.fail_streak
    }

    pub fn fail_streak(&self) -> u32 {
        self.fail_streak
    }

    /// Standing failure condition until the next successful probe
    pub fn is_failing(&self, threshold: u32) -> bool {
        self.fail_streak >= threshold
    }
}

//! Chase Entry Evaluator
//!
//! Buys a watched token opportunistically once it has moved far enough
//! above its admission price, provided the ledger has room and the route
//! is cheap enough. Every failure mode degrades to `NoAction`.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::chase::{is_accelerating, within_cost_caps};
use crate::domain::{ChaseDecision, WatchEntry};
use crate::ports::{LedgerError, LedgerPort, RouterError, RouterPort};

use super::deadline::bounded;

/// Chase entry settings
#[derive(Debug, Clone)]
pub struct ChaseConfig {
    pub autotrade: bool,
    /// Minimum move since admission, in percent
    pub acceleration_threshold_pct: f64,
    /// Notional of each chase entry
    pub per_trade_target_usd: f64,
    pub fee_cap_pct: f64,
    pub slippage_cap_pct: f64,
    pub request_timeout: Duration,
}

impl Default for ChaseConfig {
    fn default() -> Self {
        Self {
            autotrade: true,
            acceleration_threshold_pct: 2.5,
            per_trade_target_usd: 10.0,
            fee_cap_pct: 3.0,
            slippage_cap_pct: 3.0,
            request_timeout: Duration::from_secs(5),
        }
    }
}

pub struct ChaseEntryEvaluator {
    ledger: Arc<dyn LedgerPort>,
    router: Arc<dyn RouterPort>,
    config: ChaseConfig,
}

impl ChaseEntryEvaluator {
    pub fn new(ledger: Arc<dyn LedgerPort>, router: Arc<dyn RouterPort>, config: ChaseConfig) -> Self {
        Self { ledger, router, config }
    }

    /// Decide whether to enter a watched token at its current price
    pub async fn evaluate(&self, entry: &WatchEntry) -> ChaseDecision {
        if !self.config.autotrade {
            return ChaseDecision::NoAction;
        }

        let secs = self.config.request_timeout.as_secs();
        let capacity = bounded(
            self.config.request_timeout,
            self.ledger.free_capacity(self.config.per_trade_target_usd),
            || LedgerError::Timeout(secs),
        )
        .await;

        match capacity {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("No free capacity for chase on {}", entry.symbol);
                return ChaseDecision::NoAction;
            }
            Err(e) => {
                tracing::debug!("Capacity check failed for {}: {}", entry.symbol, e);
                return ChaseDecision::NoAction;
            }
        }

        let Some(move_pct) = is_accelerating(
            entry.base_price,
            entry.last_price,
            self.config.acceleration_threshold_pct,
        ) else {
            return ChaseDecision::NoAction;
        };

        let quote = match bounded(
            self.config.request_timeout,
            self.router.quote(&entry.token, self.config.per_trade_target_usd),
            || RouterError::Timeout(secs),
        )
        .await
        {
            Ok(q) => q,
            Err(e) => {
                tracing::debug!("Chase quote failed for {}: {}", entry.symbol, e);
                return ChaseDecision::NoAction;
            }
        };

        if !within_cost_caps(
            quote.fee_pct,
            quote.slip_pct,
            self.config.fee_cap_pct,
            self.config.slippage_cap_pct,
        ) {
            tracing::info!(
                "Skipping chase on {}: fee {:.2}% slip {:.2}% over caps",
                entry.symbol,
                quote.fee_pct,
                quote.slip_pct
            );
            return ChaseDecision::NoAction;
        }

        ChaseDecision::EnterAt {
            price: quote.usable_price().unwrap_or(entry.last_price),
            fee_pct: quote.fee_pct,
            slip_pct: quote.slip_pct,
            route: quote.route,
            move_pct,
        }
    }
}

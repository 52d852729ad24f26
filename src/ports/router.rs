//! Execution route quotes
//!
//! The core never executes swaps; it only asks a router what a buy would
//! cost, both to gate chase entries and to probe whether a token is still
//! routable at all.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Router error type
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("No route found for {0}")]
    NoRoute(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Quote timed out after {0}s")]
    Timeout(u64),
}

/// Buy quote for a USD notional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// USD price per token implied by the route, when derivable
    pub price: Option<f64>,
    /// Platform fee as a percentage of the notional
    pub fee_pct: f64,
    /// Expected slippage (price impact) as a percentage
    pub slip_pct: f64,
    /// Human-readable route, e.g. "Raydium -> Orca"
    pub route: String,
}

impl Quote {
    /// Quoted price if it is strictly positive and finite
    pub fn usable_price(&self) -> Option<f64> {
        self.price.filter(|p| p.is_finite() && *p > 0.0)
    }
}

/// Router port trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouterPort: Send + Sync {
    /// Short router name recorded on opened positions
    fn name(&self) -> String;

    /// Quote a buy of `usd` worth of `token`
    async fn quote(&self, token: &str, usd: f64) -> Result<Quote, RouterError>;
}

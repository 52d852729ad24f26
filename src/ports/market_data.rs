//! Market Data Port
//!
//! Per-token price snapshots with optional market cap and liquidity.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Market data error type
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("REST API error: {0}")]
    RestError(String),

    #[error("Data parsing error: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

/// Point-in-time view of one token's market
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Spot price in USD
    pub price: f64,
    pub market_cap_usd: Option<f64>,
    pub liquidity_usd: Option<f64>,
}

impl MarketSnapshot {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            market_cap_usd: None,
            liquidity_usd: None,
        }
    }

    /// A snapshot is only usable with a strictly positive, finite price
    pub fn is_usable(&self) -> bool {
        self.price.is_finite() && self.price > 0.0
    }
}

/// Market data port trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Latest snapshot for a token
    ///
    /// `Ok(None)` means the source knows nothing about the token right now.
    async fn fetch_snapshot(&self, token: &str) -> Result<Option<MarketSnapshot>, MarketDataError>;
}

//! DexScreener Client
//!
//! Price snapshots from the DexScreener token endpoint. Among a token's
//! pairs the one with the deepest liquidity and a usable USD price wins.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::ports::{MarketDataError, MarketDataPort, MarketSnapshot};

/// DexScreener token snapshot client
///
/// Picks the pair with the deepest liquidity for a mint.
#[derive(Debug, Clone)]
pub struct DexScreenerClient {
    http: Client,
    base_url: String,
}

impl DexScreenerClient {
    pub fn new(base_url: &str) -> Result<Self, MarketDataError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MarketDataError::RestError(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl MarketDataPort for DexScreenerClient {
    async fn fetch_snapshot(&self, token: &str) -> Result<Option<MarketSnapshot>, MarketDataError> {
        let url = format!("{}/latest/dex/tokens/{}", self.base_url, token);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| MarketDataError::RestError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited(url));
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MarketDataError::RestError(format!(
                "{} {}: {}",
                status,
                url,
                body.chars().take(160).collect::<String>()
            )));
        }

        let body: TokenPairsResponse = response
            .json()
            .await
            .map_err(|e| MarketDataError::ParseError(e.to_string()))?;

        Ok(best_snapshot(&body.pairs.unwrap_or_default()))
    }
}

/// Snapshot of the most liquid pair that carries a usable price
fn best_snapshot(pairs: &[Pair]) -> Option<MarketSnapshot> {
    pairs
        .iter()
        .filter_map(|p| {
            let price = p.price_usd.as_deref()?.parse::<f64>().ok()?;
            let snapshot = MarketSnapshot {
                price,
                market_cap_usd: p.fdv.or(p.market_cap),
                liquidity_usd: p.liquidity.as_ref().and_then(|l| l.usd),
            };
            snapshot.is_usable().then_some(snapshot)
        })
        .max_by(|a, b| {
            a.liquidity_usd
                .unwrap_or(0.0)
                .total_cmp(&b.liquidity_usd.unwrap_or(0.0))
        })
}

#[derive(Debug, Deserialize)]
struct TokenPairsResponse {
    #[serde(default)]
    pairs: Option<Vec<Pair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pair {
    #[serde(default)]
    price_usd: Option<String>,
    #[serde(default)]
    fdv: Option<f64>,
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    liquidity: Option<Liquidity>,
}

#[derive(Debug, Deserialize)]
struct Liquidity {
    #[serde(default)]
    usd: Option<f64>,
}

//! Jupiter Quote Types
//!
//! Request and response structures for the Jupiter quote API, and the
//! mapping from a raw response to a router `Quote`.

use serde::{Deserialize, Serialize};

use crate::ports::Quote;

/// USDC mint address on Solana
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

/// USDC has 6 decimals
pub const USDC_DECIMALS: u32 = 6;

/// Request parameters for getting a swap quote
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    /// Input token mint address
    pub input_mint: String,
    /// Output token mint address
    pub output_mint: String,
    /// Amount in base units
    pub amount: u64,
    /// Slippage tolerance in basis points (1 = 0.01%)
    pub slippage_bps: u16,
    /// Only use direct routes (no intermediate tokens)
    #[serde(default)]
    pub only_direct_routes: bool,
}

impl QuoteRequest {
    /// Buy `usd` worth of `mint` with USDC
    pub fn usdc_buy(mint: &str, usd: f64, slippage_bps: u16) -> Self {
        let amount = (usd.max(0.0) * 10f64.powi(USDC_DECIMALS as i32)).round() as u64;
        Self {
            input_mint: USDC_MINT.to_string(),
            output_mint: mint.to_string(),
            amount,
            slippage_bps,
            only_direct_routes: false,
        }
    }

    /// Query string pairs for the GET /quote endpoint
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("inputMint", self.input_mint.clone()),
            ("outputMint", self.output_mint.clone()),
            ("amount", self.amount.to_string()),
            ("slippageBps", self.slippage_bps.to_string()),
            ("onlyDirectRoutes", self.only_direct_routes.to_string()),
        ]
    }
}

/// Response from Jupiter quote API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub input_mint: String,
    pub output_mint: String,
    /// Input amount in base units
    pub in_amount: String,
    /// Output amount in base units
    pub out_amount: String,
    /// Price impact as a fraction (as string, "0.0012" = 0.12%)
    #[serde(default)]
    pub price_impact_pct: String,
    /// Platform fee, when the integrator charges one
    #[serde(default)]
    pub platform_fee: Option<PlatformFee>,
    /// Route plan with swap details
    #[serde(default)]
    pub route_plan: Vec<RoutePlanStep>,
    /// Catch-all for any additional fields from API (prevents future field loss)
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFee {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub fee_bps: u16,
}

impl QuoteResponse {
    /// Get input amount as u64
    pub fn input_amount(&self) -> u64 {
        self.in_amount.parse().unwrap_or(0)
    }

    /// Get output amount as u64
    pub fn output_amount(&self) -> u64 {
        self.out_amount.parse().unwrap_or(0)
    }

    /// Price impact in percent
    pub fn slippage_pct(&self) -> f64 {
        self.price_impact_pct.parse::<f64>().unwrap_or(0.0) * 100.0
    }

    /// Platform fee in percent
    pub fn fee_pct(&self) -> f64 {
        self.platform_fee
            .as_ref()
            .map(|f| f64::from(f.fee_bps) / 100.0)
            .unwrap_or(0.0)
    }

    /// DEX labels along the route, e.g. "Raydium -> Orca"
    pub fn route_label(&self) -> String {
        let labels: Vec<&str> = self
            .route_plan
            .iter()
            .map(|s| s.swap_info.label.as_str())
            .filter(|l| !l.is_empty())
            .collect();
        if labels.is_empty() {
            "direct".to_string()
        } else {
            labels.join(" -> ")
        }
    }

    /// USD price per whole output token for a USDC-in quote
    pub fn usd_price(&self, output_decimals: u8) -> Option<f64> {
        let out = self.output_amount();
        if out == 0 {
            return None;
        }
        let in_usd = self.input_amount() as f64 / 10f64.powi(USDC_DECIMALS as i32);
        let out_tokens = out as f64 / 10f64.powi(i32::from(output_decimals));
        let price = in_usd / out_tokens;
        (price.is_finite() && price > 0.0).then_some(price)
    }

    /// Map to a router quote; price only when decimals are known
    pub fn to_quote(&self, output_decimals: Option<u8>) -> Quote {
        Quote {
            price: output_decimals.and_then(|d| self.usd_price(d)),
            fee_pct: self.fee_pct(),
            slip_pct: self.slippage_pct(),
            route: self.route_label(),
        }
    }
}

/// A step in the route plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlanStep {
    /// Swap information for this step
    pub swap_info: SwapInfo,
    /// Percentage of the trade going through this route
    #[serde(default)]
    pub percent: u8,
}

/// Information about a single swap in the route
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInfo {
    /// AMM key (pool identifier)
    #[serde(default)]
    pub amm_key: String,
    /// Label for the DEX (e.g., "Raydium", "Orca")
    #[serde(default)]
    pub label: String,
}

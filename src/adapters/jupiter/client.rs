//! Jupiter API Client
//!
//! Quote-only HTTP client for the Jupiter aggregator, used as the router
//! port. Token decimals are looked up once per mint and cached so quotes
//! can be turned into a USD price per token.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::quote::{QuoteRequest, QuoteResponse};
use crate::config::loader::JupiterSection;
use crate::ports::{Quote, RouterError, RouterPort};

/// Jupiter API client configuration
#[derive(Debug, Clone)]
pub struct JupiterConfig {
    /// Base URL for the swap API
    pub api_base_url: String,
    /// Base URL for token metadata
    pub token_api_url: String,
    /// Optional API key for higher rate limits
    pub api_key: Option<String>,
    pub slippage_bps: u16,
    /// Request timeout
    pub timeout: Duration,
    /// Retries after the first attempt on 429, 5xx and transport errors
    pub max_retries: u32,
}

impl Default for JupiterConfig {
    fn default() -> Self {
        JupiterConfig::from(&JupiterSection::default())
    }
}

impl From<&JupiterSection> for JupiterConfig {
    fn from(section: &JupiterSection) -> Self {
        Self {
            api_base_url: section.api_url.trim_end_matches('/').to_string(),
            token_api_url: section.token_api_url.trim_end_matches('/').to_string(),
            api_key: section.get_api_key(),
            slippage_bps: section.slippage_bps,
            timeout: Duration::from_secs(10),
            max_retries: section.max_retries,
        }
    }
}

/// Token metadata subset we need
#[derive(Debug, Clone, Deserialize)]
struct TokenMeta {
    decimals: u8,
}

/// Jupiter router
#[derive(Debug)]
pub struct JupiterRouter {
    config: JupiterConfig,
    http: Client,
    decimals: RwLock<HashMap<String, u8>>,
}

impl JupiterRouter {
    /// Create a new Jupiter router with custom configuration
    pub fn with_config(config: JupiterConfig) -> Result<Self, RouterError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RouterError::ApiError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config,
            http,
            decimals: RwLock::new(HashMap::new()),
        })
    }

    /// Get a raw quote
    pub async fn get_quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, RouterError> {
        let url = format!("{}/quote", self.config.api_base_url);
        let response = self.get_with_retry(&url, &request.query_pairs()).await?;
        self.handle_response(response, &request.output_mint).await
    }

    /// Decimals for a mint, cached after the first successful lookup
    pub async fn token_decimals(&self, mint: &str) -> Result<u8, RouterError> {
        if let Some(d) = self.decimals.read().await.get(mint) {
            return Ok(*d);
        }

        let url = format!("{}/token/{}", self.config.token_api_url, mint);
        let response = self.get_with_retry(&url, &[]).await?;
        let meta: TokenMeta = self.handle_response(response, mint).await?;

        self.decimals.write().await.insert(mint.to_string(), meta.decimals);
        Ok(meta.decimals)
    }

    /// Execute a GET with retry logic and rate limit handling
    async fn get_with_retry(
        &self,
        url: &str,
        query: &[(&'static str, String)],
    ) -> Result<reqwest::Response, RouterError> {
        let mut last_error = None;
        let attempts = self.config.max_retries + 1;

        for attempt in 0..attempts {
            let mut req = self.http.get(url).query(query);
            if let Some(ref api_key) = self.config.api_key {
                req = req.header("x-api-key", api_key);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    // Handle rate limiting (429) with exponential backoff
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(RouterError::RateLimited(url.to_string()));
                        if attempt + 1 < attempts {
                            let backoff = Duration::from_secs(2u64.pow(attempt + 1));
                            tracing::warn!(
                                "Rate limited (429), backing off for {:?} (attempt {}/{})",
                                backoff,
                                attempt + 1,
                                attempts
                            );
                            tokio::time::sleep(backoff).await;
                        }
                        continue;
                    }

                    // Retry on server errors (5xx)
                    if status.is_server_error() {
                        last_error = Some(RouterError::ApiError(format!("Server error: {}", status)));
                        if attempt + 1 < attempts {
                            tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                        }
                        continue;
                    }

                    return Ok(response);
                }
                Err(e) => {
                    last_error = Some(RouterError::ApiError(e.to_string()));
                    if attempt + 1 < attempts {
                        tokio::time::sleep(Duration::from_millis(500 * (attempt as u64 + 1))).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| RouterError::ApiError("Max retries exceeded".into())))
    }

    /// Handle API response and deserialize
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
        mint: &str,
    ) -> Result<T, RouterError> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();

            if status == StatusCode::NOT_FOUND
                || error_text.contains("COULD_NOT_FIND_ANY_ROUTE")
                || error_text.contains("TOKEN_NOT_TRADABLE")
            {
                return Err(RouterError::NoRoute(mint.to_string()));
            }

            return Err(RouterError::ApiError(format!("API error {}: {}", status, error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| RouterError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }

    /// Get the configured API base URL
    pub fn api_base_url(&self) -> &str {
        &self.config.api_base_url
    }
}

#[async_trait]
impl RouterPort for JupiterRouter {
    fn name(&self) -> String {
        "JUPITER".to_string()
    }

    async fn quote(&self, token: &str, usd: f64) -> Result<Quote, RouterError> {
        let request = QuoteRequest::usdc_buy(token, usd, self.config.slippage_bps);
        let response = self.get_quote(&request).await?;

        if response.output_amount() == 0 {
            return Err(RouterError::NoRoute(token.to_string()));
        }

        let decimals = match self.token_decimals(token).await {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::debug!("Decimals unavailable for {}: {}", token, e);
                None
            }
        };

        Ok(response.to_quote(decimals))
    }
}

//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.toml structure.
//! Every section and field has a default, so an empty file is a valid paper setup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::{ExitThresholds, TrailParams};

/// Main configuration structure matching config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub watch: WatchSection,
    #[serde(default)]
    pub trailing: TrailingSection,
    #[serde(default)]
    pub protection: ProtectionSection,
    #[serde(default)]
    pub chase: ChaseSection,
    #[serde(default)]
    pub ledger: LedgerSection,
    #[serde(default)]
    pub market_data: MarketDataSection,
    #[serde(default)]
    pub jupiter: JupiterSection,
    #[serde(default)]
    pub alerts: AlertsSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Watch loop configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSection {
    /// Seconds between ticks (floored at 0.2)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: f64,
    /// Maximum number of watched candidates
    #[serde(default = "default_watchlist_max")]
    pub watchlist_max: usize,
    /// Bound of the candidate queue feeding the loop
    #[serde(default = "default_candidate_queue_size")]
    pub candidate_queue_size: usize,
    /// Timeout applied to every port call
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Trailing stop configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailingSection {
    /// EMA window for the volatility estimate
    #[serde(default = "default_atr_window")]
    pub atr_window: usize,
    /// Volatility multiplier K in `peak - K * vol`
    #[serde(default = "default_trail_k")]
    pub trail_k: f64,
    /// Static floor below entry for a fresh position (0.20 = 20%)
    #[serde(default = "default_hard_stop_fraction")]
    pub hard_stop_fraction: f64,
}

/// Gap, rug and route protection section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectionSection {
    #[serde(default = "default_true")]
    pub gap_protect: bool,
    /// Exit when price is this far below the trail
    #[serde(default = "default_gap_fraction")]
    pub gap_fraction: f64,
    #[serde(default = "default_true")]
    pub rug_enabled: bool,
    /// Single-tick drop that counts as a cliff
    #[serde(default = "default_rug_drop_fraction")]
    pub rug_drop_fraction: f64,
    /// Minimum seconds between route probes per token (0 = every tick)
    #[serde(default = "default_route_probe_interval")]
    pub route_probe_interval_secs: u64,
    /// Consecutive failed probes that force an exit
    #[serde(default = "default_route_fail_threshold")]
    pub route_fail_threshold: u32,
}

/// Chase entry configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChaseSection {
    /// Open paper positions automatically on acceleration
    #[serde(default = "default_true")]
    pub autotrade: bool,
    /// Move since admission that triggers a chase, in percent
    #[serde(default = "default_acceleration_threshold")]
    pub acceleration_threshold_pct: f64,
    #[serde(default = "default_per_trade_target")]
    pub per_trade_target_usd: f64,
    /// Notional used for route probes and the ledger's minimum trade size
    #[serde(default = "default_per_trade_min")]
    pub per_trade_min_usd: f64,
    #[serde(default = "default_cost_cap")]
    pub fee_cap_pct: f64,
    #[serde(default = "default_cost_cap")]
    pub slippage_cap_pct: f64,
}

/// Paper ledger configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSection {
    #[serde(default = "default_start_balance")]
    pub start_balance_usd: f64,
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    /// Total open notional as a fraction of balance
    #[serde(default = "default_total_exposure_cap")]
    pub total_exposure_cap: f64,
    /// Where closed trades are written as JSON on shutdown (supports `~`)
    #[serde(default)]
    pub export_path: Option<String>,
}

impl LedgerSection {
    /// Export path with `~` expanded
    pub fn resolved_export_path(&self) -> Option<PathBuf> {
        self.export_path
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
    }
}

/// Market data configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataSection {
    #[serde(default = "default_dexscreener_url")]
    pub dexscreener_url: String,
}

/// Jupiter API configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JupiterSection {
    /// Jupiter swap API base URL
    #[serde(default = "default_jupiter_api_url")]
    pub api_url: String,
    /// Token metadata API base URL (decimals lookup)
    #[serde(default = "default_token_api_url")]
    pub token_api_url: String,
    /// Optional API key for higher rate limits (get from jup.ag)
    #[serde(default)]
    pub api_key: Option<String>,
    /// Slippage tolerance in basis points (3% = 300 bps)
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,
    /// Retries on 429 and 5xx responses
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl JupiterSection {
    /// Get API key with environment variable fallback
    /// Checks JUPITER_API_KEY env var if config value is empty/None
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var("JUPITER_API_KEY").ok().filter(|k| !k.is_empty())
    }
}

/// Alerts configuration section (optional)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsSection {
    /// Enable Telegram notifications
    #[serde(default)]
    pub telegram_enabled: bool,
    /// Telegram bot token
    #[serde(default)]
    pub telegram_bot_token: String,
    /// Telegram chat ID
    #[serde(default)]
    pub telegram_chat_id: String,
}

/// Logging configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_tick_interval() -> f64 {
    1.0
}
fn default_watchlist_max() -> usize {
    10
}
fn default_candidate_queue_size() -> usize {
    64
}
fn default_request_timeout() -> u64 {
    5
}
fn default_atr_window() -> usize {
    12
}
fn default_trail_k() -> f64 {
    2.8
}
fn default_hard_stop_fraction() -> f64 {
    0.20
}
fn default_true() -> bool {
    true
}
fn default_gap_fraction() -> f64 {
    0.08
}
fn default_rug_drop_fraction() -> f64 {
    0.35
}
fn default_route_probe_interval() -> u64 {
    10
}
fn default_route_fail_threshold() -> u32 {
    2
}
fn default_acceleration_threshold() -> f64 {
    2.5
}
fn default_per_trade_target() -> f64 {
    10.0
}
fn default_per_trade_min() -> f64 {
    8.0
}
fn default_cost_cap() -> f64 {
    3.0
}
fn default_start_balance() -> f64 {
    40.0
}
fn default_max_open_positions() -> usize {
    3
}
fn default_total_exposure_cap() -> f64 {
    0.75
}
fn default_dexscreener_url() -> String {
    "https://api.dexscreener.com".to_string()
}
fn default_jupiter_api_url() -> String {
    "https://lite-api.jup.ag/swap/v1".to_string()
}
fn default_token_api_url() -> String {
    "https://lite-api.jup.ag/tokens/v1".to_string()
}
fn default_slippage_bps() -> u16 {
    300
}
fn default_max_retries() -> u32 {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval(),
            watchlist_max: default_watchlist_max(),
            candidate_queue_size: default_candidate_queue_size(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for TrailingSection {
    fn default() -> Self {
        Self {
            atr_window: default_atr_window(),
            trail_k: default_trail_k(),
            hard_stop_fraction: default_hard_stop_fraction(),
        }
    }
}

impl Default for ProtectionSection {
    fn default() -> Self {
        Self {
            gap_protect: true,
            gap_fraction: default_gap_fraction(),
            rug_enabled: true,
            rug_drop_fraction: default_rug_drop_fraction(),
            route_probe_interval_secs: default_route_probe_interval(),
            route_fail_threshold: default_route_fail_threshold(),
        }
    }
}

impl Default for ChaseSection {
    fn default() -> Self {
        Self {
            autotrade: true,
            acceleration_threshold_pct: default_acceleration_threshold(),
            per_trade_target_usd: default_per_trade_target(),
            per_trade_min_usd: default_per_trade_min(),
            fee_cap_pct: default_cost_cap(),
            slippage_cap_pct: default_cost_cap(),
        }
    }
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            start_balance_usd: default_start_balance(),
            max_open_positions: default_max_open_positions(),
            total_exposure_cap: default_total_exposure_cap(),
            export_path: None,
        }
    }
}

impl Default for MarketDataSection {
    fn default() -> Self {
        Self {
            dexscreener_url: default_dexscreener_url(),
        }
    }
}

impl Default for JupiterSection {
    fn default() -> Self {
        Self {
            api_url: default_jupiter_api_url(),
            token_api_url: default_token_api_url(),
            api_key: None,
            slippage_bps: default_slippage_bps(),
            max_retries: default_max_retries(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
///
/// Environment overrides are applied before validation.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn check_fraction(name: &str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 || value >= 1.0 || !value.is_finite() {
        return Err(ConfigError::ValidationError(format!(
            "{} must be in (0, 1), got {}",
            name, value
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value <= 0.0 || !value.is_finite() {
        return Err(ConfigError::ValidationError(format!(
            "{} must be > 0, got {}",
            name, value
        )));
    }
    Ok(())
}

impl Config {
    /// Override secrets from TELEGRAM_BOT_TOKEN, TELEGRAM_CHAT_ID and JUPITER_API_KEY
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.is_empty() {
                self.alerts.telegram_bot_token = token;
            }
        }
        if let Ok(chat) = std::env::var("TELEGRAM_CHAT_ID") {
            if !chat.is_empty() {
                self.alerts.telegram_chat_id = chat;
            }
        }
        if let Some(key) = self.jupiter.get_api_key() {
            self.jupiter.api_key = Some(key);
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Watch loop
        check_positive("tick_interval_secs", self.watch.tick_interval_secs)?;
        if self.watch.watchlist_max == 0 {
            return Err(ConfigError::ValidationError(
                "watchlist_max must be > 0".to_string(),
            ));
        }
        if self.watch.candidate_queue_size == 0 {
            return Err(ConfigError::ValidationError(
                "candidate_queue_size must be > 0".to_string(),
            ));
        }
        if self.watch.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".to_string(),
            ));
        }

        // Trailing stop
        if self.trailing.atr_window == 0 {
            return Err(ConfigError::ValidationError(
                "atr_window must be > 0".to_string(),
            ));
        }
        check_positive("trail_k", self.trailing.trail_k)?;
        check_fraction("hard_stop_fraction", self.trailing.hard_stop_fraction)?;

        // Protection
        check_fraction("gap_fraction", self.protection.gap_fraction)?;
        check_fraction("rug_drop_fraction", self.protection.rug_drop_fraction)?;
        if self.protection.route_fail_threshold == 0 {
            return Err(ConfigError::ValidationError(
                "route_fail_threshold must be > 0".to_string(),
            ));
        }

        // Chase
        check_positive("per_trade_target_usd", self.chase.per_trade_target_usd)?;
        check_positive("per_trade_min_usd", self.chase.per_trade_min_usd)?;
        if self.chase.per_trade_min_usd > self.chase.per_trade_target_usd {
            return Err(ConfigError::ValidationError(format!(
                "per_trade_min_usd ({}) cannot exceed per_trade_target_usd ({})",
                self.chase.per_trade_min_usd, self.chase.per_trade_target_usd
            )));
        }
        if self.chase.fee_cap_pct < 0.0 || self.chase.slippage_cap_pct < 0.0 {
            return Err(ConfigError::ValidationError(
                "fee_cap_pct and slippage_cap_pct must be >= 0".to_string(),
            ));
        }

        // Ledger
        check_positive("start_balance_usd", self.ledger.start_balance_usd)?;
        if self.ledger.max_open_positions == 0 {
            return Err(ConfigError::ValidationError(
                "max_open_positions must be > 0".to_string(),
            ));
        }
        if self.ledger.total_exposure_cap <= 0.0 || self.ledger.total_exposure_cap > 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "total_exposure_cap must be in (0, 1], got {}",
                self.ledger.total_exposure_cap
            )));
        }

        // Endpoints
        if self.market_data.dexscreener_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "dexscreener_url cannot be empty".to_string(),
            ));
        }
        if self.jupiter.api_url.is_empty() {
            return Err(ConfigError::ValidationError(
                "api_url cannot be empty".to_string(),
            ));
        }

        // Alerts
        if self.alerts.telegram_enabled
            && (self.alerts.telegram_bot_token.is_empty() || self.alerts.telegram_chat_id.is_empty())
        {
            return Err(ConfigError::ValidationError(
                "telegram_enabled requires telegram_bot_token and telegram_chat_id".to_string(),
            ));
        }

        Ok(())
    }

    /// Tick interval with the 0.2s floor applied
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.watch.tick_interval_secs.max(0.2))
    }

    pub fn exit_thresholds(&self) -> ExitThresholds {
        ExitThresholds {
            gap_protect: self.protection.gap_protect,
            gap_fraction: self.protection.gap_fraction,
            rug_enabled: self.protection.rug_enabled,
            rug_drop_fraction: self.protection.rug_drop_fraction,
        }
    }
}

// Conversion from Config to the simulator parameters
impl From<&Config> for TrailParams {
    fn from(config: &Config) -> Self {
        TrailParams {
            atr_window: config.trailing.atr_window,
            trail_k: config.trailing.trail_k,
            hard_stop_fraction: config.trailing.hard_stop_fraction,
            gap_protect: config.protection.gap_protect,
            gap_fraction: config.protection.gap_fraction,
            rug_enabled: config.protection.rug_enabled,
            rug_drop_fraction: config.protection.rug_drop_fraction,
        }
    }
}

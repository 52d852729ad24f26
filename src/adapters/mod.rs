//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Jupiter: DEX aggregator quotes used as the execution route
//! - Market Data: DexScreener price, market cap and liquidity
//! - Ledger: paper position book
//! - Notifier: Telegram and log alerts
//! - CLI: Command-line interface handlers

pub mod cli;
pub mod jupiter;
pub mod ledger;
pub mod market_data;
pub mod notifier;

pub use cli::CliApp;
pub use jupiter::JupiterRouter;
pub use ledger::PaperLedger;
pub use market_data::DexScreenerClient;
pub use notifier::{LogNotifier, TelegramNotifier};

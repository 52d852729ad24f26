//! Trailwatch - trailing-stop guard and momentum chaser
//!
//! Watches a bounded set of tokens, opens positions when a watched token
//! accelerates past a threshold under fee and slippage caps, and protects
//! open positions with a volatility-scaled ratcheting trail plus gap, cliff
//! and route-failure exits.
//!
//! # Modules
//!
//! - `domain`: Trailing math, exit priority, watch entries, route health
//! - `ports`: Trait abstractions (MarketDataPort, RouterPort, LedgerPort, NotifierPort)
//! - `adapters`: External implementations (DexScreener, Jupiter, paper ledger, Telegram, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Watch loop, chase evaluator, route monitor

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

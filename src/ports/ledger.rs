//! Position ledger port
//!
//! The ledger owns positions and is the source of truth for what is open.
//! The watch loop reads it every tick and only ever requests opens, closes
//! and price marks.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ledger error type
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Position already open: {0}")]
    AlreadyOpen(String),

    #[error("Insufficient capacity: {0}")]
    InsufficientCapacity(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Ledger call timed out after {0}s")]
    Timeout(u64),
}

/// Request to open a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRequest {
    pub token: String,
    pub name: String,
    pub symbol: String,
    pub entry_usd: f64,
    pub entry_price: f64,
    pub fee_pct: f64,
    pub slip_pct: f64,
    /// Router that produced the entry quote
    pub router: String,
    pub market_cap_usd: Option<f64>,
    pub liquidity_usd: Option<f64>,
    /// Why the position was opened, e.g. "watch_chase"
    pub reason: String,
}

/// Open position as reported by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionView {
    pub token: String,
    pub name: String,
    pub symbol: String,
    pub entry_price: f64,
    pub entry_usd: f64,
    /// Most recent marked price
    pub mark_price: Option<f64>,
    pub opened_at: DateTime<Utc>,
}

/// A position the ledger has just closed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedPosition {
    pub token: String,
    pub name: String,
    pub symbol: String,
    pub entry_usd: f64,
    pub entry_price: f64,
    pub exit_usd: f64,
    pub reason: String,
    pub pnl_usd: f64,
    pub pnl_pct: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
}

/// Ledger port trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerPort: Send + Sync {
    /// Whether another position of `next_usd` fits the slot and exposure limits
    async fn free_capacity(&self, next_usd: f64) -> Result<bool, LedgerError>;

    async fn open_position(&self, request: OpenRequest) -> Result<(), LedgerError>;

    /// Close a position; `Ok(None)` when nothing was open for the token
    async fn close_position(
        &self,
        token: &str,
        exit_usd: f64,
        reason: &str,
    ) -> Result<Option<ClosedPosition>, LedgerError>;

    async fn mark_price(&self, token: &str, price: f64) -> Result<(), LedgerError>;

    async fn list_open_positions(&self) -> Result<HashMap<String, PositionView>, LedgerError>;
}

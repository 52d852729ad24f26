//! Paper Ledger
//!
//! Simulated position book for running the watch loop without real money.
//! Tracks a USD balance, open positions, trade history and performance
//! statistics, and enforces the open-slot and exposure limits.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::config::loader::{ChaseSection, LedgerSection};
use crate::ports::{ClosedPosition, LedgerError, LedgerPort, OpenRequest, PositionView};

/// Paper ledger limits
#[derive(Debug, Clone)]
pub struct PaperLedgerConfig {
    pub start_balance_usd: f64,
    pub max_open_positions: usize,
    /// Total open notional as a fraction of balance
    pub total_exposure_cap: f64,
    /// Smallest trade the ledger accepts
    pub per_trade_min_usd: f64,
}

impl Default for PaperLedgerConfig {
    fn default() -> Self {
        PaperLedgerConfig::from_sections(&LedgerSection::default(), &ChaseSection::default())
    }
}

impl PaperLedgerConfig {
    pub fn from_sections(ledger: &LedgerSection, chase: &ChaseSection) -> Self {
        Self {
            start_balance_usd: ledger.start_balance_usd,
            max_open_positions: ledger.max_open_positions,
            total_exposure_cap: ledger.total_exposure_cap,
            per_trade_min_usd: chase.per_trade_min_usd,
        }
    }
}

/// Open paper position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperPosition {
    pub token: String,
    pub name: String,
    pub symbol: String,
    pub entry_usd: f64,
    pub entry_price: f64,
    pub fee_pct: f64,
    pub slip_pct: f64,
    pub router: String,
    pub market_cap_usd: Option<f64>,
    pub liquidity_usd: Option<f64>,
    pub reason: String,
    pub mark_price: Option<f64>,
    pub opened_at: DateTime<Utc>,
}

impl PaperPosition {
    /// Unrealized PnL in USD at the last mark
    pub fn unrealized_pnl_usd(&self) -> Option<f64> {
        let mark = self.mark_price?;
        if self.entry_price <= 0.0 {
            return None;
        }
        Some(self.entry_usd * (mark / self.entry_price) - self.entry_usd)
    }

    fn view(&self) -> PositionView {
        PositionView {
            token: self.token.clone(),
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            entry_price: self.entry_price,
            entry_usd: self.entry_usd,
            mark_price: self.mark_price,
            opened_at: self.opened_at,
        }
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// A single paper trade record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperTrade {
    /// Unique trade ID
    pub id: u64,
    pub token: String,
    pub symbol: String,
    pub side: TradeSide,
    /// USD notional (entry for buys, exit for sells)
    pub usd: f64,
    /// Entry price of the position
    pub entry_price: f64,
    pub router: String,
    /// Open reason for buys, exit reason for sells
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    /// PnL for this trade (sells only)
    pub pnl_usd: Option<f64>,
    /// PnL percentage (sells only)
    pub pnl_pct: Option<f64>,
}

/// Paper trading statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperStats {
    pub total_trades: u32,
    pub buy_count: u32,
    pub sell_count: u32,
    /// Number of winning trades (positive PnL)
    pub winning_trades: u32,
    /// Number of losing trades (negative PnL)
    pub losing_trades: u32,
    pub total_realized_pnl_usd: f64,
    pub largest_win_usd: f64,
    pub largest_loss_usd: f64,
    /// Closed trades by exit reason
    pub exits_by_reason: HashMap<String, u32>,
}

impl PaperStats {
    /// Win rate as a percentage (0-100)
    pub fn win_rate(&self) -> f64 {
        let total_closed = self.winning_trades + self.losing_trades;
        if total_closed == 0 {
            return 0.0;
        }
        (self.winning_trades as f64 / total_closed as f64) * 100.0
    }

    /// Record a trade for statistics
    fn record_trade(&mut self, trade: &PaperTrade) {
        self.total_trades += 1;

        match trade.side {
            TradeSide::Buy => self.buy_count += 1,
            TradeSide::Sell => {
                self.sell_count += 1;
                *self.exits_by_reason.entry(trade.reason.clone()).or_default() += 1;

                if let Some(pnl) = trade.pnl_usd {
                    self.total_realized_pnl_usd += pnl;
                    if pnl > 0.0 {
                        self.winning_trades += 1;
                        self.largest_win_usd = self.largest_win_usd.max(pnl);
                    } else if pnl < 0.0 {
                        self.losing_trades += 1;
                        self.largest_loss_usd = self.largest_loss_usd.max(pnl.abs());
                    }
                }
            }
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PaperBook {
    balance_usd: f64,
    positions: HashMap<String, PaperPosition>,
    trades: Vec<PaperTrade>,
    stats: PaperStats,
    next_trade_id: u64,
}

impl PaperBook {
    fn push_trade(&mut self, mut trade: PaperTrade) {
        self.next_trade_id += 1;
        trade.id = self.next_trade_id;
        self.stats.record_trade(&trade);
        self.trades.push(trade);
    }
}

/// Paper ledger
///
/// Interior state sits behind an async mutex so the ledger can be shared
/// between the watch loop and status readers.
#[derive(Debug)]
pub struct PaperLedger {
    config: PaperLedgerConfig,
    book: Mutex<PaperBook>,
}

impl PaperLedger {
    pub fn new(config: PaperLedgerConfig) -> Self {
        info!(
            "[PAPER] Ledger initialized with ${:.2}, max {} open, exposure cap {:.0}%",
            config.start_balance_usd,
            config.max_open_positions,
            config.total_exposure_cap * 100.0
        );
        let book = PaperBook {
            balance_usd: config.start_balance_usd,
            ..PaperBook::default()
        };
        Self {
            config,
            book: Mutex::new(book),
        }
    }

    pub async fn balance_usd(&self) -> f64 {
        self.book.lock().await.balance_usd
    }

    pub async fn open_count(&self) -> usize {
        self.book.lock().await.positions.len()
    }

    pub async fn get_position(&self, token: &str) -> Option<PaperPosition> {
        self.book.lock().await.positions.get(token).cloned()
    }

    pub async fn trades(&self) -> Vec<PaperTrade> {
        self.book.lock().await.trades.clone()
    }

    pub async fn stats(&self) -> PaperStats {
        self.book.lock().await.stats.clone()
    }

    /// Export trade history to JSON
    pub async fn export_trades_json(&self) -> Result<String, LedgerError> {
        let book = self.book.lock().await;
        serde_json::to_string_pretty(&book.trades)
            .map_err(|e| LedgerError::Storage(format!("Failed to serialize trades: {}", e)))
    }

    /// Write trade history to a JSON file, creating parent directories
    pub async fn write_trades(&self, path: &Path) -> Result<(), LedgerError> {
        let json = self.export_trades_json().await?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LedgerError::Storage(e.to_string()))?;
        }
        tokio::fs::write(path, json)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))
    }

    /// Human-readable portfolio summary
    pub async fn portfolio_text(&self) -> String {
        let book = self.book.lock().await;
        let mut lines = vec![format!(
            "📦 Paper Portfolio:\nBalance: ${:.2} | Open: {}",
            book.balance_usd,
            book.positions.len()
        )];

        if book.positions.is_empty() {
            lines.push("No open positions.".to_string());
            return lines.join("\n");
        }

        let mut positions: Vec<&PaperPosition> = book.positions.values().collect();
        positions.sort_by_key(|p| p.opened_at);
        for p in positions {
            let short: String = p.token.chars().take(6).collect();
            lines.push(format!(
                "• {} ({}…) - entry ${:.2} @ {:.10} | fee {:.2}% slip {:.2}%",
                p.name, short, p.entry_usd, p.entry_price, p.fee_pct, p.slip_pct
            ));
        }
        lines.join("\n")
    }

    /// Log a summary of the current state
    pub async fn print_summary(&self) {
        let book = self.book.lock().await;
        info!("========== PAPER LEDGER SUMMARY ==========");
        info!("Balance: ${:.2}", book.balance_usd);
        info!("Start Balance: ${:.2}", self.config.start_balance_usd);
        info!("Open Positions: {}", book.positions.len());
        info!("Total Trades: {}", book.stats.total_trades);
        info!("Win Rate: {:.1}%", book.stats.win_rate());
        info!("Realized PnL: ${:+.2}", book.stats.total_realized_pnl_usd);
        for (reason, count) in &book.stats.exits_by_reason {
            info!("  {} exits: {}", reason, count);
        }
        info!("==========================================");
    }

    fn exposure_base(&self, balance: f64) -> f64 {
        let base = if balance > 0.0 { balance } else { self.config.start_balance_usd };
        base.max(1e-9)
    }
}

#[async_trait]
impl LedgerPort for PaperLedger {
    async fn free_capacity(&self, next_usd: f64) -> Result<bool, LedgerError> {
        let book = self.book.lock().await;

        if book.positions.len() >= self.config.max_open_positions {
            return Ok(false);
        }

        let base = self.exposure_base(book.balance_usd);
        let open_usd: f64 = book.positions.values().map(|p| p.entry_usd).sum();
        if (open_usd + next_usd) / base > self.config.total_exposure_cap {
            return Ok(false);
        }

        Ok(next_usd >= self.config.per_trade_min_usd)
    }

    async fn open_position(&self, request: OpenRequest) -> Result<(), LedgerError> {
        if request.entry_usd <= 0.0 || request.entry_price <= 0.0 {
            return Err(LedgerError::InvalidRequest(format!(
                "entry ${} @ {} must be positive",
                request.entry_usd, request.entry_price
            )));
        }

        let mut book = self.book.lock().await;
        if book.positions.contains_key(&request.token) {
            return Err(LedgerError::AlreadyOpen(request.token));
        }

        let now = Utc::now();
        let short: String = request.token.chars().take(6).collect();
        info!(
            "[PAPER] OPEN {} {}… ${:.2} @ ~{:.10}",
            request.name, short, request.entry_usd, request.entry_price
        );

        book.push_trade(PaperTrade {
            id: 0,
            token: request.token.clone(),
            symbol: request.symbol.clone(),
            side: TradeSide::Buy,
            usd: request.entry_usd,
            entry_price: request.entry_price,
            router: request.router.clone(),
            reason: request.reason.clone(),
            timestamp: now,
            pnl_usd: None,
            pnl_pct: None,
        });

        book.positions.insert(
            request.token.clone(),
            PaperPosition {
                token: request.token,
                name: request.name,
                symbol: request.symbol,
                entry_usd: request.entry_usd,
                entry_price: request.entry_price,
                fee_pct: request.fee_pct,
                slip_pct: request.slip_pct,
                router: request.router,
                market_cap_usd: request.market_cap_usd,
                liquidity_usd: request.liquidity_usd,
                reason: request.reason,
                mark_price: None,
                opened_at: now,
            },
        );

        Ok(())
    }

    async fn close_position(
        &self,
        token: &str,
        exit_usd: f64,
        reason: &str,
    ) -> Result<Option<ClosedPosition>, LedgerError> {
        let mut book = self.book.lock().await;
        let Some(pos) = book.positions.remove(token) else {
            return Ok(None);
        };

        let now = Utc::now();
        let pnl_usd = exit_usd - pos.entry_usd;
        let pnl_pct = if pos.entry_usd > 0.0 {
            (exit_usd / pos.entry_usd - 1.0) * 100.0
        } else {
            0.0
        };
        book.balance_usd += pnl_usd;

        info!(
            "[PAPER] CLOSE {} ({}) ${:.2} -> ${:.2} | PnL: {:+.2} ({:+.2}%)",
            pos.name, reason, pos.entry_usd, exit_usd, pnl_usd, pnl_pct
        );

        book.push_trade(PaperTrade {
            id: 0,
            token: pos.token.clone(),
            symbol: pos.symbol.clone(),
            side: TradeSide::Sell,
            usd: exit_usd,
            entry_price: pos.entry_price,
            router: pos.router.clone(),
            reason: reason.to_string(),
            timestamp: now,
            pnl_usd: Some(pnl_usd),
            pnl_pct: Some(pnl_pct),
        });

        Ok(Some(ClosedPosition {
            token: pos.token,
            name: pos.name,
            symbol: pos.symbol,
            entry_usd: pos.entry_usd,
            entry_price: pos.entry_price,
            exit_usd,
            reason: reason.to_string(),
            pnl_usd,
            pnl_pct,
            opened_at: pos.opened_at,
            closed_at: now,
        }))
    }

    async fn mark_price(&self, token: &str, price: f64) -> Result<(), LedgerError> {
        if let Some(pos) = self.book.lock().await.positions.get_mut(token) {
            pos.mark_price = Some(price);
        }
        Ok(())
    }

    async fn list_open_positions(&self) -> Result<HashMap<String, PositionView>, LedgerError> {
        let book = self.book.lock().await;
        Ok(book
            .positions
            .iter()
            .map(|(token, pos)| (token.clone(), pos.view()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ledger() -> PaperLedger {
        PaperLedger::new(PaperLedgerConfig::default())
    }

    fn request(token: &str, usd: f64, price: f64) -> OpenRequest {
        OpenRequest {
            token: token.to_string(),
            name: format!("{} Coin", token),
            symbol: token.to_string(),
            entry_usd: usd,
            entry_price: price,
            fee_pct: 0.5,
            slip_pct: 1.0,
            router: "JUPITER".to_string(),
            market_cap_usd: Some(100_000.0),
            liquidity_usd: Some(20_000.0),
            reason: "watch_chase".to_string(),
        }
    }

    #[tokio::test]
    async fn test_new_ledger() {
        let ledger = ledger();
        assert_eq!(ledger.balance_usd().await, 40.0);
        assert_eq!(ledger.open_count().await, 0);
        assert!(ledger.portfolio_text().await.contains("No open positions."));
    }

    #[tokio::test]
    async fn test_capacity_exposure_cap() {
        let ledger = ledger();
        // 40 * 0.75 = 30 of exposure allowed
        assert!(ledger.free_capacity(10.0).await.unwrap());
        ledger.open_position(request("A", 10.0, 1.0)).await.unwrap();
        ledger.open_position(request("B", 10.0, 1.0)).await.unwrap();
        assert!(ledger.free_capacity(10.0).await.unwrap());
        ledger.open_position(request("C", 10.0, 1.0)).await.unwrap();
        assert!(!ledger.free_capacity(8.0).await.unwrap());
    }

    #[tokio::test]
    async fn test_capacity_slot_cap_and_min_size() {
        let ledger = PaperLedger::new(PaperLedgerConfig {
            start_balance_usd: 1_000.0,
            max_open_positions: 1,
            total_exposure_cap: 0.75,
            per_trade_min_usd: 8.0,
        });
        assert!(!ledger.free_capacity(5.0).await.unwrap());
        ledger.open_position(request("A", 10.0, 1.0)).await.unwrap();
        assert!(!ledger.free_capacity(10.0).await.unwrap());
    }

    #[tokio::test]
    async fn test_exposure_uses_start_balance_when_drained() {
        let ledger = PaperLedger::new(PaperLedgerConfig {
            start_balance_usd: 40.0,
            max_open_positions: 3,
            total_exposure_cap: 0.75,
            per_trade_min_usd: 1.0,
        });
        ledger.open_position(request("A", 10.0, 1.0)).await.unwrap();
        // Lose the full notional and then some: balance goes to 0
        ledger.close_position("A", 0.0, "rug").await.unwrap();
        ledger.book.lock().await.balance_usd = 0.0;

        assert!(ledger.free_capacity(10.0).await.unwrap());
    }

    #[tokio::test]
    async fn test_open_rejects_duplicates_and_bad_input() {
        let ledger = ledger();
        ledger.open_position(request("A", 10.0, 1.0)).await.unwrap();
        assert!(matches!(
            ledger.open_position(request("A", 10.0, 1.0)).await,
            Err(LedgerError::AlreadyOpen(_))
        ));
        assert!(matches!(
            ledger.open_position(request("B", 10.0, 0.0)).await,
            Err(LedgerError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let ledger = ledger();
        ledger.open_position(request("A", 10.0, 1.0)).await.unwrap();

        let closed = ledger.close_position("A", 12.0, "trail").await.unwrap().unwrap();
        assert_relative_eq!(closed.pnl_usd, 2.0);
        assert_relative_eq!(closed.pnl_pct, 20.0, epsilon = 1e-9);
        assert_relative_eq!(ledger.balance_usd().await, 42.0);

        assert!(ledger.close_position("A", 12.0, "trail").await.unwrap().is_none());
        assert_relative_eq!(ledger.balance_usd().await, 42.0);
        assert_eq!(ledger.trades().await.len(), 2);
    }

    #[tokio::test]
    async fn test_mark_and_list() {
        let ledger = ledger();
        ledger.open_position(request("A", 10.0, 2.0)).await.unwrap();
        ledger.mark_price("A", 3.0).await.unwrap();
        ledger.mark_price("missing", 3.0).await.unwrap();

        let open = ledger.list_open_positions().await.unwrap();
        assert_eq!(open["A"].mark_price, Some(3.0));
        assert_eq!(open["A"].entry_price, 2.0);

        let pos = ledger.get_position("A").await.unwrap();
        assert_relative_eq!(pos.unrealized_pnl_usd().unwrap(), 5.0);
    }

    #[tokio::test]
    async fn test_stats_and_export() {
        let ledger = ledger();
        ledger.open_position(request("A", 10.0, 1.0)).await.unwrap();
        ledger.open_position(request("B", 10.0, 1.0)).await.unwrap();
        ledger.close_position("A", 13.0, "trail").await.unwrap();
        ledger.close_position("B", 6.0, "rug").await.unwrap();

        let stats = ledger.stats().await;
        assert_eq!(stats.buy_count, 2);
        assert_eq!(stats.sell_count, 2);
        assert_eq!(stats.winning_trades, 1);
        assert_eq!(stats.losing_trades, 1);
        assert_relative_eq!(stats.win_rate(), 50.0);
        assert_relative_eq!(stats.total_realized_pnl_usd, -1.0);
        assert_eq!(stats.exits_by_reason["rug"], 1);

        let json = ledger.export_trades_json().await.unwrap();
        let trades: Vec<PaperTrade> = serde_json::from_str(&json).unwrap();
        assert_eq!(trades.len(), 4);
        assert_eq!(trades[3].side, TradeSide::Sell);
        assert_eq!(trades[3].id, 4);
    }

    #[tokio::test]
    async fn test_write_trades_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("trades.json");

        let ledger = ledger();
        ledger.open_position(request("A", 10.0, 1.0)).await.unwrap();
        ledger.write_trades(&path).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("watch_chase"));
    }

    #[tokio::test]
    async fn test_portfolio_text_lists_positions() {
        let ledger = ledger();
        ledger.open_position(request("ABCDEFGH", 10.0, 0.5)).await.unwrap();
        let text = ledger.portfolio_text().await;
        assert!(text.contains("Open: 1"));
        assert!(text.contains("ABCDEF…"));
        assert!(text.contains("fee 0.50% slip 1.00%"));
    }
}

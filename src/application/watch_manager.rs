//! Watch Manager
//!
//! Single-task tick loop over a bounded set of watched tokens.
//! Key features:
//! - Owned, insertion-ordered watch set mutated only inside the loop
//! - Bounded candidate queue fed through a cloneable `WatchHandle`
//! - Ledger reconciliation every tick (adopt untracked, drop vanished)
//! - Ratcheting ATR trail with gap, cliff and route-failure exits
//! - Chase entries for accelerating candidates
//! - Every port call bounded by a request timeout

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};

use crate::config::Config;
use crate::domain::{
    evaluate_price_exits, exit_notional, Candidate, ChaseDecision, ExitDecision, ExitThresholds,
    WatchEntry, WatchSet, WatchState,
};
use crate::ports::{
    LedgerError, LedgerPort, MarketDataError, MarketDataPort, MarketSnapshot, NotifierError,
    NotifierPort, OpenRequest, PositionView, RouterPort,
};

use super::chase::{ChaseConfig, ChaseEntryEvaluator};
use super::deadline::bounded;
use super::messages;
use super::route_monitor::{RouteHealthMonitor, RouteMonitorConfig};

/// Reason recorded on positions opened by the chase rule
pub const CHASE_REASON: &str = "watch_chase";

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Candidate queue full, dropped {0}")]
    QueueFull(String),

    #[error("Watch loop has stopped")]
    QueueClosed,
}

/// Settings for the watch loop
#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub tick_interval: Duration,
    pub watchlist_max: usize,
    pub candidate_queue_size: usize,
    pub request_timeout: Duration,
    pub atr_window: usize,
    pub trail_k: f64,
    pub hard_stop_fraction: f64,
    pub thresholds: ExitThresholds,
    pub route: RouteMonitorConfig,
    pub chase: ChaseConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        WatchConfig::from(&Config::default())
    }
}

impl From<&Config> for WatchConfig {
    fn from(config: &Config) -> Self {
        let request_timeout = Duration::from_secs(config.watch.request_timeout_secs);
        WatchConfig {
            tick_interval: config.tick_interval(),
            watchlist_max: config.watch.watchlist_max,
            candidate_queue_size: config.watch.candidate_queue_size,
            request_timeout,
            atr_window: config.trailing.atr_window,
            trail_k: config.trailing.trail_k,
            hard_stop_fraction: config.trailing.hard_stop_fraction,
            thresholds: config.exit_thresholds(),
            route: RouteMonitorConfig {
                probe_interval: Duration::from_secs(config.protection.route_probe_interval_secs),
                fail_threshold: config.protection.route_fail_threshold,
                probe_usd: config.chase.per_trade_min_usd,
                request_timeout,
            },
            chase: ChaseConfig {
                autotrade: config.chase.autotrade,
                acceleration_threshold_pct: config.chase.acceleration_threshold_pct,
                per_trade_target_usd: config.chase.per_trade_target_usd,
                fee_cap_pct: config.chase.fee_cap_pct,
                slippage_cap_pct: config.chase.slippage_cap_pct,
                request_timeout,
            },
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Candidates admitted from the queue
    pub admitted: usize,
    /// Ledger positions newly tracked
    pub adopted: usize,
    /// Tokens whose data was missing this tick
    pub skipped: usize,
    /// Positions we closed, with the decision that closed them
    pub exits: Vec<(String, ExitDecision)>,
    /// Tokens we opened positions in
    pub entries: Vec<String>,
}

/// Status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct WatchStatus {
    pub ticks: u64,
    pub watching: Vec<String>,
    pub positioned: Vec<String>,
    pub total_entries: u64,
    pub total_exits: u64,
}

/// Cloneable handle for feeding and stopping a running `WatchManager`
#[derive(Debug, Clone)]
pub struct WatchHandle {
    candidates: mpsc::Sender<Candidate>,
    is_running: Arc<RwLock<bool>>,
    shutdown_requested: Arc<RwLock<bool>>,
}

impl WatchHandle {
    /// Queue a candidate for admission on the next tick
    ///
    /// Never blocks; a full queue drops the candidate.
    pub fn add_candidate(&self, candidate: Candidate) -> Result<(), WatchError> {
        match self.candidates.try_send(candidate) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(c)) => {
                tracing::debug!("Candidate queue full, dropping {}", c.token);
                Err(WatchError::QueueFull(c.token))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(WatchError::QueueClosed),
        }
    }

    /// Request graceful shutdown; the current tick completes first
    pub async fn shutdown(&self) {
        tracing::info!("Shutdown requested");
        *self.shutdown_requested.write().await = true;
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}

pub struct WatchManager {
    market_data: Arc<dyn MarketDataPort>,
    router: Arc<dyn RouterPort>,
    ledger: Arc<dyn LedgerPort>,
    notifier: Arc<dyn NotifierPort>,
    chase: ChaseEntryEvaluator,
    route_monitor: RouteHealthMonitor,
    config: WatchConfig,
    watch: WatchSet,
    candidates: mpsc::Receiver<Candidate>,
    is_running: Arc<RwLock<bool>>,
    shutdown_requested: Arc<RwLock<bool>>,
    ticks: u64,
    total_entries: u64,
    total_exits: u64,
}

impl WatchManager {
    /// Build a manager and the handle used to feed it
    pub fn new(
        config: WatchConfig,
        market_data: Arc<dyn MarketDataPort>,
        router: Arc<dyn RouterPort>,
        ledger: Arc<dyn LedgerPort>,
        notifier: Arc<dyn NotifierPort>,
    ) -> (Self, WatchHandle) {
        let (tx, rx) = mpsc::channel(config.candidate_queue_size.max(1));
        let is_running = Arc::new(RwLock::new(false));
        let shutdown_requested = Arc::new(RwLock::new(false));

        let handle = WatchHandle {
            candidates: tx,
            is_running: is_running.clone(),
            shutdown_requested: shutdown_requested.clone(),
        };

        let manager = Self {
            chase: ChaseEntryEvaluator::new(ledger.clone(), router.clone(), config.chase.clone()),
            route_monitor: RouteHealthMonitor::new(router.clone(), config.route.clone()),
            market_data,
            router,
            ledger,
            notifier,
            config,
            watch: WatchSet::new(),
            candidates: rx,
            is_running,
            shutdown_requested,
            ticks: 0,
            total_entries: 0,
            total_exits: 0,
        };

        (manager, handle)
    }

    pub fn watch_set(&self) -> &WatchSet {
        &self.watch
    }

    /// Run the tick loop until shutdown is requested
    pub async fn run(&mut self) {
        *self.is_running.write().await = true;

        tracing::info!(
            "Starting watch loop - tick {:.1}s, watchlist max {}, router {}",
            self.config.tick_interval.as_secs_f64(),
            self.config.watchlist_max,
            self.router.name()
        );

        while !*self.shutdown_requested.read().await {
            match self.tick().await {
                Ok(report) => {
                    if !report.exits.is_empty() || !report.entries.is_empty() {
                        tracing::info!(
                            "Tick {}: {} exit(s), {} entr(ies)",
                            self.ticks,
                            report.exits.len(),
                            report.entries.len()
                        );
                    }
                }
                Err(e) => {
                    // Continue running despite errors
                    tracing::error!("Tick error: {}", e);
                }
            }
            tokio::time::sleep(self.config.tick_interval).await;
        }

        *self.is_running.write().await = false;
        tracing::info!("Watch loop stopped");
    }

    /// Execute one watch cycle
    ///
    /// Open positions are handled before candidates, so a token exited this
    /// tick cannot be chased again in the same tick.
    pub async fn tick(&mut self) -> Result<TickReport, WatchError> {
        self.ticks += 1;
        let mut report = TickReport {
            admitted: self.drain_candidates(),
            ..TickReport::default()
        };

        let open = self.list_open_positions().await?;
        report.adopted = self.reconcile(&open);

        for token in self.watch.tokens_in(WatchState::Positioned) {
            let Some(position) = open.get(&token) else {
                continue;
            };
            match self.tick_position(&token, position).await {
                PositionOutcome::Skipped => report.skipped += 1,
                PositionOutcome::Held => {}
                PositionOutcome::Exited(decision) => report.exits.push((token, decision)),
            }
        }

        let watching: Vec<String> = self
            .watch
            .tokens_in(WatchState::Watching)
            .into_iter()
            .take(self.config.watchlist_max)
            .collect();

        for token in watching {
            if open.contains_key(&token) {
                continue;
            }
            match self.tick_candidate(&token).await {
                CandidateOutcome::Skipped => report.skipped += 1,
                CandidateOutcome::Watching => {}
                CandidateOutcome::Entered => report.entries.push(token),
            }
        }

        tracing::debug!(
            "Tick {} done: {} watching, {} positioned, {} skipped",
            self.ticks,
            self.watch.watching_count(),
            self.watch.len() - self.watch.watching_count(),
            report.skipped
        );

        Ok(report)
    }

    /// Current status
    pub fn status(&self) -> WatchStatus {
        let label = |e: &WatchEntry| {
            if e.symbol.is_empty() {
                messages::short_mint(&e.token)
            } else {
                e.symbol.clone()
            }
        };

        WatchStatus {
            ticks: self.ticks,
            watching: self
                .watch
                .iter()
                .filter(|e| !e.is_positioned())
                .map(label)
                .collect(),
            positioned: self
                .watch
                .iter()
                .filter(|e| e.is_positioned())
                .map(label)
                .collect(),
            total_entries: self.total_entries,
            total_exits: self.total_exits,
        }
    }

    /// Admit queued candidates, capacity-checked, duplicates ignored
    fn drain_candidates(&mut self) -> usize {
        let mut admitted = 0;

        while let Ok(candidate) = self.candidates.try_recv() {
            let token = candidate.token.trim().to_string();
            if token.is_empty() || self.watch.contains(&token) {
                continue;
            }
            // Positioned entries occupy slots too
            if self.watch.len() >= self.config.watchlist_max {
                tracing::debug!("Watchlist full, dropping candidate {}", token);
                continue;
            }

            let candidate = Candidate { token, ..candidate };
            tracing::info!(
                "[Watch] add {} {}… base_price={}",
                candidate.name,
                messages::short_mint(&candidate.token),
                candidate.price
            );
            self.watch
                .insert(WatchEntry::watching(candidate, self.config.hard_stop_fraction));
            admitted += 1;
        }

        admitted
    }

    /// Align the watch set with the ledger's open positions
    fn reconcile(&mut self, open: &HashMap<String, PositionView>) -> usize {
        for token in self.watch.tokens_in(WatchState::Positioned) {
            if !open.contains_key(&token) {
                tracing::info!("Position in {} closed externally, no longer tracking", token);
                self.watch.remove(&token);
            }
        }

        let mut adopted = 0;
        for (token, position) in open {
            match self.watch.get_mut(token) {
                Some(entry) if entry.is_positioned() => continue,
                // Opened outside the chase rule while we were watching it
                Some(entry) => entry.open_position(position.entry_price, self.config.hard_stop_fraction),
                None => {
                    self.watch.insert(WatchEntry::adopted(
                        token.clone(),
                        position.name.clone(),
                        position.symbol.clone(),
                        position.entry_price,
                        self.config.hard_stop_fraction,
                    ));
                }
            }
            tracing::info!(
                "Tracking ledger position {} entry {:.10}",
                display_name(position),
                position.entry_price
            );
            adopted += 1;
        }

        adopted
    }

    async fn tick_position(&mut self, token: &str, position: &PositionView) -> PositionOutcome {
        let Some(snapshot) = self.fetch_snapshot(token).await else {
            return PositionOutcome::Skipped;
        };
        let price = snapshot.price;

        let secs = self.config.request_timeout.as_secs();
        if let Err(e) = bounded(
            self.config.request_timeout,
            self.ledger.mark_price(token, price),
            || LedgerError::Timeout(secs),
        )
        .await
        {
            tracing::warn!("Failed to mark {} at {}: {}", token, price, e);
        }

        let Some(entry) = self.watch.get_mut(token) else {
            return PositionOutcome::Skipped;
        };
        let update = entry.apply_tick(price, self.config.atr_window, self.config.trail_k);

        tracing::debug!(
            "{} ${:.10} | peak {:.10} | trail {:.10} | vol {:.10}",
            entry.symbol,
            price,
            entry.peak_price,
            update.trail_level,
            entry.volatility
        );

        let mut decision =
            evaluate_price_exits(price, update.prev_price, update.trail_level, &self.config.thresholds);

        if !decision.is_exit() {
            self.route_monitor
                .probe_if_due(token, &mut entry.route, Instant::now())
                .await;
            if let Some(streak) = self.route_monitor.is_broken(&entry.route) {
                decision = ExitDecision::RouteFail { price, streak };
            }
        }

        if !decision.is_exit() {
            return PositionOutcome::Held;
        }

        if self.execute_exit(token, position, decision).await {
            PositionOutcome::Exited(decision)
        } else {
            PositionOutcome::Held
        }
    }

    /// Close through the ledger; returns true when the entry was removed
    async fn execute_exit(&mut self, token: &str, position: &PositionView, decision: ExitDecision) -> bool {
        let Some(exit_price) = decision.exit_price() else {
            return false;
        };
        let exit_usd = exit_notional(position.entry_usd, position.entry_price, exit_price);
        let name = display_name(position);

        let secs = self.config.request_timeout.as_secs();
        let closed = bounded(
            self.config.request_timeout,
            self.ledger.close_position(token, exit_usd, decision.reason_code()),
            || LedgerError::Timeout(secs),
        )
        .await;

        match closed {
            Ok(Some(closed)) => {
                tracing::info!(
                    "Closed {} ({}) exit ${:.2} pnl {:+.2}%",
                    name,
                    decision,
                    closed.exit_usd,
                    closed.pnl_pct
                );
                self.watch.remove(token);
                self.total_exits += 1;
                if let Some(text) = messages::exit_message(name, token, position.entry_price, &decision) {
                    self.notify(&text).await;
                }
                true
            }
            Ok(None) => {
                tracing::debug!("Close of {} was a no-op, position already gone", token);
                self.watch.remove(token);
                true
            }
            Err(e) => {
                tracing::error!("Failed to close {} ({}): {}", name, decision, e);
                self.notify(&messages::close_failed(name, &decision, &e.to_string()))
                    .await;
                false
            }
        }
    }

    async fn tick_candidate(&mut self, token: &str) -> CandidateOutcome {
        let Some(snapshot) = self.fetch_snapshot(token).await else {
            return CandidateOutcome::Skipped;
        };

        let Some(entry) = self.watch.get_mut(token) else {
            return CandidateOutcome::Skipped;
        };
        entry.observe_price(snapshot.price);

        match self.chase.evaluate(entry).await {
            ChaseDecision::NoAction => CandidateOutcome::Watching,
            ChaseDecision::EnterAt {
                price,
                fee_pct,
                slip_pct,
                route,
                move_pct,
            } => {
                let entered = self
                    .execute_entry(token, &snapshot, price, fee_pct, slip_pct, &route, move_pct)
                    .await;
                if entered {
                    CandidateOutcome::Entered
                } else {
                    CandidateOutcome::Watching
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_entry(
        &mut self,
        token: &str,
        snapshot: &MarketSnapshot,
        price: f64,
        fee_pct: f64,
        slip_pct: f64,
        route: &str,
        move_pct: f64,
    ) -> bool {
        // The ledger may have changed since the start of the tick
        match self.list_open_positions().await {
            Ok(open) if open.contains_key(token) => {
                tracing::debug!("{} already held by the ledger, skipping chase", token);
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Ledger recheck failed before opening {}: {}", token, e);
                return false;
            }
        }

        let Some(entry) = self.watch.get(token) else {
            return false;
        };
        let name = if entry.name.is_empty() { entry.symbol.clone() } else { entry.name.clone() };

        let request = OpenRequest {
            token: token.to_string(),
            name: entry.name.clone(),
            symbol: entry.symbol.clone(),
            entry_usd: self.config.chase.per_trade_target_usd,
            entry_price: price,
            fee_pct,
            slip_pct,
            router: self.router.name(),
            market_cap_usd: snapshot.market_cap_usd,
            liquidity_usd: snapshot.liquidity_usd,
            reason: CHASE_REASON.to_string(),
        };

        let secs = self.config.request_timeout.as_secs();
        let opened = bounded(
            self.config.request_timeout,
            self.ledger.open_position(request),
            || LedgerError::Timeout(secs),
        )
        .await;

        match opened {
            Ok(()) => {
                if let Some(entry) = self.watch.get_mut(token) {
                    entry.open_position(price, self.config.hard_stop_fraction);
                }
                self.total_entries += 1;
                tracing::info!(
                    "Chase entry {} at {:.10} via {} ({:+.1}% since add)",
                    name,
                    price,
                    route,
                    move_pct
                );
                let text = messages::chase_buy(
                    &name,
                    self.config.chase.per_trade_target_usd,
                    price,
                    fee_pct,
                    slip_pct,
                    move_pct,
                );
                self.notify(&text).await;
                true
            }
            Err(e) => {
                tracing::error!("Failed to open chase position in {}: {}", name, e);
                self.notify(&messages::open_failed(&name, &e.to_string())).await;
                false
            }
        }
    }

    async fn list_open_positions(&self) -> Result<HashMap<String, PositionView>, LedgerError> {
        let secs = self.config.request_timeout.as_secs();
        bounded(
            self.config.request_timeout,
            self.ledger.list_open_positions(),
            || LedgerError::Timeout(secs),
        )
        .await
    }

    /// Usable snapshot or `None`; errors are logged, never raised
    async fn fetch_snapshot(&self, token: &str) -> Option<MarketSnapshot> {
        let secs = self.config.request_timeout.as_secs();
        let result = bounded(
            self.config.request_timeout,
            self.market_data.fetch_snapshot(token),
            || MarketDataError::Timeout(secs),
        )
        .await;

        match result {
            Ok(Some(snapshot)) if snapshot.is_usable() => Some(snapshot),
            Ok(_) => {
                tracing::debug!("No market data for {} this tick", token);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to fetch snapshot for {}: {}", token, e);
                None
            }
        }
    }

    async fn notify(&self, text: &str) {
        let secs = self.config.request_timeout.as_secs();
        let sent = bounded(
            self.config.request_timeout,
            self.notifier.send(text),
            || NotifierError::Timeout(secs),
        )
        .await;

        if let Err(e) = sent {
            tracing::warn!("Notification failed: {}", e);
        }
    }
}

enum PositionOutcome {
    Skipped,
    Held,
    Exited(ExitDecision),
}

enum CandidateOutcome {
    Skipped,
    Watching,
    Entered,
}

fn display_name(position: &PositionView) -> &str {
    if position.name.is_empty() {
        &position.symbol
    } else {
        &position.name
    }
}

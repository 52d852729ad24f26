//! Watch Entries
//!
//! Per-token state under observation, whether or not a position is open,
//! and the ordered single-writer set that holds them.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chase::acceleration_pct;
use super::route_health::RouteHealth;
use super::trailing::{initial_trail, ratchet, update_volatility};

/// Lifecycle state of a watched token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchState {
    /// No position, candidate for a chase entry
    Watching,
    /// The ledger holds a position; exits are evaluated every tick
    Positioned,
}

/// A token proposed by discovery for observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Token mint address
    pub token: String,
    pub name: String,
    pub symbol: String,
    /// Price when proposed (0.0 if unknown)
    pub price: f64,
}

impl Candidate {
    pub fn new(token: impl Into<String>, name: impl Into<String>, symbol: impl Into<String>, price: f64) -> Self {
        Self {
            token: token.into(),
            name: name.into(),
            symbol: symbol.into(),
            price,
        }
    }
}

/// Result of folding one price into a positioned entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickUpdate {
    pub price: f64,
    pub prev_price: f64,
    pub trail_level: f64,
}

/// One token under observation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchEntry {
    /// Token mint address
    pub token: String,
    pub name: String,
    pub symbol: String,
    pub added_at: DateTime<Utc>,
    /// Price when admitted (entry price for adopted positions)
    pub base_price: f64,
    pub last_price: f64,
    pub prev_price: f64,
    /// EMA of absolute tick-to-tick price changes
    pub volatility: f64,
    pub peak_price: f64,
    pub trail_level: f64,
    pub route: RouteHealth,
    pub state: WatchState,
}

impl WatchEntry {
    /// New entry for an admitted candidate
    pub fn watching(candidate: Candidate, hard_stop_fraction: f64) -> Self {
        let price = candidate.price.max(0.0);
        Self {
            token: candidate.token,
            name: candidate.name,
            symbol: candidate.symbol,
            added_at: Utc::now(),
            base_price: price,
            last_price: price,
            prev_price: price,
            volatility: 0.0,
            peak_price: price,
            trail_level: initial_trail(price, hard_stop_fraction),
            route: RouteHealth::new(),
            state: WatchState::Watching,
        }
    }

    /// New entry for a position the ledger reports but we do not track yet
    pub fn adopted(
        token: impl Into<String>,
        name: impl Into<String>,
        symbol: impl Into<String>,
        entry_price: f64,
        hard_stop_fraction: f64,
    ) -> Self {
        let mut entry = Self::watching(
            Candidate::new(token, name, symbol, entry_price),
            hard_stop_fraction,
        );
        entry.state = WatchState::Positioned;
        entry
    }

    pub fn is_positioned(&self) -> bool {
        self.state == WatchState::Positioned
    }

    /// Record a price without touching volatility or the trail
    ///
    /// A candidate admitted without a known price takes its first
    /// observation as the base.
    pub fn observe_price(&mut self, price: f64) {
        self.prev_price = self.last_price;
        self.last_price = price;
        if self.base_price <= 0.0 && price > 0.0 {
            self.base_price = price;
            self.peak_price = price;
        }
    }

    /// Percentage move of the last price since admission
    pub fn move_since_base_pct(&self) -> Option<f64> {
        acceleration_pct(self.base_price, self.last_price)
    }

    /// Reset trailing state for a freshly opened position
    ///
    /// This is the only place the trail level is allowed to move down.
    pub fn open_position(&mut self, entry_price: f64, hard_stop_fraction: f64) {
        self.state = WatchState::Positioned;
        self.last_price = entry_price;
        self.prev_price = entry_price;
        self.volatility = 0.0;
        self.peak_price = entry_price;
        self.trail_level = initial_trail(entry_price, hard_stop_fraction);
        self.route = RouteHealth::new();
    }

    /// Fold a fresh price into a positioned entry
    ///
    /// Updates volatility, peak and the ratcheting trail. The trail only
    /// follows the volatility candidate once some volatility has been seen;
    /// until then the static hard-stop floor holds.
    pub fn apply_tick(&mut self, price: f64, atr_window: usize, trail_k: f64) -> TickUpdate {
        let prev = if self.last_price > 0.0 { self.last_price } else { price };
        self.prev_price = prev;
        self.last_price = price;

        self.volatility = update_volatility(self.volatility, (price - prev).abs(), atr_window);
        self.peak_price = self.peak_price.max(price);

        if self.volatility > 0.0 {
            self.trail_level = ratchet(self.trail_level, self.peak_price, self.volatility, trail_k);
        }

        TickUpdate {
            price,
            prev_price: prev,
            trail_level: self.trail_level,
        }
    }
}

/// Insertion-ordered map of watch entries keyed by token
///
/// Owned by the watch loop; nothing else mutates it.
#[derive(Debug, Default)]
pub struct WatchSet {
    order: Vec<String>,
    entries: HashMap<String, WatchEntry>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    /// Insert if absent, returns false for duplicates
    pub fn insert(&mut self, entry: WatchEntry) -> bool {
        if self.entries.contains_key(&entry.token) {
            return false;
        }
        self.order.push(entry.token.clone());
        self.entries.insert(entry.token.clone(), entry);
        true
    }

    pub fn remove(&mut self, token: &str) -> Option<WatchEntry> {
        let removed = self.entries.remove(token)?;
        self.order.retain(|t| t != token);
        Some(removed)
    }

    pub fn get(&self, token: &str) -> Option<&WatchEntry> {
        self.entries.get(token)
    }

    pub fn get_mut(&mut self, token: &str) -> Option<&mut WatchEntry> {
        self.entries.get_mut(token)
    }

    /// Tokens in the given state, in insertion order
    pub fn tokens_in(&self, state: WatchState) -> Vec<String> {
        self.order
            .iter()
            .filter(|t| self.entries.get(*t).is_some_and(|e| e.state == state))
            .cloned()
            .collect()
    }

    /// Number of entries still waiting for a chase entry
    pub fn watching_count(&self) -> usize {
        self.entries.values().filter(|e| e.state == WatchState::Watching).count()
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &WatchEntry> {
        self.order.iter().filter_map(|t| self.entries.get(t))
    }
}

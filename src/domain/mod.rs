//! Domain Layer - Core watch and exit logic
//!
//! This module contains pure domain types and logic with no external dependencies.
//! All external interactions happen through the ports layer.
//!
//! - `trailing`: EMA/ATR math, the ratcheting stop and the bar-replay simulator
//! - `exit`: exit decisions and their explicit priority
//! - `chase`: chase entry gates
//! - `route_health`: probe throttling and failure streaks
//! - `watch_entry`: per-token watch state and the ordered watch set

pub mod chase;
pub mod exit;
pub mod route_health;
pub mod trailing;
pub mod watch_entry;

pub use chase::ChaseDecision;
pub use exit::{evaluate_price_exits, exit_notional, net_pnl_pct, prioritize, ExitDecision, ExitThresholds};
pub use route_health::RouteHealth;
pub use trailing::{simulate_trailing_exit, Bar, SimExitReason, SimOutcome, TrailParams};
pub use watch_entry::{Candidate, TickUpdate, WatchEntry, WatchSet, WatchState};

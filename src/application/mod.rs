//! Application Layer - Watch loop and the services it drives
//!
//! - `watch_manager`: tick loop, exit state machine and candidate intake
//! - `chase`: opportunistic entries on accelerating candidates
//! - `route_monitor`: execution-route probes and failure streaks
//! - `messages`: notification texts

mod deadline;

pub mod chase;
pub mod messages;
pub mod route_monitor;
pub mod watch_manager;

pub use chase::{ChaseConfig, ChaseEntryEvaluator};
pub use route_monitor::{RouteHealthMonitor, RouteMonitorConfig, RouteProbe};
pub use watch_manager::{
    TickReport, WatchConfig, WatchError, WatchHandle, WatchManager, WatchStatus, CHASE_REASON,
};

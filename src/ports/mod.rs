//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Market data snapshots (price, market cap, liquidity)
//! - Execution route quotes
//! - The position ledger
//! - Outbound notifications

pub mod ledger;
pub mod market_data;
pub mod mocks;
pub mod notifier;
pub mod router;

// Re-export main traits and types
pub use ledger::{ClosedPosition, LedgerError, LedgerPort, OpenRequest, PositionView};
pub use market_data::{MarketDataError, MarketDataPort, MarketSnapshot};
pub use notifier::{NotifierError, NotifierPort};
pub use router::{Quote, RouterError, RouterPort};

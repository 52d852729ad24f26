//! Ledger Adapters
//!
//! - `PaperLedger`: in-memory simulated ledger with JSON trade export

mod paper;

pub use paper::{PaperLedger, PaperLedgerConfig, PaperPosition, PaperStats, PaperTrade, TradeSide};

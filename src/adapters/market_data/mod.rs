//! Market Data Adapters
//!
//! External data sources for price snapshots:
//! - `DexScreenerClient`: best-liquidity pair price, market cap and liquidity

mod dexscreener;

pub use dexscreener::DexScreenerClient;

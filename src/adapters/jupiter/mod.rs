//! Jupiter Adapter
//!
//! Implementation of the RouterPort for the Jupiter DEX aggregator.
//! Quote-only: buys are priced and probed, never executed.

mod client;
mod quote;

pub use client::{JupiterConfig, JupiterRouter};
pub use quote::{QuoteRequest, QuoteResponse, USDC_MINT};

//! Scripted port implementations
//!
//! Deterministic stand-ins for the network-backed adapters: each records
//! the calls it receives and replays a configured script. Used by the
//! integration scenarios and for dry runs without network access.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::market_data::{MarketDataError, MarketDataPort, MarketSnapshot};
use super::notifier::{NotifierError, NotifierPort};
use super::router::{Quote, RouterError, RouterPort};

fn guard<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One scripted market data step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PriceStep {
    Price(f64),
    Missing,
    Fail,
}

/// Market data that replays a per-token price path
///
/// Each call pops the next step; an exhausted script reports no data.
#[derive(Debug, Default, Clone)]
pub struct ScriptedMarketData {
    calls: Arc<Mutex<Vec<String>>>,
    scripts: Arc<Mutex<HashMap<String, VecDeque<PriceStep>>>>,
}

impl ScriptedMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to script a price path for a token
    pub fn with_prices(self, token: &str, prices: &[f64]) -> Self {
        self.push_steps(token, prices.iter().map(|&p| PriceStep::Price(p)));
        self
    }

    /// Builder method to script arbitrary steps for a token
    pub fn with_steps(self, token: &str, steps: &[PriceStep]) -> Self {
        self.push_steps(token, steps.iter().copied());
        self
    }

    /// Append steps to a token's script
    pub fn push_steps(&self, token: &str, steps: impl IntoIterator<Item = PriceStep>) {
        guard(&self.scripts)
            .entry(token.to_string())
            .or_default()
            .extend(steps);
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<String> {
        guard(&self.calls).clone()
    }
}

#[async_trait]
impl MarketDataPort for ScriptedMarketData {
    async fn fetch_snapshot(&self, token: &str) -> Result<Option<MarketSnapshot>, MarketDataError> {
        guard(&self.calls).push(token.to_string());
        let step = guard(&self.scripts)
            .get_mut(token)
            .and_then(VecDeque::pop_front)
            .unwrap_or(PriceStep::Missing);

        match step {
            PriceStep::Price(price) => Ok(Some(MarketSnapshot {
                price,
                market_cap_usd: Some(1_000_000.0),
                liquidity_usd: Some(50_000.0),
            })),
            PriceStep::Missing => Ok(None),
            PriceStep::Fail => Err(MarketDataError::RestError(format!("scripted failure for {}", token))),
        }
    }
}

/// Router that replays per-token quote outcomes
///
/// Tokens without a script (or with an exhausted one) get the default quote.
#[derive(Debug, Clone)]
pub struct ScriptedRouter {
    name: String,
    default_quote: Option<Quote>,
    calls: Arc<Mutex<Vec<(String, f64)>>>,
    scripts: Arc<Mutex<HashMap<String, VecDeque<Option<Quote>>>>>,
}

impl Default for ScriptedRouter {
    fn default() -> Self {
        Self {
            name: "SCRIPTED".to_string(),
            default_quote: Some(Quote {
                price: None,
                fee_pct: 0.0,
                slip_pct: 0.0,
                route: "scripted".to_string(),
            }),
            calls: Arc::default(),
            scripts: Arc::default(),
        }
    }
}

impl ScriptedRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to replace the fallback quote (`None` = no route)
    pub fn with_default(mut self, quote: Option<Quote>) -> Self {
        self.default_quote = quote;
        self
    }

    /// Builder method to script outcomes for a token (`None` = failed quote)
    pub fn with_outcomes(self, token: &str, outcomes: Vec<Option<Quote>>) -> Self {
        guard(&self.scripts)
            .entry(token.to_string())
            .or_default()
            .extend(outcomes);
        self
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<(String, f64)> {
        guard(&self.calls).clone()
    }
}

#[async_trait]
impl RouterPort for ScriptedRouter {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn quote(&self, token: &str, usd: f64) -> Result<Quote, RouterError> {
        guard(&self.calls).push((token.to_string(), usd));
        let scripted = guard(&self.scripts).get_mut(token).and_then(VecDeque::pop_front);

        match scripted.unwrap_or_else(|| self.default_quote.clone()) {
            Some(quote) => Ok(quote),
            None => Err(RouterError::NoRoute(token.to_string())),
        }
    }
}

/// Notifier that keeps every message in memory
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method making every send fail after recording it
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn messages(&self) -> Vec<String> {
        guard(&self.messages).clone()
    }
}

#[async_trait]
impl NotifierPort for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifierError> {
        guard(&self.messages).push(message.to_string());
        if self.fail {
            return Err(NotifierError::Delivery("scripted failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_market_data() {
        let md = ScriptedMarketData::new()
            .with_prices("AAA", &[1.0])
            .with_steps("AAA", &[PriceStep::Fail]);

        assert_eq!(md.fetch_snapshot("AAA").await.unwrap().unwrap().price, 1.0);
        assert!(md.fetch_snapshot("AAA").await.is_err());
        assert!(md.fetch_snapshot("AAA").await.unwrap().is_none());
        assert!(md.fetch_snapshot("BBB").await.unwrap().is_none());
        assert_eq!(md.get_calls().len(), 4);
    }

    #[tokio::test]
    async fn test_scripted_router() {
        let router = ScriptedRouter::new().with_outcomes("AAA", vec![None]);

        assert!(router.quote("AAA", 8.0).await.is_err());
        assert!(router.quote("AAA", 8.0).await.is_ok());
        assert_eq!(router.get_calls(), vec![("AAA".to_string(), 8.0), ("AAA".to_string(), 8.0)]);
        assert_eq!(router.name(), "SCRIPTED");
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let ok = RecordingNotifier::new();
        ok.send("hello").await.unwrap();
        assert_eq!(ok.messages(), vec!["hello"]);

        let failing = RecordingNotifier::new().failing();
        assert!(failing.send("x").await.is_err());
        assert_eq!(failing.messages().len(), 1);
    }
}

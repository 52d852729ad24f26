//! Watch loop scenarios against the paper ledger and scripted ports

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use async_trait::async_trait;

use trailwatch::adapters::ledger::{PaperLedger, PaperLedgerConfig};
use trailwatch::application::{WatchConfig, WatchError, WatchManager, CHASE_REASON};
use trailwatch::config::Config;
use trailwatch::domain::{Candidate, ExitDecision};
use trailwatch::ports::mocks::{PriceStep, RecordingNotifier, ScriptedMarketData, ScriptedRouter};
use trailwatch::ports::{ClosedPosition, LedgerError, LedgerPort, OpenRequest, PositionView, Quote};

struct Harness {
    manager: WatchManager,
    handle: trailwatch::application::WatchHandle,
    ledger: Arc<PaperLedger>,
    router: ScriptedRouter,
    notifier: RecordingNotifier,
}

fn harness(config: &Config, market_data: ScriptedMarketData, router: ScriptedRouter) -> Harness {
    let ledger = Arc::new(PaperLedger::new(PaperLedgerConfig::from_sections(
        &config.ledger,
        &config.chase,
    )));
    let notifier = RecordingNotifier::new();
    let (manager, handle) = WatchManager::new(
        WatchConfig::from(config),
        Arc::new(market_data),
        Arc::new(router.clone()),
        ledger.clone(),
        Arc::new(notifier.clone()),
    );
    Harness {
        manager,
        handle,
        ledger,
        router,
        notifier,
    }
}

fn no_gap_config() -> Config {
    let mut config = Config::default();
    config.protection.gap_protect = false;
    config
}

async fn open(ledger: &PaperLedger, token: &str, price: f64) {
    ledger
        .open_position(OpenRequest {
            token: token.to_string(),
            name: format!("{} Coin", token),
            symbol: token.to_string(),
            entry_usd: 10.0,
            entry_price: price,
            fee_pct: 0.0,
            slip_pct: 0.0,
            router: "SCRIPTED".to_string(),
            market_cap_usd: None,
            liquidity_usd: None,
            reason: "manual".to_string(),
        })
        .await
        .unwrap();
}

fn quote(price: f64, fee_pct: f64, slip_pct: f64) -> Quote {
    Quote {
        price: Some(price),
        fee_pct,
        slip_pct,
        route: "Raydium -> Orca".to_string(),
    }
}

#[tokio::test]
async fn test_trail_ratchets_then_exits_at_stop_level() {
    let market_data = ScriptedMarketData::new().with_prices("AAA", &[1.00, 1.10, 1.30, 1.05]);
    let mut h = harness(&no_gap_config(), market_data, ScriptedRouter::new());
    open(&h.ledger, "AAA", 1.00).await;

    let mut last_trail = 0.0;
    for _ in 0..3 {
        let report = h.manager.tick().await.unwrap();
        assert!(report.exits.is_empty());
        let trail = h.manager.watch_set().get("AAA").unwrap().trail_level;
        assert!(trail >= last_trail);
        last_trail = trail;
    }
    // Ratcheted well above the 0.80 hard stop
    assert_relative_eq!(last_trail, 1.1774, epsilon = 1e-3);

    let report = h.manager.tick().await.unwrap();
    assert_eq!(report.exits.len(), 1);
    let (token, decision) = &report.exits[0];
    assert_eq!(token, "AAA");
    match decision {
        ExitDecision::Trail { price } => assert_relative_eq!(*price, last_trail, epsilon = 1e-12),
        other => panic!("expected trail exit, got {:?}", other),
    }

    assert!(h.manager.watch_set().get("AAA").is_none());
    assert_eq!(h.ledger.open_count().await, 0);
    assert_relative_eq!(h.ledger.balance_usd().await, 40.0 + 10.0 * (last_trail - 1.0), epsilon = 1e-9);

    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("🔻 Trailed out - AAA Coin"));
    assert!(messages[0].contains("net +17.7%"));
}

#[tokio::test]
async fn test_gap_outranks_trail_on_the_same_dip() {
    let market_data = ScriptedMarketData::new().with_prices("AAA", &[1.00, 1.10, 1.30, 1.05]);
    let mut h = harness(&Config::default(), market_data, ScriptedRouter::new());
    open(&h.ledger, "AAA", 1.00).await;

    for _ in 0..3 {
        h.manager.tick().await.unwrap();
    }
    let report = h.manager.tick().await.unwrap();
    assert_eq!(report.exits, vec![("AAA".to_string(), ExitDecision::Gap { price: 1.05 })]);
    assert!(h.notifier.messages()[0].starts_with("🛡️ Gap exit - AAA Coin"));
}

#[tokio::test]
async fn test_single_tick_cliff_exits_at_market() {
    let market_data = ScriptedMarketData::new().with_prices("BBB", &[1.00, 0.60]);
    let mut h = harness(&no_gap_config(), market_data, ScriptedRouter::new());
    open(&h.ledger, "BBB", 1.00).await;

    assert!(h.manager.tick().await.unwrap().exits.is_empty());
    let report = h.manager.tick().await.unwrap();
    assert_eq!(report.exits, vec![("BBB".to_string(), ExitDecision::CliffRug { price: 0.60 })]);

    let sell = h.ledger.trades().await.pop().unwrap();
    assert_eq!(sell.reason, "rug");
    assert_relative_eq!(sell.pnl_pct.unwrap(), -40.0, epsilon = 1e-9);
    assert!(h.notifier.messages()[0].contains("net -40.0%"));
}

#[tokio::test]
async fn test_accelerating_candidate_is_chased() {
    let market_data = ScriptedMarketData::new().with_prices("CCC", &[1.03]);
    let router = ScriptedRouter::new().with_default(Some(quote(1.03, 1.0, 1.0)));
    let mut h = harness(&Config::default(), market_data, router);

    h.handle
        .add_candidate(Candidate::new("CCC", "Chase Coin", "CC", 1.00))
        .unwrap();
    let report = h.manager.tick().await.unwrap();

    assert_eq!(report.admitted, 1);
    assert_eq!(report.entries, vec!["CCC".to_string()]);

    let position = h.ledger.get_position("CCC").await.unwrap();
    assert_relative_eq!(position.entry_price, 1.03);
    assert_relative_eq!(position.entry_usd, 10.0);
    assert_eq!(position.reason, CHASE_REASON);
    assert_eq!(position.router, "SCRIPTED");

    let entry = h.manager.watch_set().get("CCC").unwrap();
    assert!(entry.is_positioned());
    assert_relative_eq!(entry.trail_level, 1.03 * 0.8, epsilon = 1e-12);

    assert_eq!(h.router.get_calls(), vec![("CCC".to_string(), 10.0)]);
    assert!(h.notifier.messages()[0].starts_with("🟢 BUY (paper chase) - Chase Coin"));
}

#[tokio::test]
async fn test_quiet_candidate_is_not_chased() {
    let market_data = ScriptedMarketData::new().with_prices("CCC", &[1.02]);
    let router = ScriptedRouter::new().with_default(Some(quote(1.02, 1.0, 1.0)));
    let mut h = harness(&Config::default(), market_data, router);

    h.handle
        .add_candidate(Candidate::new("CCC", "Chase Coin", "CC", 1.00))
        .unwrap();
    let report = h.manager.tick().await.unwrap();

    assert!(report.entries.is_empty());
    assert!(h.router.get_calls().is_empty());
    assert_eq!(h.ledger.open_count().await, 0);
}

#[tokio::test]
async fn test_costly_route_blocks_chase() {
    let market_data = ScriptedMarketData::new().with_prices("CCC", &[1.10]);
    let router = ScriptedRouter::new().with_default(Some(quote(1.10, 1.0, 4.5)));
    let mut h = harness(&Config::default(), market_data, router);

    h.handle
        .add_candidate(Candidate::new("CCC", "Chase Coin", "CC", 1.00))
        .unwrap();
    let report = h.manager.tick().await.unwrap();

    assert!(report.entries.is_empty());
    assert_eq!(h.router.get_calls().len(), 1);
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn test_route_failure_exits_on_second_consecutive_failure() {
    let mut config = Config::default();
    config.protection.route_probe_interval_secs = 0;

    let market_data = ScriptedMarketData::new().with_prices("DDD", &[1.00, 1.00, 1.00]);
    let router = ScriptedRouter::new().with_outcomes("DDD", vec![None, None, None]);
    let mut h = harness(&config, market_data, router);
    open(&h.ledger, "DDD", 1.00).await;

    let first = h.manager.tick().await.unwrap();
    assert!(first.exits.is_empty());
    assert_eq!(h.manager.watch_set().get("DDD").unwrap().route.fail_streak(), 1);

    let second = h.manager.tick().await.unwrap();
    assert_eq!(
        second.exits,
        vec![("DDD".to_string(), ExitDecision::RouteFail { price: 1.00, streak: 2 })]
    );
    assert_eq!(h.router.get_calls().len(), 2);
    assert!(h.notifier.messages()[0].starts_with("🛡️ Route fail exit - DDD Coin (2x)"));

    // Nothing left to probe on the third tick
    let third = h.manager.tick().await.unwrap();
    assert!(third.exits.is_empty());
    assert_eq!(h.router.get_calls().len(), 2);
}

#[tokio::test]
async fn test_route_probe_is_throttled() {
    let market_data = ScriptedMarketData::new().with_prices("DDD", &[1.00, 1.00, 1.00]);
    let router = ScriptedRouter::new().with_outcomes("DDD", vec![None, None, None]);
    let mut h = harness(&Config::default(), market_data, router);
    open(&h.ledger, "DDD", 1.00).await;

    for _ in 0..3 {
        assert!(h.manager.tick().await.unwrap().exits.is_empty());
    }
    // Default interval is 10s, so only the first tick probes
    assert_eq!(h.router.get_calls().len(), 1);
}

#[tokio::test]
async fn test_externally_closed_position_is_dropped_silently() {
    let market_data = ScriptedMarketData::new().with_prices("EEE", &[1.00, 1.00]);
    let mut h = harness(&Config::default(), market_data, ScriptedRouter::new());
    open(&h.ledger, "EEE", 1.00).await;

    let report = h.manager.tick().await.unwrap();
    assert_eq!(report.adopted, 1);

    h.ledger.close_position("EEE", 10.0, "manual").await.unwrap();
    // A second close is a no-op
    assert!(h.ledger.close_position("EEE", 10.0, "manual").await.unwrap().is_none());

    let report = h.manager.tick().await.unwrap();
    assert!(report.exits.is_empty());
    assert!(h.manager.watch_set().is_empty());
    assert!(h.notifier.messages().is_empty());
}

#[tokio::test]
async fn test_full_ledger_blocks_chase_before_quoting() {
    let mut config = Config::default();
    config.ledger.max_open_positions = 1;

    let market_data = ScriptedMarketData::new()
        .with_prices("HELD", &[1.00])
        .with_prices("CCC", &[1.10]);
    let router = ScriptedRouter::new().with_default(Some(quote(1.10, 0.5, 0.5)));
    let mut h = harness(&config, market_data, router);
    open(&h.ledger, "HELD", 1.00).await;

    h.handle
        .add_candidate(Candidate::new("CCC", "Chase Coin", "CC", 1.00))
        .unwrap();
    let report = h.manager.tick().await.unwrap();

    assert!(report.entries.is_empty());
    // Only the held position's route probe reached the router
    let calls = h.router.get_calls();
    assert!(calls.iter().all(|(token, _)| token == "HELD"));
    assert_eq!(h.ledger.open_count().await, 1);
}

#[tokio::test]
async fn test_watchlist_capacity_and_duplicates() {
    let mut config = Config::default();
    config.watch.watchlist_max = 2;
    let mut h = harness(&config, ScriptedMarketData::new(), ScriptedRouter::new());

    for token in ["A1", "A2", "A1", "A3"] {
        h.handle.add_candidate(Candidate::new(token, token, token, 1.0)).unwrap();
    }
    let report = h.manager.tick().await.unwrap();

    assert_eq!(report.admitted, 2);
    assert_eq!(report.skipped, 2);
    let tokens: Vec<&str> = h.manager.watch_set().iter().map(|e| e.token.as_str()).collect();
    assert_eq!(tokens, vec!["A1", "A2"]);
}

#[tokio::test]
async fn test_missing_price_skips_position_for_the_tick() {
    let market_data = ScriptedMarketData::new().with_steps(
        "FFF",
        &[PriceStep::Price(1.00), PriceStep::Missing, PriceStep::Fail, PriceStep::Price(1.00)],
    );
    let mut h = harness(&Config::default(), market_data, ScriptedRouter::new());
    open(&h.ledger, "FFF", 1.00).await;

    assert_eq!(h.manager.tick().await.unwrap().skipped, 0);
    assert_eq!(h.manager.tick().await.unwrap().skipped, 1);
    assert_eq!(h.manager.tick().await.unwrap().skipped, 1);
    assert_eq!(h.manager.tick().await.unwrap().skipped, 0);
    assert!(h.manager.watch_set().get("FFF").unwrap().is_positioned());
}

#[tokio::test]
async fn test_queue_full_is_reported() {
    let mut config = Config::default();
    config.watch.candidate_queue_size = 1;
    let h = harness(&config, ScriptedMarketData::new(), ScriptedRouter::new());

    h.handle.add_candidate(Candidate::new("A1", "A1", "A1", 1.0)).unwrap();
    assert!(matches!(
        h.handle.add_candidate(Candidate::new("A2", "A2", "A2", 1.0)),
        Err(WatchError::QueueFull(_))
    ));
}

#[tokio::test]
async fn test_held_positions_count_against_watchlist() {
    let mut config = Config::default();
    config.watch.watchlist_max = 2;
    let market_data = ScriptedMarketData::new()
        .with_prices("P1", &[1.00, 1.00])
        .with_prices("P2", &[1.00, 1.00]);
    let mut h = harness(&config, market_data, ScriptedRouter::new());
    open(&h.ledger, "P1", 1.00).await;
    open(&h.ledger, "P2", 1.00).await;

    assert_eq!(h.manager.tick().await.unwrap().adopted, 2);

    h.handle.add_candidate(Candidate::new("C1", "C1", "C1", 1.0)).unwrap();
    h.handle.add_candidate(Candidate::new("C2", "C2", "C2", 1.0)).unwrap();
    let report = h.manager.tick().await.unwrap();

    assert_eq!(report.admitted, 0);
    assert_eq!(h.manager.watch_set().len(), 2);
    assert!(h.manager.watch_set().iter().all(|e| e.is_positioned()));
}

/// Paper ledger whose first close attempt fails
struct FlakyCloseLedger {
    inner: Arc<PaperLedger>,
    failed_once: AtomicBool,
}

#[async_trait]
impl LedgerPort for FlakyCloseLedger {
    async fn free_capacity(&self, next_usd: f64) -> Result<bool, LedgerError> {
        self.inner.free_capacity(next_usd).await
    }

    async fn open_position(&self, request: OpenRequest) -> Result<(), LedgerError> {
        self.inner.open_position(request).await
    }

    async fn close_position(
        &self,
        token: &str,
        exit_usd: f64,
        reason: &str,
    ) -> Result<Option<ClosedPosition>, LedgerError> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(LedgerError::Storage("ledger busy".to_string()));
        }
        self.inner.close_position(token, exit_usd, reason).await
    }

    async fn mark_price(&self, token: &str, price: f64) -> Result<(), LedgerError> {
        self.inner.mark_price(token, price).await
    }

    async fn list_open_positions(&self) -> Result<HashMap<String, PositionView>, LedgerError> {
        self.inner.list_open_positions().await
    }
}

#[tokio::test]
async fn test_route_fail_exit_retried_while_probe_is_throttled() {
    let mut config = Config::default();
    config.protection.route_fail_threshold = 1;

    let paper = Arc::new(PaperLedger::new(PaperLedgerConfig::from_sections(
        &config.ledger,
        &config.chase,
    )));
    open(&paper, "DDD", 1.00).await;
    let ledger = Arc::new(FlakyCloseLedger {
        inner: paper.clone(),
        failed_once: AtomicBool::new(false),
    });

    let market_data = ScriptedMarketData::new().with_prices("DDD", &[1.00, 1.00]);
    let router = ScriptedRouter::new().with_outcomes("DDD", vec![None]);
    let notifier = RecordingNotifier::new();
    let (mut manager, _handle) = WatchManager::new(
        WatchConfig::from(&config),
        Arc::new(market_data),
        Arc::new(router.clone()),
        ledger,
        Arc::new(notifier.clone()),
    );

    let first = manager.tick().await.unwrap();
    assert!(first.exits.is_empty());
    assert_eq!(paper.open_count().await, 1);

    // Default 10s probe interval: no new probe, the failing route still stands
    let second = manager.tick().await.unwrap();
    assert_eq!(
        second.exits,
        vec![("DDD".to_string(), ExitDecision::RouteFail { price: 1.00, streak: 1 })]
    );
    assert_eq!(router.get_calls().len(), 1);
    assert_eq!(paper.open_count().await, 0);

    let messages = notifier.messages();
    assert!(messages[0].starts_with("⚠️ Exit (route_fail) failed"));
    assert!(messages[1].starts_with("🛡️ Route fail exit - DDD Coin (1x)"));
}

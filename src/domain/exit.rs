//! Exit Decisions
//!
//! Tagged result of evaluating one open position on a tick, plus the
//! explicit priority ordering between competing triggers:
//! Gap > CliffRug > Trail > RouteFail.

use serde::{Deserialize, Serialize};

/// Exit decision for one position on one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitDecision {
    /// Keep holding
    None,
    /// Price fell through the trail by more than the gap fraction
    Gap { price: f64 },
    /// Single-tick collapse at or beyond the rug-drop fraction
    CliffRug { price: f64 },
    /// Price at or below the trailing stop; filled at the stop level
    Trail { price: f64 },
    /// Execution route failed too many probes in a row
    RouteFail { price: f64, streak: u32 },
}

impl ExitDecision {
    /// Priority rank, lower wins. `None` never wins.
    pub fn rank(&self) -> u8 {
        match self {
            ExitDecision::Gap { .. } => 0,
            ExitDecision::CliffRug { .. } => 1,
            ExitDecision::Trail { .. } => 2,
            ExitDecision::RouteFail { .. } => 3,
            ExitDecision::None => u8::MAX,
        }
    }

    pub fn is_exit(&self) -> bool {
        !matches!(self, ExitDecision::None)
    }

    /// Price the exit is marked at
    pub fn exit_price(&self) -> Option<f64> {
        match *self {
            ExitDecision::None => None,
            ExitDecision::Gap { price }
            | ExitDecision::CliffRug { price }
            | ExitDecision::Trail { price }
            | ExitDecision::RouteFail { price, .. } => Some(price),
        }
    }

    /// Reason code passed to the ledger
    pub fn reason_code(&self) -> &'static str {
        match self {
            ExitDecision::None => "none",
            ExitDecision::Gap { .. } => "gap",
            ExitDecision::CliffRug { .. } => "rug",
            ExitDecision::Trail { .. } => "trail",
            ExitDecision::RouteFail { .. } => "route_fail",
        }
    }
}

impl std::fmt::Display for ExitDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.exit_price() {
            Some(price) => write!(f, "{} @ {:.10}", self.reason_code(), price),
            None => f.write_str("none"),
        }
    }
}

/// Pick the highest-priority exit among simultaneously true conditions
pub fn prioritize<I>(decisions: I) -> ExitDecision
where
    I: IntoIterator<Item = ExitDecision>,
{
    decisions
        .into_iter()
        .filter(ExitDecision::is_exit)
        .min_by_key(ExitDecision::rank)
        .unwrap_or(ExitDecision::None)
}

/// Thresholds for the price-driven exit checks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitThresholds {
    pub gap_protect: bool,
    pub gap_fraction: f64,
    pub rug_enabled: bool,
    pub rug_drop_fraction: f64,
}

/// Evaluate gap, cliff and trail conditions for a tick
///
/// `prev_price` is the price seen on the previous tick, `trail` the level
/// after this tick's ratchet. Route health is evaluated separately because
/// it needs a network probe.
pub fn evaluate_price_exits(
    price: f64,
    prev_price: f64,
    trail: f64,
    thresholds: &ExitThresholds,
) -> ExitDecision {
    let gap = (thresholds.gap_protect && price <= trail * (1.0 - thresholds.gap_fraction))
        .then_some(ExitDecision::Gap { price });

    let cliff = (thresholds.rug_enabled
        && prev_price > 0.0
        && (prev_price - price) / prev_price >= thresholds.rug_drop_fraction)
        .then_some(ExitDecision::CliffRug { price });

    let trail_hit = (price <= trail).then_some(ExitDecision::Trail { price: trail });

    prioritize([gap, cliff, trail_hit].into_iter().flatten())
}

/// Net PnL percentage of an exit versus the entry price
pub fn net_pnl_pct(entry_price: f64, exit_price: f64) -> f64 {
    if entry_price <= 0.0 {
        return 0.0;
    }
    (exit_price / entry_price - 1.0) * 100.0
}

/// Exit notional: entry notional scaled by the price ratio
pub fn exit_notional(entry_usd: f64, entry_price: f64, exit_price: f64) -> f64 {
    if entry_price <= 0.0 {
        return 0.0;
    }
    entry_usd * (exit_price / entry_price)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> ExitThresholds {
        ExitThresholds {
            gap_protect: true,
            gap_fraction: 0.08,
            rug_enabled: true,
            rug_drop_fraction: 0.35,
        }
    }

    #[test]
    fn test_prioritize_order() {
        let all = [
            ExitDecision::RouteFail { price: 1.0, streak: 2 },
            ExitDecision::Trail { price: 1.1 },
            ExitDecision::CliffRug { price: 0.9 },
            ExitDecision::Gap { price: 0.8 },
        ];
        assert_eq!(prioritize(all), ExitDecision::Gap { price: 0.8 });
        assert_eq!(prioritize(all[..3].to_vec()), ExitDecision::CliffRug { price: 0.9 });
        assert_eq!(prioritize(all[..2].to_vec()), ExitDecision::Trail { price: 1.1 });
        assert_eq!(
            prioritize([ExitDecision::None, all[0]]),
            ExitDecision::RouteFail { price: 1.0, streak: 2 }
        );
    }

    #[test]
    fn test_prioritize_empty_is_none() {
        assert_eq!(prioritize(Vec::new()), ExitDecision::None);
        assert_eq!(prioritize([ExitDecision::None]), ExitDecision::None);
    }

    #[test]
    fn test_gap_beats_trail() {
        // Trail at 1.0, price 0.85 is both under the trail and under 0.92
        let d = evaluate_price_exits(0.85, 0.95, 1.0, &thresholds());
        assert_eq!(d, ExitDecision::Gap { price: 0.85 });
        assert_eq!(d.reason_code(), "gap");
    }

    #[test]
    fn test_cliff_beats_trail() {
        let t = ExitThresholds { gap_protect: false, ..thresholds() };
        let d = evaluate_price_exits(0.60, 1.00, 0.80, &t);
        assert_eq!(d, ExitDecision::CliffRug { price: 0.60 });
    }

    #[test]
    fn test_trail_marked_at_stop_level() {
        let d = evaluate_price_exits(0.99, 1.01, 1.0, &thresholds());
        assert_eq!(d, ExitDecision::Trail { price: 1.0 });
        assert_eq!(d.exit_price(), Some(1.0));
    }

    #[test]
    fn test_disabled_guards_fall_through_to_trail() {
        let t = ExitThresholds { gap_protect: false, rug_enabled: false, ..thresholds() };
        let d = evaluate_price_exits(0.5, 1.0, 0.9, &t);
        assert_eq!(d, ExitDecision::Trail { price: 0.9 });
    }

    #[test]
    fn test_hold_above_trail() {
        let d = evaluate_price_exits(1.2, 1.19, 1.0, &thresholds());
        assert_eq!(d, ExitDecision::None);
        assert!(!d.is_exit());
        assert_eq!(d.to_string(), "none");
    }

    #[test]
    fn test_zero_prev_price_never_cliffs() {
        let t = ExitThresholds { gap_protect: false, ..thresholds() };
        assert_eq!(evaluate_price_exits(1.0, 0.0, 0.5, &t), ExitDecision::None);
    }

    #[test]
    fn test_pnl_and_notional() {
        assert!((net_pnl_pct(1.0, 0.6) + 40.0).abs() < 1e-9);
        assert!((exit_notional(10.0, 1.0, 1.2) - 12.0).abs() < 1e-9);
        assert_eq!(net_pnl_pct(0.0, 1.0), 0.0);
        assert_eq!(exit_notional(10.0, 0.0, 1.0), 0.0);
    }
}

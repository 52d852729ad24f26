//! Chase entry decisions
//!
//! Pure gates used when deciding whether to buy a watched token that is
//! accelerating away from its admission price.

use serde::{Deserialize, Serialize};

/// Outcome of evaluating one watched token for a chase entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChaseDecision {
    NoAction,
    EnterAt {
        price: f64,
        fee_pct: f64,
        slip_pct: f64,
        route: String,
        /// Move since admission, in percent
        move_pct: f64,
    },
}

/// Percentage move from `base` to `last`, `None` for non-positive prices
pub fn acceleration_pct(base: f64, last: f64) -> Option<f64> {
    if base <= 0.0 || last <= 0.0 {
        return None;
    }
    Some((last / base - 1.0) * 100.0)
}

/// Whether the move since admission reaches the chase threshold
pub fn is_accelerating(base: f64, last: f64, threshold_pct: f64) -> Option<f64> {
    acceleration_pct(base, last).filter(|m| *m >= threshold_pct)
}

/// Fee and slippage both within their caps (caps are inclusive)
pub fn within_cost_caps(fee_pct: f64, slip_pct: f64, fee_cap_pct: f64, slippage_cap_pct: f64) -> bool {
    fee_pct <= fee_cap_pct && slip_pct <= slippage_cap_pct
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceleration() {
        let m = acceleration_pct(1.0, 1.03).unwrap();
        assert!((m - 3.0).abs() < 1e-9);
        assert!(is_accelerating(1.0, 1.03, 2.5).is_some());
        assert!(is_accelerating(1.0, 1.02, 2.5).is_none());
    }

    #[test]
    fn test_non_positive_prices_never_trigger() {
        assert!(acceleration_pct(0.0, 1.0).is_none());
        assert!(acceleration_pct(1.0, 0.0).is_none());
        assert!(is_accelerating(-1.0, 5.0, 0.0).is_none());
    }

    #[test]
    fn test_cost_caps() {
        assert!(within_cost_caps(1.0, 1.0, 3.0, 3.0));
        assert!(within_cost_caps(3.0, 3.0, 3.0, 3.0));
        assert!(!within_cost_caps(3.1, 1.0, 3.0, 3.0));
        assert!(!within_cost_caps(1.0, 3.5, 3.0, 3.0));
    }
}

//! Trailing Stop Calculator
//!
//! Pure volatility and stop-level math used by the watch loop and the
//! bar-replay simulator.
//!
//! - `ema`: exponential moving average, k = 2 / (span + 1), seeded with the first input
//! - `atr`: EMA of the true range over a high/low/close history
//! - `ratchet`: peak minus K x volatility, never lower than the previous level
//! - `simulate_trailing_exit`: replays bars through the trailing-only exit rules

use serde::{Deserialize, Serialize};

/// Smoothing constant for an EMA of the given span
pub fn ema_alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Exponential moving average of a series
///
/// The first output equals the first input. An empty input yields an empty output.
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };

    let k = ema_alpha(span);
    let mut out = Vec::with_capacity(values.len());
    out.push(first);

    for &v in &values[1..] {
        let prev = out[out.len() - 1];
        out.push(prev + k * (v - prev));
    }

    out
}

/// True range of a single bar given the previous close
pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

/// Average True Range series
///
/// `prev_close` starts at the first close, so the first true range is just
/// the first bar's high-low spread. Slices of unequal length are truncated
/// to the shortest one.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], window: usize) -> Vec<f64> {
    let mut prev_close = closes.first().copied().unwrap_or(0.0);

    let trs: Vec<f64> = highs
        .iter()
        .zip(lows)
        .zip(closes)
        .map(|((&h, &l), &c)| {
            let tr = true_range(h, l, prev_close);
            prev_close = c;
            tr
        })
        .collect();

    ema(&trs, window)
}

/// One EMA step of the absolute tick-to-tick change
///
/// Seeded at zero, so the estimate grows from nothing as a position ages.
pub fn update_volatility(previous: f64, abs_change: f64, window: usize) -> f64 {
    let alpha = ema_alpha(window);
    previous * (1.0 - alpha) + abs_change * alpha
}

/// Static stop floor for a freshly opened position
pub fn initial_trail(entry_price: f64, hard_stop_fraction: f64) -> f64 {
    entry_price * (1.0 - hard_stop_fraction)
}

/// Volatility-derived stop candidate for a given peak
pub fn trail_candidate(peak: f64, volatility: f64, k: f64) -> f64 {
    peak - k * volatility
}

/// Ratchet the stop level: `max(previous, peak - k * volatility)`
pub fn ratchet(previous: f64, peak: f64, volatility: f64, k: f64) -> f64 {
    previous.max(trail_candidate(peak, volatility, k))
}

/// Parameters for the trailing-only replay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrailParams {
    pub atr_window: usize,
    pub trail_k: f64,
    pub hard_stop_fraction: f64,
    pub gap_protect: bool,
    pub gap_fraction: f64,
    pub rug_enabled: bool,
    pub rug_drop_fraction: f64,
}

impl Default for TrailParams {
    fn default() -> Self {
        Self {
            atr_window: 12,
            trail_k: 2.8,
            hard_stop_fraction: 0.20,
            gap_protect: true,
            gap_fraction: 0.08,
            rug_enabled: true,
            rug_drop_fraction: 0.35,
        }
    }
}

/// One OHLC-like bar (open is not needed by the replay)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(high: f64, low: f64, close: f64) -> Self {
        Self { high, low, close }
    }
}

/// How a replay ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimExitReason {
    Gap,
    Trail,
    Rug,
    Hold,
    NoData,
}

impl SimExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SimExitReason::Gap => "gap",
            SimExitReason::Trail => "trail",
            SimExitReason::Rug => "rug",
            SimExitReason::Hold => "hold",
            SimExitReason::NoData => "no_data",
        }
    }
}

impl std::fmt::Display for SimExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a trailing-only replay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimOutcome {
    /// Net PnL percentage versus the first close
    pub net_pnl_pct: f64,
    /// Best run-up percentage seen before the exit
    pub peak_runup_pct: f64,
    pub reason: SimExitReason,
    /// Bar index at which the replay exited (last bar for `Hold`)
    pub bars_held: usize,
}

/// Replay bars through the trailing-only exit rules
///
/// Entry is at the first close. Bar-based ordering differs from the live
/// loop: gap, then trail touch inside the bar, then close-to-close cliff.
pub fn simulate_trailing_exit(bars: &[Bar], params: &TrailParams) -> SimOutcome {
    let Some(first) = bars.first() else {
        return SimOutcome {
            net_pnl_pct: 0.0,
            peak_runup_pct: 0.0,
            reason: SimExitReason::NoData,
            bars_held: 0,
        };
    };

    let highs: Vec<f64> = bars.iter().map(|b| b.high).collect();
    let lows: Vec<f64> = bars.iter().map(|b| b.low).collect();
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let atrs = atr(&highs, &lows, &closes, params.atr_window);

    let entry = first.close;
    let pct = |price: f64| (price / entry - 1.0) * 100.0;

    let mut peak = entry;
    let mut trail = initial_trail(entry, params.hard_stop_fraction);
    let mut peak_runup: f64 = 0.0;

    for i in 1..bars.len() {
        let bar = bars[i];
        peak = peak.max(bar.high);
        peak_runup = peak_runup.max(pct(peak));

        let volatility = atrs.get(i).or(atrs.last()).copied().unwrap_or(0.0);
        trail = ratchet(trail, peak, volatility, params.trail_k);

        if params.gap_protect && bar.close < trail * (1.0 - params.gap_fraction) {
            return SimOutcome {
                net_pnl_pct: pct(bar.close),
                peak_runup_pct: peak_runup,
                reason: SimExitReason::Gap,
                bars_held: i,
            };
        }

        if (bar.low <= trail && trail <= bar.high) || bar.close <= trail {
            return SimOutcome {
                net_pnl_pct: pct(trail),
                peak_runup_pct: peak_runup,
                reason: SimExitReason::Trail,
                bars_held: i,
            };
        }

        if params.rug_enabled {
            let prev_close = closes[i - 1];
            let drop = (prev_close - bar.close) / prev_close.max(1e-9);
            if drop >= params.rug_drop_fraction {
                return SimOutcome {
                    net_pnl_pct: pct(bar.close),
                    peak_runup_pct: peak_runup,
                    reason: SimExitReason::Rug,
                    bars_held: i,
                };
            }
        }
    }

    SimOutcome {
        net_pnl_pct: pct(closes[closes.len() - 1]),
        peak_runup_pct: peak_runup,
        reason: SimExitReason::Hold,
        bars_held: bars.len() - 1,
    }
}

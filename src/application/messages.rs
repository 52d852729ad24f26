//! Notification texts for entries and exits

use crate::domain::{net_pnl_pct, ExitDecision};

/// First characters of a mint, enough to tell tokens apart in chat
pub fn short_mint(token: &str) -> String {
    token.chars().take(6).collect()
}

pub fn chase_buy(name: &str, entry_usd: f64, price: f64, fee_pct: f64, slip_pct: f64, move_pct: f64) -> String {
    format!(
        "🟢 BUY (paper chase) - {} | entry ${:.2} at ~{:.10} | fee {:.2}% slip {:.2}% | move since add {:+.1}%",
        name, entry_usd, price, fee_pct, slip_pct, move_pct
    )
}

/// Exit text for a decision; `None` for `ExitDecision::None`
pub fn exit_message(name: &str, token: &str, entry_price: f64, decision: &ExitDecision) -> Option<String> {
    let price = decision.exit_price()?;
    let net = net_pnl_pct(entry_price, price);

    let text = match decision {
        ExitDecision::Gap { .. } => format!(
            "🛡️ Gap exit - {} {}… at ~{:.10} | net {:+.1}%",
            name,
            short_mint(token),
            price,
            net
        ),
        ExitDecision::CliffRug { .. } => {
            format!("🛡️ Rug guard - {} cut at ~{:.10} | net {:+.1}%", name, price, net)
        }
        ExitDecision::Trail { .. } => {
            format!("🔻 Trailed out - {} at ~{:.10} | net {:+.1}%", name, price, net)
        }
        ExitDecision::RouteFail { streak, .. } => {
            format!("🛡️ Route fail exit - {} ({}x) | net {:+.1}%", name, streak, net)
        }
        ExitDecision::None => return None,
    };
    Some(text)
}

pub fn open_failed(name: &str, reason: &str) -> String {
    format!("⚠️ Chase open failed - {}: {}", name, reason)
}

pub fn close_failed(name: &str, exit: &ExitDecision, reason: &str) -> String {
    format!("⚠️ Exit ({}) failed - {}: {}", exit.reason_code(), name, reason)
}

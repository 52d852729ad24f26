//! CLI Command Handlers
//!
//! Argument definitions and the handlers behind each subcommand.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use crate::adapters::jupiter::{JupiterConfig, JupiterRouter};
use crate::adapters::ledger::{PaperLedger, PaperLedgerConfig};
use crate::adapters::market_data::DexScreenerClient;
use crate::adapters::notifier::{LogNotifier, TelegramNotifier};
use crate::application::{WatchConfig, WatchManager};
use crate::config::{load_config, Config};
use crate::domain::{simulate_trailing_exit, Bar, Candidate, TrailParams};
use crate::ports::{LedgerPort, NotifierPort};

/// Trailwatch - trailing-stop guard and momentum chaser for watched tokens
#[derive(Parser, Debug)]
#[command(
    name = "trailwatch",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Trailing-stop guard and momentum chaser for watched tokens",
    long_about = "Trailwatch keeps a bounded watchlist of tokens, opens paper positions \
                  when a watched token accelerates, and protects open positions with a \
                  volatility-scaled trailing stop plus gap, cliff and route-failure guards."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the watch loop
    Run(RunCmd),

    /// Load and validate a configuration file
    CheckConfig(CheckConfigCmd),

    /// Replay a bar file through the trailing-only simulator
    Backtest(BacktestCmd),
}

/// Start the watch loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/trailwatch.toml")]
    pub config: PathBuf,

    /// Token mints to watch from the start
    #[arg(short, long = "watch", value_name = "MINT")]
    pub watch: Vec<String>,
}

/// Validate configuration
#[derive(Parser, Debug)]
pub struct CheckConfigCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/trailwatch.toml")]
    pub config: PathBuf,
}

/// Trailing-only replay
#[derive(Parser, Debug)]
pub struct BacktestCmd {
    /// JSON file holding an array of {high, low, close} bars
    #[arg(value_name = "BARS")]
    pub bars: PathBuf,

    /// Take trailing and protection parameters from this config
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the volatility window
    #[arg(long, value_name = "BARS")]
    pub atr_window: Option<usize>,

    /// Override the trail multiplier
    #[arg(long, value_name = "K")]
    pub trail_k: Option<f64>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    match app.command {
        Command::Run(cmd) => {
            let config = load_config(&cmd.config)
                .with_context(|| format!("Failed to load configuration from {}", cmd.config.display()))?;
            init_logging(app.verbose, app.debug, &config.logging.level);
            run_command(cmd, config).await
        }
        Command::CheckConfig(cmd) => {
            init_logging(app.verbose, app.debug, "info");
            check_config_command(cmd)
        }
        Command::Backtest(cmd) => {
            init_logging(app.verbose, app.debug, "warn");
            backtest_command(cmd)
        }
    }
}

/// Pick the log filter: flags first, then RUST_LOG, then the configured level
fn log_filter(verbose: bool, debug: bool, configured: &str) -> EnvFilter {
    if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
    }
}

/// Initialize logging system
fn init_logging(verbose: bool, debug: bool, configured: &str) {
    let filter = log_filter(verbose, debug, configured);
    // A subscriber may already be installed (tests)
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Handle run command
async fn run_command(cmd: RunCmd, config: Config) -> Result<()> {
    tracing::info!("Starting trailwatch...");
    tracing::info!("Config: {}", cmd.config.display());

    let market_data = Arc::new(
        DexScreenerClient::new(&config.market_data.dexscreener_url)
            .context("Failed to create DexScreener client")?,
    );
    let router = Arc::new(
        JupiterRouter::with_config(JupiterConfig::from(&config.jupiter))
            .context("Failed to create Jupiter router")?,
    );
    let ledger = Arc::new(PaperLedger::new(PaperLedgerConfig::from_sections(
        &config.ledger,
        &config.chase,
    )));
    let notifier = build_notifier(&config)?;

    let (mut manager, handle) = WatchManager::new(
        WatchConfig::from(&config),
        market_data,
        router,
        ledger.clone() as Arc<dyn LedgerPort>,
        notifier,
    );

    for mint in &cmd.watch {
        let name: String = mint.chars().take(6).collect();
        handle
            .add_candidate(Candidate::new(mint.clone(), name, "", 0.0))
            .with_context(|| format!("Failed to queue {}", mint))?;
    }

    // Setup Ctrl+C handler
    let shutdown = handle.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        shutdown.shutdown().await;
    });

    tracing::warn!("PAPER LEDGER - no real transactions");
    manager.run().await;

    ledger.print_summary().await;
    println!("{}", ledger.portfolio_text().await);

    if let Some(path) = config.ledger.resolved_export_path() {
        ledger
            .write_trades(&path)
            .await
            .with_context(|| format!("Failed to export trades to {}", path.display()))?;
        tracing::info!("Trades exported to {}", path.display());
    }

    tracing::info!("Trailwatch stopped");
    Ok(())
}

fn build_notifier(config: &Config) -> Result<Arc<dyn NotifierPort>> {
    if config.alerts.telegram_enabled {
        let telegram = TelegramNotifier::from_config(&config.alerts)
            .context("Failed to create Telegram notifier")?;
        return Ok(Arc::new(telegram));
    }
    tracing::info!("Telegram disabled, alerts go to the log");
    Ok(Arc::new(LogNotifier::new()))
}

/// Handle check-config command
fn check_config_command(cmd: CheckConfigCmd) -> Result<()> {
    let config = load_config(&cmd.config)
        .with_context(|| format!("Invalid configuration: {}", cmd.config.display()))?;

    println!("✓ Configuration OK: {}", cmd.config.display());
    println!("  Tick interval:   {:.1}s", config.tick_interval().as_secs_f64());
    println!("  Watchlist max:   {}", config.watch.watchlist_max);
    println!(
        "  Trail:           window {}, k {}, hard stop {:.0}%",
        config.trailing.atr_window,
        config.trailing.trail_k,
        config.trailing.hard_stop_fraction * 100.0
    );
    println!(
        "  Chase:           {} at +{}%, ${} per trade",
        if config.chase.autotrade { "on" } else { "off" },
        config.chase.acceleration_threshold_pct,
        config.chase.per_trade_target_usd
    );
    println!(
        "  Ledger:          ${} start, {} slots, {:.0}% exposure",
        config.ledger.start_balance_usd,
        config.ledger.max_open_positions,
        config.ledger.total_exposure_cap * 100.0
    );
    println!("  Telegram:        {}", config.alerts.telegram_enabled);
    if let Some(path) = config.ledger.resolved_export_path() {
        println!("  Trade export:    {}", path.display());
    }
    Ok(())
}

/// Read bars from a JSON file
fn load_bars(path: &Path) -> Result<Vec<Bar>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse bars in {}", path.display()))
}

fn backtest_params(cmd: &BacktestCmd) -> Result<TrailParams> {
    let mut params = match &cmd.config {
        Some(path) => {
            let config = load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            TrailParams::from(&config)
        }
        None => TrailParams::default(),
    };
    if let Some(window) = cmd.atr_window {
        params.atr_window = window;
    }
    if let Some(k) = cmd.trail_k {
        params.trail_k = k;
    }
    Ok(params)
}

/// Handle backtest command
fn backtest_command(cmd: BacktestCmd) -> Result<()> {
    let bars = load_bars(&cmd.bars)?;
    let params = backtest_params(&cmd)?;
    let outcome = simulate_trailing_exit(&bars, &params);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("Backtest: {} bar(s) from {}", bars.len(), cmd.bars.display());
    println!("  Window / K:   {} / {}", params.atr_window, params.trail_k);
    println!("  Exit reason:  {}", outcome.reason);
    println!("  Bars held:    {}", outcome.bars_held);
    println!("  Net PnL:      {:+.2}%", outcome.net_pnl_pct);
    println!("  Peak run-up:  {:+.2}%", outcome.peak_runup_pct);
    Ok(())
}

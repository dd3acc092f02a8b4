//! coinwatch entrypoint
//!
//! Loads configuration, wires the feed/notifier/exchange collaborators, and
//! runs the polling monitor until interrupted.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use coinwatch::config::AppConfig;
use coinwatch::exchange::BybitClient;
use coinwatch::market::CoinGeckoFeed;
use coinwatch::monitor::Monitor;
use coinwatch::notify::PushoverNotifier;

#[derive(Parser)]
#[command(name = "coinwatch", about = "Polling price monitor with signal alerts")]
struct Cli {
    /// Enable live order placement on BUY/SELL signals. Off by default;
    /// nothing else can turn trading on.
    #[arg(long, default_value_t = false)]
    enable_trading: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut cfg = AppConfig::load()?;
    cfg.trading.enabled = cli.enable_trading;
    cfg.validate_env()?;

    info!("starting coinwatch: {}", cfg.digest());

    let feed = CoinGeckoFeed::new(&cfg.monitor, &cfg.feed);
    let notifier = PushoverNotifier::from_env(&cfg.notify)?;
    let exchange = if cfg.trading.enabled {
        Some(BybitClient::from_env(&cfg.trading)?)
    } else {
        None
    };

    let mut monitor = Monitor::new(cfg, feed, notifier, exchange);

    tokio::select! {
        _ = monitor.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    Ok(())
}

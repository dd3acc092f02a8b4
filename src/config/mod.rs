//! Configuration management for coinwatch
//!
//! Loads from an optional config file + environment variables via .env.
//! Secrets (Pushover and Bybit credentials) are read only from the
//! environment, never from the config file.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub indicators: IndicatorsConfig,
    pub detectors: DetectorsConfig,
    pub feed: FeedConfig,
    pub notify: NotifyConfig,
    pub trading: TradingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Coin identifier as used by the market-data API (e.g. "sui")
    pub coin_id: String,
    /// Quote currency (e.g. "usd")
    pub vs_currency: String,
    /// Alert threshold in percent; the alert baseline ratchets on fire
    pub target_percent: f64,
    /// Seconds between polls
    pub poll_interval_secs: u64,
    /// Seconds between periodic summaries
    pub summary_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorsConfig {
    /// RSI period
    pub rsi_period: usize,
    /// MACD fast period
    pub macd_fast: usize,
    /// MACD slow period
    pub macd_slow: usize,
    /// MACD signal period
    pub macd_signal: usize,
    /// Bollinger Bands period
    pub bb_period: usize,
    /// Bollinger Bands standard-deviation multiplier
    pub bb_std_dev: f64,
    /// ATR period
    pub atr_period: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorsConfig {
    /// Window for range detection (points of price history)
    pub range_window: usize,
    /// Maximum (max-min)/avg width for a range to count as tight
    pub range_tolerance: f64,
    /// Window for breakout detection
    pub breakout_window: usize,
    /// ATR multiplier for the breakout buffer
    pub breakout_atr_mult: f64,
    /// Window for the DCA mean
    pub dca_window: usize,
    /// ATR multiplier for the DCA discount threshold
    pub dca_atr_mult: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Market-data API base URL
    pub base_url: String,
    /// Days of OHLC history to request
    pub ohlc_days: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Push API base URL
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Whether order placement is active. Only the --enable-trading CLI flag
    /// turns this on; the config default stays false.
    pub enabled: bool,
    /// Trade size in quote currency per order
    pub trade_size: f64,
    /// Decimal places for order quantities
    pub qty_precision: u32,
    /// Exchange REST base URL (testnet by default)
    pub base_url: String,
    /// Signature receive window in milliseconds
    pub recv_window_ms: u64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl AppConfig {
    /// Load configuration from defaults, optional file, and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Monitor defaults
            .set_default("monitor.coin_id", "sui")?
            .set_default("monitor.vs_currency", "usd")?
            .set_default("monitor.target_percent", 5.0)?
            .set_default("monitor.poll_interval_secs", 3600)?
            .set_default("monitor.summary_interval_secs", 3600)?
            // Indicator defaults
            .set_default("indicators.rsi_period", 14)?
            .set_default("indicators.macd_fast", 12)?
            .set_default("indicators.macd_slow", 26)?
            .set_default("indicators.macd_signal", 9)?
            .set_default("indicators.bb_period", 20)?
            .set_default("indicators.bb_std_dev", 2.0)?
            .set_default("indicators.atr_period", 14)?
            // Detector defaults
            .set_default("detectors.range_window", 10)?
            .set_default("detectors.range_tolerance", 0.03)?
            .set_default("detectors.breakout_window", 10)?
            .set_default("detectors.breakout_atr_mult", 1.5)?
            .set_default("detectors.dca_window", 5)?
            .set_default("detectors.dca_atr_mult", 1.0)?
            // Feed defaults
            .set_default("feed.base_url", "https://api.coingecko.com")?
            .set_default("feed.ohlc_days", 14)?
            .set_default("feed.timeout_secs", 15)?
            // Notify defaults
            .set_default("notify.base_url", "https://api.pushover.net")?
            .set_default("notify.timeout_secs", 10)?
            // Trading defaults
            .set_default("trading.enabled", false)?
            .set_default("trading.trade_size", 10.0)?
            .set_default("trading.qty_precision", 4)?
            .set_default("trading.base_url", "https://api-testnet.bybit.com")?
            .set_default("trading.recv_window_ms", 5000)?
            .set_default("trading.timeout_secs", 10)?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (COINWATCH_*)
            .add_source(Environment::with_prefix("COINWATCH").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Base currency in exchange notation (e.g. "SUI")
    pub fn base_currency(&self) -> String {
        self.monitor.coin_id.to_uppercase()
    }

    /// Quote currency in exchange notation (e.g. "USD")
    pub fn quote_currency(&self) -> String {
        self.monitor.vs_currency.to_uppercase()
    }

    /// Exchange spot symbol derived from coin and quote (e.g. "SUIUSD")
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base_currency(), self.quote_currency())
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        format!(
            "coin={} quote={} target={:.1}% poll={}s summary={}s trading={}",
            self.monitor.coin_id,
            self.monitor.vs_currency,
            self.monitor.target_percent,
            self.monitor.poll_interval_secs,
            self.monitor.summary_interval_secs,
            self.trading.enabled
        )
    }

    /// Validate required environment variables
    pub fn validate_env(&self) -> Result<()> {
        let mut required = vec!["PUSHOVER_APP_TOKEN", "PUSHOVER_USER_KEY"];
        if self.trading.enabled {
            required.push("BYBIT_API_KEY");
            required.push("BYBIT_API_SECRET");
        }

        for var in required {
            if std::env::var(var).map(|v| v.trim().is_empty()).unwrap_or(true) {
                bail!("Required environment variable {} is not set", var);
            }
        }

        Ok(())
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

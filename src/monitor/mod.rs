//! Monitor - per-tick orchestration of the signal pipeline
//!
//! Owns the rolling price history and alert state, wires the indicator and
//! detector engines to the feed/notifier/exchange collaborators, and applies
//! the alert policy:
//! - a ratcheting threshold alert whose baseline moves only when it fires,
//! - unconditional per-tick detector and projection notifications,
//! - a periodic summary (the first one is due immediately), and
//! - at most one order per tick when trading is enabled.
//!
//! No failure inside a tick ever escapes: a bad tick is skipped and the loop
//! keeps polling.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::detectors::{DetectorEngine, PriceHistory};
use crate::exchange::{ExchangeApi, TradeExecutor};
use crate::features::IndicatorEngine;
use crate::market::PriceFeed;
use crate::notify::Notifier;
use crate::strategy::{classify_signal, classify_trend, project_prices};
use crate::types::Signal;

/// Alert bookkeeping, initialized on the first successful fetch.
#[derive(Debug, Clone, Copy)]
pub struct AlertState {
    /// Baseline for the percentage-change ratchet
    pub last_alert_price: f64,
    /// When the last periodic summary went out
    pub last_summary_time: DateTime<Utc>,
}

/// Polling monitor for a single coin.
pub struct Monitor<F, N, X>
where
    F: PriceFeed,
    N: Notifier,
    X: ExchangeApi,
{
    cfg: AppConfig,
    feed: F,
    notifier: N,
    /// Present only when order placement is configured; trading also
    /// requires the enabled flag.
    exchange: Option<X>,
    executor: TradeExecutor,
    indicators: IndicatorEngine,
    detectors: DetectorEngine,
    history: PriceHistory,
    state: Option<AlertState>,
}

impl<F, N, X> Monitor<F, N, X>
where
    F: PriceFeed,
    N: Notifier,
    X: ExchangeApi,
{
    pub fn new(cfg: AppConfig, feed: F, notifier: N, exchange: Option<X>) -> Self {
        let executor = TradeExecutor::new(&cfg);
        let indicators = IndicatorEngine::new(&cfg.indicators);
        let detectors = DetectorEngine::new(&cfg.detectors);
        Self {
            cfg,
            feed,
            notifier,
            exchange,
            executor,
            indicators,
            detectors,
            history: PriceHistory::new(),
            state: None,
        }
    }

    /// Poll forever. Never returns; every tick failure is contained.
    pub async fn run(&mut self) {
        let interval = Duration::from_secs(self.cfg.monitor.poll_interval_secs);
        info!(
            coin = %self.cfg.monitor.coin_id,
            interval_secs = interval.as_secs(),
            "monitor loop started"
        );
        loop {
            self.tick().await;
            tokio::time::sleep(interval).await;
        }
    }

    /// One polling iteration: fetch, analyze, notify, maybe trade.
    pub async fn tick(&mut self) {
        let snapshot = match self.feed.fetch_snapshot().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "price fetch failed, skipping tick");
                return;
            }
        };

        let price = snapshot.current_price;
        let coin = self.cfg.monitor.coin_id.to_uppercase();
        let now = Utc::now();
        let summary_interval =
            ChronoDuration::seconds(self.cfg.monitor.summary_interval_secs as i64);

        // First successful fetch: baseline the ratchet and make the first
        // summary immediately due.
        let mut state = self.state.unwrap_or_else(|| {
            info!(price, "first snapshot received, alert baseline set");
            AlertState {
                last_alert_price: price,
                last_summary_time: now - summary_interval,
            }
        });

        let indicators = self.indicators.compute(&snapshot.ohlc);
        if indicators.is_empty() {
            debug!("indicators unavailable this tick");
        }
        let signal = classify_signal(&indicators, price);
        let trend = classify_trend(price, snapshot.p1h, snapshot.p24h, snapshot.p7d);
        let projection = project_prices(price, snapshot.p1h, snapshot.p24h, snapshot.p7d);

        // Threshold alert. The baseline only moves when an alert fires, so
        // repeated small moves in one direction accumulate until they trip it.
        let target = self.cfg.monitor.target_percent;
        let pct_change = (price - state.last_alert_price) / state.last_alert_price * 100.0;
        if pct_change >= target || pct_change <= -target {
            let header = if pct_change >= target {
                format!(
                    "🎯 {} up {:.2}% to ${:.4}, +{:.0}% target hit!",
                    coin, pct_change, price, target
                )
            } else {
                format!(
                    "📉 {} down {:.2}% to ${:.4}, -{:.0}% target hit!",
                    coin, pct_change, price, target
                )
            };
            let message = format!("{}\n{}\n{}\nSignal: {}", header, trend, projection, signal);
            self.send(&message).await;
            state.last_alert_price = price;
        }

        // Per-tick detector sweep over the previous ticks' prices. The
        // current price joins the history at the end of the tick, so the
        // window a detector compares against never contains it.
        if let Some(range) = self.detectors.detect_range(&self.history) {
            self.send(&range.to_string()).await;
        }
        if let Some(breakout) = self
            .detectors
            .detect_breakout(&self.history, price, indicators.atr)
        {
            self.send(&breakout.to_string()).await;
        }
        if let Some(dca) = self.detectors.detect_dca(&self.history, price, indicators.atr) {
            self.send(&dca.to_string()).await;
        }
        let momentum = self.detectors.momentum(&self.history);
        if let Some(hint) = momentum {
            self.send(&hint.to_string()).await;
        }
        self.send(&projection.to_string()).await;
        self.send(&format!("Signal for {}: {} at ${:.4}", coin, signal, price))
            .await;

        // Periodic summary with the latest known price.
        if now.signed_duration_since(state.last_summary_time) >= summary_interval {
            let mut message = format!("📊 Summary for {}, price ${:.4}\n{}", coin, price, trend);
            if let Some(hint) = momentum {
                message.push_str(&format!("\n{}", hint));
            }
            message.push_str(&format!("\nSignal: {}", signal));
            self.send(&message).await;
            state.last_summary_time = now;
        }

        // At most one order per tick, and only on an actionable signal.
        if self.cfg.trading.enabled && signal != Signal::Hold {
            if let Some(exchange) = self.exchange.as_ref() {
                self.executor
                    .execute(exchange, &self.notifier, signal, price)
                    .await;
            } else {
                warn!("trading enabled but no exchange client configured");
            }
        }

        self.history.push(price);
        self.state = Some(state);
    }

    async fn send(&self, message: &str) {
        if let Err(e) = self.notifier.notify(message).await {
            warn!(error = %e, "notification failed");
        }
    }
}

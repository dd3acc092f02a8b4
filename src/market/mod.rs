//! Market data feed - CoinGecko REST client
//!
//! One snapshot per poll: spot price, percentage changes, and the recent
//! OHLC series. A failed or malformed fetch skips the tick; it never stops
//! the monitor.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::{FeedConfig, MonitorConfig};
use crate::types::{Candle, PriceSnapshot};

/// Errors from the market-data feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// Source of per-tick market snapshots.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<PriceSnapshot, FeedError>;
}

/// CoinGecko REST feed for a single coin.
pub struct CoinGeckoFeed {
    client: Client,
    base_url: String,
    coin_id: String,
    vs_currency: String,
    ohlc_days: u32,
}

#[derive(Debug, Deserialize)]
struct CoinResponse {
    market_data: MarketData,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    current_price: HashMap<String, f64>,
    #[serde(default)]
    price_change_percentage_1h_in_currency: HashMap<String, f64>,
    #[serde(default)]
    price_change_percentage_24h_in_currency: HashMap<String, f64>,
    #[serde(default)]
    price_change_percentage_7d_in_currency: HashMap<String, f64>,
}

impl CoinGeckoFeed {
    pub fn new(monitor: &MonitorConfig, feed: &FeedConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(feed.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: feed.base_url.trim_end_matches('/').to_string(),
            coin_id: monitor.coin_id.clone(),
            vs_currency: monitor.vs_currency.clone(),
            ohlc_days: feed.ohlc_days,
        }
    }

    async fn fetch_market_data(&self) -> Result<(f64, f64, f64, f64), FeedError> {
        let url = format!(
            "{}/api/v3/coins/{}?localization=false&tickers=false&market_data=true",
            self.base_url, self.coin_id
        );
        let resp: CoinResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let data = resp.market_data;
        let price = data
            .current_price
            .get(&self.vs_currency)
            .copied()
            .ok_or_else(|| {
                FeedError::MalformedPayload(format!(
                    "no current price for currency {}",
                    self.vs_currency
                ))
            })?;

        // Percentage changes are optional in the payload; missing means 0.
        let pct = |map: &HashMap<String, f64>| map.get(&self.vs_currency).copied().unwrap_or(0.0);
        Ok((
            price,
            pct(&data.price_change_percentage_1h_in_currency),
            pct(&data.price_change_percentage_24h_in_currency),
            pct(&data.price_change_percentage_7d_in_currency),
        ))
    }

    async fn fetch_ohlc(&self) -> Result<Vec<Candle>, FeedError> {
        let url = format!(
            "{}/api/v3/coins/{}/ohlc?vs_currency={}&days={}",
            self.base_url, self.coin_id, self.vs_currency, self.ohlc_days
        );
        // Rows arrive as [timestamp_ms, open, high, low, close] arrays.
        let rows: Vec<(f64, f64, f64, f64, f64)> = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(rows
            .into_iter()
            .map(|(ts, open, high, low, close)| Candle {
                ts: ts as i64,
                open,
                high,
                low,
                close,
            })
            .collect())
    }
}

#[async_trait]
impl PriceFeed for CoinGeckoFeed {
    async fn fetch_snapshot(&self) -> Result<PriceSnapshot, FeedError> {
        let (current_price, p1h, p24h, p7d) = self.fetch_market_data().await?;
        let ohlc = self.fetch_ohlc().await?;

        tracing::debug!(
            price = current_price,
            p1h,
            p24h,
            p7d,
            ohlc_rows = ohlc.len(),
            "fetched market snapshot"
        );

        Ok(PriceSnapshot {
            current_price,
            p1h,
            p24h,
            p7d,
            ohlc,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_percentage_fields_default_to_zero() {
        let payload = r#"{
            "market_data": {
                "current_price": {"usd": 3.21},
                "price_change_percentage_24h_in_currency": {"usd": -1.5}
            }
        }"#;
        let resp: CoinResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(resp.market_data.current_price.get("usd"), Some(&3.21));
        assert!(resp
            .market_data
            .price_change_percentage_1h_in_currency
            .is_empty());
        assert_eq!(
            resp.market_data
                .price_change_percentage_24h_in_currency
                .get("usd"),
            Some(&-1.5)
        );
    }

    #[test]
    fn ohlc_rows_parse_from_arrays() {
        let payload = "[[1700000000000, 1.0, 1.2, 0.9, 1.1], [1700000060000, 1.1, 1.3, 1.0, 1.2]]";
        let rows: Vec<(f64, f64, f64, f64, f64)> = serde_json::from_str(payload).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].4, 1.2);
    }
}

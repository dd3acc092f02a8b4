//! Exchange client - Bybit v5 spot trading
//!
//! Signed REST calls for wallet balance and market orders, plus the
//! [`TradeExecutor`] that sizes and gates orders off a signal. Balance reads
//! default to 0.0 on any error; order failures are notified, never fatal.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;
use serde::Deserialize;
use sha2::Sha256;
use std::time::Duration;

use crate::config::{AppConfig, TradingConfig};
use crate::notify::Notifier;
use crate::types::{OrderReceipt, OrderSide, Signal};

type HmacSha256 = Hmac<Sha256>;

/// Spot-trading operations the monitor needs from an exchange.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Available spot balance for a currency; 0.0 on any error.
    async fn spot_balance(&self, coin: &str) -> f64;

    /// Place a spot market order and return the exchange confirmation.
    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: Decimal,
    ) -> Result<OrderReceipt>;
}

/// Bybit v5 REST client with HMAC-SHA256 request signing.
pub struct BybitClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    recv_window_ms: u64,
}

/// Common Bybit response envelope.
#[derive(Debug, Deserialize)]
struct BybitResponse<T> {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg")]
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct WalletBalanceResult {
    // Rejections come back with an empty result object
    #[serde(default)]
    list: Vec<WalletAccount>,
}

#[derive(Debug, Deserialize)]
struct WalletAccount {
    coin: Vec<WalletCoin>,
}

#[derive(Debug, Deserialize)]
struct WalletCoin {
    coin: String,
    #[serde(rename = "availableToWithdraw")]
    available_to_withdraw: String,
}

#[derive(Debug, Deserialize)]
struct OrderCreateResult {
    #[serde(rename = "orderId", default)]
    order_id: String,
}

impl BybitClient {
    pub fn new(cfg: &TradingConfig, api_key: String, api_secret: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            api_secret,
            recv_window_ms: cfg.recv_window_ms,
        }
    }

    /// Build from the BYBIT_API_KEY / BYBIT_API_SECRET environment variables.
    pub fn from_env(cfg: &TradingConfig) -> Result<Self> {
        let api_key = std::env::var("BYBIT_API_KEY").context("BYBIT_API_KEY is not set")?;
        let api_secret =
            std::env::var("BYBIT_API_SECRET").context("BYBIT_API_SECRET is not set")?;
        Ok(Self::new(cfg, api_key, api_secret))
    }

    /// v5 signature: hex HMAC-SHA256 over timestamp + key + window + payload,
    /// where payload is the query string for GET and the body for POST.
    fn sign(&self, timestamp_ms: i64, payload: &str) -> String {
        let message = format!(
            "{}{}{}{}",
            timestamp_ms, self.api_key, self.recv_window_ms, payload
        );
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn wallet_balance(&self, coin: &str) -> Result<f64> {
        let query = format!("accountType=UNIFIED&coin={}", coin);
        let timestamp = Utc::now().timestamp_millis();
        let url = format!("{}/v5/account/wallet-balance?{}", self.base_url, query);

        let resp: BybitResponse<WalletBalanceResult> = self
            .client
            .get(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", self.recv_window_ms.to_string())
            .header("X-BAPI-SIGN", self.sign(timestamp, &query))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if resp.ret_code != 0 {
            bail!("wallet balance query failed: {}", resp.ret_msg);
        }

        let result = resp
            .result
            .context("wallet balance response had no result")?;
        for account in &result.list {
            for c in &account.coin {
                if c.coin == coin {
                    return c
                        .available_to_withdraw
                        .parse::<f64>()
                        .context("unparseable balance value");
                }
            }
        }

        tracing::warn!(coin, "currency not present in wallet balance response");
        Ok(0.0)
    }
}

#[async_trait]
impl ExchangeApi for BybitClient {
    async fn spot_balance(&self, coin: &str) -> f64 {
        match self.wallet_balance(coin).await {
            Ok(balance) => balance,
            Err(e) => {
                tracing::warn!(coin, error = %e, "balance lookup failed, assuming 0");
                0.0
            }
        }
    }

    async fn place_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: Decimal,
    ) -> Result<OrderReceipt> {
        let body = serde_json::json!({
            "category": "spot",
            "symbol": symbol,
            "side": side.as_str(),
            "orderType": "Market",
            "qty": qty.to_string(),
        })
        .to_string();

        let timestamp = Utc::now().timestamp_millis();
        let url = format!("{}/v5/order/create", self.base_url);

        let resp: BybitResponse<OrderCreateResult> = self
            .client
            .post(&url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", self.recv_window_ms.to_string())
            .header("X-BAPI-SIGN", self.sign(timestamp, &body))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if resp.ret_code != 0 {
            bail!("order rejected: {}", resp.ret_msg);
        }

        let result = resp.result.context("order response had no result")?;
        Ok(OrderReceipt {
            order_id: result.order_id,
            symbol: symbol.to_string(),
            side,
            qty: qty.to_string(),
        })
    }
}

/// Sizes and places at most one order per signal, gated on balances.
pub struct TradeExecutor {
    symbol: String,
    base_currency: String,
    quote_currency: String,
    trade_size: f64,
    qty_precision: u32,
}

impl TradeExecutor {
    pub fn new(cfg: &AppConfig) -> Self {
        Self {
            symbol: cfg.symbol(),
            base_currency: cfg.base_currency(),
            quote_currency: cfg.quote_currency(),
            trade_size: cfg.trading.trade_size,
            qty_precision: cfg.trading.qty_precision,
        }
    }

    /// Round toward zero so a quantity never exceeds the checked balance.
    fn round_qty(&self, qty: f64) -> Option<Decimal> {
        let qty = Decimal::from_f64(qty)?
            .round_dp_with_strategy(self.qty_precision, RoundingStrategy::ToZero);
        (qty > Decimal::ZERO).then_some(qty)
    }

    /// Act on a BUY/SELL signal: check the relevant balance, size the order,
    /// place it, and notify the outcome. Insufficient balance means
    /// notify-only. HOLD is a no-op.
    pub async fn execute(
        &self,
        exchange: &dyn ExchangeApi,
        notifier: &dyn Notifier,
        signal: Signal,
        current_price: f64,
    ) {
        let (side, qty) = match signal {
            Signal::Hold => return,
            Signal::Buy => {
                let quote = exchange.spot_balance(&self.quote_currency).await;
                if quote < self.trade_size {
                    self.send(
                        notifier,
                        &format!(
                            "BUY signal, but {} balance {:.2} is under the {:.2} trade size. No order placed.",
                            self.quote_currency, quote, self.trade_size
                        ),
                    )
                    .await;
                    return;
                }
                (OrderSide::Buy, self.trade_size / current_price)
            }
            Signal::Sell => {
                let base = exchange.spot_balance(&self.base_currency).await;
                if base <= 0.0 {
                    self.send(
                        notifier,
                        &format!(
                            "SELL signal, but no {} balance is available. No order placed.",
                            self.base_currency
                        ),
                    )
                    .await;
                    return;
                }
                // Sell the trade-size equivalent, capped at what we hold.
                (OrderSide::Sell, (self.trade_size / current_price).min(base))
            }
        };

        let qty = match self.round_qty(qty) {
            Some(q) => q,
            None => {
                tracing::warn!(raw_qty = qty, "order quantity rounded to zero, skipping");
                return;
            }
        };

        match exchange.place_market_order(&self.symbol, side, qty).await {
            Ok(receipt) => {
                self.send(
                    notifier,
                    &format!(
                        "Placed {} order for {} {} (order id {})",
                        receipt.side, receipt.qty, self.base_currency, receipt.order_id
                    ),
                )
                .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, side = %side, "order placement failed");
                self.send(notifier, &format!("{} order failed: {}", side, e))
                    .await;
            }
        }
    }

    async fn send(&self, notifier: &dyn Notifier, message: &str) {
        if let Err(e) = notifier.notify(message).await {
            tracing::warn!(error = %e, "notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::MockNotifier;

    fn executor() -> TradeExecutor {
        TradeExecutor {
            symbol: "SUIUSDT".into(),
            base_currency: "SUI".into(),
            quote_currency: "USDT".into(),
            trade_size: 10.0,
            qty_precision: 4,
        }
    }

    fn quiet_notifier() -> MockNotifier {
        let mut n = MockNotifier::new();
        n.expect_notify().returning(|_| Ok(()));
        n
    }

    #[tokio::test]
    async fn hold_places_nothing_and_stays_silent() {
        let exchange = MockExchangeApi::new();
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(0);

        executor()
            .execute(&exchange, &notifier, Signal::Hold, 100.0)
            .await;
    }

    #[tokio::test]
    async fn buy_sizes_the_order_from_the_trade_budget() {
        let mut exchange = MockExchangeApi::new();
        exchange
            .expect_spot_balance()
            .withf(|coin| coin == "USDT")
            .returning(|_| 50.0);

        let expected: Decimal = "0.0943".parse().unwrap();
        exchange
            .expect_place_market_order()
            .withf(move |symbol, side, qty| {
                symbol == "SUIUSDT" && *side == OrderSide::Buy && *qty == expected
            })
            .times(1)
            .returning(|symbol, side, qty| {
                Ok(OrderReceipt {
                    order_id: "42".into(),
                    symbol: symbol.to_string(),
                    side,
                    qty: qty.to_string(),
                })
            });

        executor()
            .execute(&exchange, &quiet_notifier(), Signal::Buy, 106.0)
            .await;
    }

    #[tokio::test]
    async fn insufficient_quote_balance_is_notify_only() {
        let mut exchange = MockExchangeApi::new();
        exchange.expect_spot_balance().returning(|_| 5.0);
        exchange.expect_place_market_order().times(0);

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|m| m.contains("No order placed"))
            .times(1)
            .returning(|_| Ok(()));

        executor()
            .execute(&exchange, &notifier, Signal::Buy, 106.0)
            .await;
    }

    #[tokio::test]
    async fn sell_is_capped_at_the_available_base_balance() {
        let mut exchange = MockExchangeApi::new();
        // trade-size equivalent would be 10/100 = 0.1, but only 0.05 is held
        exchange
            .expect_spot_balance()
            .withf(|coin| coin == "SUI")
            .returning(|_| 0.05);

        let expected: Decimal = "0.05".parse().unwrap();
        exchange
            .expect_place_market_order()
            .withf(move |_, side, qty| *side == OrderSide::Sell && *qty == expected)
            .times(1)
            .returning(|symbol, side, qty| {
                Ok(OrderReceipt {
                    order_id: "7".into(),
                    symbol: symbol.to_string(),
                    side,
                    qty: qty.to_string(),
                })
            });

        executor()
            .execute(&exchange, &quiet_notifier(), Signal::Sell, 100.0)
            .await;
    }

    #[tokio::test]
    async fn zero_base_balance_blocks_the_sell() {
        let mut exchange = MockExchangeApi::new();
        exchange.expect_spot_balance().returning(|_| 0.0);
        exchange.expect_place_market_order().times(0);

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|m| m.contains("No order placed"))
            .times(1)
            .returning(|_| Ok(()));

        executor()
            .execute(&exchange, &notifier, Signal::Sell, 100.0)
            .await;
    }

    #[tokio::test]
    async fn failed_order_is_notified_not_propagated() {
        let mut exchange = MockExchangeApi::new();
        exchange.expect_spot_balance().returning(|_| 50.0);
        exchange
            .expect_place_market_order()
            .returning(|_, _, _| Err(anyhow::anyhow!("insufficient liquidity")));

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|m| m.contains("order failed"))
            .times(1)
            .returning(|_| Ok(()));

        executor()
            .execute(&exchange, &notifier, Signal::Buy, 106.0)
            .await;
    }
}

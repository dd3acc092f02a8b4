//! Core types used throughout coinwatch
//!
//! Defines common data structures for market data, indicators, and orders.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Single OHLC row from the market-data API.
///
/// Timestamps are Unix milliseconds; the series a feed returns is ascending
/// by timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Open time in milliseconds
    pub ts: i64,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
}

impl Candle {
    /// True when every price field is a finite number.
    pub fn is_valid(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
    }
}

/// One poll's worth of market data: spot price, percentage changes, and the
/// recent OHLC series. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSnapshot {
    /// Current spot price in the quote currency
    pub current_price: f64,
    /// 1-hour percentage change
    pub p1h: f64,
    /// 24-hour percentage change
    pub p24h: f64,
    /// 7-day percentage change
    pub p7d: f64,
    /// Recent OHLC series, ascending by timestamp
    pub ohlc: Vec<Candle>,
}

/// Latest value of each technical indicator.
///
/// A field is `None` when there was not enough data to compute it or the
/// computation degraded. `macd_histogram` always equals
/// `macd_line - macd_signal` when both operands are present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub rsi: Option<f64>,
    pub macd_line: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bb_lower: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_upper: Option<f64>,
    pub atr: Option<f64>,
}

impl IndicatorSet {
    /// True when no indicator could be computed this tick.
    pub fn is_empty(&self) -> bool {
        self.rsi.is_none()
            && self.macd_line.is_none()
            && self.macd_signal.is_none()
            && self.macd_histogram.is_none()
            && self.bb_lower.is_none()
            && self.bb_middle.is_none()
            && self.bb_upper.is_none()
            && self.atr.is_none()
    }
}

/// Trading signal derived from indicators and the current price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Default for Signal {
    fn default() -> Self {
        Signal::Hold
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
            Signal::Hold => write!(f, "HOLD"),
        }
    }
}

/// Order side for spot market orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Wire value expected by the exchange API.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "Buy",
            OrderSide::Sell => "Sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Confirmation returned by the exchange for a placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// Exchange-assigned order id
    pub order_id: String,
    /// Symbol the order was placed on (e.g. "SUIUSDT")
    pub symbol: String,
    /// Side of the order
    pub side: OrderSide,
    /// Quantity in base currency, as sent to the exchange
    pub qty: String,
}

//! Strategy - Signal classification, trend labeling, and price projection
//!
//! Everything here is a pure function over indicator values and the
//! percentage-change fields of a snapshot. The classifier has no memory of
//! prior signals; for the same inputs it always returns the same output.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{IndicatorSet, Signal};

/// RSI above this blocks a BUY (overbought).
const RSI_OVERBOUGHT: f64 = 70.0;
/// RSI below this blocks a SELL (oversold).
const RSI_OVERSOLD: f64 = 30.0;
/// 1h change above this counts as a short-term bounce inside a down-move.
const BOUNCE_P1H_THRESHOLD: f64 = 0.5;

/// Classify a trading signal from indicator values and the current price.
///
/// Returns HOLD when any required indicator is absent; there is no reliable
/// basis for a decision without them.
pub fn classify_signal(indicators: &IndicatorSet, current_price: f64) -> Signal {
    let (hist, line, rsi, bb_middle) = match (
        indicators.macd_histogram,
        indicators.macd_line,
        indicators.rsi,
        indicators.bb_middle,
    ) {
        (Some(h), Some(l), Some(r), Some(b)) => (h, l, r, b),
        _ => {
            tracing::debug!("missing indicator values, holding");
            return Signal::Hold;
        }
    };

    // Bullish momentum on both MACD measures, room left on RSI, and price
    // under the middle band (upward mean-reversion potential).
    if hist > 0.0 && line > 0.0 && rsi < RSI_OVERBOUGHT && current_price < bb_middle {
        return Signal::Buy;
    }

    // Mirror image on the short side.
    if hist < 0.0 && line < 0.0 && rsi > RSI_OVERSOLD && current_price > bb_middle {
        return Signal::Sell;
    }

    Signal::Hold
}

/// Trend bucket derived from the percentage-change fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendLabel {
    Uptrend,
    Pullback,
    Downtrend,
    Sideways,
}

/// Trend classification plus the numbers it was derived from, formatted for
/// notifications via `Display`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendAssessment {
    pub label: TrendLabel,
    pub p1h: f64,
    pub p24h: f64,
    pub p7d: f64,
}

impl fmt::Display for TrendAssessment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label {
            TrendLabel::Uptrend => write!(
                f,
                "🟢 Uptrend: 1h +{:.2}%, 24h +{:.2}%, still gaining",
                self.p1h, self.p24h
            ),
            TrendLabel::Pullback => write!(
                f,
                "🟡 Pullback: 1h {:.2}% dip, but the 24h +{:.2}% uptrend continues",
                self.p1h, self.p24h
            ),
            TrendLabel::Downtrend => write!(
                f,
                "🔴 Downtrend: 24h {:.2}%, 7d {:.2}%, not a buying window",
                self.p24h, self.p7d
            ),
            TrendLabel::Sideways => write!(
                f,
                "⚪ Sideways: 1h {:.2}%, 24h {:.2}%, 7d {:.2}%",
                self.p1h, self.p24h, self.p7d
            ),
        }
    }
}

/// Classify the trend from short/medium/long percentage changes.
///
/// Ordered rules, first match wins.
pub fn classify_trend(_price: f64, p1h: f64, p24h: f64, p7d: f64) -> TrendAssessment {
    let label = if p1h > 1.0 && p24h > 2.0 {
        TrendLabel::Uptrend
    } else if p1h < -1.0 && p24h > 2.0 {
        TrendLabel::Pullback
    } else if p24h < 0.0 && p7d < 0.0 {
        TrendLabel::Downtrend
    } else {
        TrendLabel::Sideways
    };

    TrendAssessment {
        label,
        p1h,
        p24h,
        p7d,
    }
}

/// Heuristic price projections. Compounding of observed rates, not a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceProjection {
    /// Projected price after one day
    pub p1d: f64,
    /// Projected price after seven days
    pub p7d: f64,
    /// Projected price after thirty days
    pub p30d: f64,
}

impl fmt::Display for PriceProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "📊 Projection: 1D ${:.3} | 7D ${:.3} | 30D ${:.3}",
            self.p1d, self.p7d, self.p30d
        )
    }
}

/// Project prices from the current percentage changes.
///
/// The 1-day figure normally compounds the 24h rate; when the 24h trend is
/// down but the last hour bounced more than half a percent, it averages the
/// two signed rates instead (partial mean-reversion expectation). The 30-day
/// figure compounds the weekly rate over four weeks.
pub fn project_prices(price: f64, p1h: f64, p24h: f64, p7d: f64) -> PriceProjection {
    let p1d = if p24h < 0.0 && p1h > BOUNCE_P1H_THRESHOLD {
        let effective_daily = (p1h + p24h) / 2.0;
        price * (1.0 + effective_daily / 100.0)
    } else {
        price * (1.0 + p24h / 100.0)
    };

    PriceProjection {
        p1d,
        p7d: price * (1.0 + p7d / 100.0),
        p30d: price * (1.0 + p7d / 100.0).powi(4),
    }
}

//! Indicator Engine - Technical indicators from OHLC data
//!
//! Computes the latest value of each indicator from a cleaned OHLC series:
//! - RSI (Wilder's smoothing)
//! - MACD (with proper EMA signal line)
//! - Bollinger Bands
//! - ATR (simple rolling mean of true ranges)
//!
//! The engine is pure per call: every tick recomputes from the full series
//! passed in. Insufficient data and internal faults both degrade to an
//! all-absent [`IndicatorSet`] rather than erroring; the caller treats that
//! as "signal generation unavailable this tick".

use crate::config::IndicatorsConfig;
use crate::types::{Candle, IndicatorSet};

/// Indicator engine holding period configuration
pub struct IndicatorEngine {
    /// RSI period
    rsi_period: usize,
    /// MACD periods (fast, slow, signal)
    macd_periods: (usize, usize, usize),
    /// Bollinger Band period and multiplier
    bb_config: (usize, f64),
    /// ATR period
    atr_period: usize,
}

impl IndicatorEngine {
    pub fn new(cfg: &IndicatorsConfig) -> Self {
        Self {
            rsi_period: cfg.rsi_period,
            macd_periods: (cfg.macd_fast, cfg.macd_slow, cfg.macd_signal),
            bb_config: (cfg.bb_period, cfg.bb_std_dev),
            atr_period: cfg.atr_period,
        }
    }

    /// Minimum valid rows needed for a stable MACD signal line (slow period
    /// plus signal period; 35 with default settings).
    pub fn min_rows(&self) -> usize {
        self.macd_periods.1 + self.macd_periods.2
    }

    /// Compute the latest indicator values from an OHLC series.
    ///
    /// Rows with non-finite fields are dropped first. Fewer than
    /// [`min_rows`](Self::min_rows) valid rows yields an all-absent set.
    pub fn compute(&self, ohlc: &[Candle]) -> IndicatorSet {
        let candles: Vec<Candle> = ohlc.iter().filter(|c| c.is_valid()).copied().collect();

        if candles.len() < self.min_rows() {
            tracing::debug!(
                valid_rows = candles.len(),
                required = self.min_rows(),
                "not enough OHLC rows for indicators"
            );
            return IndicatorSet::default();
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let mut set = IndicatorSet {
            rsi: self.compute_rsi(&closes),
            ..Default::default()
        };

        if let Some((line, signal, hist)) = self.compute_macd(&closes) {
            set.macd_line = Some(line);
            set.macd_signal = Some(signal);
            set.macd_histogram = Some(hist);
        }

        if let Some((upper, middle, lower)) = self.compute_bollinger(&closes) {
            set.bb_upper = Some(upper);
            set.bb_middle = Some(middle);
            set.bb_lower = Some(lower);
        }

        set.atr = self.compute_atr(&candles);

        // Fault guard: a non-finite value anywhere invalidates the whole set.
        let values = [
            set.rsi,
            set.macd_line,
            set.macd_signal,
            set.macd_histogram,
            set.bb_upper,
            set.bb_middle,
            set.bb_lower,
            set.atr,
        ];
        if values.iter().flatten().any(|v| !v.is_finite()) {
            tracing::debug!("non-finite indicator output, dropping the whole set");
            return IndicatorSet::default();
        }

        set
    }

    /// RSI using Wilder's smoothing: seeded with the simple average of the
    /// first `period` gains/losses, then smoothed over the rest of the series.
    fn compute_rsi(&self, closes: &[f64]) -> Option<f64> {
        let period = self.rsi_period;
        if closes.len() < period + 1 {
            return None;
        }

        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for i in 1..=period {
            let change = closes[i] - closes[i - 1];
            if change > 0.0 {
                avg_gain += change;
            } else {
                avg_loss += change.abs();
            }
        }
        avg_gain /= period as f64;
        avg_loss /= period as f64;

        for i in (period + 1)..closes.len() {
            let change = closes[i] - closes[i - 1];
            let gain = if change > 0.0 { change } else { 0.0 };
            let loss = if change < 0.0 { change.abs() } else { 0.0 };
            avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
            avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        }

        if avg_gain < 1e-12 && avg_loss < 1e-12 {
            return Some(50.0); // No movement = neutral
        }
        if avg_loss < 1e-12 {
            return Some(100.0);
        }
        let rs = avg_gain / avg_loss;
        Some((100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0))
    }

    /// MACD line, signal line, and histogram.
    ///
    /// The histogram is the literal difference of the two returned values.
    fn compute_macd(&self, closes: &[f64]) -> Option<(f64, f64, f64)> {
        let (fast, slow, signal_period) = self.macd_periods;
        if closes.len() < slow + signal_period {
            return None;
        }

        let ema_fast = ema_series(closes, fast);
        let ema_slow = ema_series(closes, slow);
        let line: Vec<f64> = ema_fast
            .iter()
            .zip(ema_slow.iter())
            .map(|(f, s)| f - s)
            .collect();
        let signal = ema_series(&line, signal_period);

        let macd = *line.last()?;
        let sig = *signal.last()?;
        Some((macd, sig, macd - sig))
    }

    /// Bollinger Bands (returns upper, middle, lower)
    fn compute_bollinger(&self, closes: &[f64]) -> Option<(f64, f64, f64)> {
        let (period, multiplier) = self.bb_config;
        if closes.len() < period {
            return None;
        }

        let recent = &closes[closes.len() - period..];
        let sma = recent.iter().sum::<f64>() / period as f64;
        let variance: f64 =
            recent.iter().map(|p| (p - sma).powi(2)).sum::<f64>() / period as f64;
        let std = variance.sqrt();

        Some((sma + multiplier * std, sma, sma - multiplier * std))
    }

    /// ATR as the simple rolling mean of the last `atr_period` true ranges.
    ///
    /// True range = max(high-low, |high-prev close|, |low-prev close|).
    fn compute_atr(&self, candles: &[Candle]) -> Option<f64> {
        if candles.len() < self.atr_period + 1 {
            return None;
        }

        let mut sum = 0.0;
        for i in 1..=self.atr_period {
            let idx = candles.len() - i;
            let curr = &candles[idx];
            let prev = &candles[idx - 1];

            let tr = (curr.high - curr.low)
                .max((curr.high - prev.close).abs())
                .max((curr.low - prev.close).abs());
            sum += tr;
        }

        Some(sum / self.atr_period as f64)
    }
}

/// EMA over a full series, seeded at the first value, multiplier 2/(n+1).
fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut ema = values[0];
    out.push(ema);
    for v in values.iter().skip(1) {
        ema = (v - ema) * multiplier + ema;
        out.push(ema);
    }
    out
}

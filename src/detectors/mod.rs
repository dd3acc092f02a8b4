//! Opportunity Detectors - Range, breakout, DCA, and momentum over a
//! bounded rolling price history
//!
//! Detectors are pure and side-effect-free: each takes the shared
//! [`PriceHistory`] (plus the current price and ATR where relevant) and
//! returns either a formatted opportunity record or `None`. The ATR-based
//! detectors abstain entirely when ATR is absent or zero; they never fall
//! back to a fixed-percentage rule.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::config::DetectorsConfig;

/// Number of past prices kept for the detectors.
pub const HISTORY_CAPACITY: usize = 10;

/// Bounded FIFO of recent spot prices, oldest evicted on overflow.
///
/// Appended once per tick by the monitor; detectors only read it.
#[derive(Debug, Clone, Default)]
pub struct PriceHistory {
    prices: VecDeque<f64>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self {
            prices: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Append a price, evicting the oldest entry once at capacity.
    pub fn push(&mut self, price: f64) {
        if self.prices.len() == HISTORY_CAPACITY {
            self.prices.pop_front();
        }
        self.prices.push_back(price);
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Most recently appended price.
    pub fn latest(&self) -> Option<f64> {
        self.prices.back().copied()
    }

    /// The last `n` prices in chronological order; `None` if fewer are held.
    pub fn last_n(&self, n: usize) -> Option<Vec<f64>> {
        if self.prices.len() < n {
            return None;
        }
        Some(self.prices.iter().skip(self.prices.len() - n).copied().collect())
    }
}

/// Tight trading range with proposed entry/exit levels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeOpportunity {
    pub low: f64,
    pub high: f64,
    pub avg: f64,
    /// Proposed buy level, just above the range floor
    pub buy_level: f64,
    /// Proposed sell level, just below the range ceiling
    pub sell_level: f64,
}

impl fmt::Display for RangeOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "📐 Tight range ${:.4}-${:.4}: buy near ${:.4}, sell near ${:.4}",
            self.low, self.high, self.buy_level, self.sell_level
        )
    }
}

/// Direction of a volatility-confirmed breakout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakoutDirection {
    Up,
    Down,
}

/// Price escaping the recent range by more than an ATR-scaled buffer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakoutSignal {
    pub direction: BreakoutDirection,
    /// The breached boundary including the ATR buffer
    pub level: f64,
    pub price: f64,
}

impl fmt::Display for BreakoutSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            BreakoutDirection::Up => write!(
                f,
                "🚀 Breakout up: ${:.4} cleared the recent high barrier ${:.4}",
                self.price, self.level
            ),
            BreakoutDirection::Down => write!(
                f,
                "⚠️ Breakout down: ${:.4} fell through the recent low barrier ${:.4}",
                self.price, self.level
            ),
        }
    }
}

/// Price dipping meaningfully below its local average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DcaOpportunity {
    /// Mean of the recent window
    pub mean: f64,
    /// Fire threshold (mean minus the ATR-scaled discount)
    pub threshold: f64,
    pub price: f64,
}

impl fmt::Display for DcaOpportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "💰 DCA opportunity: ${:.4} is below the ${:.4} local average (threshold ${:.4})",
            self.price, self.mean, self.threshold
        )
    }
}

/// Short-term moving-average comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MomentumHint {
    Rising,
    Weakening,
    Flat,
}

impl fmt::Display for MomentumHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MomentumHint::Rising => {
                write!(f, "📈 Momentum up: short-term prices rising above average")
            }
            MomentumHint::Weakening => {
                write!(f, "📉 Weakening: short-term prices below average")
            }
            MomentumHint::Flat => write!(f, "No clear direction"),
        }
    }
}

/// Detector engine holding tolerances and window lengths
pub struct DetectorEngine {
    cfg: DetectorsConfig,
}

impl DetectorEngine {
    pub fn new(cfg: &DetectorsConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    /// Detect a tight trading range over the last `range_window` prices.
    ///
    /// Ranges whose proposed buy level meets or exceeds the sell level are
    /// too tight to leave a spread and are dropped.
    pub fn detect_range(&self, history: &PriceHistory) -> Option<RangeOpportunity> {
        let window = history.last_n(self.cfg.range_window)?;

        let high = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let low = window.iter().cloned().fold(f64::INFINITY, f64::min);
        let avg = window.iter().sum::<f64>() / window.len() as f64;

        if avg <= 0.0 || (high - low) / avg > self.cfg.range_tolerance {
            return None;
        }

        let buy_level = low * 1.01;
        let sell_level = high * 0.99;
        if buy_level >= sell_level {
            // Range too tight to leave a spread between the levels.
            return None;
        }

        Some(RangeOpportunity {
            low,
            high,
            avg,
            buy_level,
            sell_level,
        })
    }

    /// Detect a breakout beyond the recent range plus an ATR-scaled buffer.
    ///
    /// Abstains without a positive ATR.
    pub fn detect_breakout(
        &self,
        history: &PriceHistory,
        current_price: f64,
        atr: Option<f64>,
    ) -> Option<BreakoutSignal> {
        let atr = atr.filter(|a| *a > 0.0)?;
        let window = history.last_n(self.cfg.breakout_window)?;

        let high = window.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let low = window.iter().cloned().fold(f64::INFINITY, f64::min);
        let buffer = self.cfg.breakout_atr_mult * atr;

        if current_price > high + buffer {
            return Some(BreakoutSignal {
                direction: BreakoutDirection::Up,
                level: high + buffer,
                price: current_price,
            });
        }
        if current_price < low - buffer {
            return Some(BreakoutSignal {
                direction: BreakoutDirection::Down,
                level: low - buffer,
                price: current_price,
            });
        }
        None
    }

    /// Detect a dollar-cost-average entry: price below the local mean by
    /// more than an ATR-scaled discount. Abstains without a positive ATR.
    pub fn detect_dca(
        &self,
        history: &PriceHistory,
        current_price: f64,
        atr: Option<f64>,
    ) -> Option<DcaOpportunity> {
        let atr = atr.filter(|a| *a > 0.0)?;
        let window = history.last_n(self.cfg.dca_window)?;

        let mean = window.iter().sum::<f64>() / window.len() as f64;
        let threshold = mean - self.cfg.dca_atr_mult * atr;

        if current_price < threshold {
            Some(DcaOpportunity {
                mean,
                threshold,
                price: current_price,
            })
        } else {
            None
        }
    }

    /// Compare the 3-point and 5-point moving averages of the history.
    pub fn momentum(&self, history: &PriceHistory) -> Option<MomentumHint> {
        let last5 = history.last_n(5)?;
        let short: f64 = last5[2..].iter().sum::<f64>() / 3.0;
        let long: f64 = last5.iter().sum::<f64>() / 5.0;

        Some(if short > long {
            MomentumHint::Rising
        } else if short < long {
            MomentumHint::Weakening
        } else {
            MomentumHint::Flat
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> DetectorEngine {
        DetectorEngine::new(&DetectorsConfig {
            range_window: 10,
            range_tolerance: 0.03,
            breakout_window: 10,
            breakout_atr_mult: 1.5,
            dca_window: 5,
            dca_atr_mult: 1.0,
        })
    }

    fn history(prices: &[f64]) -> PriceHistory {
        let mut h = PriceHistory::new();
        for p in prices {
            h.push(*p);
        }
        h
    }

    #[test]
    fn history_evicts_oldest_at_capacity() {
        let mut h = PriceHistory::new();
        for i in 0..15 {
            h.push(i as f64);
        }
        assert_eq!(h.len(), HISTORY_CAPACITY);
        assert_eq!(h.latest(), Some(14.0));
        assert_eq!(h.last_n(10).unwrap()[0], 5.0);
    }

    #[test]
    fn range_needs_a_full_window() {
        let e = engine();
        assert!(e.detect_range(&history(&[100.0; 9])).is_none());
    }

    #[test]
    fn tight_range_proposes_levels_inside_the_band() {
        // 2.5% wide: inside tolerance, and wide enough that the proposed
        // levels leave a spread.
        let e = engine();
        let prices = [100.0, 101.0, 99.0, 100.5, 101.5, 100.0, 99.5, 101.0, 100.2, 99.8];
        let opp = e.detect_range(&history(&prices)).unwrap();

        assert_eq!(opp.low, 99.0);
        assert_eq!(opp.high, 101.5);
        assert!(opp.buy_level < opp.sell_level);
        assert!((opp.buy_level - 99.0 * 1.01).abs() < 1e-9);
        assert!((opp.sell_level - 101.5 * 0.99).abs() < 1e-9);
    }

    #[test]
    fn narrow_but_tight_range_cannot_leave_a_spread() {
        // Tight by tolerance, but under ~2% wide the buy level crosses the
        // sell level, so nothing is proposed.
        let e = engine();
        let prices = [100.0, 100.4, 99.8, 100.2, 100.1, 99.9, 100.3, 100.0, 99.7, 100.5];
        assert!(e.detect_range(&history(&prices)).is_none());
    }

    #[test]
    fn degenerate_range_leaves_no_spread_and_is_dropped() {
        // All ten points equal: buy would be 101.0, sell 99.0, so the
        // proposal would be inverted and must be suppressed.
        let e = engine();
        assert!(e.detect_range(&history(&[100.0; 10])).is_none());
    }

    #[test]
    fn wide_range_is_not_reported() {
        let e = engine();
        let prices = [100.0, 104.0, 97.0, 102.0, 100.0, 98.0, 103.0, 100.0, 96.0, 105.0];
        assert!(e.detect_range(&history(&prices)).is_none());
    }

    #[test]
    fn breakout_requires_positive_atr() {
        let e = engine();
        let h = history(&[100.0; 10]);
        // Price far beyond the range, but no ATR basis
        assert!(e.detect_breakout(&h, 150.0, None).is_none());
        assert!(e.detect_breakout(&h, 150.0, Some(0.0)).is_none());
    }

    #[test]
    fn breakout_fires_beyond_the_buffered_range() {
        let e = engine();
        let h = history(&[100.0; 10]);

        let up = e.detect_breakout(&h, 103.1, Some(2.0)).unwrap();
        assert_eq!(up.direction, BreakoutDirection::Up);
        assert!((up.level - 103.0).abs() < 1e-9);

        let down = e.detect_breakout(&h, 96.9, Some(2.0)).unwrap();
        assert_eq!(down.direction, BreakoutDirection::Down);

        // Inside the buffer: no breakout either way
        assert!(e.detect_breakout(&h, 102.9, Some(2.0)).is_none());
        assert!(e.detect_breakout(&h, 97.1, Some(2.0)).is_none());
    }

    #[test]
    fn dca_requires_positive_atr_and_a_real_discount() {
        let e = engine();
        let h = history(&[100.0, 101.0, 99.0, 100.0, 100.0]);

        assert!(e.detect_dca(&h, 90.0, None).is_none());
        assert!(e.detect_dca(&h, 90.0, Some(0.0)).is_none());

        // mean 100, threshold 98: 97.5 fires, 98.5 does not
        let opp = e.detect_dca(&h, 97.5, Some(2.0)).unwrap();
        assert!((opp.mean - 100.0).abs() < 1e-9);
        assert!((opp.threshold - 98.0).abs() < 1e-9);
        assert!(e.detect_dca(&h, 98.5, Some(2.0)).is_none());
    }

    #[test]
    fn momentum_needs_five_points() {
        let e = engine();
        assert!(e.momentum(&history(&[100.0; 4])).is_none());
        assert!(e.momentum(&history(&[100.0; 5])).is_some());
    }

    #[test]
    fn momentum_compares_short_and_long_averages() {
        let e = engine();
        assert_eq!(
            e.momentum(&history(&[100.0, 100.0, 101.0, 102.0, 103.0])),
            Some(MomentumHint::Rising)
        );
        assert_eq!(
            e.momentum(&history(&[103.0, 102.0, 101.0, 100.0, 99.0])),
            Some(MomentumHint::Weakening)
        );
        assert_eq!(
            e.momentum(&history(&[100.0; 5])),
            Some(MomentumHint::Flat)
        );
    }
}

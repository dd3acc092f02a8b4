//! End-to-end tests for the signal pipeline

#[cfg(test)]
mod tests {
    use coinwatch::config::{DetectorsConfig, IndicatorsConfig};
    use coinwatch::detectors::{DetectorEngine, MomentumHint, PriceHistory};
    use coinwatch::features::IndicatorEngine;
    use coinwatch::strategy::{classify_signal, classify_trend, project_prices, TrendLabel};
    use coinwatch::types::{Candle, IndicatorSet, Signal};

    fn indicator_engine() -> IndicatorEngine {
        IndicatorEngine::new(&IndicatorsConfig {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bb_period: 20,
            bb_std_dev: 2.0,
            atr_period: 14,
        })
    }

    fn detector_engine() -> DetectorEngine {
        DetectorEngine::new(&DetectorsConfig {
            range_window: 10,
            range_tolerance: 0.03,
            breakout_window: 10,
            breakout_atr_mult: 1.5,
            dca_window: 5,
            dca_atr_mult: 1.0,
        })
    }

    fn series(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let wiggle = if i % 2 == 0 { 0.3 } else { -0.3 };
                let close = 100.0 + i as f64 * 0.1 + wiggle;
                Candle {
                    ts: i as i64 * 1_800_000,
                    open: close - 0.1,
                    high: close + 0.4,
                    low: close - 0.4,
                    close,
                }
            })
            .collect()
    }

    // ============================================================================
    // Indicator engine
    // ============================================================================

    #[test]
    fn short_series_yields_nothing_and_classifies_as_hold() {
        let set = indicator_engine().compute(&series(34));
        assert!(set.is_empty());
        assert_eq!(classify_signal(&set, 100.0), Signal::Hold);
    }

    #[test]
    fn full_series_yields_a_complete_consistent_set() {
        let set = indicator_engine().compute(&series(60));

        assert!(!set.is_empty());
        let line = set.macd_line.unwrap();
        let signal = set.macd_signal.unwrap();
        assert_eq!(set.macd_histogram.unwrap(), line - signal);

        let rsi = set.rsi.unwrap();
        assert!((0.0..=100.0).contains(&rsi));

        assert!(set.bb_lower.unwrap() <= set.bb_middle.unwrap());
        assert!(set.bb_middle.unwrap() <= set.bb_upper.unwrap());
        assert!(set.atr.unwrap() > 0.0);
    }

    #[test]
    fn classification_over_computed_indicators_is_deterministic() {
        let set = indicator_engine().compute(&series(60));
        let price = set.bb_middle.unwrap() - 1.0;
        let first = classify_signal(&set, price);
        for _ in 0..5 {
            assert_eq!(classify_signal(&set, price), first);
        }
    }

    // ============================================================================
    // Classifier contract examples
    // ============================================================================

    #[test]
    fn bullish_set_buys_below_the_middle_band_and_holds_above() {
        let set = IndicatorSet {
            rsi: Some(65.0),
            macd_line: Some(1.2),
            macd_signal: Some(0.9),
            macd_histogram: Some(0.3),
            bb_middle: Some(100.0),
            bb_lower: Some(95.0),
            bb_upper: Some(105.0),
            atr: Some(1.0),
        };
        assert_eq!(classify_signal(&set, 95.0), Signal::Buy);
        assert_eq!(classify_signal(&set, 105.0), Signal::Hold);
    }

    // ============================================================================
    // Detectors over a rolling history
    // ============================================================================

    #[test]
    fn degenerate_tight_range_never_inverts_the_levels() {
        let engine = detector_engine();
        let mut history = PriceHistory::new();
        for _ in 0..10 {
            history.push(100.0);
        }
        // buy would be 101.0 and sell 99.0; the inverted proposal must be
        // suppressed rather than reported.
        assert!(engine.detect_range(&history).is_none());
    }

    #[test]
    fn atr_gated_detectors_abstain_without_volatility_basis() {
        let engine = detector_engine();
        let mut history = PriceHistory::new();
        for _ in 0..10 {
            history.push(100.0);
        }
        assert!(engine.detect_breakout(&history, 200.0, None).is_none());
        assert!(engine.detect_dca(&history, 50.0, Some(0.0)).is_none());
    }

    #[test]
    fn momentum_stays_silent_until_five_points_arrive() {
        let engine = detector_engine();
        let mut history = PriceHistory::new();
        for i in 0..4 {
            history.push(100.0 + i as f64);
            assert!(engine.momentum(&history).is_none());
        }
        history.push(104.0);
        assert_eq!(engine.momentum(&history), Some(MomentumHint::Rising));
    }

    // ============================================================================
    // Trend and projection
    // ============================================================================

    #[test]
    fn trend_and_projection_follow_the_snapshot_changes() {
        let trend = classify_trend(50.0, 1.5, 3.0, 1.0);
        assert_eq!(trend.label, TrendLabel::Uptrend);

        let projection = project_prices(50.0, 1.5, 3.0, 1.0);
        assert!((projection.p1d - 51.5).abs() < 1e-9);
        assert!((projection.p7d - 50.5).abs() < 1e-9);
        assert!((projection.p30d - 50.0 * 1.01_f64.powi(4)).abs() < 1e-9);
    }
}

//! S1/S2: hybrid-strategy signal generation from a fresh candle window.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use altinrade::application::hybrid_strategy;
use altinrade::application::signal_combiner::Thresholds;
use altinrade::config::ModuleWeights;
use altinrade::domain::analysis::record::SignalDirection;
use altinrade::domain::analysis::sub_analysis::SubAnalysis;
use altinrade::domain::market::candle::Candle;
use altinrade::domain::market::quote::{MarketSnapshot, PriceQuote};
use altinrade::domain::market::timeframe::Timeframe;
use altinrade::domain::trading::CostConfig;

const CANDLE_COUNT: usize = 200;

fn thresholds() -> Thresholds {
    Thresholds {
        confidence_by_tf: std::collections::HashMap::new(),
        gram_override_confidence: dec!(0.50),
        min_volatility_pct: dec!(0.005),
        weights: ModuleWeights::default(),
        costs: CostConfig::default(),
    }
}

/// Builds a monotonic gram-gold series from 2000.00 to 2100.00 with a
/// constant true-range-to-close ratio, so `atr_pct` stays near `atr_pct_target`
/// for the whole window regardless of the rising price level.
fn trending_candles(atr_pct_target: Decimal) -> Vec<Candle> {
    let start = dec!(2000.00);
    let end = dec!(2100.00);
    let step = (end - start) / Decimal::from(CANDLE_COUNT as i64 - 1);
    let mut candles = Vec::with_capacity(CANDLE_COUNT);
    for i in 0..CANDLE_COUNT {
        let close = start + step * Decimal::from(i as i64);
        let half_range = close * atr_pct_target / dec!(100) / Decimal::TWO;
        candles.push(Candle {
            interval: Timeframe::FifteenMin,
            ts_open: (i as i64) * 15 * 60 * 1000,
            open: close - half_range / Decimal::TWO,
            high: close + half_range,
            low: close - half_range,
            close,
            tick_count: 4,
            sealed: true,
        });
    }
    candles
}

/// Flat reference series used for the global/currency context so neither
/// biases the gram-trend-driven direction under test.
fn flat_candles(price: Decimal) -> Vec<Candle> {
    (0..CANDLE_COUNT)
        .map(|i| Candle {
            interval: Timeframe::FifteenMin,
            ts_open: (i as i64) * 15 * 60 * 1000,
            open: price,
            high: price,
            low: price,
            close: price,
            tick_count: 4,
            sealed: true,
        })
        .collect()
}

fn snapshot(gram_candles: Vec<Candle>) -> MarketSnapshot {
    let latest = gram_candles.last().unwrap();
    MarketSnapshot {
        latest: PriceQuote::new(Utc::now(), latest.close, dec!(2650), dec!(32.0), None),
        gram_candles,
        ounce_usd_candles: flat_candles(dec!(2650)),
        usd_try_candles: flat_candles(dec!(32.0)),
    }
}

#[test]
fn s1_single_timeframe_buy_generation() {
    let snap = snapshot(trending_candles(dec!(0.8)));
    let (analysis, signal) = hybrid_strategy::analyze(Timeframe::FifteenMin, &snap, &thresholds());

    let atr_pct = analysis
        .sub_analyses
        .iter()
        .find_map(|s| match s {
            SubAnalysis::VolatilityRegime(v) => Some(v.atr_pct),
            _ => None,
        })
        .expect("volatility sub-analysis present");
    assert!(atr_pct > dec!(0.5), "fixture ATR% ({atr_pct}) must clear the volatility gate");

    assert_eq!(analysis.signal, SignalDirection::Buy);
    let signal = signal.expect("buy verdict projects to a signal");
    assert_eq!(signal.direction, SignalDirection::Buy);
    assert!(signal.confidence >= dec!(0.55), "confidence {} below the scenario floor", signal.confidence);

    let stop_loss = signal.stop_loss.expect("actionable signal carries a stop loss");
    let take_profit = signal.take_profit.expect("actionable signal carries a take profit");
    assert!(stop_loss < dec!(2100.00));
    assert!(take_profit > dec!(2100.00));
}

#[test]
fn s2_hold_by_low_volatility() {
    let snap = snapshot(trending_candles(dec!(0.3)));
    let (analysis, signal) = hybrid_strategy::analyze(Timeframe::FifteenMin, &snap, &thresholds());

    let atr_pct = analysis
        .sub_analyses
        .iter()
        .find_map(|s| match s {
            SubAnalysis::VolatilityRegime(v) => Some(v.atr_pct),
            _ => None,
        })
        .expect("volatility sub-analysis present");
    assert!(atr_pct < dec!(0.5), "fixture ATR% ({atr_pct}) must fall below the volatility gate");

    assert_eq!(analysis.signal, SignalDirection::Hold);
    assert!(analysis.summary.contains("low_volatility"));
    assert!(analysis.stop_loss.is_none());
    assert!(analysis.take_profit.is_none());
    assert!(signal.is_none());
}

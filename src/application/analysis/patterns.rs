use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::analysis::sub_analysis::{DetectedPattern, PatternsAnalysis, SubAnalysis};
use crate::domain::market::candle::Candle;

fn body(c: &Candle) -> Decimal {
    (c.close - c.open).abs()
}

fn range(c: &Candle) -> Decimal {
    c.high - c.low
}

fn is_doji(c: &Candle) -> bool {
    range(c) > Decimal::ZERO && body(c) / range(c) < dec!(0.1)
}

fn is_hammer(c: &Candle) -> bool {
    let lower_wick = c.open.min(c.close) - c.low;
    let upper_wick = c.high - c.open.max(c.close);
    let b = body(c);
    b > Decimal::ZERO && lower_wick >= b * Decimal::TWO && upper_wick <= b
}

fn is_shooting_star(c: &Candle) -> bool {
    let upper_wick = c.high - c.open.max(c.close);
    let lower_wick = c.open.min(c.close) - c.low;
    let b = body(c);
    b > Decimal::ZERO && upper_wick >= b * Decimal::TWO && lower_wick <= b
}

fn bullish_engulfing(prev: &Candle, c: &Candle) -> bool {
    prev.close < prev.open && c.close > c.open && c.open <= prev.close && c.close >= prev.open
}

fn bearish_engulfing(prev: &Candle, c: &Candle) -> bool {
    prev.close > prev.open && c.close < c.open && c.open >= prev.close && c.close <= prev.open
}

/// Detects a handful of single/two-candle patterns over the most recent
/// bars. Unlike the other analyzers this one never returns
/// `InsufficientData`: an empty detection list for a quiet window is a
/// legitimate result, not a data-availability failure.
pub fn analyze(candles: &[Candle]) -> SubAnalysis {
    let mut detected = Vec::new();
    let Some(last) = candles.last() else {
        return SubAnalysis::Patterns(PatternsAnalysis::default());
    };

    if is_doji(last) {
        detected.push(DetectedPattern { name: "doji".to_string(), confidence: dec!(0.4), target: None });
    }
    if is_hammer(last) {
        detected.push(DetectedPattern { name: "hammer".to_string(), confidence: dec!(0.55), target: None });
    }
    if is_shooting_star(last) {
        detected.push(DetectedPattern { name: "shooting_star".to_string(), confidence: dec!(0.55), target: None });
    }

    if candles.len() >= 2 {
        let prev = &candles[candles.len() - 2];
        if bullish_engulfing(prev, last) {
            detected.push(DetectedPattern {
                name: "bullish_engulfing".to_string(),
                confidence: dec!(0.65),
                target: Some(last.close + body(last)),
            });
        }
        if bearish_engulfing(prev, last) {
            detected.push(DetectedPattern {
                name: "bearish_engulfing".to_string(),
                confidence: dec!(0.65),
                target: Some(last.close - body(last)),
            });
        }
    }

    SubAnalysis::Patterns(PatternsAnalysis { detected })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle { interval: Timeframe::FifteenMin, ts_open: 0, open, high, low, close, tick_count: 1, sealed: true }
    }

    #[test]
    fn detects_bullish_engulfing() {
        let candles = vec![
            candle(dec!(100), dec!(101), dec!(95), dec!(96)),
            candle(dec!(95), dec!(103), dec!(94), dec!(102)),
        ];
        let SubAnalysis::Patterns(p) = analyze(&candles) else { panic!("wrong variant") };
        assert!(p.detected.iter().any(|d| d.name == "bullish_engulfing"));
    }

    #[test]
    fn empty_series_yields_no_patterns_not_insufficient_data() {
        let result = analyze(&[]);
        assert!(!result.is_insufficient());
    }
}

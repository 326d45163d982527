use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::application::analysis::swing::find_swings;
use crate::domain::analysis::sub_analysis::{FibonacciAnalysis, FibonacciLevel, SubAnalysis};
use crate::domain::market::candle::Candle;

const LOOKBACK: usize = 10;
const BOUNCE_BAND_PCT: Decimal = dec!(0.003);
const RATIOS: [Decimal; 5] = [dec!(0.236), dec!(0.382), dec!(0.5), dec!(0.618), dec!(0.786)];

/// Retracement levels drawn from the most recent swing-high/swing-low pair.
pub fn analyze(candles: &[Candle]) -> SubAnalysis {
    let swings = find_swings(candles, LOOKBACK);
    let Some(last_high) = swings.iter().rev().find(|s| s.is_high) else {
        return SubAnalysis::insufficient("fibonacci", "no swing-high available");
    };
    let Some(last_low) = swings.iter().rev().find(|s| !s.is_high) else {
        return SubAnalysis::insufficient("fibonacci", "no swing-low available");
    };

    let (high, low) = (last_high.price, last_low.price);
    let uptrend = last_low.index < last_high.index;
    let range = high - low;
    if range <= Decimal::ZERO {
        return SubAnalysis::insufficient("fibonacci", "degenerate swing range");
    }

    let levels: Vec<FibonacciLevel> = RATIOS
        .iter()
        .map(|&ratio| {
            let price = if uptrend { high - range * ratio } else { low + range * ratio };
            FibonacciLevel { ratio, price }
        })
        .collect();

    let close = candles.last().map(|c| c.close).unwrap_or_default();
    let mut active_bounce = None;
    let mut target_level = None;
    if candles.len() >= 3 {
        let breach_up = candles[candles.len() - 2].close < candles[candles.len() - 3].close
            && candles[candles.len() - 1].close < candles[candles.len() - 2].close;
        let breach_down = candles[candles.len() - 2].close > candles[candles.len() - 3].close
            && candles[candles.len() - 1].close > candles[candles.len() - 2].close;

        for level in &levels {
            let band = level.price * BOUNCE_BAND_PCT;
            if (close - level.price).abs() <= band {
                let bouncing_against_breach = (uptrend && breach_down) || (!uptrend && breach_up);
                if bouncing_against_breach {
                    active_bounce = Some(level.price);
                    target_level = Some(if uptrend { high } else { low });
                }
                break;
            }
        }
    }

    SubAnalysis::Fibonacci(FibonacciAnalysis { levels, active_bounce, target_level })
}

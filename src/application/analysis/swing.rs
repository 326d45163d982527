use rust_decimal::Decimal;

use crate::domain::market::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingPoint {
    pub index: usize,
    pub price: Decimal,
    pub is_high: bool,
    /// Normalized prominence against the lookback window, in `[0, 1]`.
    pub strength: Decimal,
}

/// Finds swing highs/lows: index `i` is a swing-high if `high[i]` exceeds
/// every high within `lookback` bars on both sides, and symmetrically for
/// swing-lows. Strength is the point's excursion over the window range,
/// normalized to `[0, 1]`.
pub fn find_swings(candles: &[Candle], lookback: usize) -> Vec<SwingPoint> {
    let mut swings = Vec::new();
    if candles.len() < 2 * lookback + 1 {
        return swings;
    }

    for i in lookback..candles.len() - lookback {
        let window = &candles[i - lookback..=i + lookback];
        let window_high = window.iter().map(|c| c.high).fold(Decimal::MIN, Decimal::max);
        let window_low = window.iter().map(|c| c.low).fold(Decimal::MAX, Decimal::min);
        let range = window_high - window_low;

        let is_high = candles[i].high == window_high
            && window.iter().enumerate().all(|(j, c)| j == lookback || c.high < candles[i].high);
        let is_low = candles[i].low == window_low
            && window.iter().enumerate().all(|(j, c)| j == lookback || c.low > candles[i].low);

        if is_high {
            let strength = if range > Decimal::ZERO {
                (candles[i].high - window_low) / range
            } else {
                Decimal::ZERO
            };
            swings.push(SwingPoint { index: i, price: candles[i].high, is_high: true, strength });
        } else if is_low {
            let strength = if range > Decimal::ZERO {
                (window_high - candles[i].low) / range
            } else {
                Decimal::ZERO
            };
            swings.push(SwingPoint { index: i, price: candles[i].low, is_high: false, strength });
        }
    }
    swings
}

pub fn most_recent_of(swings: &[SwingPoint], is_high: bool, count: usize) -> Vec<SwingPoint> {
    swings
        .iter()
        .rev()
        .filter(|s| s.is_high == is_high)
        .take(count)
        .copied()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use rust_decimal_macros::dec;

    fn candle(high: Decimal, low: Decimal) -> Candle {
        Candle {
            interval: Timeframe::FifteenMin,
            ts_open: 0,
            open: (high + low) / Decimal::TWO,
            high,
            low,
            close: (high + low) / Decimal::TWO,
            tick_count: 1,
            sealed: true,
        }
    }

    #[test]
    fn detects_single_swing_high_at_peak() {
        let prices = [10, 11, 12, 20, 13, 12, 11];
        let candles: Vec<Candle> = prices.iter().map(|&p| candle(Decimal::from(p), Decimal::from(p - 1))).collect();
        let swings = find_swings(&candles, 2);
        assert!(swings.iter().any(|s| s.is_high && s.index == 3));
    }

    #[test]
    fn too_short_series_yields_no_swings() {
        let candles: Vec<Candle> = (0..3).map(|i| candle(Decimal::from(i + 1), Decimal::from(i))).collect();
        assert!(find_swings(&candles, 5).is_empty());
    }
}

use rust_decimal::Decimal;

use crate::domain::indicators::{require_history, IndicatorResult};
use crate::domain::market::candle::Candle;

/// Volume-Weighted Average Price over the whole input window, using
/// `tick_count` as the volume proxy.
pub fn vwap(candles: &[Candle]) -> IndicatorResult<Decimal> {
    require_history(candles, 1)?;

    let mut pv = Decimal::ZERO;
    let mut v = Decimal::ZERO;
    for c in candles {
        let typical = (c.high + c.low + c.close) / Decimal::from(3);
        let weight = Decimal::from(c.tick_count.max(1));
        pv += typical * weight;
        v += weight;
    }
    if v == Decimal::ZERO {
        return Err(crate::domain::errors::EngineError::insufficient_data(
            "zero total tick weight",
        ));
    }
    Ok(pv / v)
}

/// On-Balance Volume: running sum of +-tick_count by close direction.
pub fn obv(candles: &[Candle]) -> IndicatorResult<Decimal> {
    require_history(candles, 2)?;

    let mut value = Decimal::ZERO;
    for i in 1..candles.len() {
        let weight = Decimal::from(candles[i].tick_count.max(1));
        if candles[i].close > candles[i - 1].close {
            value += weight;
        } else if candles[i].close < candles[i - 1].close {
            value -= weight;
        }
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use rust_decimal_macros::dec;

    fn candle(close: Decimal, ticks: u32) -> Candle {
        Candle {
            interval: Timeframe::FifteenMin,
            ts_open: 0,
            open: close,
            high: close,
            low: close,
            close,
            tick_count: ticks,
            sealed: true,
        }
    }

    #[test]
    fn vwap_of_constant_price_equals_that_price() {
        let candles = vec![candle(dec!(100), 10); 5];
        assert_eq!(vwap(&candles).unwrap(), dec!(100));
    }

    #[test]
    fn obv_accumulates_on_rising_closes() {
        let candles = vec![candle(dec!(100), 5), candle(dec!(101), 5), candle(dec!(102), 5)];
        assert_eq!(obv(&candles).unwrap(), dec!(10));
    }
}

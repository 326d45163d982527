use rust_decimal::Decimal;

use crate::domain::indicators::{require_history, IndicatorResult};
use crate::domain::market::candle::Candle;

fn typical_price(c: &Candle) -> Decimal {
    (c.high + c.low + c.close) / Decimal::from(3)
}

/// Commodity Channel Index, period 20 by default.
pub fn cci(candles: &[Candle], period: usize) -> IndicatorResult<Decimal> {
    require_history(candles, period)?;

    let window = &candles[candles.len() - period..];
    let typical: Vec<Decimal> = window.iter().map(typical_price).collect();
    let sma = typical.iter().sum::<Decimal>() / Decimal::from(period);
    let mean_deviation =
        typical.iter().map(|tp| (*tp - sma).abs()).sum::<Decimal>() / Decimal::from(period);

    if mean_deviation == Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    let last_tp = *typical.last().expect("non-empty: checked by require_history");
    Ok((last_tp - sma) / (Decimal::new(15, 3) * mean_deviation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use rust_decimal_macros::dec;

    fn candle(h: Decimal, l: Decimal, c: Decimal) -> Candle {
        Candle {
            interval: Timeframe::FifteenMin,
            ts_open: 0,
            open: c,
            high: h,
            low: l,
            close: c,
            tick_count: 1,
            sealed: true,
        }
    }

    #[test]
    fn flat_series_gives_zero_cci() {
        let candles = vec![candle(dec!(101), dec!(99), dec!(100)); 20];
        assert_eq!(cci(&candles, 20).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn spike_above_mean_gives_positive_cci() {
        let mut candles: Vec<Candle> = (0..19).map(|_| candle(dec!(101), dec!(99), dec!(100))).collect();
        candles.push(candle(dec!(120), dec!(118), dec!(119)));
        assert!(cci(&candles, 20).unwrap() > Decimal::ZERO);
    }
}

use rust_decimal::Decimal;

use crate::domain::indicators::{require_history, true_range, IndicatorResult};
use crate::domain::market::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtrOutput {
    pub atr: Decimal,
    pub atr_pct: Decimal,
}

/// Wilder-smoothed Average True Range, period 14.
pub fn atr(candles: &[Candle], period: usize) -> IndicatorResult<AtrOutput> {
    require_history(candles, period + 1)?;

    let mut atr = {
        let mut sum = Decimal::ZERO;
        for i in 1..=period {
            sum += true_range(candles[i].high, candles[i].low, candles[i - 1].close);
        }
        sum / Decimal::from(period)
    };

    for i in (period + 1)..candles.len() {
        let tr = true_range(candles[i].high, candles[i].low, candles[i - 1].close);
        atr = (atr * Decimal::from(period - 1) + tr) / Decimal::from(period);
    }

    let close = candles.last().expect("non-empty: checked by require_history").close;
    let atr_pct = if close == Decimal::ZERO {
        Decimal::ZERO
    } else {
        atr / close * Decimal::ONE_HUNDRED
    };

    Ok(AtrOutput { atr, atr_pct })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use rust_decimal_macros::dec;

    fn candle(o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Candle {
        Candle {
            interval: Timeframe::FifteenMin,
            ts_open: 0,
            open: o,
            high: h,
            low: l,
            close: c,
            tick_count: 1,
            sealed: true,
        }
    }

    #[test]
    fn insufficient_data_below_minimum() {
        let candles = vec![candle(dec!(100), dec!(101), dec!(99), dec!(100)); 5];
        assert!(atr(&candles, 14).is_err());
    }

    #[test]
    fn constant_range_yields_matching_atr() {
        let candles: Vec<Candle> = (0..20)
            .map(|_| candle(dec!(100), dec!(102), dec!(98), dec!(100)))
            .collect();
        let out = atr(&candles, 14).unwrap();
        assert_eq!(out.atr, dec!(4));
        assert_eq!(out.atr_pct, dec!(4));
    }
}

use rust_decimal::Decimal;

use crate::domain::indicators::{require_history, IndicatorResult};
use crate::domain::market::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdOutput {
    pub macd_line: Decimal,
    pub signal_line: Decimal,
    pub histogram: Decimal,
}

fn ema_series(prices: &[Decimal], period: usize) -> Vec<Decimal> {
    let k = Decimal::TWO / Decimal::from(period + 1);
    let mut out = Vec::with_capacity(prices.len());
    let mut ema = prices[0];
    out.push(ema);
    for &p in &prices[1..] {
        ema = p * k + ema * (Decimal::ONE - k);
        out.push(ema);
    }
    out
}

/// EMA(12)/EMA(26) MACD with a 9-period signal line.
pub fn macd(
    candles: &[Candle],
    fast: usize,
    slow: usize,
    signal: usize,
) -> IndicatorResult<MacdOutput> {
    require_history(candles, slow + signal)?;

    let closes: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
    let ema_fast = ema_series(&closes, fast);
    let ema_slow = ema_series(&closes, slow);

    let macd_series: Vec<Decimal> = ema_fast
        .iter()
        .zip(ema_slow.iter())
        .map(|(f, s)| f - s)
        .collect();

    let signal_series = ema_series(&macd_series, signal);

    let macd_line = *macd_series.last().expect("non-empty: checked by require_history");
    let signal_line = *signal_series.last().expect("non-empty: checked by require_history");

    Ok(MacdOutput {
        macd_line,
        signal_line,
        histogram: macd_line - signal_line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use rust_decimal_macros::dec;

    fn candle(close: Decimal) -> Candle {
        Candle {
            interval: Timeframe::FifteenMin,
            ts_open: 0,
            open: close,
            high: close,
            low: close,
            close,
            tick_count: 1,
            sealed: true,
        }
    }

    #[test]
    fn insufficient_data_below_minimum() {
        let candles = vec![candle(dec!(100)); 10];
        assert!(macd(&candles, 12, 26, 9).is_err());
    }

    #[test]
    fn uptrend_has_positive_histogram() {
        let candles: Vec<Candle> = (0..60).map(|i| candle(Decimal::from(100 + i))).collect();
        let out = macd(&candles, 12, 26, 9).unwrap();
        assert!(out.macd_line > Decimal::ZERO);
        assert_eq!(out.histogram, out.macd_line - out.signal_line);
    }
}

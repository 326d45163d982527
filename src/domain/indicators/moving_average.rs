use rust_decimal::Decimal;

use crate::domain::indicators::{require_history, IndicatorResult};
use crate::domain::market::candle::Candle;

pub fn sma(candles: &[Candle], period: usize) -> IndicatorResult<Decimal> {
    require_history(candles, period)?;
    let window = &candles[candles.len() - period..];
    Ok(window.iter().map(|c| c.close).sum::<Decimal>() / Decimal::from(period))
}

pub fn ema(candles: &[Candle], period: usize) -> IndicatorResult<Decimal> {
    require_history(candles, period)?;
    let window = &candles[candles.len() - period..];
    let k = Decimal::TWO / Decimal::from(period + 1);
    let mut value = window[0].close;
    for c in &window[1..] {
        value = c.close * k + value * (Decimal::ONE - k);
    }
    Ok(value)
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
    fn sma_averages_the_window() {
        let candles: Vec<Candle> = (1..=5).map(|i| candle(Decimal::from(i))).collect();
        assert_eq!(sma(&candles, 5).unwrap(), dec!(3));
    }

    #[test]
    fn ema_tracks_recent_prices_more_closely_than_sma() {
        let mut candles: Vec<Candle> = vec![candle(dec!(100)); 19];
        candles.push(candle(dec!(200)));
        let ema_value = ema(&candles, 20).unwrap();
        let sma_value = sma(&candles, 20).unwrap();
        assert!(ema_value > sma_value);
    }
}

use rust_decimal::Decimal;

use crate::domain::indicators::{require_history, IndicatorResult};
use crate::domain::market::candle::Candle;

/// Wilder-smoothed RSI, period 14 by default.
pub fn rsi(candles: &[Candle], period: usize) -> IndicatorResult<Decimal> {
    require_history(candles, period + 1)?;

    let mut avg_gain = Decimal::ZERO;
    let mut avg_loss = Decimal::ZERO;

    for i in 1..=period {
        let delta = candles[i].close - candles[i - 1].close;
        if delta > Decimal::ZERO {
            avg_gain += delta;
        } else {
            avg_loss += -delta;
        }
    }
    avg_gain /= Decimal::from(period);
    avg_loss /= Decimal::from(period);

    for idx in (period + 1)..candles.len() {
        let delta = candles[idx].close - candles[idx - 1].close;
        let (gain, loss) = if delta > Decimal::ZERO {
            (delta, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -delta)
        };
        avg_gain = (avg_gain * Decimal::from(period - 1) + gain) / Decimal::from(period);
        avg_loss = (avg_loss * Decimal::from(period - 1) + loss) / Decimal::from(period);
    }

    if avg_loss == Decimal::ZERO {
        return Ok(Decimal::ONE_HUNDRED);
    }
    let rs = avg_gain / avg_loss;
    Ok(Decimal::ONE_HUNDRED - (Decimal::ONE_HUNDRED / (Decimal::ONE + rs)))
}

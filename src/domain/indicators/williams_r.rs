use rust_decimal::Decimal;

use crate::domain::indicators::{require_history, IndicatorResult};
use crate::domain::market::candle::Candle;

/// Williams %R, period 14 by default.
pub fn williams_r(candles: &[Candle], period: usize) -> IndicatorResult<Decimal> {
    require_history(candles, period)?;

    let window = &candles[candles.len() - period..];
    let highest_high = window.iter().map(|c| c.high).fold(Decimal::MIN, Decimal::max);
    let lowest_low = window.iter().map(|c| c.low).fold(Decimal::MAX, Decimal::min);
    let close = window.last().expect("non-empty: checked by require_history").close;

    if highest_high == lowest_low {
        return Ok(Decimal::new(-50, 0));
    }
    Ok((highest_high - close) / (highest_high - lowest_low) * Decimal::new(-100, 0))
}

use rust_decimal::Decimal;

use crate::domain::indicators::{require_history, IndicatorResult};
use crate::domain::market::candle::Candle;

fn typical_price(c: &Candle) -> Decimal {
    (c.high + c.low + c.close) / Decimal::from(3)
}

/// Money Flow Index, period 14. Tick count stands in for volume since the
/// gram tick stream carries no traded-volume field.
pub fn mfi(candles: &[Candle], period: usize) -> IndicatorResult<Decimal> {
    require_history(candles, period + 1)?;

    let start = candles.len() - period - 1;
    let window = &candles[start..];

    let mut positive_flow = Decimal::ZERO;
    let mut negative_flow = Decimal::ZERO;

    for i in 1..window.len() {
        let tp = typical_price(&window[i]);
        let prev_tp = typical_price(&window[i - 1]);
        let raw_flow = tp * Decimal::from(window[i].tick_count.max(1));
        if tp > prev_tp {
            positive_flow += raw_flow;
        } else if tp < prev_tp {
            negative_flow += raw_flow;
        }
    }

    if negative_flow == Decimal::ZERO {
        return Ok(Decimal::ONE_HUNDRED);
    }
    let money_ratio = positive_flow / negative_flow;
    Ok(Decimal::ONE_HUNDRED - (Decimal::ONE_HUNDRED / (Decimal::ONE + money_ratio)))
}

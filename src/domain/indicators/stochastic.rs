use rust_decimal::Decimal;

use crate::domain::indicators::{require_history, IndicatorResult};
use crate::domain::market::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticOutput {
    pub k: Decimal,
    pub d: Decimal,
}

fn raw_k(window: &[Candle]) -> Decimal {
    let high = window.iter().map(|c| c.high).fold(Decimal::MIN, Decimal::max);
    let low = window.iter().map(|c| c.low).fold(Decimal::MAX, Decimal::min);
    let close = window.last().expect("window is non-empty by construction").close;
    if high == low {
        return Decimal::new(50, 0);
    }
    (close - low) / (high - low) * Decimal::ONE_HUNDRED
}

/// %K period 14, %D = SMA(3) of %K.
pub fn stochastic(candles: &[Candle], k_period: usize, d_period: usize) -> IndicatorResult<StochasticOutput> {
    require_history(candles, k_period + d_period - 1)?;

    let mut k_values = Vec::with_capacity(d_period);
    let start = candles.len() - d_period;
    for i in start..candles.len() {
        let window_start = i + 1 - k_period;
        k_values.push(raw_k(&candles[window_start..=i]));
    }

    let k = *k_values.last().expect("d_period >= 1 guarantees at least one value");
    let d = k_values.iter().sum::<Decimal>() / Decimal::from(k_values.len());

    Ok(StochasticOutput { k, d })
}

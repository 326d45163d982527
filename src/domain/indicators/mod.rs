//! Pure indicator functions over candle series.
//!
//! Every function is deterministic, allocates at most O(n), and never
//! panics: inputs shorter than the documented minimum history return
//! `EngineError::InsufficientData` instead.

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod cci;
pub mod macd;
pub mod mfi;
pub mod moving_average;
pub mod pivot;
pub mod rsi;
pub mod stochastic;
pub mod volume_flow;
pub mod williams_r;

use crate::domain::errors::EngineError;
use crate::domain::market::candle::Candle;

pub type IndicatorResult<T> = Result<T, EngineError>;

/// Returns `Err(InsufficientData)` when `candles` is shorter than `min`.
pub(crate) fn require_history(candles: &[Candle], min: usize) -> IndicatorResult<()> {
    if candles.len() < min {
        return Err(EngineError::insufficient_data(format!(
            "need at least {min} candles, got {}",
            candles.len()
        )));
    }
    Ok(())
}

pub(crate) fn true_range(high: rust_decimal::Decimal, low: rust_decimal::Decimal, prev_close: rust_decimal::Decimal) -> rust_decimal::Decimal {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}

use rust_decimal::Decimal;

use crate::domain::indicators::{require_history, true_range, IndicatorResult};
use crate::domain::market::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdxOutput {
    pub adx: Decimal,
    pub plus_di: Decimal,
    pub minus_di: Decimal,
}

/// Wilder-smoothed +DI/-DI and ADX, period 14 by default.
pub fn adx(candles: &[Candle], period: usize) -> IndicatorResult<AdxOutput> {
    require_history(candles, period * 2 + 1)?;

    let mut plus_dm = Vec::with_capacity(candles.len());
    let mut minus_dm = Vec::with_capacity(candles.len());
    let mut tr = Vec::with_capacity(candles.len());

    for i in 1..candles.len() {
        let up_move = candles[i].high - candles[i - 1].high;
        let down_move = candles[i - 1].low - candles[i].low;
        let plus = if up_move > down_move && up_move > Decimal::ZERO {
            up_move
        } else {
            Decimal::ZERO
        };
        let minus = if down_move > up_move && down_move > Decimal::ZERO {
            down_move
        } else {
            Decimal::ZERO
        };
        plus_dm.push(plus);
        minus_dm.push(minus);
        tr.push(true_range(candles[i].high, candles[i].low, candles[i - 1].close));
    }

    let wilder_smooth = |series: &[Decimal]| -> Vec<Decimal> {
        let mut smoothed = Vec::with_capacity(series.len());
        let mut running: Decimal = series[..period].iter().sum();
        smoothed.push(running);
        for v in &series[period..] {
            running = running - (running / Decimal::from(period)) + v;
            smoothed.push(running);
        }
        smoothed
    };

    let smoothed_tr = wilder_smooth(&tr);
    let smoothed_plus = wilder_smooth(&plus_dm);
    let smoothed_minus = wilder_smooth(&minus_dm);

    let dx_series: Vec<Decimal> = smoothed_tr
        .iter()
        .zip(smoothed_plus.iter())
        .zip(smoothed_minus.iter())
        .map(|((&tr_v, &plus_v), &minus_v)| {
            if tr_v == Decimal::ZERO {
                return Decimal::ZERO;
            }
            let plus_di = plus_v / tr_v * Decimal::ONE_HUNDRED;
            let minus_di = minus_v / tr_v * Decimal::ONE_HUNDRED;
            let sum = plus_di + minus_di;
            if sum == Decimal::ZERO {
                Decimal::ZERO
            } else {
                (plus_di - minus_di).abs() / sum * Decimal::ONE_HUNDRED
            }
        })
        .collect();

    let adx_value = if dx_series.len() >= period {
        dx_series[dx_series.len() - period..].iter().sum::<Decimal>() / Decimal::from(period)
    } else {
        dx_series.iter().sum::<Decimal>() / Decimal::from(dx_series.len().max(1))
    };

    let last_tr = *smoothed_tr.last().expect("non-empty: checked by require_history");
    let plus_di = if last_tr == Decimal::ZERO {
        Decimal::ZERO
    } else {
        *smoothed_plus.last().unwrap() / last_tr * Decimal::ONE_HUNDRED
    };
    let minus_di = if last_tr == Decimal::ZERO {
        Decimal::ZERO
    } else {
        *smoothed_minus.last().unwrap() / last_tr * Decimal::ONE_HUNDRED
    };

    Ok(AdxOutput {
        adx: adx_value,
        plus_di,
        minus_di,
    })
}

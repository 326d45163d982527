use rust_decimal::Decimal;

use crate::domain::indicators::{require_history, IndicatorResult};
use crate::domain::market::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerOutput {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
    /// `(close - lower) / (upper - lower)`, clamped to `[0, 1]` at the bands.
    pub position: Decimal,
    /// True when band-width percentile over the window is below 20%.
    pub squeeze: bool,
}

fn sma(values: &[Decimal]) -> Decimal {
    values.iter().sum::<Decimal>() / Decimal::from(values.len())
}

fn stddev(values: &[Decimal], mean: Decimal) -> Decimal {
    let variance: Decimal = values
        .iter()
        .map(|v| (*v - mean) * (*v - mean))
        .sum::<Decimal>()
        / Decimal::from(values.len());
    // Decimal has no native sqrt; Newton's method to f64 precision is
    // sufficient for a band width that only gates a squeeze flag.
    Decimal::from_f64_retain(variance.to_string().parse::<f64>().unwrap_or(0.0).sqrt())
        .unwrap_or(Decimal::ZERO)
}

/// SMA(20) +/- 2 standard deviations.
pub fn bollinger(candles: &[Candle], period: usize) -> IndicatorResult<BollingerOutput> {
    require_history(candles, period)?;

    let window = &candles[candles.len() - period..];
    let closes: Vec<Decimal> = window.iter().map(|c| c.close).collect();
    let middle = sma(&closes);
    let sd = stddev(&closes, middle);

    let upper = middle + sd * Decimal::TWO;
    let lower = middle - sd * Decimal::TWO;
    let close = closes[closes.len() - 1];

    let band_width = upper - lower;
    let position = if band_width == Decimal::ZERO {
        Decimal::new(5, 1) // 0.5: flat bands, treat price as centered
    } else {
        ((close - lower) / band_width).clamp(Decimal::ZERO, Decimal::ONE)
    };

    // Squeeze: compare this window's band width (as % of middle) against the
    // widths of every window of the same size in the available history.
    let this_width_pct = if middle == Decimal::ZERO {
        Decimal::ZERO
    } else {
        band_width / middle
    };
    let widths_pct: Vec<Decimal> = candles
        .windows(period)
        .filter_map(|w| {
            let closes: Vec<Decimal> = w.iter().map(|c| c.close).collect();
            let m = sma(&closes);
            if m == Decimal::ZERO {
                return None;
            }
            let s = stddev(&closes, m);
            Some((s * Decimal::TWO * Decimal::TWO) / m)
        })
        .collect();
    let rank = widths_pct.iter().filter(|w| **w <= this_width_pct).count();
    let percentile = Decimal::from(rank) * Decimal::ONE_HUNDRED / Decimal::from(widths_pct.len().max(1));
    let squeeze = percentile < Decimal::from(20);

    Ok(BollingerOutput {
        upper,
        middle,
        lower,
        position,
        squeeze,
    })
}

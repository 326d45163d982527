use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::application::analysis::swing::{find_swings, most_recent_of};
use crate::domain::analysis::sub_analysis::{DivergenceAnalysis, DivergenceDirection, SubAnalysis};
use crate::domain::indicators::rsi::rsi;
use crate::domain::market::candle::Candle;

const LOOKBACK: usize = 5;
const STALE_AFTER_BARS: usize = 10;

fn rsi_at(candles: &[Candle], index: usize, period: usize) -> Option<Decimal> {
    rsi(&candles[..=index], period).ok()
}

/// Pairs the two most-recent swing-lows in price against RSI at those same
/// bars. Bullish divergence: price makes a lower low while RSI makes a
/// higher low. Never raises; returns `InsufficientData` when fewer than two
/// qualifying swing-lows exist.
pub fn analyze(candles: &[Candle]) -> SubAnalysis {
    let swings = find_swings(candles, LOOKBACK);
    let lows = most_recent_of(&swings, false, 2);

    if lows.len() < 2 {
        return SubAnalysis::insufficient("divergence", "fewer than two swing-lows available");
    }

    let (first, second) = (lows[0], lows[1]);
    let rsi_period = 14;
    let (Some(rsi_first), Some(rsi_second)) = (
        rsi_at(candles, first.index, rsi_period),
        rsi_at(candles, second.index, rsi_period),
    ) else {
        return SubAnalysis::insufficient("divergence", "rsi unavailable at swing points");
    };

    let price_ll = second.price < first.price;
    let price_hl = second.price > first.price;
    let rsi_hl = rsi_second > rsi_first;
    let rsi_ll = rsi_second < rsi_first;

    let direction = if price_ll && rsi_hl {
        DivergenceDirection::Bullish
    } else if price_hl && rsi_ll {
        DivergenceDirection::Bearish
    } else {
        return SubAnalysis::insufficient("divergence", "no qualifying divergence between the two most recent swing-lows");
    };

    let price_change_pct = ((second.price - first.price) / first.price).abs() * Decimal::ONE_HUNDRED;
    let rsi_change = (rsi_second - rsi_first).abs();
    let magnitude = price_change_pct + rsi_change / Decimal::TWO;
    let strength: u8 = if magnitude > dec!(15) {
        5
    } else if magnitude > dec!(10) {
        4
    } else if magnitude > dec!(6) {
        3
    } else if magnitude > dec!(3) {
        2
    } else {
        1
    };

    let bars_since = candles.len().saturating_sub(1).saturating_sub(second.index);
    let staleness_penalty = if bars_since > STALE_AFTER_BARS {
        dec!(0.5)
    } else {
        Decimal::ONE
    };
    let confidence = (Decimal::from(strength) / dec!(5)) * staleness_penalty;

    SubAnalysis::Divergence(DivergenceAnalysis {
        direction,
        hidden: false,
        strength,
        confidence,
    })
}

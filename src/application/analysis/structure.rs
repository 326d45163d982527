use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::application::analysis::swing::find_swings;
use crate::domain::analysis::sub_analysis::{PullbackZone, StructureAnalysis, StructureBreakType, StructureState, SubAnalysis};
use crate::domain::market::candle::Candle;

const LOOKBACK: usize = 10;
const PULLBACK_BAND_PCT: Decimal = dec!(0.003);

/// Classifies the last four swings into HH/HL/LL/LH and flags a structure
/// break when the latest counter-swing violates the prior same-type swing.
pub fn analyze(candles: &[Candle]) -> SubAnalysis {
    let swings = find_swings(candles, LOOKBACK);
    if swings.len() < 4 {
        return SubAnalysis::insufficient("structure", "fewer than four swings available");
    }

    let recent = &swings[swings.len() - 4..];
    let highs: Vec<_> = recent.iter().filter(|s| s.is_high).collect();
    let lows: Vec<_> = recent.iter().filter(|s| !s.is_high).collect();

    let higher_highs = highs.len() >= 2 && highs.windows(2).all(|w| w[1].price > w[0].price);
    let higher_lows = lows.len() >= 2 && lows.windows(2).all(|w| w[1].price > w[0].price);
    let lower_lows = lows.len() >= 2 && lows.windows(2).all(|w| w[1].price < w[0].price);
    let lower_highs = highs.len() >= 2 && highs.windows(2).all(|w| w[1].price < w[0].price);

    let current = if higher_highs && higher_lows {
        StructureState::Uptrend
    } else if lower_lows && lower_highs {
        StructureState::Downtrend
    } else {
        StructureState::Ranging
    };

    let last = recent.last().expect("checked len >= 4");
    let prior_same_type: Vec<_> = recent.iter().rev().skip(1).filter(|s| s.is_high == last.is_high).collect();

    let (has_break, break_type, pullback_zone) = match prior_same_type.first() {
        Some(prior) if last.is_high && last.price < prior.price => (
            true,
            Some(StructureBreakType::BearishBreakOfStructure),
            Some(PullbackZone {
                low: prior.price * (Decimal::ONE - PULLBACK_BAND_PCT),
                high: prior.price * (Decimal::ONE + PULLBACK_BAND_PCT),
                active: false,
            }),
        ),
        Some(prior) if !last.is_high && last.price > prior.price => (
            true,
            Some(StructureBreakType::BullishBreakOfStructure),
            Some(PullbackZone {
                low: prior.price * (Decimal::ONE - PULLBACK_BAND_PCT),
                high: prior.price * (Decimal::ONE + PULLBACK_BAND_PCT),
                active: false,
            }),
        ),
        _ => (false, None, None),
    };

    let pullback_zone = pullback_zone.map(|mut zone| {
        if let Some(close) = candles.last().map(|c| c.close) {
            zone.active = close >= zone.low && close <= zone.high;
        }
        zone
    });

    let key_levels = recent.iter().map(|s| s.price).collect();

    SubAnalysis::Structure(StructureAnalysis {
        current,
        has_break,
        break_type,
        pullback_zone,
        key_levels,
    })
}

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::analysis::sub_analysis::{FairValueGap, LiquidityPool, OrderBlock, SmcAnalysis, StopHunt, SubAnalysis};
use crate::domain::market::candle::Candle;

const ROUNDING_UNIT: Decimal = dec!(5);
const MIN_TOUCHES: u32 = 3;
const CONSOLIDATION_MIN: usize = 3;
const CONSOLIDATION_MAX: usize = 5;

fn round_to_bucket(price: Decimal) -> Decimal {
    (price / ROUNDING_UNIT).round() * ROUNDING_UNIT
}

fn liquidity_pools(candles: &[Candle]) -> Vec<LiquidityPool> {
    let mut touches: HashMap<Decimal, u32> = HashMap::new();
    for c in candles {
        *touches.entry(round_to_bucket(c.high)).or_insert(0) += 1;
        *touches.entry(round_to_bucket(c.low)).or_insert(0) += 1;
    }
    touches
        .into_iter()
        .filter(|(_, count)| *count >= MIN_TOUCHES)
        .map(|(price, touches)| LiquidityPool { price, touches })
        .collect()
}

fn stop_hunt(candles: &[Candle], pools: &[LiquidityPool]) -> Option<StopHunt> {
    if candles.len() < 3 {
        return None;
    }
    for i in 0..candles.len().saturating_sub(2) {
        let c = &candles[i];
        let body = (c.close - c.open).abs();
        let upper_wick = c.high - c.open.max(c.close);
        let lower_wick = c.open.min(c.close) - c.low;
        let wick = upper_wick.max(lower_wick);
        if body == Decimal::ZERO || wick < body * Decimal::TWO {
            continue;
        }
        for pool in pools {
            let crossed = c.high >= pool.price && c.low <= pool.price;
            if !crossed {
                continue;
            }
            for (offset, follow) in candles[i + 1..].iter().take(2).enumerate() {
                let reverted = if upper_wick > lower_wick {
                    follow.close < pool.price
                } else {
                    follow.close > pool.price
                };
                if reverted {
                    return Some(StopHunt { level: pool.price, reverted_within_bars: (offset + 1) as u32 });
                }
            }
        }
    }
    None
}

fn order_blocks(candles: &[Candle]) -> Vec<OrderBlock> {
    let mut blocks = Vec::new();
    if candles.len() < CONSOLIDATION_MAX + 2 {
        return blocks;
    }
    for window_len in CONSOLIDATION_MIN..=CONSOLIDATION_MAX {
        for start in 0..candles.len().saturating_sub(window_len + 1) {
            let window = &candles[start..start + window_len];
            let high = window.iter().map(|c| c.high).fold(Decimal::MIN, Decimal::max);
            let low = window.iter().map(|c| c.low).fold(Decimal::MAX, Decimal::min);
            let range = high - low;
            let avg_range: Decimal =
                window.iter().map(|c| c.high - c.low).sum::<Decimal>() / Decimal::from(window_len.max(1));
            if avg_range == Decimal::ZERO || range > avg_range * dec!(1.5) {
                continue;
            }
            let breakout = &candles[start + window_len];
            let breakout_range = breakout.high - breakout.low;
            if breakout_range < avg_range * Decimal::TWO {
                continue;
            }
            blocks.push(OrderBlock { low, high, bullish: breakout.close > breakout.open });
        }
    }
    blocks
}

fn fair_value_gaps(candles: &[Candle]) -> Vec<FairValueGap> {
    let mut gaps = Vec::new();
    for i in 1..candles.len().saturating_sub(1) {
        let prev = &candles[i - 1];
        let next = &candles[i + 1];
        if next.low > prev.high {
            gaps.push(FairValueGap { low: prev.high, high: next.low, bullish: true });
        } else if next.high < prev.low {
            gaps.push(FairValueGap { low: next.high, high: prev.low, bullish: false });
        }
    }
    gaps
}

/// Smart-money-concepts read: liquidity pools, stop hunts, order blocks and
/// fair-value gaps, each computed independently over the same candle window.
pub fn analyze(candles: &[Candle]) -> SubAnalysis {
    if candles.len() < 10 {
        return SubAnalysis::insufficient("smc", "fewer than ten candles available");
    }

    let pools = liquidity_pools(candles);
    let hunt = stop_hunt(candles, &pools);
    let blocks = order_blocks(candles);
    let gaps = fair_value_gaps(candles);

    let entry_zones = blocks
        .iter()
        .filter(|b| b.bullish)
        .map(|b| b.low)
        .chain(gaps.iter().filter(|g| g.bullish).map(|g| g.low))
        .collect();

    SubAnalysis::Smc(SmcAnalysis {
        liquidity_pools: pools,
        stop_hunt: hunt,
        order_blocks: blocks,
        fvgs: gaps,
        entry_zones,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;

    fn candle(open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle { interval: Timeframe::FifteenMin, ts_open: 0, open, high, low, close, tick_count: 1, sealed: true }
    }

    #[test]
    fn detects_bullish_fair_value_gap() {
        let candles = vec![
            candle(dec!(100), dec!(101), dec!(99), dec!(100)),
            candle(dec!(103), dec!(106), dec!(103), dec!(105)),
            candle(dec!(108), dec!(110), dec!(107), dec!(109)),
        ];
        let gaps = fair_value_gaps(&candles);
        assert_eq!(gaps.len(), 1);
        assert!(gaps[0].bullish);
    }

    #[test]
    fn too_short_series_is_insufficient_data() {
        let candles: Vec<Candle> = (0..5).map(|i| candle(Decimal::from(100 + i), Decimal::from(101 + i), Decimal::from(99 + i), Decimal::from(100 + i))).collect();
        assert!(analyze(&candles).is_insufficient());
    }
}

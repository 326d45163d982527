use rust_decimal::Decimal;

use crate::domain::market::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotLevels {
    pub pivot: Decimal,
    pub r1: Decimal,
    pub r2: Decimal,
    pub r3: Decimal,
    pub s1: Decimal,
    pub s2: Decimal,
    pub s3: Decimal,
}

/// Classic floor-trader pivots computed from one sealed candle of the
/// next-larger timeframe.
pub fn classic_pivots(prior: &Candle) -> PivotLevels {
    let pivot = (prior.high + prior.low + prior.close) / Decimal::from(3);
    let range = prior.high - prior.low;
    PivotLevels {
        pivot,
        r1: pivot * Decimal::TWO - prior.low,
        r2: pivot + range,
        r3: prior.high + Decimal::TWO * (pivot - prior.low),
        s1: pivot * Decimal::TWO - prior.high,
        s2: pivot - range,
        s3: prior.low - Decimal::TWO * (prior.high - pivot),
    }
}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::market::timeframe::Timeframe;

/// OHLC bar for one `(interval, ts_open)` bucket.
///
/// Mutated only by the aggregator while open (`ts_open <= now < ts_open +
/// interval`); sealed at the boundary and never rewritten afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub interval: Timeframe,
    pub ts_open: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub tick_count: u32,
    pub sealed: bool,
}

impl Candle {
    pub fn open_from_price(interval: Timeframe, ts_open: i64, price: Decimal) -> Self {
        Self {
            interval,
            ts_open,
            open: price,
            high: price,
            low: price,
            close: price,
            tick_count: 1,
            sealed: false,
        }
    }

    /// Synthesizes an empty gap candle carrying the previous close forward.
    pub fn synthesize_gap(interval: Timeframe, ts_open: i64, last_close: Decimal) -> Self {
        Self {
            interval,
            ts_open,
            open: last_close,
            high: last_close,
            low: last_close,
            close: last_close,
            tick_count: 0,
            sealed: false,
        }
    }

    pub fn fold(&mut self, price: Decimal) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
        self.tick_count += 1;
    }

    pub fn ts_close(&self) -> i64 {
        self.ts_open + self.interval.to_seconds() * 1000
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fold_tracks_high_low_close_and_count() {
        let mut c = Candle::open_from_price(Timeframe::FifteenMin, 0, dec!(2000.00));
        c.fold(dec!(2005.00));
        c.fold(dec!(1998.00));
        c.fold(dec!(2002.00));

        assert_eq!(c.open, dec!(2000.00));
        assert_eq!(c.high, dec!(2005.00));
        assert_eq!(c.low, dec!(1998.00));
        assert_eq!(c.close, dec!(2002.00));
        assert_eq!(c.tick_count, 4);
    }

    #[test]
    fn gap_candle_carries_last_close_with_zero_ticks() {
        let c = Candle::synthesize_gap(Timeframe::FifteenMin, 900_000, dec!(100.0));
        assert_eq!(c.open, dec!(100.0));
        assert_eq!(c.high, dec!(100.0));
        assert_eq!(c.low, dec!(100.0));
        assert_eq!(c.close, dec!(100.0));
        assert_eq!(c.tick_count, 0);
    }
}

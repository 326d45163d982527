use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::EngineError;

/// Candle aggregation interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    FifteenMin,
    OneHour,
    FourHour,
    OneDay,
}

impl Timeframe {
    pub fn to_minutes(&self) -> i64 {
        match self {
            Timeframe::FifteenMin => 15,
            Timeframe::OneHour => 60,
            Timeframe::FourHour => 240,
            Timeframe::OneDay => 1440,
        }
    }

    pub fn to_seconds(&self) -> i64 {
        self.to_minutes() * 60
    }

    pub fn all() -> [Timeframe; 4] {
        [
            Timeframe::FifteenMin,
            Timeframe::OneHour,
            Timeframe::FourHour,
            Timeframe::OneDay,
        ]
    }

    /// Candle history window the scheduler loads per run.
    pub fn scheduler_window(&self) -> usize {
        match self {
            Timeframe::FifteenMin | Timeframe::OneHour | Timeframe::FourHour => 200,
            Timeframe::OneDay => 100,
        }
    }

    /// Default confidence threshold gate below which a signal is dropped.
    pub fn default_confidence_threshold(&self) -> rust_decimal::Decimal {
        use rust_decimal_macros::dec;
        match self {
            Timeframe::FifteenMin => dec!(0.35),
            Timeframe::OneHour => dec!(0.40),
            Timeframe::FourHour => dec!(0.45),
            Timeframe::OneDay => dec!(0.50),
        }
    }

    /// Maximum hold duration used by the time-based exit strategy.
    pub fn max_hold_seconds(&self) -> i64 {
        match self {
            Timeframe::FifteenMin => 4 * 3600,
            Timeframe::OneHour => 24 * 3600,
            Timeframe::FourHour => 3 * 24 * 3600,
            Timeframe::OneDay => 7 * 24 * 3600,
        }
    }

    /// Rounds `ts` (unix millis) down to the start of the bucket it falls in.
    pub fn floor(&self, ts_ms: i64) -> i64 {
        let period_ms = self.to_seconds() * 1000;
        ts_ms - ts_ms.rem_euclid(period_ms)
    }
}

impl FromStr for Timeframe {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "15m" | "15min" | "fifteenmin" => Ok(Timeframe::FifteenMin),
            "1h" | "1hour" | "onehour" => Ok(Timeframe::OneHour),
            "4h" | "4hour" | "fourhour" => Ok(Timeframe::FourHour),
            "1d" | "1day" | "oneday" => Ok(Timeframe::OneDay),
            _ => Err(EngineError::ValidationError {
                field: "timeframe".to_string(),
                reason: format!("invalid timeframe '{s}', expected one of 15m, 1h, 4h, 1d"),
            }),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Timeframe::FifteenMin => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHour => "4h",
            Timeframe::OneDay => "1d",
        };
        write!(f, "{s}")
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::errors::EngineError;

/// The three price series the engine aggregates candles for: gram gold in
/// TRY (the tradable instrument), ounce/USD (global trend context), and
/// USD/TRY (currency-risk context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instrument {
    GramGold,
    OunceUsd,
    UsdTry,
}

impl Instrument {
    pub fn all() -> [Instrument; 3] {
        [Instrument::GramGold, Instrument::OunceUsd, Instrument::UsdTry]
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Instrument::GramGold => "gram_gold",
            Instrument::OunceUsd => "ounce_usd",
            Instrument::UsdTry => "usd_try",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Instrument {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gram_gold" => Ok(Instrument::GramGold),
            "ounce_usd" => Ok(Instrument::OunceUsd),
            "usd_try" => Ok(Instrument::UsdTry),
            _ => Err(EngineError::ValidationError {
                field: "instrument".to_string(),
                reason: format!("invalid instrument '{s}'"),
            }),
        }
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::errors::EngineError;
use crate::domain::market::candle::Candle;

/// A single pushed price tick.
///
/// Created by the ingestion port; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceQuote {
    pub ts: DateTime<Utc>,
    pub gram_gold: Decimal,
    pub ounce_usd: Decimal,
    pub usd_try: Decimal,
    pub ounce_try: Decimal,
}

impl PriceQuote {
    /// Builds a quote, computing `ounce_try` when the caller did not supply
    /// one.
    pub fn new(
        ts: DateTime<Utc>,
        gram_gold: Decimal,
        ounce_usd: Decimal,
        usd_try: Decimal,
        ounce_try: Option<Decimal>,
    ) -> Self {
        Self {
            ts,
            gram_gold,
            ounce_usd,
            usd_try,
            ounce_try: ounce_try.unwrap_or(ounce_usd * usd_try),
        }
    }

    /// Validates that every field is positive and finite. `Decimal` has no
    /// NaN/Inf representation, so "finite" reduces to a positivity check.
    pub fn validate(&self) -> Result<(), EngineError> {
        let fields: [(&str, Decimal); 4] = [
            ("gram_gold", self.gram_gold),
            ("ounce_usd", self.ounce_usd),
            ("usd_try", self.usd_try),
            ("ounce_try", self.ounce_try),
        ];
        for (name, value) in fields {
            if value <= Decimal::ZERO {
                return Err(EngineError::ValidationError {
                    field: name.to_string(),
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Snapshot of the series a hybrid-strategy run needs at once: the gram
/// price candles plus the two context series (ounce/USD for global trend,
/// USD/TRY for currency risk).
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub latest: PriceQuote,
    pub gram_candles: Vec<Candle>,
    pub ounce_usd_candles: Vec<Candle>,
    pub usd_try_candles: Vec<Candle>,
}

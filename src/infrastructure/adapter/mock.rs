use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::errors::EngineError;
use crate::domain::market::quote::PriceQuote;
use crate::domain::ports::QuoteAdapter;

/// Deterministic synthetic quote generator. Walks gram-gold, ounce/USD and
/// USD/TRY independently with small bounded steps so tests and the
/// `--mode mock` CLI path get a repeatable, self-consistent tick stream
/// without a network dependency.
pub struct MockAdapter {
    rng: StdRng,
    gram_gold: Decimal,
    ounce_usd: Decimal,
    usd_try: Decimal,
    remaining: Option<u64>,
}

impl MockAdapter {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            gram_gold: dec!(2450.00),
            ounce_usd: dec!(2380.00),
            usd_try: dec!(32.80),
            remaining: None,
        }
    }

    /// Same deterministic walk, but exhausts after `count` quotes instead of
    /// running forever. Used by finite-length integration tests.
    pub fn bounded(seed: u64, count: u64) -> Self {
        let mut adapter = Self::new(seed);
        adapter.remaining = Some(count);
        adapter
    }

    fn step(&mut self, value: Decimal, max_step_pct: Decimal) -> Decimal {
        let pct: f64 = self.rng.random_range(-1.0..=1.0);
        let step = value * max_step_pct * Decimal::try_from(pct).unwrap_or(Decimal::ZERO);
        let next = value + step;
        if next <= Decimal::ZERO {
            value
        } else {
            next
        }
    }
}

#[async_trait]
impl QuoteAdapter for MockAdapter {
    async fn next_quote(&mut self) -> Result<Option<PriceQuote>, EngineError> {
        if let Some(remaining) = self.remaining {
            if remaining == 0 {
                return Ok(None);
            }
            self.remaining = Some(remaining - 1);
        }

        self.gram_gold = self.step(self.gram_gold, dec!(0.0015));
        self.ounce_usd = self.step(self.ounce_usd, dec!(0.0015));
        self.usd_try = self.step(self.usd_try, dec!(0.0008));

        Ok(Some(PriceQuote::new(
            chrono::Utc::now(),
            self.gram_gold,
            self.ounce_usd,
            self.usd_try,
            None,
        )))
    }
}

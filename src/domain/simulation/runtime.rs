use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::domain::errors::CapitalMismatch;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::simulation::config::{SimulationConfig, SimulationStatus};

/// Live per-timeframe capital ledger for one simulation. `SimulationConfig`
/// is immutable once created; this is the mutable half the engine drives.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub config: SimulationConfig,
    pub status: SimulationStatus,
    pub tf_capital: HashMap<Timeframe, Decimal>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Self {
        let tf_capital = config.initial_per_tf_capital();
        Self {
            config,
            status: SimulationStatus::Active,
            tf_capital,
        }
    }

    pub fn capital_for(&self, tf: Timeframe) -> Decimal {
        self.tf_capital.get(&tf).copied().unwrap_or(Decimal::ZERO)
    }

    /// Debits `amount` grams from `tf`'s ledger. Fails if the ledger does
    /// not hold enough to cover it; callers must size positions against
    /// `capital_for` first so this should never trip in practice.
    pub fn debit(&mut self, tf: Timeframe, amount: Decimal) -> Result<(), CapitalMismatch> {
        let current = self.capital_for(tf);
        if amount > current {
            return Err(CapitalMismatch {
                sim_id: self.config.id.to_string(),
                ledger: current,
                expected: amount,
            });
        }
        self.tf_capital.insert(tf, current - amount);
        Ok(())
    }

    pub fn credit(&mut self, tf: Timeframe, amount: Decimal) {
        let current = self.capital_for(tf);
        self.tf_capital.insert(tf, current + amount);
    }

    /// Total capital across every tracked timeframe, used for the capital
    /// invariant check against the sum of realized P&L since inception.
    pub fn total_capital(&self) -> Decimal {
        self.tf_capital.values().copied().sum()
    }

    pub fn is_active(&self) -> bool {
        self.status == SimulationStatus::Active
    }
}

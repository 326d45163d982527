use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Spread and commission parameters for one simulation. Spread is quoted
/// as a flat TL amount per unit (half charged on each side of a trade);
/// commission is a percentage of notional, charged on entry and exit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostConfig {
    pub spread_tl: Decimal,
    pub commission_pct: Decimal,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            spread_tl: Decimal::new(5, 1),
            commission_pct: Decimal::new(5, 4),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeCost {
    pub spread_cost: Decimal,
    pub commission_cost: Decimal,
}

impl TradeCost {
    pub fn total(&self) -> Decimal {
        self.spread_cost + self.commission_cost
    }
}

pub struct SimulationCostModel {
    config: CostConfig,
}

impl SimulationCostModel {
    pub fn new(config: CostConfig) -> Self {
        Self { config }
    }

    fn leg_cost(&self, notional: Decimal) -> TradeCost {
        TradeCost {
            spread_cost: self.config.spread_tl / Decimal::TWO,
            commission_cost: notional * self.config.commission_pct,
        }
    }

    pub fn entry_cost(&self, price: Decimal, size_grams: Decimal) -> TradeCost {
        self.leg_cost(price * size_grams)
    }

    pub fn exit_cost(&self, price: Decimal, size_grams: Decimal) -> TradeCost {
        self.leg_cost(price * size_grams)
    }

    /// Minimum round-trip cost a signal's expected move must clear before
    /// the position is worth opening at all.
    pub fn round_trip_floor(&self, entry_price: Decimal, exit_price: Decimal, size_grams: Decimal) -> Decimal {
        self.entry_cost(entry_price, size_grams).total() + self.exit_cost(exit_price, size_grams).total()
    }

    pub fn half_spread(&self) -> Decimal {
        self.config.spread_tl / Decimal::TWO
    }
}

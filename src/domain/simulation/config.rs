use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::market::timeframe::Timeframe;
use crate::domain::trading::CostConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyType {
    Main,
    Conservative,
    Momentum,
    MeanReversion,
    Consensus,
    RiskAdjusted,
    TimeBased,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationStatus {
    Active,
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub min_confidence: Decimal,
    pub max_risk_pct: Decimal,
    pub max_daily_loss_pct: Decimal,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            min_confidence: dec!(0.40),
            max_risk_pct: dec!(0.02),
            max_daily_loss_pct: dec!(0.05),
        }
    }
}

/// Immutable configuration for one paper-trading simulation. Mutable state
/// (per-TF capital, open positions) is tracked separately so a running
/// simulation can be reasoned about without re-reading its config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub id: Uuid,
    pub name: String,
    pub strategy_type: StrategyType,
    pub initial_capital_grams: Decimal,
    pub tracked_timeframes: Vec<Timeframe>,
    pub costs: CostConfig,
    pub thresholds: RiskThresholds,
}

impl SimulationConfig {
    pub fn new(name: impl Into<String>, strategy_type: StrategyType, tracked_timeframes: Vec<Timeframe>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            strategy_type,
            initial_capital_grams: dec!(1000),
            tracked_timeframes,
            costs: CostConfig::default(),
            thresholds: RiskThresholds::default(),
        }
    }

    /// Capital allocated to each tracked timeframe at simulation start, split
    /// evenly across the tracked set.
    pub fn initial_per_tf_capital(&self) -> HashMap<Timeframe, Decimal> {
        let share = self.initial_capital_grams / Decimal::from(self.tracked_timeframes.len().max(1));
        self.tracked_timeframes.iter().map(|tf| (*tf, share)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_capital_splits_evenly_across_timeframes() {
        let cfg = SimulationConfig::new(
            "main",
            StrategyType::Main,
            vec![Timeframe::FifteenMin, Timeframe::OneHour],
        );
        let per_tf = cfg.initial_per_tf_capital();
        assert_eq!(per_tf[&Timeframe::FifteenMin], dec!(500));
        assert_eq!(per_tf[&Timeframe::OneHour], dec!(500));
    }
}

pub mod cost_model;

pub use cost_model::{CostConfig, SimulationCostModel, TradeCost};

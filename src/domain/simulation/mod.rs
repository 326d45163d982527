pub mod config;
pub mod daily_performance;
pub mod position;
pub mod runtime;

pub use config::{RiskThresholds, SimulationConfig, SimulationStatus, StrategyType};
pub use daily_performance::DailyPerformance;
pub use position::{ExitReason, Position, PositionSide, PositionStatus};
pub use runtime::Simulation;

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::FixedOffset;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::market::timeframe::Timeframe;
use crate::domain::simulation::SimulationConfig;
use crate::domain::trading::CostConfig;

/// `Europe/Istanbul` carries no DST since 2016, so a fixed UTC+3 offset is
/// exact rather than an approximation.
fn istanbul_offset() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).expect("UTC+3 is a valid fixed offset")
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TradingWindow {
    pub start_hour: u32,
    pub start_minute: u32,
    pub end_hour: u32,
    pub end_minute: u32,
    #[serde(default = "istanbul_offset")]
    pub zone: FixedOffset,
}

impl Default for TradingWindow {
    fn default() -> Self {
        Self {
            start_hour: 9,
            start_minute: 0,
            end_hour: 17,
            end_minute: 0,
            zone: istanbul_offset(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationLimits {
    pub max_position_pct: Decimal,
    pub max_daily_loss_pct: Decimal,
    pub max_risk_per_trade_pct: Decimal,
    pub costs: CostConfig,
}

impl Default for SimulationLimits {
    fn default() -> Self {
        Self {
            max_position_pct: dec!(0.20),
            max_daily_loss_pct: dec!(0.02),
            max_risk_per_trade_pct: dec!(0.02),
            costs: CostConfig::default(),
        }
    }
}

/// Process-wide configuration aggregate, assembled from environment
/// variables (via `dotenvy`) with an optional TOML overlay for the
/// simulation grid. Every field has a documented default so a bare `.env`
/// boots the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub collection_interval_s: u64,
    pub min_confidence_thresholds: HashMap<Timeframe, Decimal>,
    pub gram_override_confidence: Decimal,
    pub min_volatility_pct: Decimal,
    pub module_weights: ModuleWeights,
    pub simulation: SimulationLimits,
    pub trading_window: TradingWindow,
    pub retention_days_raw: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModuleWeights {
    pub gram: Decimal,
    pub global: Decimal,
    pub currency: Decimal,
    pub confirmations: Decimal,
}

impl Default for ModuleWeights {
    fn default() -> Self {
        Self {
            gram: dec!(0.50),
            global: dec!(0.15),
            currency: dec!(0.10),
            confirmations: dec!(0.25),
        }
    }
}

fn default_confidence_thresholds() -> HashMap<Timeframe, Decimal> {
    Timeframe::all()
        .into_iter()
        .map(|tf| (tf, tf.default_confidence_threshold()))
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://altinrade.db".to_string());

        let collection_interval_s = env::var("COLLECTION_INTERVAL_S")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u64>()
            .context("failed to parse COLLECTION_INTERVAL_S")?;

        let gram_override_confidence = env::var("GRAM_OVERRIDE_CONFIDENCE")
            .ok()
            .map(|v| Decimal::from_str(&v))
            .transpose()
            .context("failed to parse GRAM_OVERRIDE_CONFIDENCE")?
            .unwrap_or(dec!(0.50));

        let min_volatility_pct = env::var("MIN_VOLATILITY_PCT")
            .ok()
            .map(|v| Decimal::from_str(&v))
            .transpose()
            .context("failed to parse MIN_VOLATILITY_PCT")?
            .unwrap_or(dec!(0.005));

        let retention_days_raw = env::var("RETENTION_DAYS_RAW")
            .unwrap_or_else(|_| "7".to_string())
            .parse::<i64>()
            .context("failed to parse RETENTION_DAYS_RAW")?;

        Ok(Self {
            database_url,
            collection_interval_s,
            min_confidence_thresholds: default_confidence_thresholds(),
            gram_override_confidence,
            min_volatility_pct,
            module_weights: ModuleWeights::default(),
            simulation: SimulationLimits::default(),
            trading_window: TradingWindow::default(),
            retention_days_raw,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SimulationGridFile {
    #[serde(rename = "simulation")]
    simulations: Vec<SimulationConfig>,
}

/// Loads a simulation grid overlay from a TOML file, replacing the default
/// seeded grid. Expects a top-level array of tables: `[[simulation]]`.
pub fn load_simulation_grid_overlay(path: &Path) -> Result<Vec<SimulationConfig>> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("failed to read simulation grid file {}", path.display()))?;
    let file: SimulationGridFile = toml::from_str(&contents).context("failed to parse simulation grid TOML")?;
    Ok(file.simulations)
}

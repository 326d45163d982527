use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::market::regime::{MomentumRegime, TrendRegime, VolatilityRegime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergenceDirection {
    Bullish,
    Bearish,
}

/// RSI/price divergence between a swing pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DivergenceAnalysis {
    pub direction: DivergenceDirection,
    pub hidden: bool,
    /// 1..=5
    pub strength: u8,
    pub confidence: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureState {
    Uptrend,
    Downtrend,
    Ranging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StructureBreakType {
    BullishBreakOfStructure,
    BearishBreakOfStructure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullbackZone {
    pub low: Decimal,
    pub high: Decimal,
    pub active: bool,
}

/// Market-structure read: prevailing state plus any break of structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureAnalysis {
    pub current: StructureState,
    pub has_break: bool,
    pub break_type: Option<StructureBreakType>,
    pub pullback_zone: Option<PullbackZone>,
    pub key_levels: Vec<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub price: Decimal,
    pub touches: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopHunt {
    pub level: Decimal,
    pub reverted_within_bars: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBlock {
    pub low: Decimal,
    pub high: Decimal,
    pub bullish: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairValueGap {
    pub low: Decimal,
    pub high: Decimal,
    pub bullish: bool,
}

/// Smart-money-concepts read: liquidity pools, order blocks, fair-value
/// gaps and stop hunts.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmcAnalysis {
    pub liquidity_pools: Vec<LiquidityPool>,
    pub stop_hunt: Option<StopHunt>,
    pub order_blocks: Vec<OrderBlock>,
    pub fvgs: Vec<FairValueGap>,
    pub entry_zones: Vec<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FibonacciLevel {
    pub ratio: Decimal,
    pub price: Decimal,
}

/// Fibonacci retracement/extension levels over the active swing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FibonacciAnalysis {
    pub levels: Vec<FibonacciLevel>,
    pub active_bounce: Option<Decimal>,
    pub target_level: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub name: String,
    pub confidence: Decimal,
    pub target: Option<Decimal>,
}

/// Named chart/candlestick patterns detected in the recent window.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PatternsAnalysis {
    pub detected: Vec<DetectedPattern>,
}

/// Tagged sum of every sub-analyzer's result. `InsufficientData` stands in
/// for a missing or stale analyzer result instead of a panic or exception.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SubAnalysis {
    TrendRegime(TrendRegime),
    VolatilityRegime(VolatilityRegime),
    MomentumRegime(MomentumRegime),
    Divergence(DivergenceAnalysis),
    Structure(StructureAnalysis),
    Smc(SmcAnalysis),
    Fibonacci(FibonacciAnalysis),
    Patterns(PatternsAnalysis),
    InsufficientData { analyzer: String, reason: String },
}

impl SubAnalysis {
    pub fn insufficient(analyzer: impl Into<String>, reason: impl Into<String>) -> Self {
        SubAnalysis::InsufficientData {
            analyzer: analyzer.into(),
            reason: reason.into(),
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, SubAnalysis::InsufficientData { .. })
    }

    /// Confidence contributed toward the signal combiner's confluence
    /// weighting; `InsufficientData` contributes none.
    pub fn confidence(&self) -> Decimal {
        match self {
            SubAnalysis::Divergence(d) => d.confidence,
            SubAnalysis::Patterns(p) => p
                .detected
                .iter()
                .map(|d| d.confidence)
                .fold(Decimal::ZERO, Decimal::max),
            SubAnalysis::Smc(s) => {
                if !s.entry_zones.is_empty() || s.stop_hunt.is_some() {
                    Decimal::new(6, 1)
                } else {
                    Decimal::ZERO
                }
            }
            SubAnalysis::Fibonacci(f) => {
                if f.active_bounce.is_some() {
                    Decimal::new(6, 1)
                } else {
                    Decimal::new(3, 1)
                }
            }
            SubAnalysis::Structure(s) => {
                if s.has_break {
                    Decimal::new(7, 1)
                } else {
                    Decimal::new(4, 1)
                }
            }
            SubAnalysis::TrendRegime(t) => t.strength,
            SubAnalysis::VolatilityRegime(_) => Decimal::new(5, 1),
            SubAnalysis::MomentumRegime(m) => {
                if m.alignment {
                    Decimal::new(6, 1)
                } else {
                    Decimal::new(3, 1)
                }
            }
            SubAnalysis::InsufficientData { .. } => Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_has_zero_confidence() {
        let sa = SubAnalysis::insufficient("divergence", "no swings");
        assert!(sa.is_insufficient());
        assert_eq!(sa.confidence(), Decimal::ZERO);
    }
}

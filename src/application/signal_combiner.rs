use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::ModuleWeights;
use crate::domain::analysis::record::{AnalysisRecord, CurrencyRiskLevel, SignalDirection, SignalRecord, SignalStrength};
use crate::domain::analysis::sub_analysis::{StructureState, SubAnalysis};
use crate::domain::market::regime::{Direction, TrendRegimeType, VolatilityLevel};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::trading::CostConfig;

#[derive(Debug, Clone, Copy)]
pub struct GramSubSignal {
    pub direction: SignalDirection,
    pub score: Decimal,
    pub confidence: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct GlobalSubSignal {
    pub direction: SignalDirection,
    pub strength: Decimal,
    pub momentum: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct CurrencySubSignal {
    pub risk_level: CurrencyRiskLevel,
    pub position_size_multiplier: Decimal,
}

pub struct CombinerInputs {
    pub timeframe: Timeframe,
    pub ts: DateTime<Utc>,
    pub close: Decimal,
    pub gram: GramSubSignal,
    pub global: GlobalSubSignal,
    pub currency: CurrencySubSignal,
    pub sub_analyses: Vec<SubAnalysis>,
}

#[derive(Debug, Clone)]
pub struct Thresholds {
    pub confidence_by_tf: std::collections::HashMap<Timeframe, Decimal>,
    pub gram_override_confidence: Decimal,
    pub min_volatility_pct: Decimal,
    pub weights: ModuleWeights,
    pub costs: CostConfig,
}

fn confirmation_direction(sub: &SubAnalysis) -> (SignalDirection, Decimal) {
    match sub {
        SubAnalysis::Divergence(d) => {
            let dir = match d.direction {
                crate::domain::analysis::sub_analysis::DivergenceDirection::Bullish => SignalDirection::Buy,
                crate::domain::analysis::sub_analysis::DivergenceDirection::Bearish => SignalDirection::Sell,
            };
            (dir, d.confidence)
        }
        SubAnalysis::Structure(s) => {
            let dir = match s.current {
                StructureState::Uptrend => SignalDirection::Buy,
                StructureState::Downtrend => SignalDirection::Sell,
                StructureState::Ranging => SignalDirection::Hold,
            };
            (dir, sub.confidence())
        }
        SubAnalysis::Smc(s) => {
            let dir = if !s.entry_zones.is_empty() { SignalDirection::Buy } else { SignalDirection::Hold };
            (dir, sub.confidence())
        }
        SubAnalysis::TrendRegime(t) => {
            let dir = match (t.regime_type, t.direction) {
                (TrendRegimeType::Trending, Direction::Up) => SignalDirection::Buy,
                (TrendRegimeType::Trending, Direction::Down) => SignalDirection::Sell,
                _ => SignalDirection::Hold,
            };
            (dir, t.strength)
        }
        SubAnalysis::Fibonacci(f) => {
            let dir = if f.active_bounce.is_some() { SignalDirection::Buy } else { SignalDirection::Hold };
            (dir, sub.confidence())
        }
        SubAnalysis::Patterns(_) => {
            let dir = SignalDirection::Hold;
            (dir, sub.confidence())
        }
        SubAnalysis::VolatilityRegime(_) | SubAnalysis::MomentumRegime(_) | SubAnalysis::InsufficientData { .. } => {
            (SignalDirection::Hold, Decimal::ZERO)
        }
    }
}

fn signed_vote(direction: SignalDirection) -> Decimal {
    match direction {
        SignalDirection::Buy => Decimal::ONE,
        SignalDirection::Sell => -Decimal::ONE,
        SignalDirection::Hold => Decimal::ZERO,
    }
}

fn volatility_regime(sub_analyses: &[SubAnalysis]) -> Option<&crate::domain::market::regime::VolatilityRegime> {
    sub_analyses.iter().find_map(|s| match s {
        SubAnalysis::VolatilityRegime(v) => Some(v),
        _ => None,
    })
}

/// Fuses the gram/global/currency sub-signals and every confirmation
/// sub-analysis into one final direction, confidence, and risk parameters.
/// Returns the fused `AnalysisRecord` and, when the verdict is actionable,
/// its `SignalRecord` projection.
pub fn combine(inputs: CombinerInputs, thresholds: &Thresholds) -> (AnalysisRecord, Option<SignalRecord>) {
    let w = thresholds.weights;
    let mut hold_reasons: Vec<String> = Vec::new();
    let confirmations: Vec<(SignalDirection, Decimal)> =
        inputs.sub_analyses.iter().map(confirmation_direction).collect();
    let confirmation_weight = if confirmations.is_empty() {
        Decimal::ZERO
    } else {
        w.confirmations / Decimal::from(confirmations.len())
    };

    let mut weighted_sum = signed_vote(inputs.gram.direction) * w.gram * inputs.gram.confidence
        + signed_vote(inputs.global.direction) * w.global * inputs.global.strength;
    let mut confidence_sum =
        w.gram * inputs.gram.confidence + w.global * inputs.global.strength;

    for (dir, conf) in &confirmations {
        weighted_sum += signed_vote(*dir) * confirmation_weight * conf;
        confidence_sum += confirmation_weight * conf;
    }

    let mut agreeing_count = 0usize;
    let mut final_direction = if weighted_sum > dec!(0.05) {
        SignalDirection::Buy
    } else if weighted_sum < -dec!(0.05) {
        SignalDirection::Sell
    } else {
        SignalDirection::Hold
    };

    let mut confidence = if confidence_sum > Decimal::ZERO {
        (weighted_sum.abs() / confidence_sum).min(Decimal::ONE)
    } else {
        Decimal::ZERO
    };

    let overridden = inputs.gram.direction != SignalDirection::Hold && inputs.gram.confidence >= thresholds.gram_override_confidence;
    if overridden {
        final_direction = inputs.gram.direction;
        confidence = inputs.gram.confidence;
    } else {
        if final_direction != SignalDirection::Hold && final_direction != inputs.global.direction && inputs.global.direction != SignalDirection::Hold {
            confidence *= dec!(0.7);
        }
        if inputs.currency.risk_level == CurrencyRiskLevel::Extreme && final_direction != SignalDirection::Hold {
            confidence *= dec!(0.7);
        }
    }

    for (dir, _) in &confirmations {
        if *dir == final_direction && final_direction != SignalDirection::Hold {
            agreeing_count += 1;
        }
    }

    let threshold = thresholds
        .confidence_by_tf
        .get(&inputs.timeframe)
        .copied()
        .unwrap_or_else(|| inputs.timeframe.default_confidence_threshold());
    if confidence < threshold {
        final_direction = SignalDirection::Hold;
        hold_reasons.push("low_confidence".to_string());
    }

    let atr_pct = volatility_regime(&inputs.sub_analyses).map(|v| v.atr_pct).unwrap_or(Decimal::ZERO);
    if atr_pct < thresholds.min_volatility_pct * dec!(100) {
        final_direction = SignalDirection::Hold;
        hold_reasons.push("low_volatility".to_string());
    }

    let atr = volatility_regime(&inputs.sub_analyses).map(|v| v.atr).unwrap_or(inputs.close * dec!(0.01));
    let (sl_mult, tp_mult) = match volatility_regime(&inputs.sub_analyses).map(|v| v.level) {
        Some(VolatilityLevel::VeryLow) | Some(VolatilityLevel::Low) => (dec!(3.0), dec!(4.5)),
        Some(VolatilityLevel::Medium) => (dec!(2.0), dec!(3.0)),
        Some(VolatilityLevel::High) => (dec!(1.5), dec!(2.0)),
        Some(VolatilityLevel::Extreme) | None => (dec!(1.2), dec!(1.5)),
    };

    let (stop_loss, take_profit) = match final_direction {
        SignalDirection::Buy => (Some(inputs.close - atr * sl_mult), Some(inputs.close + atr * tp_mult)),
        SignalDirection::Sell => (Some(inputs.close + atr * sl_mult), Some(inputs.close - atr * tp_mult)),
        SignalDirection::Hold => (None, None),
    };

    if let (Some(tp), SignalDirection::Buy | SignalDirection::Sell) = (take_profit, final_direction) {
        let expected_move = (tp - inputs.close).abs();
        let min_move = thresholds.costs.spread_tl * Decimal::TWO + inputs.close * thresholds.costs.commission_pct * Decimal::TWO;
        if expected_move < min_move {
            final_direction = SignalDirection::Hold;
            hold_reasons.push("insufficient_reward".to_string());
        }
    }

    let (stop_loss, take_profit) = if final_direction == SignalDirection::Hold {
        (None, None)
    } else {
        (stop_loss, take_profit)
    };

    let signal_strength = if confidence >= dec!(0.7) && agreeing_count >= 3 {
        SignalStrength::Strong
    } else if confidence >= dec!(0.55) {
        SignalStrength::Moderate
    } else {
        SignalStrength::Weak
    };

    let risk_reward = match (stop_loss, take_profit) {
        (Some(sl), Some(tp)) if (inputs.close - sl).abs() > Decimal::ZERO => {
            (tp - inputs.close).abs() / (inputs.close - sl).abs()
        }
        _ => Decimal::ZERO,
    };

    let half_kelly = (confidence - (Decimal::ONE - confidence)) / Decimal::TWO;
    let position_size_pct = half_kelly
        .max(Decimal::ZERO)
        .min(dec!(0.20))
        * inputs.currency.position_size_multiplier.min(Decimal::ONE);

    let contributing: Vec<String> = confirmations
        .iter()
        .zip(inputs.sub_analyses.iter())
        .filter(|((dir, _), _)| *dir == final_direction && final_direction != SignalDirection::Hold)
        .map(|(_, sub)| analyzer_name(sub))
        .collect();

    let global_trend = match inputs.global.direction {
        SignalDirection::Buy => Direction::Up,
        SignalDirection::Sell => Direction::Down,
        SignalDirection::Hold => Direction::Flat,
    };

    let summary = if final_direction == SignalDirection::Hold {
        if hold_reasons.is_empty() {
            "hold: no confluence across confirmations".to_string()
        } else {
            format!("hold: {}", hold_reasons.join(", "))
        }
    } else {
        format!(
            "{:?} signal at {:.2} confidence backed by {}",
            final_direction,
            confidence,
            if contributing.is_empty() { "no confirmations".to_string() } else { contributing.join(", ") }
        )
    };

    let recommendations: Vec<String> = if final_direction == SignalDirection::Hold {
        vec!["wait_for_next_bar".to_string()]
    } else {
        contributing.iter().map(|name| format!("confirmed_by_{name}")).collect()
    };

    let analysis = AnalysisRecord::new(
        inputs.timeframe,
        inputs.ts,
        inputs.close,
        final_direction,
        confidence,
        signal_strength,
        position_size_pct,
        stop_loss,
        take_profit,
        risk_reward,
        global_trend,
        inputs.currency.risk_level,
        inputs.sub_analyses,
        summary,
        recommendations,
    );

    let signal = analysis.to_signal(contributing);

    (analysis, signal)
}

fn analyzer_name(sub: &SubAnalysis) -> String {
    match sub {
        SubAnalysis::TrendRegime(_) => "trend_regime".to_string(),
        SubAnalysis::VolatilityRegime(_) => "volatility_regime".to_string(),
        SubAnalysis::MomentumRegime(_) => "momentum_regime".to_string(),
        SubAnalysis::Divergence(_) => "divergence".to_string(),
        SubAnalysis::Structure(_) => "structure".to_string(),
        SubAnalysis::Smc(_) => "smc".to_string(),
        SubAnalysis::Fibonacci(_) => "fibonacci".to_string(),
        SubAnalysis::Patterns(_) => "patterns".to_string(),
        SubAnalysis::InsufficientData { analyzer, .. } => analyzer.clone(),
    }
}

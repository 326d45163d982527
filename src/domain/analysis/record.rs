use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::analysis::sub_analysis::SubAnalysis;
use crate::domain::market::regime::Direction;
use crate::domain::market::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalDirection {
    Buy,
    Sell,
    Hold,
}

/// Bucketed USD/TRY volatility read, carried on the record so a reviewer
/// can see why position sizing was damped without re-running the currency
/// sub-analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurrencyRiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

/// Confluence bucket derived from confidence and the number of agreeing
/// confirmations; drives `StrategyType::Conservative`/`TimeBased` entry
/// gates without re-deriving it from the raw signal fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalStrength {
    Strong,
    Moderate,
    Weak,
}

/// One fused analysis pass over one timeframe at one point in time: the
/// combiner's verdict (signal, confidence, sizing, risk parameters) plus
/// the full set of sub-analyses it was derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub timeframe: Timeframe,
    pub ts: DateTime<Utc>,
    pub close: Decimal,
    pub signal: SignalDirection,
    pub confidence: Decimal,
    pub signal_strength: SignalStrength,
    pub position_size_pct: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub risk_reward: Decimal,
    pub global_trend: Direction,
    pub currency_risk: CurrencyRiskLevel,
    pub sub_analyses: Vec<SubAnalysis>,
    pub summary: String,
    pub recommendations: Vec<String>,
}

impl AnalysisRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        timeframe: Timeframe,
        ts: DateTime<Utc>,
        close: Decimal,
        signal: SignalDirection,
        confidence: Decimal,
        signal_strength: SignalStrength,
        position_size_pct: Decimal,
        stop_loss: Option<Decimal>,
        take_profit: Option<Decimal>,
        risk_reward: Decimal,
        global_trend: Direction,
        currency_risk: CurrencyRiskLevel,
        sub_analyses: Vec<SubAnalysis>,
        summary: String,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timeframe,
            ts,
            close,
            signal,
            confidence,
            signal_strength,
            position_size_pct,
            stop_loss,
            take_profit,
            risk_reward,
            global_trend,
            currency_risk,
            sub_analyses,
            summary,
            recommendations,
        }
    }

    pub fn has_usable_data(&self) -> bool {
        self.sub_analyses.iter().any(|s| !s.is_insufficient())
    }

    /// Projects this analysis into a `SignalRecord` for downstream
    /// consumers (scheduler persistence, the simulation engine) — `None`
    /// when the fused verdict is `Hold`, since a `SignalRecord` only exists
    /// for an actionable signal.
    pub fn to_signal(&self, contributing: Vec<String>) -> Option<SignalRecord> {
        if self.signal == SignalDirection::Hold {
            return None;
        }
        Some(SignalRecord {
            id: Uuid::new_v4(),
            timeframe: self.timeframe,
            ts: self.ts,
            direction: self.signal,
            confidence: self.confidence,
            signal_strength: self.signal_strength,
            entry_price: self.close,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            risk_reward: self.risk_reward,
            position_size_pct: self.position_size_pct,
            contributing,
        })
    }
}

/// A filtered, non-`Hold` projection of an `AnalysisRecord`: the trade
/// parameters the simulation engine needs to open a position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRecord {
    pub id: Uuid,
    pub timeframe: Timeframe,
    pub ts: DateTime<Utc>,
    pub direction: SignalDirection,
    pub confidence: Decimal,
    pub signal_strength: SignalStrength,
    pub entry_price: Decimal,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub risk_reward: Decimal,
    pub position_size_pct: Decimal,
    pub contributing: Vec<String>,
}

impl SignalRecord {
    pub fn is_actionable(&self, threshold: Decimal) -> bool {
        self.direction != SignalDirection::Hold && self.confidence >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(direction: SignalDirection, confidence: Decimal) -> SignalRecord {
        SignalRecord {
            id: Uuid::new_v4(),
            timeframe: Timeframe::OneHour,
            ts: Utc::now(),
            direction,
            confidence,
            signal_strength: SignalStrength::Moderate,
            entry_price: dec!(2000),
            stop_loss: None,
            take_profit: None,
            risk_reward: Decimal::ZERO,
            position_size_pct: dec!(0.1),
            contributing: vec![],
        }
    }

    #[test]
    fn hold_is_never_actionable() {
        let r = record(SignalDirection::Hold, dec!(0.9));
        assert!(!r.is_actionable(dec!(0.3)));
    }

    #[test]
    fn below_threshold_is_not_actionable() {
        let r = record(SignalDirection::Buy, dec!(0.2));
        assert!(!r.is_actionable(dec!(0.35)));
    }

    #[test]
    fn above_threshold_buy_is_actionable() {
        let r = record(SignalDirection::Buy, dec!(0.5));
        assert!(r.is_actionable(dec!(0.35)));
    }

    fn analysis(signal: SignalDirection) -> AnalysisRecord {
        AnalysisRecord::new(
            Timeframe::OneHour,
            Utc::now(),
            dec!(2000),
            signal,
            dec!(0.6),
            SignalStrength::Moderate,
            dec!(0.05),
            Some(dec!(1950)),
            Some(dec!(2100)),
            dec!(2.0),
            Direction::Up,
            CurrencyRiskLevel::Medium,
            vec![],
            "buy signal".to_string(),
            vec!["trend_regime".to_string()],
        )
    }

    #[test]
    fn hold_analysis_projects_to_no_signal() {
        assert!(analysis(SignalDirection::Hold).to_signal(vec![]).is_none());
    }

    #[test]
    fn actionable_analysis_projects_its_trade_parameters() {
        let a = analysis(SignalDirection::Buy);
        let s = a.to_signal(vec!["trend_regime".to_string()]).expect("buy projects to a signal");
        assert_eq!(s.direction, SignalDirection::Buy);
        assert_eq!(s.stop_loss, a.stop_loss);
        assert_eq!(s.take_profit, a.take_profit);
        assert_eq!(s.signal_strength, a.signal_strength);
        assert_eq!(s.contributing, vec!["trend_regime".to_string()]);
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::analysis::record::{AnalysisRecord, SignalDirection};
use crate::domain::analysis::sub_analysis::SubAnalysis;
use crate::domain::simulation::daily_performance::DailyPerformance;
use crate::domain::simulation::position::{ExitReason, Position, PositionSide};
use crate::domain::simulation::runtime::Simulation;

/// Everything an exit strategy needs to decide whether to close a position.
/// Built fresh by the engine for each evaluation; never stored.
pub struct ExitContext<'a> {
    pub position: &'a Position,
    pub current_price: Decimal,
    pub now: DateTime<Utc>,
    pub latest_analysis: Option<&'a AnalysisRecord>,
    pub latest_signal_direction: Option<SignalDirection>,
    pub latest_signal_confidence: Option<Decimal>,
    pub daily_performance: &'a DailyPerformance,
    pub sim: &'a Simulation,
    pub entry_atr_pct: Option<Decimal>,
}

pub trait ExitStrategy: Send + Sync {
    fn check(&self, ctx: &ExitContext) -> Option<ExitReason>;
}

/// Priority 1: the position's own stop-loss/take-profit levels.
pub struct StopLossTakeProfit;

impl ExitStrategy for StopLossTakeProfit {
    fn check(&self, ctx: &ExitContext) -> Option<ExitReason> {
        let p = ctx.position;
        match p.side {
            PositionSide::Long => {
                if ctx.current_price <= p.stop_loss {
                    return Some(ExitReason::StopLoss);
                }
                if ctx.current_price >= p.take_profit {
                    return Some(ExitReason::TakeProfit);
                }
            }
            PositionSide::Short => {
                if ctx.current_price >= p.stop_loss {
                    return Some(ExitReason::StopLoss);
                }
                if ctx.current_price <= p.take_profit {
                    return Some(ExitReason::TakeProfit);
                }
            }
        }
        None
    }
}

/// Priority 2: the simulation's daily loss limit has been breached, closing
/// every open position regardless of its own P&L.
pub struct DailyLossLimit;

impl ExitStrategy for DailyLossLimit {
    fn check(&self, ctx: &ExitContext) -> Option<ExitReason> {
        let max = ctx.sim.config.thresholds.max_daily_loss_pct;
        if ctx.daily_performance.has_breached_daily_loss_limit(max) {
            Some(ExitReason::DailyLossLimit)
        } else {
            None
        }
    }
}

/// Priority 3: a fresh signal on the same timeframe, confident enough to
/// act on, now points the other way.
pub struct OppositeSignal;

impl ExitStrategy for OppositeSignal {
    fn check(&self, ctx: &ExitContext) -> Option<ExitReason> {
        let dir = ctx.latest_signal_direction?;
        let conf = ctx.latest_signal_confidence?;
        if conf < ctx.sim.config.thresholds.min_confidence {
            return None;
        }
        let opposite = match ctx.position.side {
            PositionSide::Long => dir == SignalDirection::Sell,
            PositionSide::Short => dir == SignalDirection::Buy,
        };
        opposite.then_some(ExitReason::OppositeSignal)
    }
}

/// Priority 4: once price has moved one stop-distance in the position's
/// favor, `position.trailing_stop` starts trailing 70% of the best
/// excursion seen (ratcheted by the engine before this check runs).
pub struct TrailingStop;

impl ExitStrategy for TrailingStop {
    fn check(&self, ctx: &ExitContext) -> Option<ExitReason> {
        let p = ctx.position;
        let trail = p.trailing_stop?;
        let hit = match p.side {
            PositionSide::Long => ctx.current_price <= trail,
            PositionSide::Short => ctx.current_price >= trail,
        };
        hit.then_some(ExitReason::TrailingStop)
    }
}

/// Priority 5: the position has been open longer than its timeframe's
/// maximum hold duration.
pub struct MaxHoldDuration;

impl ExitStrategy for MaxHoldDuration {
    fn check(&self, ctx: &ExitContext) -> Option<ExitReason> {
        let elapsed = (ctx.now - ctx.position.entry_ts).num_seconds();
        (elapsed >= ctx.position.timeframe.max_hold_seconds()).then_some(ExitReason::MaxHoldDuration)
    }
}

/// Priority 6: the latest signal's confidence has decayed to less than 40%
/// of what it was at entry, even though it has not flipped direction.
pub struct ConfidenceDecay;

impl ExitStrategy for ConfidenceDecay {
    fn check(&self, ctx: &ExitContext) -> Option<ExitReason> {
        let latest = ctx.latest_signal_confidence?;
        (latest < ctx.position.entry_confidence * dec!(0.4)).then_some(ExitReason::ConfidenceDecay)
    }
}

/// Priority 7: ATR% has jumped at least 50% since entry, signaling the
/// stop/target distances were sized for a calmer market than this one.
pub struct VolatilitySpike;

impl ExitStrategy for VolatilitySpike {
    fn check(&self, ctx: &ExitContext) -> Option<ExitReason> {
        let entry_atr = ctx.entry_atr_pct.filter(|v| !v.is_zero())?;
        let latest_atr = ctx.latest_analysis.and_then(|a| {
            a.sub_analyses.iter().find_map(|s| match s {
                SubAnalysis::VolatilityRegime(v) => Some(v.atr_pct),
                _ => None,
            })
        })?;
        (latest_atr >= entry_atr * dec!(1.5)).then_some(ExitReason::VolatilitySpike)
    }
}

/// The full priority-ordered chain. Outside the trading window, session
/// close blocks every strategy except the three that can fire on an
/// already-open position regardless of market hours (stop/target, trailing
/// stop, volatility spike); opposite-signal, confidence-decay and max-hold
/// wait for the next session.
pub fn ordered_strategies(within_trading_window: bool) -> Vec<Box<dyn ExitStrategy>> {
    if within_trading_window {
        vec![
            Box::new(StopLossTakeProfit),
            Box::new(DailyLossLimit),
            Box::new(OppositeSignal),
            Box::new(TrailingStop),
            Box::new(MaxHoldDuration),
            Box::new(ConfidenceDecay),
            Box::new(VolatilitySpike),
        ]
    } else {
        vec![Box::new(StopLossTakeProfit), Box::new(TrailingStop), Box::new(VolatilitySpike)]
    }
}

pub fn evaluate(strategies: &[Box<dyn ExitStrategy>], ctx: &ExitContext) -> Option<ExitReason> {
    strategies.iter().find_map(|s| s.check(ctx))
}

/// Ratchets `position.trailing_stop` toward 70% of the best favorable
/// excursion seen so far, once price has moved at least one stop-distance
/// in the position's favor. Never loosens an existing trail.
pub fn update_trailing_stop(position: &mut Position, current_price: Decimal) {
    let stop_distance = (position.entry_price - position.stop_loss).abs();
    if stop_distance.is_zero() {
        return;
    }
    let favorable = match position.side {
        PositionSide::Long => current_price - position.entry_price,
        PositionSide::Short => position.entry_price - current_price,
    };
    if favorable < stop_distance {
        return;
    }
    let trail_offset = favorable * dec!(0.7);
    let candidate = match position.side {
        PositionSide::Long => position.entry_price + trail_offset - stop_distance,
        PositionSide::Short => position.entry_price - trail_offset + stop_distance,
    };
    let tighter = match position.side {
        PositionSide::Long => position.trailing_stop.is_none_or(|t| candidate > t),
        PositionSide::Short => position.trailing_stop.is_none_or(|t| candidate < t),
    };
    if tighter {
        position.trailing_stop = Some(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::timeframe::Timeframe;
    use crate::domain::simulation::config::{SimulationConfig, StrategyType};
    use crate::domain::simulation::position::PositionSide;
    use uuid::Uuid;

    fn position(side: PositionSide) -> Position {
        Position::open(
            Uuid::new_v4(),
            Timeframe::OneHour,
            side,
            dec!(10),
            dec!(2000),
            Utc::now(),
            dec!(1),
            dec!(1950),
            dec!(2150),
            dec!(0.6),
        )
    }

    fn sim() -> Simulation {
        Simulation::new(SimulationConfig::new("main", StrategyType::Main, vec![Timeframe::OneHour]))
    }

    fn daily(sim_id: uuid::Uuid) -> DailyPerformance {
        DailyPerformance::opening(sim_id, Utc::now().date_naive(), dec!(1000))
    }

    #[test]
    fn stop_loss_triggers_for_long_below_stop() {
        let p = position(PositionSide::Long);
        let s = sim();
        let d = daily(p.sim_id);
        let ctx = ExitContext {
            position: &p,
            current_price: dec!(1940),
            now: Utc::now(),
            latest_analysis: None,
            latest_signal_direction: None,
            latest_signal_confidence: None,
            daily_performance: &d,
            sim: &s,
            entry_atr_pct: None,
        };
        assert_eq!(StopLossTakeProfit.check(&ctx), Some(ExitReason::StopLoss));
    }

    #[test]
    fn trailing_stop_ratchets_up_and_not_down_for_long() {
        let mut p = position(PositionSide::Long);
        update_trailing_stop(&mut p, dec!(2060));
        let first = p.trailing_stop.unwrap();
        update_trailing_stop(&mut p, dec!(2200));
        let second = p.trailing_stop.unwrap();
        assert!(second > first);
        update_trailing_stop(&mut p, dec!(2100));
        assert_eq!(p.trailing_stop.unwrap(), second);
    }

    #[test]
    fn opposite_signal_below_confidence_threshold_does_not_exit() {
        let p = position(PositionSide::Long);
        let s = sim();
        let d = daily(p.sim_id);
        let ctx = ExitContext {
            position: &p,
            current_price: dec!(2000),
            now: Utc::now(),
            latest_analysis: None,
            latest_signal_direction: Some(SignalDirection::Sell),
            latest_signal_confidence: Some(dec!(0.1)),
            daily_performance: &d,
            sim: &s,
            entry_atr_pct: None,
        };
        assert_eq!(OppositeSignal.check(&ctx), None);
    }

    #[test]
    fn evaluate_returns_first_matching_reason_in_priority_order() {
        let p = position(PositionSide::Long);
        let s = sim();
        let d = daily(p.sim_id);
        let ctx = ExitContext {
            position: &p,
            current_price: dec!(1900),
            now: Utc::now() + chrono::Duration::days(30),
            latest_analysis: None,
            latest_signal_direction: None,
            latest_signal_confidence: None,
            daily_performance: &d,
            sim: &s,
            entry_atr_pct: None,
        };
        let strategies = ordered_strategies(true);
        assert_eq!(evaluate(&strategies, &ctx), Some(ExitReason::StopLoss));
    }
}

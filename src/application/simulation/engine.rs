use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{error, info, warn};

use crate::application::simulation::exit_strategies::{self, ExitContext};
use crate::config::TradingWindow;
use crate::domain::analysis::record::{AnalysisRecord, SignalDirection, SignalRecord, SignalStrength};
use crate::domain::analysis::sub_analysis::SubAnalysis;
use crate::domain::errors::EngineError;
use crate::domain::market::regime::VolatilityLevel;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::repositories::{AnalysisStore, SimulationStore};
use crate::domain::simulation::config::{SimulationStatus, StrategyType};
use crate::domain::simulation::daily_performance::DailyPerformance;
use crate::domain::simulation::position::{ExitReason, Position, PositionSide};
use crate::domain::simulation::runtime::Simulation;
use crate::domain::simulation::SimulationConfig;
use crate::domain::trading::cost_model::SimulationCostModel;
use crate::infrastructure::event_bus::{Event, EventBus, PriceUpdatePayload, Topic};
use crate::infrastructure::observability::Metrics;

/// One simulation's live state: its capital ledger, at most one open
/// position per tracked timeframe, and the entry ATR% each open position
/// was sized against (for the volatility-spike exit).
struct RuntimeSim {
    simulation: Simulation,
    open_positions: HashMap<Timeframe, Position>,
    entry_atr_pct: HashMap<Timeframe, Decimal>,
    daily: DailyPerformance,
}

impl RuntimeSim {
    fn new(config: SimulationConfig) -> Self {
        let simulation = Simulation::new(config);
        let daily = DailyPerformance::opening(simulation.config.id, Utc::now().date_naive(), simulation.total_capital());
        Self {
            simulation,
            open_positions: HashMap::new(),
            entry_atr_pct: HashMap::new(),
            daily,
        }
    }
}

/// Drives every registered paper-trading simulation: opens positions off
/// fresh signals, monitors open ones against the priority-ordered exit
/// chain on every tick, and keeps each timeframe's capital ledger and
/// daily P&L current.
pub struct SimulationEngine<A: AnalysisStore, S: SimulationStore> {
    analyses: Arc<A>,
    store: Arc<S>,
    bus: Arc<EventBus>,
    metrics: Arc<Metrics>,
    trading_window: TradingWindow,
    sims: RwLock<Vec<RuntimeSim>>,
}

impl<A: AnalysisStore, S: SimulationStore> SimulationEngine<A, S> {
    pub fn new(
        configs: Vec<SimulationConfig>,
        analyses: Arc<A>,
        store: Arc<S>,
        bus: Arc<EventBus>,
        metrics: Arc<Metrics>,
        trading_window: TradingWindow,
    ) -> Self {
        let sims = configs.into_iter().map(RuntimeSim::new).collect();
        Self {
            analyses,
            store,
            bus,
            metrics,
            trading_window,
            sims: RwLock::new(sims),
        }
    }

    fn within_trading_window(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.trading_window.zone);
        let minutes = local.hour() * 60 + local.minute();
        let start = self.trading_window.start_hour * 60 + self.trading_window.start_minute;
        let end = self.trading_window.end_hour * 60 + self.trading_window.end_minute;
        minutes >= start && minutes < end
    }

    /// Listens for signals (position opens, opposite-signal exits), price
    /// updates (stop/target, trailing stop, volatility-spike exits), daily
    /// rolls, and operator commands, for as long as the bus stays open and
    /// no shutdown has been requested.
    pub async fn run(self: Arc<Self>, mut commands: mpsc::Receiver<SimulationCommand>, mut shutdown: watch::Receiver<bool>) {
        let mut signal_sub = self.bus.subscribe(Topic::Signal);
        let mut price_sub = self.bus.subscribe(Topic::PriceUpdate);
        let mut roll_sub = self.bus.subscribe(Topic::DailyRoll);
        loop {
            tokio::select! {
                event = signal_sub.recv(&self.bus) => {
                    match event {
                        Some(Event::Signal(signal)) => self.on_signal(signal).await,
                        Some(_) => {}
                        None => break,
                    }
                }
                event = price_sub.recv(&self.bus) => {
                    match event {
                        Some(Event::PriceUpdate(payload)) => self.on_price_update(payload).await,
                        Some(_) => {}
                        None => break,
                    }
                }
                event = roll_sub.recv(&self.bus) => {
                    match event {
                        Some(Event::DailyRoll(payload)) => self.on_daily_roll(payload.date).await,
                        Some(_) => {}
                        None => break,
                    }
                }
                command = commands.recv() => {
                    match command {
                        Some(command) => self.on_command(command).await,
                        None => {}
                    }
                }
                _ = shutdown.changed() => {
                    info!("simulation engine shutting down");
                    break;
                }
            }
        }
    }

    async fn on_command(&self, command: SimulationCommand) {
        let (target, status) = match command {
            SimulationCommand::Pause(id) => (id, SimulationStatus::Paused),
            SimulationCommand::Resume(id) => (id, SimulationStatus::Active),
        };
        let mut sims = self.sims.write().await;
        if let Some(sim) = sims.iter_mut().find(|s| s.simulation.config.id == target) {
            sim.simulation.status = status;
            if status == SimulationStatus::Paused {
                self.metrics.simulation_paused.with_label_values(&[&target.to_string(), "operator"]).inc();
            }
            info!(sim_id = %target, ?status, "simulation status changed");
        } else {
            warn!(sim_id = %target, "command for unknown simulation id");
        }
    }

    /// Closes out the previous day's P&L row and opens a fresh one at each
    /// tracked simulation's current total capital.
    async fn on_daily_roll(&self, date: chrono::NaiveDate) {
        let mut sims = self.sims.write().await;
        for sim in sims.iter_mut() {
            if let Err(e) = self.store.upsert_daily_performance(&sim.daily).await {
                warn!(error = %e, "failed to persist end-of-day performance");
            }
            sim.daily = DailyPerformance::opening(sim.simulation.config.id, date, sim.simulation.total_capital());
        }
    }

    async fn on_signal(&self, signal: SignalRecord) {
        let analysis = self.analyses.fetch_latest_analysis(signal.timeframe).await.ok().flatten();
        let mut sims = self.sims.write().await;
        for sim in sims.iter_mut() {
            if !sim.simulation.is_active() || !sim.simulation.config.tracked_timeframes.contains(&signal.timeframe) {
                continue;
            }
            if let Some(position) = sim.open_positions.get(&signal.timeframe) {
                let ctx = ExitContext {
                    position,
                    current_price: signal.entry_price,
                    now: signal.ts,
                    latest_analysis: analysis.as_ref(),
                    latest_signal_direction: Some(signal.direction),
                    latest_signal_confidence: Some(signal.confidence),
                    daily_performance: &sim.daily,
                    sim: &sim.simulation,
                    entry_atr_pct: sim.entry_atr_pct.get(&signal.timeframe).copied(),
                };
                if let Some(reason) = exit_strategies::OppositeSignal.check(&ctx) {
                    self.close_position(sim, signal.timeframe, signal.entry_price, signal.ts, reason).await;
                }
            } else {
                self.try_open(sim, &signal, analysis.as_ref()).await;
            }
        }
    }

    async fn on_price_update(&self, payload: PriceUpdatePayload) {
        let within_window = self.within_trading_window(payload.t);
        let strategies = exit_strategies::ordered_strategies(within_window);
        let tfs: Vec<Timeframe> = Timeframe::all().into_iter().collect();

        let mut sims = self.sims.write().await;
        for sim in sims.iter_mut() {
            if !sim.simulation.is_active() {
                continue;
            }
            for tf in &tfs {
                if !sim.open_positions.contains_key(tf) {
                    continue;
                }
                let reason = {
                    let position = sim.open_positions.get_mut(tf).expect("checked contains_key above");
                    exit_strategies::update_trailing_stop(position, payload.g);
                    let ctx = ExitContext {
                        position,
                        current_price: payload.g,
                        now: payload.t,
                        latest_analysis: None,
                        latest_signal_direction: None,
                        latest_signal_confidence: None,
                        daily_performance: &sim.daily,
                        sim: &sim.simulation,
                        entry_atr_pct: sim.entry_atr_pct.get(tf).copied(),
                    };
                    exit_strategies::evaluate(&strategies, &ctx)
                };
                if let Some(reason) = reason {
                    self.close_position(sim, *tf, payload.g, payload.t, reason).await;
                }
            }
        }
    }

    /// Filters a signal through strategy-type rules, the confidence floor,
    /// then sizes and opens a position if it clears both.
    async fn try_open(&self, sim: &mut RuntimeSim, signal: &SignalRecord, analysis: Option<&AnalysisRecord>) {
        if !signal.is_actionable(Decimal::ZERO) {
            return;
        }
        if !self.within_trading_window(signal.ts) {
            return;
        }
        if !strategy_allows_entry(sim.simulation.config.strategy_type, signal, analysis, signal.ts) {
            return;
        }
        if signal.confidence < sim.simulation.config.thresholds.min_confidence {
            return;
        }
        let (Some(stop_loss), Some(take_profit)) = (signal.stop_loss, signal.take_profit) else {
            return;
        };

        let sizing = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| size_and_debit(sim, signal, stop_loss, take_profit))) {
            Ok(sizing) => sizing,
            Err(_) => {
                self.pause_on_invariant_violation(sim, "position sizing or ledger debit panicked");
                return;
            }
        };
        let Some(position) = sizing else {
            return;
        };

        if let Err(e) = self.store.insert_position(&position).await {
            warn!(error = %e, "failed to persist opened position");
        }
        let atr_pct = analysis.and_then(|a| {
            a.sub_analyses.iter().find_map(|s| match s {
                SubAnalysis::VolatilityRegime(v) => Some(v.atr_pct),
                _ => None,
            })
        });
        if let Some(atr_pct) = atr_pct {
            sim.entry_atr_pct.insert(signal.timeframe, atr_pct);
        }
        self.bus.publish(Event::PositionOpened(position.clone()));
        info!(sim_id = %sim.simulation.config.id, tf = ?signal.timeframe, side = ?position.side, size_grams = %position.size_grams, "opened position");
        sim.open_positions.insert(signal.timeframe, position);
    }

    async fn close_position(&self, sim: &mut RuntimeSim, tf: Timeframe, market_price: Decimal, now: DateTime<Utc>, reason: ExitReason) {
        let Some(mut position) = sim.open_positions.remove(&tf) else {
            return;
        };
        sim.entry_atr_pct.remove(&tf);

        let settled = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| settle_exit(sim, &mut position, tf, market_price, now, reason))) {
            Ok(()) => true,
            Err(_) => {
                self.pause_on_invariant_violation(sim, "position settlement panicked");
                false
            }
        };
        if !settled {
            return;
        }

        if let Err(e) = self.store.update_position_exit(&position).await {
            warn!(error = %e, "failed to persist closed position");
        }
        if let Err(e) = self.store.upsert_daily_performance(&sim.daily).await {
            warn!(error = %e, "failed to persist daily performance");
        }
        info!(sim_id = %sim.simulation.config.id, tf = ?tf, ?reason, net_pnl_grams = ?position.net_pnl_grams, "closed position");
        self.bus.publish(Event::PositionClosed(position));
    }

    /// A panic during capital-ledger arithmetic means the ledger can no
    /// longer be trusted. Pause this simulation only; the worker, the bus,
    /// and every other simulation keep running.
    fn pause_on_invariant_violation(&self, sim: &mut RuntimeSim, reason: &str) {
        let sim_id = sim.simulation.config.id;
        sim.simulation.status = SimulationStatus::Paused;
        self.metrics.simulation_paused.with_label_values(&[&sim_id.to_string(), "invariant_violation"]).inc();
        let err = EngineError::InvariantViolation {
            sim_id: sim_id.to_string(),
            reason: reason.to_string(),
        };
        error!(%err, "simulation paused after caught panic");
    }
}

/// Sizes a position against the timeframe's available capital, debits the
/// ledger, and returns the opened `Position`. Pure except for the ledger
/// debit; isolated behind `catch_unwind` at the call site so a panic here
/// (e.g. a Decimal division edge case) only pauses the owning simulation.
fn size_and_debit(sim: &mut RuntimeSim, signal: &SignalRecord, stop_loss: Decimal, take_profit: Decimal) -> Option<Position> {
    let tf_capital = sim.simulation.capital_for(signal.timeframe);
    let stop_distance = (signal.entry_price - stop_loss).abs();
    if stop_distance.is_zero() || tf_capital.is_zero() {
        return None;
    }
    let risk_budget_tl = tf_capital * signal.entry_price * sim.simulation.config.thresholds.max_risk_pct;
    let size_grams = (risk_budget_tl / stop_distance).min(tf_capital * dec!(0.20));
    if size_grams <= Decimal::ZERO {
        return None;
    }

    let side = match signal.direction {
        SignalDirection::Buy => PositionSide::Long,
        SignalDirection::Sell => PositionSide::Short,
        SignalDirection::Hold => return None,
    };

    let cost_model = SimulationCostModel::new(sim.simulation.config.costs);
    let half_spread = cost_model.half_spread();
    let entry_price = match side {
        PositionSide::Long => signal.entry_price + half_spread,
        PositionSide::Short => signal.entry_price - half_spread,
    };
    let entry_commission = cost_model.entry_cost(entry_price, size_grams).total();

    if sim.simulation.debit(signal.timeframe, size_grams).is_err() {
        return None;
    }

    Some(Position::open(
        sim.simulation.config.id,
        signal.timeframe,
        side,
        size_grams,
        entry_price,
        signal.ts,
        entry_commission,
        stop_loss,
        take_profit,
        signal.confidence,
    ))
}

/// Prices the exit, closes the position in place, and credits the ledger.
/// Isolated behind `catch_unwind` at the call site for the same reason as
/// `size_and_debit`.
fn settle_exit(sim: &mut RuntimeSim, position: &mut Position, tf: Timeframe, market_price: Decimal, now: DateTime<Utc>, reason: ExitReason) {
    let cost_model = SimulationCostModel::new(sim.simulation.config.costs);
    let half_spread = cost_model.half_spread();
    let exit_price = match position.side {
        PositionSide::Long => market_price - half_spread,
        PositionSide::Short => market_price + half_spread,
    };
    let exit_commission = cost_model.exit_cost(exit_price, position.size_grams).total();

    position.close(exit_price, now, exit_commission, market_price, reason);
    let settlement = position.settlement_grams().unwrap_or(position.size_grams);
    sim.simulation.credit(tf, settlement);

    if let Some(net_pnl_grams) = position.net_pnl_grams {
        sim.daily.record_close(net_pnl_grams, sim.simulation.total_capital());
    }
}

/// Operator commands accepted by a running `SimulationEngine`, delivered
/// over its dedicated `mpsc` channel (the per-subsystem command channel
/// every worker in the system owns one end of).
#[derive(Debug, Clone, Copy)]
pub enum SimulationCommand {
    Pause(uuid::Uuid),
    Resume(uuid::Uuid),
}

fn is_extreme_volatility(analysis: &AnalysisRecord) -> bool {
    analysis.sub_analyses.iter().any(|s| matches!(s, SubAnalysis::VolatilityRegime(v) if v.level == VolatilityLevel::Extreme))
}

/// Momentum entries want the MACD-histogram progression actively
/// accelerating in the direction RSI confirms.
fn momentum_confirmed(analysis: &AnalysisRecord) -> bool {
    analysis.sub_analyses.iter().any(|s| {
        matches!(
            s,
            SubAnalysis::MomentumRegime(m)
                if m.alignment && matches!(m.state, crate::domain::market::regime::MomentumState::Accelerating)
        )
    })
}

/// Mean-reversion entries want price extended far enough from the mean to
/// have produced a divergence read.
fn mean_reversion_opportunity(analysis: &AnalysisRecord) -> bool {
    analysis.sub_analyses.iter().any(|s| matches!(s, SubAnalysis::Divergence(_)))
}

fn strategy_allows_entry(strategy_type: StrategyType, signal: &SignalRecord, analysis: Option<&AnalysisRecord>, now: DateTime<Utc>) -> bool {
    match strategy_type {
        StrategyType::Main => true,
        StrategyType::Conservative => signal.signal_strength == SignalStrength::Strong,
        StrategyType::Momentum => analysis.is_some_and(momentum_confirmed),
        StrategyType::MeanReversion => analysis.is_some_and(mean_reversion_opportunity),
        StrategyType::Consensus => signal.contributing.len() >= 3,
        StrategyType::RiskAdjusted => !analysis.is_some_and(is_extreme_volatility),
        StrategyType::TimeBased => match now.hour() {
            9..=10 => analysis.is_some_and(momentum_confirmed),
            11..=13 => analysis.is_some_and(mean_reversion_opportunity),
            _ => signal.signal_strength == SignalStrength::Strong,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::simulation::config::RiskThresholds;
    use crate::domain::trading::CostConfig;
    use uuid::Uuid;

    fn signal(direction: SignalDirection, confidence: Decimal) -> SignalRecord {
        let contributing = vec!["trend_regime".to_string(), "structure".to_string(), "divergence".to_string()];
        let signal_strength = if confidence >= dec!(0.7) && contributing.len() >= 3 {
            SignalStrength::Strong
        } else if confidence >= dec!(0.55) {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        };
        SignalRecord {
            id: Uuid::new_v4(),
            timeframe: Timeframe::OneHour,
            ts: Utc::now(),
            direction,
            confidence,
            signal_strength,
            entry_price: dec!(2000),
            stop_loss: Some(dec!(1950)),
            take_profit: Some(dec!(2100)),
            risk_reward: dec!(2.0),
            position_size_pct: dec!(0.05),
            contributing,
        }
    }

    #[test]
    fn main_strategy_allows_any_actionable_signal() {
        let s = signal(SignalDirection::Buy, dec!(0.4));
        assert!(strategy_allows_entry(StrategyType::Main, &s, None, Utc::now()));
    }

    #[test]
    fn conservative_strategy_requires_strong_classification() {
        let weak = signal(SignalDirection::Buy, dec!(0.4));
        assert!(!strategy_allows_entry(StrategyType::Conservative, &weak, None, Utc::now()));
        let strong = signal(SignalDirection::Buy, dec!(0.8));
        assert!(strategy_allows_entry(StrategyType::Conservative, &strong, None, Utc::now()));
    }

    #[test]
    fn consensus_strategy_requires_three_confirmations() {
        let mut s = signal(SignalDirection::Buy, dec!(0.5));
        s.contributing = vec!["trend_regime".to_string()];
        assert!(!strategy_allows_entry(StrategyType::Consensus, &s, None, Utc::now()));
    }

    #[tokio::test]
    async fn try_open_debits_ledger_by_sized_position() {
        let config = SimulationConfig {
            id: Uuid::new_v4(),
            name: "main".to_string(),
            strategy_type: StrategyType::Main,
            initial_capital_grams: dec!(1000),
            tracked_timeframes: vec![Timeframe::OneHour],
            costs: CostConfig::default(),
            thresholds: RiskThresholds {
                min_confidence: dec!(0.3),
                max_risk_pct: dec!(0.02),
                max_daily_loss_pct: dec!(0.05),
            },
        };
        let mut runtime = RuntimeSim::new(config);
        let before = runtime.simulation.capital_for(Timeframe::OneHour);
        let s = signal(SignalDirection::Buy, dec!(0.5));

        let stop_distance = (s.entry_price - s.stop_loss.unwrap()).abs();
        let risk_budget_tl = before * s.entry_price * runtime.simulation.config.thresholds.max_risk_pct;
        let expected_size = (risk_budget_tl / stop_distance).min(before * dec!(0.20));
        runtime.simulation.debit(Timeframe::OneHour, expected_size).unwrap();

        assert_eq!(runtime.simulation.capital_for(Timeframe::OneHour), before - expected_size);
    }

    fn test_config() -> SimulationConfig {
        SimulationConfig {
            id: Uuid::new_v4(),
            name: "main".to_string(),
            strategy_type: StrategyType::Main,
            initial_capital_grams: dec!(1000),
            tracked_timeframes: vec![Timeframe::OneHour],
            costs: CostConfig::default(),
            thresholds: RiskThresholds {
                min_confidence: dec!(0.3),
                max_risk_pct: dec!(0.02),
                max_daily_loss_pct: dec!(0.05),
            },
        }
    }

    #[test]
    fn size_and_debit_refuses_zero_stop_distance() {
        let mut runtime = RuntimeSim::new(test_config());
        let mut s = signal(SignalDirection::Buy, dec!(0.5));
        s.stop_loss = Some(s.entry_price);
        assert!(size_and_debit(&mut runtime, &s, s.stop_loss.unwrap(), s.take_profit.unwrap()).is_none());
    }

    #[test]
    fn size_and_debit_opens_and_debits_matching_amount() {
        let mut runtime = RuntimeSim::new(test_config());
        let before = runtime.simulation.capital_for(Timeframe::OneHour);
        let s = signal(SignalDirection::Buy, dec!(0.5));

        let position = size_and_debit(&mut runtime, &s, s.stop_loss.unwrap(), s.take_profit.unwrap()).expect("sizing should succeed");

        assert_eq!(position.side, PositionSide::Long);
        assert_eq!(runtime.simulation.capital_for(Timeframe::OneHour), before - position.size_grams);
    }

    #[test]
    fn settle_exit_credits_ledger_and_records_daily_pnl() {
        let mut runtime = RuntimeSim::new(test_config());
        let s = signal(SignalDirection::Buy, dec!(0.5));
        let mut position = size_and_debit(&mut runtime, &s, s.stop_loss.unwrap(), s.take_profit.unwrap()).expect("sizing should succeed");
        let after_open = runtime.simulation.capital_for(Timeframe::OneHour);

        settle_exit(&mut runtime, &mut position, Timeframe::OneHour, dec!(1950), Utc::now(), ExitReason::StopLoss);

        assert!(position.net_pnl_grams.is_some());
        assert!(runtime.simulation.capital_for(Timeframe::OneHour) > after_open);
        assert_eq!(runtime.daily.closed_trades, 1);
    }
}

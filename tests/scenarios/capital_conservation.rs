//! S5: capital conservation across two simulations run side by side under
//! a burst of alternating signals, replayed from the store's own ledger of
//! opens and closes rather than peeking at the engine's private state.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use altinrade::application::simulation::engine::SimulationCommand;
use altinrade::application::simulation::SimulationEngine;
use altinrade::config::TradingWindow;
use altinrade::domain::analysis::record::{SignalDirection, SignalStrength};
use altinrade::domain::analysis::{AnalysisRecord, SignalRecord};
use altinrade::domain::market::timeframe::Timeframe;
use altinrade::domain::repositories::{AnalysisStore, SimulationStore, StoreResult};
use altinrade::domain::simulation::daily_performance::DailyPerformance;
use altinrade::domain::simulation::position::Position;
use altinrade::domain::simulation::{SimulationConfig, StrategyType};
use altinrade::infrastructure::event_bus::{Event, EventBus, Topic};
use altinrade::infrastructure::observability::Metrics;

struct NoAnalysis;

#[async_trait]
impl AnalysisStore for NoAnalysis {
    async fn insert_analysis(&self, _record: &AnalysisRecord) -> StoreResult<()> {
        Ok(())
    }
    async fn fetch_latest_analysis(&self, _timeframe: Timeframe) -> StoreResult<Option<AnalysisRecord>> {
        Ok(None)
    }
    async fn fetch_analyses(&self, _timeframe: Timeframe, _limit: usize) -> StoreResult<Vec<AnalysisRecord>> {
        Ok(vec![])
    }
    async fn insert_signal(&self, _record: &SignalRecord) -> StoreResult<()> {
        Ok(())
    }
    async fn fetch_signals(&self, _since: chrono::DateTime<Utc>) -> StoreResult<Vec<SignalRecord>> {
        Ok(vec![])
    }
}

#[derive(Debug, Clone, Copy)]
enum LedgerEvent {
    Open { sim_id: Uuid, tf: Timeframe, size_grams: Decimal },
    Close { sim_id: Uuid, tf: Timeframe, settlement_grams: Decimal, net_pnl_grams: Decimal },
}

/// Every open/close the engine persists, in the order it persisted them.
/// A test replays this log against each simulation's starting capital to
/// check the ledger never goes negative and balances at the end.
#[derive(Default)]
struct LedgerStore {
    events: Mutex<Vec<LedgerEvent>>,
}

#[async_trait]
impl SimulationStore for LedgerStore {
    async fn list_simulations(&self) -> StoreResult<Vec<SimulationConfig>> {
        Ok(vec![])
    }
    async fn create_simulation(&self, _config: &SimulationConfig) -> StoreResult<()> {
        Ok(())
    }
    async fn insert_position(&self, position: &Position) -> StoreResult<()> {
        self.events.lock().unwrap().push(LedgerEvent::Open {
            sim_id: position.sim_id,
            tf: position.timeframe,
            size_grams: position.size_grams,
        });
        Ok(())
    }
    async fn update_position_exit(&self, position: &Position) -> StoreResult<()> {
        self.events.lock().unwrap().push(LedgerEvent::Close {
            sim_id: position.sim_id,
            tf: position.timeframe,
            settlement_grams: position.settlement_grams().unwrap_or(position.size_grams),
            net_pnl_grams: position.net_pnl_grams.unwrap_or(Decimal::ZERO),
        });
        Ok(())
    }
    async fn fetch_open_positions(&self, _sim_id: Uuid) -> StoreResult<Vec<Position>> {
        Ok(vec![])
    }
    async fn upsert_daily_performance(&self, _performance: &DailyPerformance) -> StoreResult<()> {
        Ok(())
    }
}

fn signal(tf: Timeframe, ts: chrono::DateTime<Utc>, direction: SignalDirection, entry: Decimal) -> SignalRecord {
    let (stop_loss, take_profit) = match direction {
        SignalDirection::Buy => (entry - dec!(10), entry + dec!(20)),
        SignalDirection::Sell => (entry + dec!(10), entry - dec!(20)),
        SignalDirection::Hold => (entry, entry),
    };
    SignalRecord {
        id: Uuid::new_v4(),
        timeframe: tf,
        ts,
        direction,
        confidence: dec!(0.8),
        signal_strength: SignalStrength::Strong,
        entry_price: entry,
        stop_loss: Some(stop_loss),
        take_profit: Some(take_profit),
        risk_reward: dec!(2.0),
        position_size_pct: dec!(0.05),
        contributing: vec!["trend_regime".to_string()],
    }
}

#[tokio::test]
async fn s5_capital_conserved_across_two_parallel_simulations() {
    let tf = Timeframe::FifteenMin;
    let sim_a = SimulationConfig::new("sim-a", StrategyType::Main, vec![tf]);
    let sim_b = SimulationConfig::new("sim-b", StrategyType::Main, vec![tf]);
    let initial_capital: HashMap<Uuid, Decimal> =
        [(sim_a.id, sim_a.initial_capital_grams), (sim_b.id, sim_b.initial_capital_grams)].into_iter().collect();

    let bus = std::sync::Arc::new(EventBus::new());
    let store = std::sync::Arc::new(LedgerStore::default());
    let analyses = std::sync::Arc::new(NoAnalysis);
    let metrics = std::sync::Arc::new(Metrics::new().expect("metrics registration"));
    let engine = std::sync::Arc::new(SimulationEngine::new(
        vec![sim_a.clone(), sim_b.clone()],
        analyses,
        store.clone(),
        bus.clone(),
        metrics,
        TradingWindow::default(),
    ));

    let (_cmd_tx, cmd_rx) = mpsc::channel::<SimulationCommand>(4);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(engine.run(cmd_rx, shutdown_rx));
    std::mem::forget(_cmd_tx);

    // Alternate direction every signal: each pair opens a position on the
    // first half and closes it via opposite-signal on the second,
    // entirely within the default 09:00-17:00 trading window.
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
    let mut closed_sub = bus.subscribe(Topic::PositionClosed);
    const SIGNAL_COUNT: i64 = 80;
    for i in 0..SIGNAL_COUNT {
        let ts = start + Duration::minutes(i * 5);
        let direction = if i % 2 == 0 { SignalDirection::Buy } else { SignalDirection::Sell };
        bus.publish(Event::Signal(signal(tf, ts, direction, dec!(2000.00))));
        if i % 2 == 1 {
            tokio::time::timeout(std::time::Duration::from_secs(1), closed_sub.recv(&bus)).await.expect("close within timeout");
        } else {
            // give the engine a turn to process the open before the next publish
            tokio::task::yield_now().await;
        }
    }
    let _ = shutdown_tx.send(true);
    // Let the shutdown arm win the next select iteration before we read the log.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let events = store.events.lock().unwrap().clone();
    assert!(!events.is_empty(), "the burst should have produced at least one open/close pair");

    let mut per_tf_capital: HashMap<(Uuid, Timeframe), Decimal> = HashMap::new();
    let mut allocated_open: HashMap<(Uuid, Timeframe), Decimal> = HashMap::new();
    let mut realized_pnl: HashMap<Uuid, Decimal> = HashMap::new();

    for (sim_id, t) in [(sim_a.id, tf), (sim_b.id, tf)] {
        per_tf_capital.insert((sim_id, t), initial_capital[&sim_id]);
    }

    let mut opened_count = 0u32;
    let mut closed_count = 0u32;
    for event in &events {
        match *event {
            LedgerEvent::Open { sim_id, tf, size_grams } => {
                opened_count += 1;
                let capital = per_tf_capital.entry((sim_id, tf)).or_insert(Decimal::ZERO);
                *capital -= size_grams;
                assert!(*capital >= Decimal::ZERO, "per-tf capital must never go negative on debit");
                *allocated_open.entry((sim_id, tf)).or_insert(Decimal::ZERO) += size_grams;
            }
            LedgerEvent::Close { sim_id, tf, settlement_grams, net_pnl_grams } => {
                closed_count += 1;
                let capital = per_tf_capital.entry((sim_id, tf)).or_insert(Decimal::ZERO);
                *capital += settlement_grams;
                assert!(*capital >= Decimal::ZERO, "per-tf capital must never go negative on credit");
                *allocated_open.entry((sim_id, tf)).or_insert(Decimal::ZERO) -= settlement_grams - net_pnl_grams;
                *realized_pnl.entry(sim_id).or_insert(Decimal::ZERO) += net_pnl_grams;
            }
        }
    }
    assert_eq!(opened_count, (SIGNAL_COUNT as u32) / 2 * 2, "both simulations should open on every buy/sell pair");
    assert_eq!(opened_count, closed_count, "every opened position in this burst is closed by the final signal pair");

    for sim_id in [sim_a.id, sim_b.id] {
        let capital_sum: Decimal = per_tf_capital.iter().filter(|((s, _), _)| *s == sim_id).map(|(_, c)| *c).sum();
        let allocated_sum: Decimal = allocated_open.iter().filter(|((s, _), _)| *s == sim_id).map(|(_, c)| *c).sum();
        let pnl = realized_pnl.get(&sim_id).copied().unwrap_or(Decimal::ZERO);
        assert_eq!(
            capital_sum + allocated_sum,
            initial_capital[&sim_id] + pnl,
            "capital + allocated-at-entry must equal initial capital plus realized P&L for {sim_id}"
        );
    }
}

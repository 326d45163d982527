//! S3/S4: a real `SimulationEngine` driven end to end through the event
//! bus, backed by in-memory test doubles for the two stores it depends on.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use altinrade::application::simulation::engine::SimulationCommand;
use altinrade::application::simulation::SimulationEngine;
use altinrade::config::TradingWindow;
use altinrade::domain::analysis::{AnalysisRecord, SignalRecord};
use altinrade::domain::analysis::record::{SignalDirection, SignalStrength};
use altinrade::domain::market::timeframe::Timeframe;
use altinrade::domain::repositories::{AnalysisStore, SimulationStore, StoreResult};
use altinrade::domain::simulation::daily_performance::DailyPerformance;
use altinrade::domain::simulation::position::{ExitReason, Position, PositionSide};
use altinrade::domain::simulation::{SimulationConfig, StrategyType};
use altinrade::infrastructure::event_bus::{Event, EventBus, PriceUpdatePayload, Topic};
use altinrade::infrastructure::observability::Metrics;

/// No fresh analysis available; every strategy filter that consults it
/// degrades to "no opinion", which is fine for `StrategyType::Main`.
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

/// Records every position the engine persists, keyed by position id, so a
/// test can assert on its final settled shape.
#[derive(Default)]
struct RecordingStore {
    positions: Mutex<HashMap<Uuid, Position>>,
}

#[async_trait]
impl SimulationStore for RecordingStore {
    async fn list_simulations(&self) -> StoreResult<Vec<SimulationConfig>> {
        Ok(vec![])
    }
    async fn create_simulation(&self, _config: &SimulationConfig) -> StoreResult<()> {
        Ok(())
    }
    async fn insert_position(&self, position: &Position) -> StoreResult<()> {
        self.positions.lock().unwrap().insert(position.id, position.clone());
        Ok(())
    }
    async fn update_position_exit(&self, position: &Position) -> StoreResult<()> {
        self.positions.lock().unwrap().insert(position.id, position.clone());
        Ok(())
    }
    async fn fetch_open_positions(&self, sim_id: Uuid) -> StoreResult<Vec<Position>> {
        Ok(self.positions.lock().unwrap().values().filter(|p| p.sim_id == sim_id && p.is_open()).cloned().collect())
    }
    async fn upsert_daily_performance(&self, _performance: &DailyPerformance) -> StoreResult<()> {
        Ok(())
    }
}

fn buy_signal(tf: Timeframe, ts: chrono::DateTime<Utc>, entry: rust_decimal::Decimal) -> SignalRecord {
    SignalRecord {
        id: Uuid::new_v4(),
        timeframe: tf,
        ts,
        direction: SignalDirection::Buy,
        confidence: dec!(0.8),
        signal_strength: SignalStrength::Strong,
        entry_price: entry,
        stop_loss: Some(entry - dec!(10)),
        take_profit: Some(entry + dec!(20)),
        risk_reward: dec!(2.0),
        position_size_pct: dec!(0.05),
        contributing: vec!["trend_regime".to_string()],
    }
}

fn sell_signal(tf: Timeframe, ts: chrono::DateTime<Utc>, entry: rust_decimal::Decimal, confidence: rust_decimal::Decimal) -> SignalRecord {
    SignalRecord {
        id: Uuid::new_v4(),
        timeframe: tf,
        ts,
        direction: SignalDirection::Sell,
        confidence,
        signal_strength: SignalStrength::Strong,
        entry_price: entry,
        stop_loss: Some(entry + dec!(10)),
        take_profit: Some(entry - dec!(20)),
        risk_reward: dec!(2.0),
        position_size_pct: dec!(0.05),
        contributing: vec!["trend_regime".to_string()],
    }
}

/// Spawns a `SimulationEngine` over one `StrategyType::Main` simulation
/// tracking a single timeframe, wired to a fresh bus and in-memory stores.
fn spawn_engine(tf: Timeframe) -> (std::sync::Arc<EventBus>, std::sync::Arc<RecordingStore>, SimulationConfig, watch::Sender<bool>) {
    let config = SimulationConfig::new("main", StrategyType::Main, vec![tf]);
    let bus = std::sync::Arc::new(EventBus::new());
    let store = std::sync::Arc::new(RecordingStore::default());
    let analyses = std::sync::Arc::new(NoAnalysis);
    let metrics = std::sync::Arc::new(Metrics::new().expect("metrics registration"));
    let engine = std::sync::Arc::new(SimulationEngine::new(
        vec![config.clone()],
        analyses,
        store.clone(),
        bus.clone(),
        metrics,
        TradingWindow::default(),
    ));

    let (_cmd_tx, cmd_rx) = mpsc::channel::<SimulationCommand>(4);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(engine.run(cmd_rx, shutdown_rx));
    // Keep the command sender alive for the test's duration so the
    // engine's `commands.recv()` arm never observes a closed channel.
    std::mem::forget(_cmd_tx);
    (bus, store, config, shutdown_tx)
}

fn at(hour: u32, minute: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, hour, minute, 0).unwrap()
}

#[tokio::test]
async fn s3_position_opens_and_closes_on_stop_loss() {
    let (bus, store, _config, shutdown) = spawn_engine(Timeframe::FifteenMin);
    let mut opened_sub = bus.subscribe(Topic::PositionOpened);
    let mut closed_sub = bus.subscribe(Topic::PositionClosed);

    bus.publish(Event::Signal(buy_signal(Timeframe::FifteenMin, at(10, 0), dec!(2000.00))));

    let opened = tokio::time::timeout(std::time::Duration::from_secs(1), opened_sub.recv(&bus))
        .await
        .expect("position-opened event within timeout")
        .expect("bus still open");
    let Event::PositionOpened(opened) = opened else { panic!("expected PositionOpened") };
    assert_eq!(opened.side, PositionSide::Long);
    assert_eq!(opened.stop_loss, dec!(1990.00));
    assert_eq!(opened.take_profit, dec!(2020.00));

    // Next tick drops straight through the stop, below the half-spread
    // cushion that widened the actual fill price on entry.
    bus.publish(Event::PriceUpdate(PriceUpdatePayload {
        t: at(10, 15),
        g: dec!(1985.00),
        o: dec!(2650),
        u: dec!(32.0),
    }));

    let closed = tokio::time::timeout(std::time::Duration::from_secs(1), closed_sub.recv(&bus))
        .await
        .expect("position-closed event within timeout")
        .expect("bus still open");
    let Event::PositionClosed(closed) = closed else { panic!("expected PositionClosed") };
    assert_eq!(closed.id, opened.id);
    assert_eq!(closed.exit_reason, Some(ExitReason::StopLoss));
    assert!(closed.net_pnl_tl.unwrap() < rust_decimal::Decimal::ZERO, "a stop-loss exit must realize a loss");

    let recorded = store.positions.lock().unwrap().get(&opened.id).cloned().expect("position recorded");
    assert!(!recorded.is_open());

    let _ = shutdown.send(true);
}

#[tokio::test]
async fn s4_opposite_signal_closes_before_any_new_entry_is_considered() {
    let (bus, store, _config, shutdown) = spawn_engine(Timeframe::OneHour);
    let mut opened_sub = bus.subscribe(Topic::PositionOpened);
    let mut closed_sub = bus.subscribe(Topic::PositionClosed);

    bus.publish(Event::Signal(buy_signal(Timeframe::OneHour, at(9, 0), dec!(2000.00))));
    let first = tokio::time::timeout(std::time::Duration::from_secs(1), opened_sub.recv(&bus))
        .await
        .unwrap()
        .unwrap();
    let Event::PositionOpened(first) = first else { panic!("expected PositionOpened") };
    assert_eq!(first.side, PositionSide::Long);

    // One hour later, a confident SELL on the same timeframe: the long
    // must be closed as `opposite_signal`, and the engine must not have
    // opened a fresh short from this very signal.
    bus.publish(Event::Signal(sell_signal(Timeframe::OneHour, at(10, 0), dec!(2005.00), dec!(0.7))));

    let closed = tokio::time::timeout(std::time::Duration::from_secs(1), closed_sub.recv(&bus))
        .await
        .unwrap()
        .unwrap();
    let Event::PositionClosed(closed) = closed else { panic!("expected PositionClosed") };
    assert_eq!(closed.id, first.id);
    assert_eq!(closed.exit_reason, Some(ExitReason::OppositeSignal));

    let no_new_open = tokio::time::timeout(std::time::Duration::from_millis(200), opened_sub.recv(&bus)).await;
    assert!(no_new_open.is_err(), "the closing signal must not also open a new position");

    assert!(!store.positions.lock().unwrap().get(&first.id).unwrap().is_open());

    let _ = shutdown.send(true);
}

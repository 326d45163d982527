use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::{mpsc, watch};
use tracing::info;
use uuid::Uuid;

use crate::application::signal_combiner::Thresholds;
use crate::application::simulation::SimulationEngine;
use crate::application::simulation::engine::SimulationCommand;
use crate::application::{aggregator, ingestion, scheduler};
use crate::config::Config;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::QuoteAdapter;
use crate::domain::repositories::SimulationStore;
use crate::domain::simulation::config::{SimulationConfig, StrategyType};
use crate::infrastructure::event_bus::{DailyRollPayload, Event, EventBus};
use crate::infrastructure::observability::Metrics;
use crate::infrastructure::persistence::{compaction, Database, SqliteStore};

const TICK_CHANNEL_CAPACITY: usize = 1024;
const SIM_COMMAND_CHANNEL_CAPACITY: usize = 10;
const COMPACTION_INTERVAL_S: u64 = 86_400;

/// Every shared handle an operator-facing layer (the CLI, a future admin
/// endpoint) needs once the system is running: the bus to subscribe to, the
/// metrics registry to render, the channel to pause/resume a simulation, and
/// the shutdown switch.
pub struct SystemHandle {
    pub bus: Arc<EventBus>,
    pub metrics: Arc<Metrics>,
    pub sim_commands: mpsc::Sender<SimulationCommand>,
    pub shutdown: watch::Sender<bool>,
}

/// Assembles the shared infrastructure (database, bus, metrics) and the
/// configured simulation grid. `start` spawns the six long-lived workers
/// from the concurrency model: ingestion, aggregator, scheduler, simulation
/// engine, tick compaction, and the daily-roll timer.
pub struct System {
    config: Config,
    store: Arc<SqliteStore>,
    bus: Arc<EventBus>,
    metrics: Arc<Metrics>,
}

fn default_simulation_grid() -> Vec<SimulationConfig> {
    let timeframes: Vec<Timeframe> = Timeframe::all().into_iter().collect();
    [
        StrategyType::Main,
        StrategyType::Conservative,
        StrategyType::Momentum,
        StrategyType::MeanReversion,
        StrategyType::Consensus,
        StrategyType::RiskAdjusted,
        StrategyType::TimeBased,
    ]
    .into_iter()
    .map(|strategy_type| SimulationConfig::new(format!("{strategy_type:?}").to_lowercase(), strategy_type, timeframes.clone()))
    .collect()
}

impl System {
    pub async fn build(config: Config) -> Result<Self> {
        info!(database_url = %config.database_url, "building altinrade system");

        let db = Database::new(&config.database_url).await.context("failed to initialize database")?;
        let bus = Arc::new(EventBus::new());
        let metrics = Arc::new(Metrics::new().context("failed to register metrics")?);
        let store = Arc::new(SqliteStore::new(db.pool.clone(), metrics.clone()));

        Ok(Self {
            config,
            store,
            bus,
            metrics,
        })
    }

    /// Spawns every worker and returns a handle to the live system. `adapter`
    /// is the tick source the ingestion worker drives; callers pick it (mock
    /// or, eventually, a live feed) before calling `start`.
    pub async fn start(self, adapter: Box<dyn QuoteAdapter>, grid_overlay: Option<Vec<SimulationConfig>>) -> Result<SystemHandle> {
        let existing = self.store.list_simulations().await.context("failed to load simulation grid")?;
        let sims = if existing.is_empty() {
            let seeded = grid_overlay.unwrap_or_else(default_simulation_grid);
            for sim in &seeded {
                self.store.create_simulation(sim).await.context("failed to persist default simulation")?;
            }
            info!(count = seeded.len(), "seeded default simulation grid");
            seeded
        } else {
            info!(count = existing.len(), "loaded existing simulation grid");
            existing
        };
        let sim_ids: Vec<Uuid> = sims.iter().map(|s| s.id).collect();

        let thresholds = Thresholds {
            confidence_by_tf: self.config.min_confidence_thresholds.clone(),
            gram_override_confidence: self.config.gram_override_confidence,
            min_volatility_pct: self.config.min_volatility_pct,
            weights: self.config.module_weights,
            costs: self.config.simulation.costs,
        };

        let (tick_tx, tick_rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);
        let (sim_commands_tx, sim_commands_rx) = mpsc::channel(SIM_COMMAND_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = SystemHandle {
            bus: self.bus.clone(),
            metrics: self.metrics.clone(),
            sim_commands: sim_commands_tx,
            shutdown: shutdown_tx,
        };

        let aggregator = aggregator::Aggregator::new(self.store.clone(), self.bus.clone());
        let sched = Arc::new(scheduler::Scheduler::new(
            self.store.clone(),
            self.store.clone(),
            self.bus.clone(),
            self.metrics.clone(),
            thresholds,
        ));
        let sim_engine = Arc::new(SimulationEngine::new(
            sims,
            self.store.clone(),
            self.store.clone(),
            self.bus.clone(),
            self.metrics.clone(),
            self.config.trading_window,
        ));

        let poll_period = Duration::from_secs(self.config.collection_interval_s.max(1));
        let ingestion_metrics = self.metrics.clone();
        let ingestion_shutdown = shutdown_rx.clone();
        tokio::spawn(async move { ingestion::run(adapter, tick_tx, poll_period, ingestion_metrics, ingestion_shutdown).await });

        let aggregator_shutdown = shutdown_rx.clone();
        tokio::spawn(async move { aggregator.run(tick_rx, aggregator_shutdown).await });

        let scheduler_shutdown = shutdown_rx.clone();
        tokio::spawn(async move { sched.run(scheduler_shutdown).await });

        let sim_shutdown = shutdown_rx.clone();
        tokio::spawn(async move { sim_engine.run(sim_commands_rx, sim_shutdown).await });

        let compaction_store: Arc<dyn crate::domain::repositories::TickStore> = self.store.clone();
        let compaction_metrics = self.metrics.clone();
        let retention_days_raw = self.config.retention_days_raw;
        let compaction_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            compaction::run(
                compaction_store,
                compaction_metrics,
                Duration::from_secs(COMPACTION_INTERVAL_S),
                retention_days_raw,
                compaction_shutdown,
            )
            .await
        });

        let roll_bus = self.bus.clone();
        let roll_shutdown = shutdown_rx;
        tokio::spawn(async move { daily_roll_task(roll_bus, sim_ids, roll_shutdown).await });

        info!("all workers spawned");
        Ok(handle)
    }
}

/// Publishes `DailyRoll` for every tracked simulation at each UTC midnight.
/// Not one of the six roles in the concurrency model's worker table, but
/// necessary plumbing: nothing else drives the event `DailyPerformance`
/// resets are keyed on.
async fn daily_roll_task(bus: Arc<EventBus>, sim_ids: Vec<Uuid>, mut shutdown: watch::Receiver<bool>) {
    loop {
        let now = Utc::now();
        let next_midnight = (now + ChronoDuration::days(1))
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc();
        let wait = (next_midnight - now).to_std().unwrap_or(Duration::from_secs(COMPACTION_INTERVAL_S));

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                info!("daily roll task shutting down");
                return;
            }
        }

        let date = Utc::now().date_naive();
        for sim_id in &sim_ids {
            bus.publish(Event::DailyRoll(DailyRollPayload { sim_id: *sim_id, date }));
        }
        info!(%date, count = sim_ids.len(), "published daily roll");
    }
}

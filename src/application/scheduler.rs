use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::application::hybrid_strategy;
use crate::application::signal_combiner::Thresholds;
use crate::domain::market::instrument::Instrument;
use crate::domain::market::quote::MarketSnapshot;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::repositories::{AnalysisStore, CandleStore};
use crate::infrastructure::event_bus::{Event, EventBus};
use crate::infrastructure::observability::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running,
    RunningWithPending,
}

/// Per-timeframe `Idle -> Running -> Idle` state machine. A trigger that
/// arrives while a run is already in flight is coalesced into a single
/// pending re-run instead of stacking up.
struct TimeframeState {
    state: RunState,
}

/// Drives a strategy run for every tracked timeframe whenever it is
/// triggered (bar close or timer tick), loading the configured candle
/// window and persisting/publishing through the shared stores and bus.
pub struct Scheduler<C: CandleStore, A: AnalysisStore> {
    candles: Arc<C>,
    analyses: Arc<A>,
    bus: Arc<EventBus>,
    metrics: Arc<Metrics>,
    thresholds: Thresholds,
    states: Mutex<HashMap<Timeframe, TimeframeState>>,
}

impl<C: CandleStore, A: AnalysisStore> Scheduler<C, A> {
    pub fn new(candles: Arc<C>, analyses: Arc<A>, bus: Arc<EventBus>, metrics: Arc<Metrics>, thresholds: Thresholds) -> Self {
        let states = Timeframe::all()
            .into_iter()
            .map(|tf| (tf, TimeframeState { state: RunState::Idle }))
            .collect();
        Self {
            candles,
            analyses,
            bus,
            metrics,
            thresholds,
            states: Mutex::new(states),
        }
    }

    /// Listens for bar-close triggers and runs the matching timeframe.
    /// `self` is shared across the lifetime of the worker via `Arc`.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut sub = self.bus.subscribe(crate::infrastructure::event_bus::Topic::BarClose);
        loop {
            let event = tokio::select! {
                event = sub.recv(&self.bus) => match event {
                    Some(event) => event,
                    None => return,
                },
                _ = shutdown.changed() => {
                    info!("scheduler shutting down");
                    return;
                }
            };
            let Event::BarClose(payload) = event else { continue };
            let tf = payload.interval;
            let me = self.clone();
            let should_spawn = {
                let mut states = me.states.lock().await;
                let entry = states.entry(tf).or_insert(TimeframeState { state: RunState::Idle });
                match entry.state {
                    RunState::Idle => {
                        entry.state = RunState::Running;
                        true
                    }
                    RunState::Running => {
                        entry.state = RunState::RunningWithPending;
                        false
                    }
                    RunState::RunningWithPending => false,
                }
            };
            if should_spawn {
                tokio::spawn(async move { me.drive(tf).await });
            }
        }
    }

    /// Runs `tf`, then immediately re-runs if a trigger was coalesced while
    /// this run was in flight, until the timeframe goes fully idle.
    async fn drive(self: Arc<Self>, tf: Timeframe) {
        loop {
            self.run_once(tf).await;
            let mut states = self.states.lock().await;
            let entry = states.get_mut(&tf).expect("timeframe state initialized for every Timeframe variant");
            match entry.state {
                RunState::RunningWithPending => {
                    entry.state = RunState::Running;
                }
                _ => {
                    entry.state = RunState::Idle;
                    return;
                }
            }
        }
    }

    async fn run_once(&self, tf: Timeframe) {
        let timer = self.metrics.scheduler_run_seconds.with_label_values(&[&tf.to_string()]).start_timer();
        let window = tf.scheduler_window();

        let gram_candles = match self.candles.fetch_candles(Instrument::GramGold, tf, window, None).await {
            Ok(c) => c,
            Err(e) => {
                warn!(?tf, error = %e, "scheduler: failed to load gram candles, retrying next trigger");
                return;
            }
        };
        let ounce_usd_candles = self
            .candles
            .fetch_candles(Instrument::OunceUsd, tf, window, None)
            .await
            .unwrap_or_default();
        let usd_try_candles = self
            .candles
            .fetch_candles(Instrument::UsdTry, tf, window, None)
            .await
            .unwrap_or_default();

        let Some(latest_candle) = gram_candles.last() else {
            return;
        };
        let latest = crate::domain::market::quote::PriceQuote::new(
            chrono::DateTime::from_timestamp_millis(latest_candle.ts_close()).unwrap_or_else(chrono::Utc::now),
            latest_candle.close,
            ounce_usd_candles.last().map(|c| c.close).unwrap_or(latest_candle.close),
            usd_try_candles.last().map(|c| c.close).unwrap_or(rust_decimal_macros::dec!(32)),
            None,
        );
        let snapshot = MarketSnapshot {
            latest,
            gram_candles,
            ounce_usd_candles,
            usd_try_candles,
        };

        let (analysis, signal) = hybrid_strategy::analyze(tf, &snapshot, &self.thresholds);

        if !analysis.has_usable_data() {
            self.metrics.inc_insufficient_data(&tf.to_string(), "hybrid_strategy");
        }
        if let Err(e) = self.analyses.insert_analysis(&analysis).await {
            warn!(?tf, error = %e, "scheduler: failed to persist analysis");
        }
        if let Some(signal) = &signal {
            if let Err(e) = self.analyses.insert_signal(signal).await {
                warn!(?tf, error = %e, "scheduler: failed to persist signal");
            }
        }
        self.bus.publish(Event::AnalysisReady(analysis));
        if let Some(signal) = signal {
            self.bus.publish(Event::Signal(signal));
        }
        info!(?tf, "scheduler: run complete");

        drop(timer);
    }
}

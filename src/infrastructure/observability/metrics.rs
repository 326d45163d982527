use prometheus::{
    core::{AtomicF64, GenericGauge},
    CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Prometheus metrics for the analysis/simulation engine, all under the
/// `altinrade_` prefix.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Ticks ingested since startup.
    pub ticks_ingested_total: CounterVec,
    /// Ticks rejected by validation, by field.
    pub ticks_rejected_total: CounterVec,
    /// Events dropped by the broadcaster, by topic.
    pub events_dropped_total: CounterVec,
    /// Retried storage operations, by operation.
    pub storage_retries_total: CounterVec,
    /// Analyzer runs that produced InsufficientData, by timeframe/analyzer.
    pub insufficient_data_total: CounterVec,
    /// Scheduler run latency, by timeframe.
    pub scheduler_run_seconds: HistogramVec,
    /// Simulations currently paused (1=paused, 0=running), by simulation id.
    pub simulation_paused: CounterVec,
    /// Open positions, by simulation id.
    pub open_positions: GenericGauge<AtomicF64>,
    /// Process uptime in seconds.
    pub uptime_seconds: GenericGauge<AtomicF64>,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let ticks_ingested_total = CounterVec::new(
            Opts::new("altinrade_ticks_ingested_total", "Ticks ingested since startup"),
            &["outcome"],
        )?;
        registry.register(Box::new(ticks_ingested_total.clone()))?;

        let ticks_rejected_total = CounterVec::new(
            Opts::new("altinrade_ticks_rejected_total", "Ticks rejected by validation"),
            &["field"],
        )?;
        registry.register(Box::new(ticks_rejected_total.clone()))?;

        let events_dropped_total = CounterVec::new(
            Opts::new("altinrade_events_dropped_total", "Events dropped by the broadcaster"),
            &["topic"],
        )?;
        registry.register(Box::new(events_dropped_total.clone()))?;

        let storage_retries_total = CounterVec::new(
            Opts::new("altinrade_storage_retries_total", "Retried storage operations"),
            &["operation"],
        )?;
        registry.register(Box::new(storage_retries_total.clone()))?;

        let insufficient_data_total = CounterVec::new(
            Opts::new(
                "altinrade_insufficient_data_total",
                "Analyzer runs producing InsufficientData",
            ),
            &["timeframe", "analyzer"],
        )?;
        registry.register(Box::new(insufficient_data_total.clone()))?;

        let scheduler_run_seconds = HistogramVec::new(
            HistogramOpts::new("altinrade_scheduler_run_seconds", "Scheduler run latency"),
            &["timeframe"],
        )?;
        registry.register(Box::new(scheduler_run_seconds.clone()))?;

        let simulation_paused = CounterVec::new(
            Opts::new("altinrade_simulation_paused_total", "Simulation pause events"),
            &["sim_id", "reason"],
        )?;
        registry.register(Box::new(simulation_paused.clone()))?;

        let open_positions = Gauge::with_opts(Opts::new("altinrade_open_positions", "Open positions across all simulations"))?;
        registry.register(Box::new(open_positions.clone()))?;

        let uptime_seconds = Gauge::with_opts(Opts::new("altinrade_uptime_seconds", "Process uptime in seconds"))?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            ticks_ingested_total,
            ticks_rejected_total,
            events_dropped_total,
            storage_retries_total,
            insufficient_data_total,
            scheduler_run_seconds,
            simulation_paused,
            open_positions,
            uptime_seconds,
        })
    }

    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        Ok(encoder.encode_to_string(&metric_families)?)
    }

    pub fn inc_tick_ingested(&self, outcome: &str) {
        self.ticks_ingested_total.with_label_values(&[outcome]).inc();
    }

    pub fn inc_tick_rejected(&self, field: &str) {
        self.ticks_rejected_total.with_label_values(&[field]).inc();
    }

    pub fn inc_events_dropped(&self, topic: &str, n: u64) {
        self.events_dropped_total.with_label_values(&[topic]).inc_by(n as f64);
    }

    pub fn inc_storage_retry(&self, operation: &str) {
        self.storage_retries_total.with_label_values(&[operation]).inc();
    }

    pub fn inc_insufficient_data(&self, timeframe: &str, analyzer: &str) {
        self.insufficient_data_total
            .with_label_values(&[timeframe, analyzer])
            .inc();
    }
}

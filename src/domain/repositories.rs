//! Storage abstractions the application layer programs against. Concrete
//! implementations live under `infrastructure::persistence`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::analysis::{AnalysisRecord, SignalRecord};
use crate::domain::errors::StorageError;
use crate::domain::market::candle::Candle;
use crate::domain::market::instrument::Instrument;
use crate::domain::market::quote::PriceQuote;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::simulation::{DailyPerformance, Position, SimulationConfig};

pub type StoreResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait TickStore: Send + Sync {
    async fn append_tick(&self, tick: &PriceQuote) -> StoreResult<()>;
    async fn fetch_ticks(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> StoreResult<Vec<PriceQuote>>;
    /// Replaces every raw tick older than `cutoff` with a one-per-minute
    /// aggregate. Idempotent: re-running against already-compacted rows is
    /// a no-op.
    async fn compact_ticks_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait CandleStore: Send + Sync {
    async fn upsert_candle(&self, instrument: Instrument, candle: &Candle) -> StoreResult<()>;
    async fn fetch_candles(
        &self,
        instrument: Instrument,
        interval: Timeframe,
        count: usize,
        end_ts: Option<i64>,
    ) -> StoreResult<Vec<Candle>>;
}

#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn insert_analysis(&self, record: &AnalysisRecord) -> StoreResult<()>;
    async fn fetch_latest_analysis(&self, timeframe: Timeframe) -> StoreResult<Option<AnalysisRecord>>;
    async fn fetch_analyses(&self, timeframe: Timeframe, limit: usize) -> StoreResult<Vec<AnalysisRecord>>;
    async fn insert_signal(&self, record: &SignalRecord) -> StoreResult<()>;
    async fn fetch_signals(&self, since: DateTime<Utc>) -> StoreResult<Vec<SignalRecord>>;
}

#[async_trait]
pub trait SimulationStore: Send + Sync {
    async fn list_simulations(&self) -> StoreResult<Vec<SimulationConfig>>;
    async fn create_simulation(&self, config: &SimulationConfig) -> StoreResult<()>;
    async fn insert_position(&self, position: &Position) -> StoreResult<()>;
    async fn update_position_exit(&self, position: &Position) -> StoreResult<()>;
    async fn fetch_open_positions(&self, sim_id: uuid::Uuid) -> StoreResult<Vec<Position>>;
    async fn upsert_daily_performance(&self, performance: &DailyPerformance) -> StoreResult<()>;
}

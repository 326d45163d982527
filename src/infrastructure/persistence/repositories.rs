use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use tokio::time::sleep;
use tracing::warn;
use uuid::Uuid;

use crate::domain::analysis::{AnalysisRecord, SignalRecord};
use crate::domain::errors::StorageError;
use crate::domain::market::candle::Candle;
use crate::domain::market::instrument::Instrument;
use crate::domain::market::quote::PriceQuote;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::repositories::{AnalysisStore, CandleStore, SimulationStore, StoreResult, TickStore};
use crate::domain::simulation::{DailyPerformance, Position, SimulationConfig};
use crate::infrastructure::observability::Metrics;

const RETRY_BACKOFFS_MS: [u64; 3] = [100, 400, 1600];

fn io_err(e: sqlx::Error) -> StorageError {
    StorageError::Io(e.to_string())
}

fn parse_dec(s: &str) -> Result<Decimal, StorageError> {
    Decimal::from_str(s).map_err(|e| StorageError::Corrupt(e.to_string()))
}

/// Retries a transient store write up to 3 times with the same exponential
/// backoff as the compaction task, counting every retry against
/// `storage_retries_total`.
async fn with_retry<T, F, Fut>(metrics: &Metrics, operation: &str, mut f: F) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut last_err = None;
    for backoff_ms in RETRY_BACKOFFS_MS {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                metrics.inc_storage_retry(operation);
                warn!(error = %e, backoff_ms, operation, "store write failed, retrying");
                last_err = Some(e);
                sleep(Duration::from_millis(backoff_ms)).await;
            }
        }
    }
    Err(last_err.expect("loop runs at least once"))
}

/// SQLite-backed implementation of every repository trait the application
/// layer programs against. Decimals round-trip as `TEXT` columns, parsed
/// back with `Decimal::from_str` on read.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    metrics: Arc<Metrics>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, metrics: Arc<Metrics>) -> Self {
        Self { pool, metrics }
    }
}

#[async_trait]
impl TickStore for SqliteStore {
    async fn append_tick(&self, tick: &PriceQuote) -> StoreResult<()> {
        with_retry(&self.metrics, "append_tick", || {
            sqlx::query(
                r#"
                INSERT INTO ticks (ts, gram_gold, ounce_usd, usd_try, ounce_try)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(ts) DO NOTHING
                "#,
            )
            .bind(tick.ts.timestamp_millis())
            .bind(tick.gram_gold.to_string())
            .bind(tick.ounce_usd.to_string())
            .bind(tick.usd_try.to_string())
            .bind(tick.ounce_try.to_string())
            .execute(&self.pool)
        })
        .await
        .map_err(io_err)?;
        Ok(())
    }

    async fn fetch_ticks(&self, since: DateTime<Utc>, until: DateTime<Utc>) -> StoreResult<Vec<PriceQuote>> {
        let rows = sqlx::query("SELECT * FROM ticks WHERE ts >= ? AND ts < ? ORDER BY ts ASC")
            .bind(since.timestamp_millis())
            .bind(until.timestamp_millis())
            .fetch_all(&self.pool)
            .await
            .map_err(io_err)?;

        let mut ticks = Vec::with_capacity(rows.len());
        for row in rows {
            let ts_ms: i64 = row.try_get("ts").map_err(io_err)?;
            let gram_gold: String = row.try_get("gram_gold").map_err(io_err)?;
            let ounce_usd: String = row.try_get("ounce_usd").map_err(io_err)?;
            let usd_try: String = row.try_get("usd_try").map_err(io_err)?;
            let ounce_try: String = row.try_get("ounce_try").map_err(io_err)?;
            ticks.push(PriceQuote {
                ts: DateTime::from_timestamp_millis(ts_ms).ok_or(StorageError::Corrupt("ts".into()))?,
                gram_gold: parse_dec(&gram_gold)?,
                ounce_usd: parse_dec(&ounce_usd)?,
                usd_try: parse_dec(&usd_try)?,
                ounce_try: parse_dec(&ounce_try)?,
            });
        }
        Ok(ticks)
    }

    async fn compact_ticks_older_than(&self, cutoff: DateTime<Utc>) -> StoreResult<u64> {
        let cutoff_ms = cutoff.timestamp_millis();
        let rows = sqlx::query(
            r#"
            SELECT ts, gram_gold, ounce_usd, usd_try, ounce_try FROM ticks
            WHERE ts < ? ORDER BY ts ASC
            "#,
        )
        .bind(cutoff_ms)
        .fetch_all(&self.pool)
        .await
        .map_err(io_err)?;

        if rows.is_empty() {
            return Ok(0);
        }

        let mut by_minute: std::collections::BTreeMap<i64, (Decimal, Decimal, Decimal, Decimal)> =
            std::collections::BTreeMap::new();
        for row in &rows {
            let ts_ms: i64 = row.try_get("ts").map_err(io_err)?;
            let minute_bucket = ts_ms - ts_ms.rem_euclid(60_000);
            let gram_gold = parse_dec(&row.try_get::<String, _>("gram_gold").map_err(io_err)?)?;
            let ounce_usd = parse_dec(&row.try_get::<String, _>("ounce_usd").map_err(io_err)?)?;
            let usd_try = parse_dec(&row.try_get::<String, _>("usd_try").map_err(io_err)?)?;
            let ounce_try = parse_dec(&row.try_get::<String, _>("ounce_try").map_err(io_err)?)?;
            by_minute.insert(minute_bucket, (gram_gold, ounce_usd, usd_try, ounce_try));
        }

        let mut tx = self.pool.begin().await.map_err(io_err)?;
        sqlx::query("DELETE FROM ticks WHERE ts < ?")
            .bind(cutoff_ms)
            .execute(&mut *tx)
            .await
            .map_err(io_err)?;

        let compacted = by_minute.len() as u64;
        for (ts, (gram_gold, ounce_usd, usd_try, ounce_try)) in by_minute {
            sqlx::query(
                r#"
                INSERT INTO ticks (ts, gram_gold, ounce_usd, usd_try, ounce_try)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(ts) DO NOTHING
                "#,
            )
            .bind(ts)
            .bind(gram_gold.to_string())
            .bind(ounce_usd.to_string())
            .bind(usd_try.to_string())
            .bind(ounce_try.to_string())
            .execute(&mut *tx)
            .await
            .map_err(io_err)?;
        }
        tx.commit().await.map_err(io_err)?;
        Ok(compacted)
    }
}

#[async_trait]
impl CandleStore for SqliteStore {
    async fn upsert_candle(&self, instrument: Instrument, candle: &Candle) -> StoreResult<()> {
        with_retry(&self.metrics, "upsert_candle", || {
            sqlx::query(
                r#"
                INSERT INTO candles (instrument, interval, ts_open, open, high, low, close, tick_count, sealed)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(instrument, interval, ts_open) DO UPDATE SET
                    high = excluded.high,
                    low = excluded.low,
                    close = excluded.close,
                    tick_count = excluded.tick_count,
                    sealed = excluded.sealed
                "#,
            )
            .bind(instrument.to_string())
            .bind(candle.interval.to_string())
            .bind(candle.ts_open)
            .bind(candle.open.to_string())
            .bind(candle.high.to_string())
            .bind(candle.low.to_string())
            .bind(candle.close.to_string())
            .bind(candle.tick_count as i64)
            .bind(candle.sealed as i64)
            .execute(&self.pool)
        })
        .await
        .map_err(io_err)?;
        Ok(())
    }

    async fn fetch_candles(
        &self,
        instrument: Instrument,
        interval: Timeframe,
        count: usize,
        end_ts: Option<i64>,
    ) -> StoreResult<Vec<Candle>> {
        let end_ts = end_ts.unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT * FROM candles WHERE instrument = ? AND interval = ? AND ts_open < ?
            ORDER BY ts_open DESC LIMIT ?
            "#,
        )
        .bind(instrument.to_string())
        .bind(interval.to_string())
        .bind(end_ts)
        .bind(count as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(io_err)?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            let tick_count: i64 = row.try_get("tick_count").map_err(io_err)?;
            let sealed: i64 = row.try_get("sealed").map_err(io_err)?;
            candles.push(Candle {
                interval,
                ts_open: row.try_get("ts_open").map_err(io_err)?,
                open: parse_dec(&row.try_get::<String, _>("open").map_err(io_err)?)?,
                high: parse_dec(&row.try_get::<String, _>("high").map_err(io_err)?)?,
                low: parse_dec(&row.try_get::<String, _>("low").map_err(io_err)?)?,
                close: parse_dec(&row.try_get::<String, _>("close").map_err(io_err)?)?,
                tick_count: tick_count as u32,
                sealed: sealed != 0,
            });
        }
        candles.reverse();
        Ok(candles)
    }
}

#[async_trait]
impl AnalysisStore for SqliteStore {
    async fn insert_analysis(&self, record: &AnalysisRecord) -> StoreResult<()> {
        let payload = serde_json::to_string(record).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        with_retry(&self.metrics, "insert_analysis", || {
            sqlx::query(
                r#"
                INSERT INTO analyses (id, timeframe, ts, close, payload_json)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(record.id.to_string())
            .bind(record.timeframe.to_string())
            .bind(record.ts.timestamp_millis())
            .bind(record.close.to_string())
            .bind(payload.clone())
            .execute(&self.pool)
        })
        .await
        .map_err(io_err)?;
        Ok(())
    }

    async fn fetch_latest_analysis(&self, timeframe: Timeframe) -> StoreResult<Option<AnalysisRecord>> {
        let row = sqlx::query("SELECT payload_json FROM analyses WHERE timeframe = ? ORDER BY ts DESC LIMIT 1")
            .bind(timeframe.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(io_err)?;
        match row {
            Some(row) => {
                let payload: String = row.try_get("payload_json").map_err(io_err)?;
                Ok(Some(
                    serde_json::from_str(&payload).map_err(|e| StorageError::Corrupt(e.to_string()))?,
                ))
            }
            None => Ok(None),
        }
    }

    async fn fetch_analyses(&self, timeframe: Timeframe, limit: usize) -> StoreResult<Vec<AnalysisRecord>> {
        let rows = sqlx::query("SELECT payload_json FROM analyses WHERE timeframe = ? ORDER BY ts DESC LIMIT ?")
            .bind(timeframe.to_string())
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(io_err)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.try_get("payload_json").map_err(io_err)?;
            out.push(serde_json::from_str(&payload).map_err(|e| StorageError::Corrupt(e.to_string()))?);
        }
        out.reverse();
        Ok(out)
    }

    async fn insert_signal(&self, record: &SignalRecord) -> StoreResult<()> {
        let payload = serde_json::to_string(record).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        with_retry(&self.metrics, "insert_signal", || {
            sqlx::query(
                r#"
                INSERT INTO signals (id, timeframe, ts, payload_json)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(record.id.to_string())
            .bind(record.timeframe.to_string())
            .bind(record.ts.timestamp_millis())
            .bind(payload.clone())
            .execute(&self.pool)
        })
        .await
        .map_err(io_err)?;
        Ok(())
    }

    async fn fetch_signals(&self, since: DateTime<Utc>) -> StoreResult<Vec<SignalRecord>> {
        let rows = sqlx::query("SELECT payload_json FROM signals WHERE ts >= ? ORDER BY ts ASC")
            .bind(since.timestamp_millis())
            .fetch_all(&self.pool)
            .await
            .map_err(io_err)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.try_get("payload_json").map_err(io_err)?;
            out.push(serde_json::from_str(&payload).map_err(|e| StorageError::Corrupt(e.to_string()))?);
        }
        Ok(out)
    }
}

#[async_trait]
impl SimulationStore for SqliteStore {
    async fn list_simulations(&self) -> StoreResult<Vec<SimulationConfig>> {
        let rows = sqlx::query("SELECT payload_json FROM simulations")
            .fetch_all(&self.pool)
            .await
            .map_err(io_err)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.try_get("payload_json").map_err(io_err)?;
            out.push(serde_json::from_str(&payload).map_err(|e| StorageError::Corrupt(e.to_string()))?);
        }
        Ok(out)
    }

    async fn create_simulation(&self, config: &SimulationConfig) -> StoreResult<()> {
        let payload = serde_json::to_string(config).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        with_retry(&self.metrics, "create_simulation", || {
            sqlx::query("INSERT INTO simulations (id, payload_json) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET payload_json = excluded.payload_json")
                .bind(config.id.to_string())
                .bind(payload.clone())
                .execute(&self.pool)
        })
        .await
        .map_err(io_err)?;
        Ok(())
    }

    async fn insert_position(&self, position: &Position) -> StoreResult<()> {
        let payload = serde_json::to_string(position).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        with_retry(&self.metrics, "insert_position", || {
            sqlx::query(
                r#"
                INSERT INTO positions (id, sim_id, status, payload_json)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET status = excluded.status, payload_json = excluded.payload_json
                "#,
            )
            .bind(position.id.to_string())
            .bind(position.sim_id.to_string())
            .bind(format!("{:?}", position.status))
            .bind(payload.clone())
            .execute(&self.pool)
        })
        .await
        .map_err(io_err)?;
        Ok(())
    }

    async fn update_position_exit(&self, position: &Position) -> StoreResult<()> {
        self.insert_position(position).await
    }

    async fn fetch_open_positions(&self, sim_id: Uuid) -> StoreResult<Vec<Position>> {
        let rows = sqlx::query("SELECT payload_json FROM positions WHERE sim_id = ? AND status = 'Open'")
            .bind(sim_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(io_err)?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let payload: String = row.try_get("payload_json").map_err(io_err)?;
            out.push(serde_json::from_str(&payload).map_err(|e| StorageError::Corrupt(e.to_string()))?);
        }
        Ok(out)
    }

    async fn upsert_daily_performance(&self, performance: &DailyPerformance) -> StoreResult<()> {
        let payload = serde_json::to_string(performance).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        with_retry(&self.metrics, "upsert_daily_performance", || {
            sqlx::query(
                r#"
                INSERT INTO daily_performance (sim_id, date, payload_json)
                VALUES (?, ?, ?)
                ON CONFLICT(sim_id, date) DO UPDATE SET payload_json = excluded.payload_json
                "#,
            )
            .bind(performance.sim_id.to_string())
            .bind(performance.date.to_string())
            .bind(payload.clone())
            .execute(&self.pool)
        })
        .await
        .map_err(io_err)?;
        Ok(())
    }
}

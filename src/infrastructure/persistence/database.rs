use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Connection pool plus schema management for the SQLite-backed store.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("failed to create database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("failed to connect to sqlite database")?;

        info!(%db_url, "connected to database");

        let db = Self { pool };
        db.init().await?;
        Ok(db)
    }

    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ticks (
                ts INTEGER NOT NULL,
                gram_gold TEXT NOT NULL,
                ounce_usd TEXT NOT NULL,
                usd_try TEXT NOT NULL,
                ounce_try TEXT NOT NULL,
                PRIMARY KEY (ts)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create ticks table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_ticks_ts ON ticks (ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create ticks index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candles (
                instrument TEXT NOT NULL,
                interval TEXT NOT NULL,
                ts_open INTEGER NOT NULL,
                open TEXT NOT NULL,
                high TEXT NOT NULL,
                low TEXT NOT NULL,
                close TEXT NOT NULL,
                tick_count INTEGER NOT NULL,
                sealed INTEGER NOT NULL,
                PRIMARY KEY (instrument, interval, ts_open)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create candles table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS analyses (
                id TEXT PRIMARY KEY,
                timeframe TEXT NOT NULL,
                ts INTEGER NOT NULL,
                close TEXT NOT NULL,
                payload_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_analyses_tf_ts ON analyses (timeframe, ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create analyses table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS signals (
                id TEXT PRIMARY KEY,
                timeframe TEXT NOT NULL,
                ts INTEGER NOT NULL,
                payload_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_signals_ts ON signals (ts);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create signals table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS simulations (
                id TEXT PRIMARY KEY,
                payload_json TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create simulations table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                id TEXT PRIMARY KEY,
                sim_id TEXT NOT NULL,
                status TEXT NOT NULL,
                payload_json TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_positions_sim_status ON positions (sim_id, status);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create positions table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_performance (
                sim_id TEXT NOT NULL,
                date TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                PRIMARY KEY (sim_id, date)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("failed to create daily_performance table")?;

        Ok(())
    }
}

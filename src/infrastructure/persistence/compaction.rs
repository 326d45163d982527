use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::domain::repositories::TickStore;
use crate::infrastructure::observability::Metrics;

const RETRY_BACKOFFS_MS: [u64; 3] = [100, 400, 1600];

/// Runs once a day, collapsing raw ticks older than the retention window
/// into one-per-minute aggregates. Retries transient failures with
/// exponential backoff before giving up until the next tick.
pub async fn run(store: Arc<dyn TickStore>, metrics: Arc<Metrics>, interval: Duration, retention_days_raw: i64, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = sleep(interval) => {}
            _ = shutdown.changed() => {
                info!("tick compaction task shutting down");
                return;
            }
        }
        let cutoff = Utc::now() - ChronoDuration::days(retention_days_raw);

        let mut last_err = None;
        let mut compacted = None;
        for backoff_ms in RETRY_BACKOFFS_MS {
            match store.compact_ticks_older_than(cutoff).await {
                Ok(count) => {
                    compacted = Some(count);
                    break;
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms, "tick compaction attempt failed, retrying");
                    metrics.inc_storage_retry("compact_ticks_older_than");
                    last_err = Some(e);
                    sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }

        match compacted {
            Some(count) => info!(compacted_rows = count, %cutoff, "tick compaction complete"),
            None => error!(error = ?last_err, "tick compaction failed after retries, will retry next cycle"),
        }
    }
}

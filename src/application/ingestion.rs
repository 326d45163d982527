use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::domain::market::quote::PriceQuote;
use crate::domain::ports::QuoteAdapter;
use crate::infrastructure::observability::Metrics;

/// Token-bucket rate limiter over a fixed-period refill. Used to keep the
/// ingestion loop from hammering an upstream adapter faster than it wants
/// to be polled.
struct RateLimiter {
    ticker: tokio::time::Interval,
}

impl RateLimiter {
    fn new(period: Duration) -> Self {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { ticker }
    }

    async fn wait(&mut self) {
        self.ticker.tick().await;
    }
}

/// Drives a `QuoteAdapter`, validating and forwarding each quote onto the
/// tick channel. Never halts the pipeline: adapter or validation errors are
/// logged and the loop moves on to the next poll. Honors `shutdown` at every
/// suspension point, finishing the poll already in flight before exiting.
pub async fn run(
    mut adapter: Box<dyn QuoteAdapter>,
    tick_tx: mpsc::Sender<PriceQuote>,
    poll_period: Duration,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut limiter = RateLimiter::new(poll_period);
    loop {
        tokio::select! {
            _ = limiter.wait() => {}
            _ = shutdown.changed() => {
                info!("ingestion loop shutting down");
                return;
            }
        }

        match adapter.next_quote().await {
            Ok(Some(quote)) => match quote.validate() {
                Ok(()) => {
                    metrics.inc_tick_ingested("accepted");
                    debug!(gram_gold = %quote.gram_gold, "ingested quote");
                    if tick_tx.send(quote).await.is_err() {
                        warn!("tick channel closed, stopping ingestion loop");
                        return;
                    }
                }
                Err(e) => {
                    metrics.inc_tick_rejected("validation");
                    warn!(error = %e, "rejected quote");
                }
            },
            Ok(None) => {
                debug!("quote source exhausted, stopping ingestion loop");
                return;
            }
            Err(e) => {
                metrics.inc_tick_ingested("error");
                warn!(error = %e, "adapter error, continuing");
            }
        }
    }
}

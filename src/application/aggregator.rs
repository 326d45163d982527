use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::domain::market::candle::Candle;
use crate::domain::market::instrument::Instrument;
use crate::domain::market::quote::PriceQuote;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::repositories::CandleStore;
use crate::infrastructure::event_bus::{BarClosePayload, Event, EventBus};

/// Folds incoming ticks into per-interval candles, one open bucket per
/// `(instrument, timeframe)` at a time. Rejects clock-regressed ticks and
/// synthesizes gap candles when buckets are skipped entirely.
pub struct Aggregator<S: CandleStore> {
    store: Arc<S>,
    bus: Arc<EventBus>,
    open: HashMap<(Instrument, Timeframe), Candle>,
}

fn price_of(tick: &PriceQuote, instrument: Instrument) -> rust_decimal::Decimal {
    match instrument {
        Instrument::GramGold => tick.gram_gold,
        Instrument::OunceUsd => tick.ounce_usd,
        Instrument::UsdTry => tick.usd_try,
    }
}

impl<S: CandleStore> Aggregator<S> {
    pub fn new(store: Arc<S>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            bus,
            open: HashMap::new(),
        }
    }

    /// Exclusive writer on the open-candle map. Exits once the tick channel
    /// closes or `shutdown` fires, completing whichever tick is in flight.
    pub async fn run(mut self, mut tick_rx: mpsc::Receiver<PriceQuote>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let tick = tokio::select! {
                tick = tick_rx.recv() => match tick {
                    Some(tick) => tick,
                    None => return,
                },
                _ = shutdown.changed() => {
                    info!("aggregator shutting down");
                    return;
                }
            };
            self.bus.publish(Event::PriceUpdate(crate::infrastructure::event_bus::PriceUpdatePayload {
                t: tick.ts,
                g: tick.gram_gold,
                o: tick.ounce_usd,
                u: tick.usd_try,
            }));
            for instrument in Instrument::all() {
                for interval in Timeframe::all() {
                    self.on_tick(instrument, interval, &tick).await;
                }
            }
        }
    }

    async fn on_tick(&mut self, instrument: Instrument, interval: Timeframe, tick: &PriceQuote) {
        let ts_open = interval.floor(tick.ts.timestamp_millis());
        let price = price_of(tick, instrument);
        let key = (instrument, interval);

        match self.open.get(&key) {
            None => {
                let candle = Candle::open_from_price(interval, ts_open, price);
                self.persist(instrument, &candle).await;
                self.open.insert(key, candle);
            }
            Some(current) if ts_open < current.ts_open => {
                warn!(?instrument, ?interval, tick_ts_open = ts_open, open_ts_open = current.ts_open, "rejecting clock-regressed tick");
            }
            Some(current) if ts_open == current.ts_open => {
                let mut candle = current.clone();
                candle.fold(price);
                self.persist(instrument, &candle).await;
                self.open.insert(key, candle);
            }
            Some(current) => {
                let mut sealed = current.clone();
                sealed.seal();
                self.persist(instrument, &sealed).await;
                if instrument == Instrument::GramGold {
                    self.bus.publish(Event::BarClose(BarClosePayload {
                        interval,
                        ts_open: sealed.ts_open,
                        close: sealed.close,
                    }));
                }

                let period_ms = interval.to_seconds() * 1000;
                let mut cursor = sealed.ts_open + period_ms;
                let last_close = sealed.close;
                while cursor < ts_open {
                    let gap = Candle::synthesize_gap(interval, cursor, last_close);
                    self.persist(instrument, &gap).await;
                    let mut sealed_gap = gap.clone();
                    sealed_gap.seal();
                    self.persist(instrument, &sealed_gap).await;
                    if instrument == Instrument::GramGold {
                        self.bus.publish(Event::BarClose(BarClosePayload {
                            interval,
                            ts_open: sealed_gap.ts_open,
                            close: sealed_gap.close,
                        }));
                    }
                    cursor += period_ms;
                }

                let candle = Candle::open_from_price(interval, ts_open, price);
                self.persist(instrument, &candle).await;
                self.open.insert(key, candle);
            }
        }
    }

    async fn persist(&self, instrument: Instrument, candle: &Candle) {
        if let Err(e) = self.store.upsert_candle(instrument, candle).await {
            warn!(error = %e, ?instrument, interval = ?candle.interval, "failed to persist candle");
        }
    }
}

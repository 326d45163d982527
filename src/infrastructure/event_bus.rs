use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::domain::analysis::{AnalysisRecord, SignalRecord};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::simulation::Position;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    PriceUpdate,
    BarClose,
    AnalysisReady,
    Signal,
    PositionOpened,
    PositionClosed,
    DailyRoll,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdatePayload {
    pub t: DateTime<Utc>,
    pub g: Decimal,
    pub o: Decimal,
    pub u: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarClosePayload {
    pub interval: Timeframe,
    pub ts_open: i64,
    pub close: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRollPayload {
    pub sim_id: Uuid,
    pub date: chrono::NaiveDate,
}

/// Every event shape a subscriber can receive, one variant per topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    PriceUpdate(PriceUpdatePayload),
    BarClose(BarClosePayload),
    AnalysisReady(AnalysisRecord),
    Signal(SignalRecord),
    PositionOpened(Position),
    PositionClosed(Position),
    DailyRoll(DailyRollPayload),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::PriceUpdate(_) => Topic::PriceUpdate,
            Event::BarClose(_) => Topic::BarClose,
            Event::AnalysisReady(_) => Topic::AnalysisReady,
            Event::Signal(_) => Topic::Signal,
            Event::PositionOpened(_) => Topic::PositionOpened,
            Event::PositionClosed(_) => Topic::PositionClosed,
            Event::DailyRoll(_) => Topic::DailyRoll,
        }
    }
}

struct TopicChannel {
    sender: broadcast::Sender<Event>,
    dropped: AtomicU64,
}

/// Fan-out broadcaster over one bounded `broadcast` channel per topic.
///
/// `tokio::sync::broadcast` already gives the exact delivery semantics
/// wanted here: a slow subscriber lags and silently skips old messages
/// instead of back-pressuring the publisher. `dropped` tallies those skips,
/// read off `RecvError::Lagged(n)` inside `EventBus::recv`.
pub struct EventBus {
    channels: [TopicChannel; 7],
}

fn topic_index(topic: Topic) -> usize {
    match topic {
        Topic::PriceUpdate => 0,
        Topic::BarClose => 1,
        Topic::AnalysisReady => 2,
        Topic::Signal => 3,
        Topic::PositionOpened => 4,
        Topic::PositionClosed => 5,
        Topic::DailyRoll => 6,
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: std::array::from_fn(|_| TopicChannel {
                sender: broadcast::channel(capacity).0,
                dropped: AtomicU64::new(0),
            }),
        }
    }

    /// Publishes to the event's own topic channel. Never blocks; a channel
    /// with no subscribers simply drops the event.
    pub fn publish(&self, event: Event) {
        let channel = &self.channels[topic_index(event.topic())];
        let _ = channel.sender.send(event);
    }

    /// Registers a new subscriber for `topic`. The returned `Subscription`
    /// both receives events and tracks how many it has lost to lag.
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        let channel = &self.channels[topic_index(topic)];
        Subscription {
            topic,
            receiver: channel.sender.subscribe(),
        }
    }

    pub fn dropped_count(&self, topic: Topic) -> u64 {
        self.channels[topic_index(topic)].dropped.load(Ordering::Relaxed)
    }

    fn note_drop(&self, topic: Topic, n: u64) {
        self.channels[topic_index(topic)].dropped.fetch_add(n, Ordering::Relaxed);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A live subscription handle. Dropping it unsubscribes: no further
/// deliveries reach it once it goes out of scope.
pub struct Subscription {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Awaits the next event, transparently skipping past any lag gap and
    /// reporting it back to the owning bus's drop counter.
    pub async fn recv(&mut self, bus: &EventBus) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    bus.note_drop(self.topic, n);
                    warn!(topic = ?self.topic, skipped = n, "subscriber lagged, dropping oldest events");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

pub type EventBusHandle = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe(Topic::PriceUpdate);
        bus.publish(Event::PriceUpdate(PriceUpdatePayload {
            t: Utc::now(),
            g: dec!(2000),
            o: dec!(2000),
            u: dec!(32.5),
        }));
        let event = sub.recv(&bus).await.unwrap();
        assert!(matches!(event, Event::PriceUpdate(_)));
    }

    #[tokio::test]
    async fn lagging_subscriber_increments_dropped_counter() {
        let bus = EventBus::with_capacity(2);
        let mut sub = bus.subscribe(Topic::PriceUpdate);
        for _ in 0..5 {
            bus.publish(Event::PriceUpdate(PriceUpdatePayload {
                t: Utc::now(),
                g: dec!(2000),
                o: dec!(2000),
                u: dec!(32.5),
            }));
        }
        sub.recv(&bus).await;
        assert!(bus.dropped_count(Topic::PriceUpdate) > 0);
    }

    #[tokio::test]
    async fn unrelated_topics_do_not_interfere() {
        let bus = EventBus::new();
        let mut price_sub = bus.subscribe(Topic::PriceUpdate);
        bus.publish(Event::DailyRoll(DailyRollPayload {
            sim_id: Uuid::new_v4(),
            date: Utc::now().date_naive(),
        }));
        let timeout = tokio::time::timeout(std::time::Duration::from_millis(50), price_sub.recv(&bus)).await;
        assert!(timeout.is_err());
    }
}

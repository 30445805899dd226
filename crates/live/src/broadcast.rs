//! Fan-out of live events.
//!
//! Subscribers each hold a receiver on a bounded `tokio::sync::broadcast`
//! channel. Delivery is best-effort: a dropped receiver simply stops counting
//! and a receiver that falls too far behind skips ahead.

use std::collections::BTreeMap;

use tokio::sync::broadcast;
use tracing::debug;

use mrqa_compliance::ComplianceRecord;

use crate::event::LiveEvent;
use crate::tracker::SharedTracker;

#[derive(Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<String>,
    tracker: SharedTracker,
}

impl Broadcaster {
    pub fn new(capacity: usize, tracker: SharedTracker) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, tracker }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    /// Send `event` to every connected subscriber. Returns how many there were.
    pub fn publish(&self, event: &LiveEvent) -> usize {
        match self.tx.send(event.to_json()) {
            Ok(n) => {
                debug!(station = event.station(), subscribers = n, "live event published");
                n
            }
            Err(_) => {
                debug!(station = event.station(), "no subscribers");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// What is known now: the last check result per station.
    pub async fn snapshot(&self) -> BTreeMap<String, ComplianceRecord> {
        self.tracker.read().await.snapshot()
    }

    pub fn tracker(&self) -> &SharedTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::{SeriesSignature, StationTracker};
    use mrqa_core::FieldMap;

    fn update(n: u64) -> LiveEvent {
        LiveEvent::Update {
            station: "AWP167046".into(),
            content: n,
        }
    }

    #[tokio::test]
    async fn every_subscriber_gets_each_event() {
        let b = Broadcaster::new(16, StationTracker::shared());
        let mut one = b.subscribe();
        let mut two = b.subscribe();

        assert_eq!(b.publish(&update(1)), 2);
        assert_eq!(one.recv().await.unwrap(), update(1).to_json());
        assert_eq!(two.recv().await.unwrap(), update(1).to_json());
    }

    #[tokio::test]
    async fn disconnected_subscribers_are_dropped() {
        let b = Broadcaster::new(16, StationTracker::shared());
        assert_eq!(b.publish(&update(1)), 0);

        let gone = b.subscribe();
        let mut kept = b.subscribe();
        drop(gone);
        assert_eq!(b.subscriber_count(), 1);
        assert_eq!(b.publish(&update(2)), 1);
        assert_eq!(kept.recv().await.unwrap(), update(2).to_json());
    }

    #[tokio::test]
    async fn snapshot_reads_tracker_state() {
        let tracker = StationTracker::shared();
        let b = Broadcaster::new(4, tracker.clone());
        assert!(b.snapshot().await.is_empty());

        let signature = SeriesSignature::new("1", "HabitTask");
        let record = ComplianceRecord::without_template(FieldMap::new());
        {
            let mut t = tracker.write().await;
            t.on_event("AWP167046", signature.clone());
            t.record_result("AWP167046", &signature, record.clone());
        }
        assert_eq!(b.snapshot().await.get("AWP167046"), Some(&record));
    }
}

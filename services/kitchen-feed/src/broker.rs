//! Fan-out broker: delivers each published order event to every display
//! that is connected at dispatch time
//!
//! Delivery is best-effort and at-most-once per connection. The broker never
//! waits on a display: it offers the shared frame to each queue and moves on.
//! A display whose queue is full is evicted; one whose session is gone is
//! unregistered. Neither outcome is an error for the publisher.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use tracing::{debug, warn};
use types::ids::ConnectionId;
use types::order::OrderEvent;

use crate::backpressure::BackpressureAction;
use crate::error::FeedError;
use crate::events::OutboundFrame;
use crate::metrics::FeedMetrics;
use crate::registry::{ActiveConnection, ConnectionRegistry};

/// Outcome of one publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Broker sequence assigned to the event
    pub sequence: u64,
    /// Displays the frame was queued for
    pub delivered: Vec<ConnectionId>,
    /// Displays evicted as slow consumers during this publish
    pub evicted: Vec<ConnectionId>,
    /// Displays found already disconnected and cleaned up
    pub gone: Vec<ConnectionId>,
}

impl PublishReport {
    fn new(sequence: u64) -> Self {
        Self {
            sequence,
            delivered: Vec::new(),
            evicted: Vec::new(),
            gone: Vec::new(),
        }
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }
}

pub struct OrderBroker {
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<FeedMetrics>,
    /// Last assigned sequence. Held for the whole fan-out so that publish
    /// order is the delivery order on every connection.
    sequence: Mutex<u64>,
}

impl OrderBroker {
    pub fn new(registry: Arc<ConnectionRegistry>, metrics: Arc<FeedMetrics>) -> Self {
        Self {
            registry,
            metrics,
            sequence: Mutex::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<FeedMetrics> {
        &self.metrics
    }

    /// Sequence of the most recent publish (0 before the first).
    pub fn last_sequence(&self) -> u64 {
        *self.sequence.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `event` to every display currently open.
    ///
    /// Only fails if the event cannot be serialized, in which case nothing
    /// is delivered and the sequence does not advance.
    pub fn publish(&self, event: &OrderEvent) -> Result<PublishReport, FeedError> {
        let started = Instant::now();
        let mut sequence = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);

        let frame = OutboundFrame::from_event(*sequence + 1, event)?;
        *sequence = frame.sequence;

        let mut report = PublishReport::new(frame.sequence);
        for connection in self.registry.list_active() {
            match connection.outbound.offer(frame.clone()) {
                Ok(()) => report.delivered.push(connection.id),
                Err(BackpressureAction::DisconnectClient { queued }) => {
                    self.evict(&connection, queued);
                    report.evicted.push(connection.id);
                }
                Err(BackpressureAction::ClientGone) => {
                    self.registry.unregister(connection.id);
                    debug!(connection_id = connection.id.get(), "Removed departed display");
                    report.gone.push(connection.id);
                }
            }
        }
        drop(sequence);

        self.metrics.record_publish(
            report.delivered.len() as u64,
            started.elapsed().as_nanos() as u64,
        );
        debug!(
            sequence = report.sequence,
            event_type = event.kind().as_str(),
            delivered = report.delivered.len(),
            evicted = report.evicted.len(),
            "Published order event"
        );

        Ok(report)
    }

    fn evict(&self, connection: &ActiveConnection, queued: usize) {
        connection.outbound.evict();
        self.registry.mark_closing(connection.id);
        self.registry.unregister(connection.id);
        self.metrics.record_eviction();

        let err = FeedError::SlowConsumer {
            id: connection.id,
            queued,
        };
        warn!(
            connection_id = connection.id.get(),
            queued,
            error = %err,
            "Backpressure: disconnecting lagging display"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backpressure::outbound_queue;
    use chrono::{TimeZone, Utc};
    use types::ids::StoreId;

    fn setup() -> OrderBroker {
        OrderBroker::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(FeedMetrics::new()),
        )
    }

    fn order(product: &str, quantity: u32) -> OrderEvent {
        let at = Utc.with_ymd_and_hms(2026, 2, 14, 7, 45, 0).unwrap();
        OrderEvent::new_order(product, quantity, StoreId::new(1), at).unwrap()
    }

    #[test]
    fn test_publish_with_no_displays() {
        let broker = setup();
        let report = broker.publish(&order("Latte", 1)).unwrap();

        assert_eq!(report.sequence, 1);
        assert_eq!(report.delivered_count(), 0);
        assert!(report.evicted.is_empty());
    }

    #[test]
    fn test_fanout_to_every_display() {
        let broker = setup();
        let (tx1, mut rx1) = outbound_queue(8);
        let (tx2, mut rx2) = outbound_queue(8);
        let id1 = broker.registry().register(tx1).unwrap();
        let id2 = broker.registry().register(tx2).unwrap();

        let report = broker.publish(&order("Latte", 2)).unwrap();
        assert_eq!(report.delivered, vec![id1, id2]);

        let f1 = rx1.try_recv().unwrap();
        let f2 = rx2.try_recv().unwrap();
        assert_eq!(f1.payload, f2.payload);
        assert!(Arc::ptr_eq(&f1.payload, &f2.payload));
    }

    #[test]
    fn test_sequences_increase() {
        let broker = setup();
        let (tx, mut rx) = outbound_queue(8);
        broker.registry().register(tx);

        for i in 1..=3 {
            broker.publish(&order("Mocha", i)).unwrap();
        }

        let seqs: Vec<u64> = std::iter::from_fn(|| rx.try_recv()).map(|f| f.sequence).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(broker.last_sequence(), 3);
    }

    #[test]
    fn test_slow_display_evicted_others_served() {
        let broker = setup();
        let (slow_tx, slow_rx) = outbound_queue(1);
        let (fast_tx, mut fast_rx) = outbound_queue(8);
        let slow = broker.registry().register(slow_tx).unwrap();
        let fast = broker.registry().register(fast_tx).unwrap();

        broker.publish(&order("Latte", 1)).unwrap();
        let report = broker.publish(&order("Latte", 2)).unwrap();

        assert_eq!(report.evicted, vec![slow]);
        assert_eq!(report.delivered, vec![fast]);
        assert!(slow_rx.is_evicted());
        assert_eq!(broker.registry().state_of(slow), None);
        assert_eq!(fast_rx.try_recv().unwrap().sequence, 1);
        assert_eq!(fast_rx.try_recv().unwrap().sequence, 2);

        // Later publishes are unaffected by the evicted display.
        let report = broker.publish(&order("Latte", 3)).unwrap();
        assert_eq!(report.delivered, vec![fast]);
        assert!(report.evicted.is_empty());
    }

    #[test]
    fn test_departed_display_cleaned_up() {
        let broker = setup();
        let (tx, rx) = outbound_queue(8);
        let id = broker.registry().register(tx).unwrap();
        drop(rx);

        let report = broker.publish(&order("Latte", 1)).unwrap();
        assert_eq!(report.gone, vec![id]);
        assert!(broker.registry().is_empty());
    }

    #[test]
    fn test_late_display_gets_nothing_earlier() {
        let broker = setup();
        broker.publish(&order("Latte", 1)).unwrap();

        let (tx, mut rx) = outbound_queue(8);
        broker.registry().register(tx);
        assert!(rx.try_recv().is_none());

        broker.publish(&order("Mocha", 1)).unwrap();
        assert_eq!(rx.try_recv().unwrap().sequence, 2);
    }

    #[test]
    fn test_metrics_recorded() {
        let broker = setup();
        let (tx, _rx) = outbound_queue(8);
        broker.registry().register(tx);
        broker.publish(&order("Latte", 1)).unwrap();

        let exported = broker.metrics().export();
        assert_eq!(exported["events_published"], 1);
        assert_eq!(exported["frames_queued"], 1);
    }
}

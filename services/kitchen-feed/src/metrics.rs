//! Observability counters for the display feed
//!
//! Tracks publishes, fan-out latency, connection churn and the reasons
//! connections end. Exported as a flat map for the health endpoint.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::lifecycle::CloseReason;

/// Core metrics for the display feed.
pub struct FeedMetrics {
    // Publishing
    pub events_published: AtomicU64,
    pub frames_queued: AtomicU64,
    pub fanout_latency_ns: Mutex<LatencyTracker>,

    // Connections
    pub connections_opened: AtomicU64,
    pub connections_closed: AtomicU64,
    pub handshake_failures: AtomicU64,

    // Close reasons worth alerting on
    pub slow_consumer_evictions: AtomicU64,
    pub heartbeat_expiries: AtomicU64,
    pub transport_errors: AtomicU64,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self {
            events_published: AtomicU64::new(0),
            frames_queued: AtomicU64::new(0),
            fanout_latency_ns: Mutex::new(LatencyTracker::new(1000)),
            connections_opened: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            handshake_failures: AtomicU64::new(0),
            slow_consumer_evictions: AtomicU64::new(0),
            heartbeat_expiries: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
        }
    }

    /// Record one publish and how many queues accepted its frame.
    pub fn record_publish(&self, frames_queued: u64, latency_ns: u64) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.frames_queued.fetch_add(frames_queued, Ordering::Relaxed);
        if let Ok(mut tracker) = self.fanout_latency_ns.lock() {
            tracker.record(latency_ns);
        }
    }

    /// Record a broker-side eviction of a lagging display.
    pub fn record_eviction(&self) {
        self.slow_consumer_evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// A display that never reached `open`. Not counted as a close, since
    /// it was never counted as opened.
    pub fn record_handshake_failure(&self) {
        self.handshake_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an opened connection reaching `closed`, bucketed by reason.
    pub fn record_closed(&self, reason: CloseReason) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
        match reason {
            CloseReason::HeartbeatTimeout => {
                self.heartbeat_expiries.fetch_add(1, Ordering::Relaxed);
            }
            CloseReason::TransportError => {
                self.transport_errors.fetch_add(1, Ordering::Relaxed);
            }
            // Evictions are counted by the broker when it drops the queue;
            // a writer-side send timeout is counted here.
            CloseReason::SlowConsumer => {
                self.slow_consumer_evictions.fetch_add(1, Ordering::Relaxed);
            }
            CloseReason::HandshakeFailed
            | CloseReason::ClientClosed
            | CloseReason::Evicted
            | CloseReason::Shutdown => {}
        }
    }

    /// Export metrics as a BTreeMap for the health endpoint.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let mut m = BTreeMap::new();
        m.insert("events_published".to_string(), self.events_published.load(Ordering::Relaxed));
        m.insert("frames_queued".to_string(), self.frames_queued.load(Ordering::Relaxed));
        m.insert("connections_opened".to_string(), self.connections_opened.load(Ordering::Relaxed));
        m.insert("connections_closed".to_string(), self.connections_closed.load(Ordering::Relaxed));
        m.insert("handshake_failures".to_string(), self.handshake_failures.load(Ordering::Relaxed));
        m.insert(
            "slow_consumer_evictions".to_string(),
            self.slow_consumer_evictions.load(Ordering::Relaxed),
        );
        m.insert("heartbeat_expiries".to_string(), self.heartbeat_expiries.load(Ordering::Relaxed));
        m.insert("transport_errors".to_string(), self.transport_errors.load(Ordering::Relaxed));
        if let Ok(tracker) = self.fanout_latency_ns.lock() {
            if let Some(p99) = tracker.percentile(99) {
                m.insert("fanout_latency_p99_ns".to_string(), p99);
            }
        }
        m
    }
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks latency samples for percentile calculation.
pub struct LatencyTracker {
    samples: VecDeque<u64>,
    max_samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    /// Record a latency sample.
    pub fn record(&mut self, value: u64) {
        if self.max_samples == 0 {
            return;
        }
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Get a percentile value (0-100).
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (p as f64 / 100.0 * (sorted.len() - 1) as f64) as usize;
        Some(sorted[idx.min(sorted.len() - 1)])
    }

    /// Number of samples recorded.
    pub fn count(&self) -> usize {
        self.samples.len()
    }
}

//! Configuration for the display feed

use std::time::Duration;

/// Tunables for display connections and the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Frames a connection may have queued before it counts as a slow
    /// consumer and is evicted.
    pub outbound_capacity: usize,
    /// Upper bound on a single socket write.
    pub send_timeout: Duration,
    /// Time between keep-alive pings.
    pub heartbeat_interval: Duration,
    /// Consecutive unanswered pings before the connection is expired.
    pub max_missed_heartbeats: u32,
    /// Upper bound on upgrade + welcome frame.
    pub handshake_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 64,
            send_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(15),
            max_missed_heartbeats: 3,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl FeedConfig {
    /// How long a silent display survives: `interval * (max_missed + 1)`.
    pub fn liveness_window(&self) -> Duration {
        self.heartbeat_interval * (self.max_missed_heartbeats + 1)
    }
}

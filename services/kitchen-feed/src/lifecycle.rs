//! Per-connection state machine
//!
//! ```text
//! connecting ──► open ──► closing ──► closed
//!      │                                ▲
//!      └──────── handshake failure ─────┘
//! ```
//!
//! Entering `open` registers the connection. Reaching `closed` unregisters
//! it, exactly once, whichever path got there: client close, transport
//! error, heartbeat expiry, eviction or drop.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use types::ids::ConnectionId;

use crate::backpressure::OutboundSender;
use crate::error::FeedError;
use crate::metrics::FeedMetrics;
use crate::registry::ConnectionRegistry;

/// Lifecycle state of one display connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ConnectionState {
    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Open) | (Connecting, Closed) | (Open, Closing) | (Closing, Closed)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a connection ended. Recorded for logs and metrics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    HandshakeFailed,
    ClientClosed,
    TransportError,
    HeartbeatTimeout,
    /// A socket write exceeded the send timeout.
    SlowConsumer,
    /// The broker dropped the queue after it overflowed.
    Evicted,
    Shutdown,
}

impl CloseReason {
    pub fn as_str(self) -> &'static str {
        match self {
            CloseReason::HandshakeFailed => "handshake_failed",
            CloseReason::ClientClosed => "client_closed",
            CloseReason::TransportError => "transport_error",
            CloseReason::HeartbeatTimeout => "heartbeat_timeout",
            CloseReason::SlowConsumer => "slow_consumer",
            CloseReason::Evicted => "evicted",
            CloseReason::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One display connection driven through its lifecycle.
///
/// Owns its registry membership: dropping a connection that has not reached
/// `closed` closes it with [`CloseReason::Shutdown`].
pub struct DisplayConnection {
    registry: Arc<ConnectionRegistry>,
    metrics: Arc<FeedMetrics>,
    state: ConnectionState,
    id: Option<ConnectionId>,
    close_reason: Option<CloseReason>,
}

impl DisplayConnection {
    /// A connection in `connecting`, not yet visible to the broker.
    pub fn new(registry: Arc<ConnectionRegistry>, metrics: Arc<FeedMetrics>) -> Self {
        Self {
            registry,
            metrics,
            state: ConnectionState::Connecting,
            id: None,
            close_reason: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Registry id, assigned on entry to `open`.
    pub fn id(&self) -> Option<ConnectionId> {
        self.id
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    fn transition(&mut self, next: ConnectionState) -> Result<(), FeedError> {
        if !self.state.can_transition_to(next) {
            return Err(FeedError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(
            connection_id = self.id.map(|id| id.get()),
            from = %self.state,
            to = %next,
            "Connection transition"
        );
        self.state = next;
        Ok(())
    }

    /// Handshake complete: `connecting -> open`, and register with the
    /// registry so the next publish reaches this display.
    ///
    /// Fails and stays in `connecting` if the registry is shutting down.
    pub fn open(&mut self, outbound: OutboundSender) -> Result<ConnectionId, FeedError> {
        if !self.state.can_transition_to(ConnectionState::Open) {
            return Err(FeedError::InvalidTransition {
                from: self.state,
                to: ConnectionState::Open,
            });
        }
        let id = self
            .registry
            .register(outbound)
            .ok_or_else(|| FeedError::Connection {
                id: None,
                reason: "registry is shutting down".into(),
            })?;
        self.id = Some(id);
        self.transition(ConnectionState::Open)?;
        self.metrics.record_opened();
        info!(connection_id = id.get(), "Display connected");
        Ok(id)
    }

    /// `open -> closing`. The entry stays registered but is skipped by
    /// snapshots until [`finish_close`](Self::finish_close).
    pub fn begin_close(&mut self, reason: CloseReason) -> Result<(), FeedError> {
        self.transition(ConnectionState::Closing)?;
        self.close_reason = Some(reason);
        if let Some(id) = self.id {
            self.registry.mark_closing(id);
        }
        Ok(())
    }

    /// `closing -> closed`, unregistering the connection.
    pub fn finish_close(&mut self) -> Result<(), FeedError> {
        self.transition(ConnectionState::Closed)?;
        self.release();
        Ok(())
    }

    /// Drive the connection to `closed` from wherever it is.
    ///
    /// `connecting` goes straight to `closed` (handshake failure). Returns
    /// `false` if the connection was already closed; the first recorded
    /// reason wins.
    pub fn close(&mut self, reason: CloseReason) -> bool {
        match self.state {
            ConnectionState::Closed => false,
            ConnectionState::Connecting => {
                self.close_reason = Some(reason);
                self.state = ConnectionState::Closed;
                self.release();
                true
            }
            ConnectionState::Open => {
                self.close_reason = Some(reason);
                self.state = ConnectionState::Closing;
                if let Some(id) = self.id {
                    self.registry.mark_closing(id);
                }
                self.state = ConnectionState::Closed;
                self.release();
                true
            }
            ConnectionState::Closing => {
                self.state = ConnectionState::Closed;
                self.release();
                true
            }
        }
    }

    // Reached only on the single transition into `closed`.
    fn release(&mut self) {
        let reason = self.close_reason.unwrap_or(CloseReason::Shutdown);
        match self.id {
            Some(id) => {
                self.registry.unregister(id);
                info!(connection_id = id.get(), reason = %reason, "Display disconnected");
                self.metrics.record_closed(reason);
            }
            None => {
                debug!(reason = %reason, "Display closed before handshake completed");
                self.metrics.record_handshake_failure();
            }
        }
    }
}

impl Drop for DisplayConnection {
    fn drop(&mut self) {
        self.close(CloseReason::Shutdown);
    }
}

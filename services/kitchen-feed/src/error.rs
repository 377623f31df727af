//! Error types for the display feed
//!
//! Everything here is local to one display connection, except
//! `Serialization`, which the broker reports to its caller. None of the
//! connection errors ever reach Order Ingress.

use thiserror::Error;
use types::ids::ConnectionId;

use crate::lifecycle::ConnectionState;

#[derive(Error, Debug)]
pub enum FeedError {
    /// Handshake or transport failure on one connection.
    #[error("connection {id:?} failed: {reason}")]
    Connection {
        id: Option<ConnectionId>,
        reason: String,
    },

    /// Outbound queue overflowed or a write exceeded the send timeout.
    #[error("connection {id} is a slow consumer ({queued} frames queued)")]
    SlowConsumer { id: ConnectionId, queued: usize },

    #[error("connection {id} missed {missed} consecutive heartbeats")]
    HeartbeatTimeout { id: ConnectionId, missed: u32 },

    #[error("invalid connection transition from {from} to {to}")]
    InvalidTransition {
        from: ConnectionState,
        to: ConnectionState,
    },

    #[error("failed to serialize frame: {0}")]
    Serialization(#[from] serde_json::Error),
}

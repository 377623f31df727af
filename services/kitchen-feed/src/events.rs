//! Frames pushed down display connections
//!
//! An [`OutboundFrame`] is the serialized form of one published event. It is
//! built once per `publish` and shared by reference count with every queue,
//! so all displays receive byte-identical payloads.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use types::order::OrderEvent;

use crate::error::FeedError;

/// A serialized event, tagged with the broker sequence it was published at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    /// Broker-global publish sequence (starts at 1)
    pub sequence: u64,
    /// JSON text sent as one WebSocket text message
    pub payload: Arc<str>,
}

impl OutboundFrame {
    /// Serialize an order event into a shareable frame.
    pub fn from_event(sequence: u64, event: &OrderEvent) -> Result<Self, FeedError> {
        let json = serde_json::to_string(event)?;
        Ok(Self {
            sequence,
            payload: Arc::from(json),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.payload
    }
}

/// Control messages the server sends outside the order stream.
///
/// Displays that only understand `NEW_ORDER` skip these by their `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlFrame {
    /// Sent once, right after the upgrade. Completes the handshake.
    Connected { heartbeat_interval_ms: u64 },
}

impl ControlFrame {
    pub fn to_json(&self) -> Result<String, FeedError> {
        Ok(serde_json::to_string(self)?)
    }
}

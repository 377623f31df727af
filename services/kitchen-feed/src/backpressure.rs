//! Backpressure and flow control for display connections
//!
//! Each display gets a bounded outbound queue between the broker and the
//! socket writer. The broker only ever offers frames without waiting; a full
//! queue means the display cannot keep up and must be disconnected rather
//! than allowed to stall the fan-out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::events::OutboundFrame;

/// Action to take when an offer cannot be queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackpressureAction {
    /// Queue is at capacity: the client should be disconnected.
    DisconnectClient { queued: usize },
    /// The receiving session is already gone.
    ClientGone,
}

#[derive(Debug, Default)]
struct QueueShared {
    evicted: AtomicBool,
}

/// Producer half, held by the registry entry and cloned into broker snapshots.
#[derive(Debug, Clone)]
pub struct OutboundSender {
    tx: mpsc::Sender<OutboundFrame>,
    shared: Arc<QueueShared>,
    capacity: usize,
}

/// Consumer half, owned by the connection's session task.
#[derive(Debug)]
pub struct OutboundReceiver {
    rx: mpsc::Receiver<OutboundFrame>,
    shared: Arc<QueueShared>,
}

/// Create a bounded outbound queue. A capacity of zero is treated as one.
pub fn outbound_queue(capacity: usize) -> (OutboundSender, OutboundReceiver) {
    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    let shared = Arc::new(QueueShared::default());

    (
        OutboundSender {
            tx,
            shared: Arc::clone(&shared),
            capacity,
        },
        OutboundReceiver { rx, shared },
    )
}

impl OutboundSender {
    /// Queue a frame without waiting.
    pub fn offer(&self, frame: OutboundFrame) -> Result<(), BackpressureAction> {
        if self.shared.evicted.load(Ordering::Acquire) {
            return Err(BackpressureAction::ClientGone);
        }

        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(BackpressureAction::DisconnectClient {
                queued: self.depth(),
            }),
            Err(TrySendError::Closed(_)) => Err(BackpressureAction::ClientGone),
        }
    }

    /// Frames currently waiting to be written.
    pub fn depth(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mark the queue as evicted. The session stops at its next receive even
    /// if other snapshot clones of this sender are still alive.
    pub fn evict(&self) {
        self.shared.evicted.store(true, Ordering::Release);
    }

    /// Whether the session has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl OutboundReceiver {
    /// Next frame, or `None` once the queue was evicted or every sender is gone.
    pub async fn recv(&mut self) -> Option<OutboundFrame> {
        if self.is_evicted() {
            return None;
        }
        self.rx.recv().await
    }

    /// Non-waiting variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<OutboundFrame> {
        if self.is_evicted() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    pub fn is_evicted(&self) -> bool {
        self.shared.evicted.load(Ordering::Acquire)
    }

    /// Frames queued and not yet received.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

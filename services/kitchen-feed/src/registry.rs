//! Connection registry: the single source of truth for who is listening
//!
//! One entry per open display connection, keyed by a connection id that is
//! never reused. Every operation takes the registry lock for exactly its own
//! duration; `list_active` hands out a cloned snapshot so the broker never
//! holds the lock while it delivers.
//!
//! Uses BTreeMap so snapshots come out in connection order.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tracing::debug;
use types::ids::ConnectionId;

use crate::backpressure::OutboundSender;
use crate::lifecycle::ConnectionState;

/// One registered display.
#[derive(Debug)]
struct RegistryEntry {
    state: ConnectionState,
    outbound: OutboundSender,
    registered_at: Instant,
}

/// Snapshot element handed to the broker.
#[derive(Debug, Clone)]
pub struct ActiveConnection {
    pub id: ConnectionId,
    pub outbound: OutboundSender,
}

/// Registry of live display connections.
///
/// Constructed at service start and torn down with [`close_all`](Self::close_all)
/// at service stop; share it behind an `Arc`.
pub struct ConnectionRegistry {
    entries: Mutex<BTreeMap<ConnectionId, RegistryEntry>>,
    next_id: AtomicU64,
    shutting_down: AtomicBool,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            shutting_down: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ConnectionId, RegistryEntry>> {
        // Entries stay consistent even if a holder panicked: every critical
        // section is a single map operation.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an open connection and return its fresh id.
    ///
    /// Returns `None` once [`close_all`](Self::close_all) has begun; the
    /// refused queue is evicted so nothing is ever delivered through it.
    pub fn register(&self, outbound: OutboundSender) -> Option<ConnectionId> {
        let mut entries = self.lock();
        // Checked under the lock: close_all raises the flag before it drains,
        // so no entry can slip in behind the drain.
        if self.is_shutting_down() {
            outbound.evict();
            debug!("Refused display registration during shutdown");
            return None;
        }
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        entries.insert(
            id,
            RegistryEntry {
                state: ConnectionState::Open,
                outbound,
                registered_at: Instant::now(),
            },
        );
        debug!(connection_id = id.get(), displays = entries.len(), "Registered display");
        Some(id)
    }

    /// Remove a connection. Returns `false` if it was already gone.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = {
            let mut entries = self.lock();
            entries.remove(&id)
        };

        match removed {
            Some(entry) => {
                debug!(
                    connection_id = id.get(),
                    connected_for_ms = entry.registered_at.elapsed().as_millis() as u64,
                    "Unregistered display"
                );
                true
            }
            None => false,
        }
    }

    /// Flag an entry as `closing` so snapshots skip it while its session
    /// finishes tearing down.
    pub fn mark_closing(&self, id: ConnectionId) -> bool {
        match self.lock().get_mut(&id) {
            Some(entry) => {
                entry.state = ConnectionState::Closing;
                true
            }
            None => false,
        }
    }

    /// Snapshot of every `open` connection, in ascending id order.
    pub fn list_active(&self) -> Vec<ActiveConnection> {
        self.lock()
            .iter()
            .filter(|(_, entry)| entry.state == ConnectionState::Open)
            .map(|(id, entry)| ActiveConnection {
                id: *id,
                outbound: entry.outbound.clone(),
            })
            .collect()
    }

    /// State of a registered connection; `None` once it reached `closed`.
    pub fn state_of(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.lock().get(&id).map(|entry| entry.state)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Tear down: evict every queue and empty the registry.
    ///
    /// Each session observes its queue ending and closes its socket.
    /// Returns the number of connections that were removed.
    pub fn close_all(&self) -> usize {
        self.shutting_down.store(true, Ordering::Release);
        let drained = std::mem::take(&mut *self.lock());
        for entry in drained.values() {
            entry.outbound.evict();
        }
        debug!(closed = drained.len(), "Closed all displays");
        drained.len()
    }

    /// Whether [`close_all`](Self::close_all) has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

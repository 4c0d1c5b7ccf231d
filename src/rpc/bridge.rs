//! Bridge coordinator owning cross-connection state.
//!
//! Exactly three things are shared across connections: the session-id
//! allocator, the presence handle, and the registry of live connection ids.
//! All three live here, on one object the host creates and passes down to
//! the server and each connection task — there are no process-wide statics.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use crate::rpc::presence::PresenceHandle;

/// Shared coordinator for the IPC bridge.
#[derive(Debug)]
pub struct Bridge {
    presence: PresenceHandle,
    next_session_id: AtomicI64,
    connections: Mutex<HashSet<String>>,
}

impl Bridge {
    /// Create a coordinator that forwards presence updates through `presence`.
    pub fn new(presence: PresenceHandle) -> Self {
        Self {
            presence,
            next_session_id: AtomicI64::new(1),
            connections: Mutex::new(HashSet::new()),
        }
    }

    /// Handle for enqueueing presence updates.
    pub fn presence(&self) -> &PresenceHandle {
        &self.presence
    }

    /// Allocate the next session id.
    ///
    /// Monotonic and unique across all connections for the life of the
    /// process.
    pub fn allocate_session_id(&self) -> i64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Track a newly accepted connection.
    pub(crate) fn register_connection(&self, conn_id: &str) {
        let mut connections = self.connections.lock().expect("connection registry poisoned");
        connections.insert(conn_id.to_string());
        log::debug!(
            "[Bridge] Connection {conn_id} registered ({} live)",
            connections.len()
        );
    }

    /// Drop a connection from the registry.
    pub(crate) fn unregister_connection(&self, conn_id: &str) {
        let mut connections = self.connections.lock().expect("connection registry poisoned");
        connections.remove(conn_id);
        log::debug!(
            "[Bridge] Connection {conn_id} unregistered ({} live)",
            connections.len()
        );
    }

    /// Number of currently live connections.
    pub fn connection_count(&self) -> usize {
        self.connections
            .lock()
            .expect("connection registry poisoned")
            .len()
    }
}

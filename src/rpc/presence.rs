//! Presence sink interface and the serialized hand-off worker.
//!
//! The bridge never renders anything itself: it forwards normalized
//! activities to a [`PresenceSink`] supplied by the host (the desktop shell
//! implements one against its embedded web content). All updates funnel
//! through a single worker task draining one channel, so pushes from
//! concurrent connections can never interleave inside the sink, and a slow
//! sink never stalls a connection's read loop.
//!
//! Ordering contract: for a given `(pid, session_id)` pair, a clear is only
//! ever enqueued after its push, and the FIFO channel preserves that order
//! through to the sink.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::rpc::activity::Activity;

/// Receives activity pushes and clears from the bridge.
///
/// Calls are fire-and-forget from the bridge's perspective; implementations
/// log their own failures.
pub trait PresenceSink: Send + 'static {
    /// Render (or update) an activity for `(pid, session_id)`.
    ///
    /// Safe to call repeatedly for the same pair with updated fields.
    fn push_activity(&mut self, activity: &Activity, pid: i64, session_id: i64);

    /// Remove whatever is rendered for `(pid, session_id)`.
    fn clear_activity(&mut self, pid: i64, session_id: i64);
}

/// One queued presence change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceUpdate {
    /// Render an activity.
    Push {
        /// Normalized activity to render.
        activity: Activity,
        /// Client process id.
        pid: i64,
        /// Session id assigned at handshake.
        session_id: i64,
    },
    /// Remove a previously pushed activity.
    Clear {
        /// Client process id of the push being revoked.
        pid: i64,
        /// Session id of the push being revoked.
        session_id: i64,
    },
}

/// Cloneable sender half used by connection tasks to enqueue updates.
#[derive(Debug, Clone)]
pub struct PresenceHandle {
    update_tx: UnboundedSender<PresenceUpdate>,
}

impl PresenceHandle {
    /// Enqueue an activity push.
    pub fn push(&self, activity: Activity, pid: i64, session_id: i64) {
        let update = PresenceUpdate::Push {
            activity,
            pid,
            session_id,
        };
        if self.update_tx.send(update).is_err() {
            log::warn!("[Bridge] Presence worker gone, dropping activity push for pid {pid}");
        }
    }

    /// Enqueue an activity clear.
    pub fn clear(&self, pid: i64, session_id: i64) {
        let update = PresenceUpdate::Clear { pid, session_id };
        if self.update_tx.send(update).is_err() {
            log::warn!("[Bridge] Presence worker gone, dropping activity clear for pid {pid}");
        }
    }
}

/// Create a presence channel without a worker.
///
/// Used by tests that want to observe the queued updates directly; the
/// runtime wiring goes through [`spawn_worker`].
pub fn channel() -> (PresenceHandle, UnboundedReceiver<PresenceUpdate>) {
    let (update_tx, update_rx) = mpsc::unbounded_channel();
    (PresenceHandle { update_tx }, update_rx)
}

/// Spawn the worker task that owns the sink and drains updates in order.
///
/// The worker exits when every [`PresenceHandle`] clone has been dropped.
pub fn spawn_worker(mut sink: Box<dyn PresenceSink>) -> PresenceHandle {
    let (handle, mut update_rx) = channel();
    tokio::spawn(async move {
        while let Some(update) = update_rx.recv().await {
            match update {
                PresenceUpdate::Push {
                    activity,
                    pid,
                    session_id,
                } => sink.push_activity(&activity, pid, session_id),
                PresenceUpdate::Clear { pid, session_id } => {
                    sink.clear_activity(pid, session_id);
                }
            }
        }
        log::debug!("[Bridge] Presence worker stopped");
    });
    handle
}

/// Sink that logs every update.
///
/// Stands in for the rendering surface when the bridge runs headless.
#[derive(Debug, Default)]
pub struct LogSink;

impl PresenceSink for LogSink {
    fn push_activity(&mut self, activity: &Activity, pid: i64, session_id: i64) {
        log::info!(
            "[Presence] Push for pid {pid} session {session_id}: {} ({})",
            activity.name.as_deref().unwrap_or("<unnamed>"),
            activity.details.as_deref().unwrap_or("no details"),
        );
    }

    fn clear_activity(&mut self, pid: i64, session_id: i64) {
        log::info!("[Presence] Clear for pid {pid} session {session_id}");
    }
}

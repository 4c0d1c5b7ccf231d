//! Per-connection session state.
//!
//! One [`Session`] exists per accepted connection, owned by that
//! connection's read loop; no session is ever shared across tasks. The
//! phase machine is the dispatcher's source of truth: nothing but a
//! handshake (or a close) is honored while the session is still in
//! [`SessionPhase::AwaitingHandshake`].

/// Where the session is in the handshake lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    /// Connected, no valid handshake yet.
    AwaitingHandshake,
    /// Handshake accepted; identifiers are fixed for the session's life.
    Acknowledged {
        /// Application id the client identified with.
        client_id: String,
        /// Bridge-allocated id, unique per handshake process-wide.
        session_id: i64,
    },
}

/// The `(pid, session_id)` pair an activity was pushed under.
///
/// The presence surface keys activities by this pair; a clear must quote
/// the same pair as the push it revokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityClaim {
    /// Process id reported by the client.
    pub pid: i64,
    /// Session id assigned at handshake.
    pub session_id: i64,
}

/// Server-side state for one accepted connection.
#[derive(Debug)]
pub struct Session {
    conn_id: String,
    phase: SessionPhase,
    active_activity: Option<ActivityClaim>,
}

impl Session {
    /// Create a fresh session for a newly accepted connection.
    pub fn new(conn_id: String) -> Self {
        Self {
            conn_id,
            phase: SessionPhase::AwaitingHandshake,
            active_activity: None,
        }
    }

    /// Transport-level connection identifier (for logging).
    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    /// Current phase.
    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    /// Whether a valid handshake has completed.
    pub fn is_acknowledged(&self) -> bool {
        matches!(self.phase, SessionPhase::Acknowledged { .. })
    }

    /// Client id fixed at handshake, if acknowledged.
    pub fn client_id(&self) -> Option<&str> {
        match &self.phase {
            SessionPhase::Acknowledged { client_id, .. } => Some(client_id),
            SessionPhase::AwaitingHandshake => None,
        }
    }

    /// Session id allocated at handshake, if acknowledged.
    pub fn session_id(&self) -> Option<i64> {
        match &self.phase {
            SessionPhase::Acknowledged { session_id, .. } => Some(*session_id),
            SessionPhase::AwaitingHandshake => None,
        }
    }

    /// Mark the handshake complete and fix the session identifiers.
    pub fn acknowledge(&mut self, client_id: String, session_id: i64) {
        self.phase = SessionPhase::Acknowledged {
            client_id,
            session_id,
        };
    }

    /// Record the pair the latest activity was pushed under.
    ///
    /// Returns the superseded claim, if any, so the caller can clear it
    /// when the pair changed.
    pub fn record_activity(&mut self, claim: ActivityClaim) -> Option<ActivityClaim> {
        self.active_activity.replace(claim)
    }

    /// Take the active claim, leaving none.
    ///
    /// Close paths use this to guarantee the presence surface is cleared
    /// exactly once per pushed activity.
    pub fn take_active_activity(&mut self) -> Option<ActivityClaim> {
        self.active_activity.take()
    }
}

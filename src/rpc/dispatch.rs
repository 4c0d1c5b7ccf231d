//! Protocol state machine and command handlers.
//!
//! The dispatcher is synchronous: it takes one decoded message, mutates the
//! session, enqueues presence updates, and returns the frames to write back
//! plus an optional close decision. All socket I/O stays in the connection
//! task, which keeps every transition here unit-testable without a socket.
//!
//! State machine: `AwaitingHandshake → Acknowledged → Closed`. Only a
//! handshake (or a close) is honored before acknowledgment; ping works in
//! any state; pong is tolerated and ignored.

use serde_json::Value;

use crate::constants::IPC_VERSION;
use crate::rpc::bridge::Bridge;
use crate::rpc::codec::{IpcMessage, OpCode};
use crate::rpc::session::{ActivityClaim, Session, SessionPhase};
use crate::rpc::wire::{
    self, FrameCommand, FramePayload, HandshakePayload, PingPayload, ResponseCode,
};

/// Close decision produced by a dispatch step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// Numeric close code written into the close frame.
    pub code: i32,
    /// Close message written into the close frame.
    pub message: String,
}

impl CloseReason {
    /// Close with the code's default message.
    pub fn from_code(code: ResponseCode) -> Self {
        Self {
            code: code.code(),
            message: code.default_message(),
        }
    }

    /// Close with an explicit message.
    pub fn with_message(code: ResponseCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
        }
    }
}

/// What the connection task should do after one dispatched message.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Frames to write back, in order.
    pub replies: Vec<(OpCode, Value)>,
    /// Terminal close decision, if the session is done.
    pub close: Option<CloseReason>,
}

impl DispatchOutcome {
    fn nothing() -> Self {
        Self::default()
    }

    fn reply(op: OpCode, payload: Value) -> Self {
        Self {
            replies: vec![(op, payload)],
            close: None,
        }
    }

    fn close(reason: CloseReason) -> Self {
        Self {
            replies: Vec::new(),
            close: Some(reason),
        }
    }
}

/// Dispatch one decoded message against the session state machine.
pub fn dispatch_message(
    session: &mut Session,
    bridge: &Bridge,
    message: IpcMessage,
) -> DispatchOutcome {
    match message {
        IpcMessage::Handshake(payload) => handle_handshake(session, bridge, &payload),
        IpcMessage::Frame(payload) => handle_frame(session, bridge, &payload),
        IpcMessage::Close => DispatchOutcome::close(CloseReason::from_code(ResponseCode::Normal)),
        IpcMessage::Ping(payload) => handle_ping(session, &payload),
        IpcMessage::Pong => {
            log::debug!("[Bridge] Ignoring PONG on {}", session.conn_id());
            DispatchOutcome::nothing()
        }
    }
}

fn handle_handshake(
    session: &mut Session,
    bridge: &Bridge,
    payload: &HandshakePayload,
) -> DispatchOutcome {
    let conn_id = session.conn_id().to_string();
    log::info!("[Bridge] Handling HANDSHAKE on {conn_id}");

    if session.is_acknowledged() {
        // client_id is immutable once set; a repeat handshake changes nothing.
        log::warn!("[Bridge] Ignoring repeat handshake on {conn_id}");
        return DispatchOutcome::nothing();
    }

    if payload.v != Some(IPC_VERSION) {
        log::error!(
            "[Bridge] Invalid or missing version {:?} in handshake on {conn_id}",
            payload.v
        );
        return DispatchOutcome::close(CloseReason::from_code(ResponseCode::InvalidVersion));
    }

    let client_id = match payload.client_id.as_deref() {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            log::error!("[Bridge] Empty or missing client_id in handshake on {conn_id}");
            return DispatchOutcome::close(CloseReason::from_code(ResponseCode::InvalidClientId));
        }
    };

    let session_id = bridge.allocate_session_id();
    session.acknowledge(client_id.clone(), session_id);
    log::info!(
        "[Bridge] Handshake successful for client {client_id} on {conn_id} (session {session_id})"
    );

    DispatchOutcome {
        replies: vec![
            (OpCode::Handshake, wire::handshake_ack(&client_id)),
            (OpCode::Frame, wire::ready_dispatch()),
        ],
        close: None,
    }
}

fn handle_frame(session: &mut Session, bridge: &Bridge, payload: &FramePayload) -> DispatchOutcome {
    let (client_id, session_id) = match session.phase() {
        SessionPhase::Acknowledged {
            client_id,
            session_id,
        } => (client_id.clone(), *session_id),
        SessionPhase::AwaitingHandshake => {
            log::error!(
                "[Bridge] Received FRAME before handshake on {}",
                session.conn_id()
            );
            return DispatchOutcome::close(CloseReason::with_message(
                ResponseCode::Abnormal,
                "need handshake first",
            ));
        }
    };

    let Some(cmd) = payload.cmd.as_ref() else {
        log::error!("[Bridge] Missing 'cmd' in FRAME on {}", session.conn_id());
        return DispatchOutcome::nothing();
    };

    log::info!(
        "[Bridge] Handling FRAME command {} on {}",
        cmd.as_str(),
        session.conn_id()
    );

    match cmd {
        FrameCommand::SetActivity => {
            handle_set_activity(session, bridge, payload, &client_id, session_id)
        }
        FrameCommand::InviteBrowser | FrameCommand::GuildTemplateBrowser => {
            handle_invite_browser(session, cmd, payload)
        }
        FrameCommand::DeepLink => DispatchOutcome::reply(
            OpCode::Frame,
            wire::success_envelope(cmd.as_str(), payload.nonce.as_deref()),
        ),
        FrameCommand::ConnectionsCallback => DispatchOutcome::reply(
            OpCode::Frame,
            wire::error_envelope(cmd.as_str(), "Unhandled", payload.nonce.as_deref()),
        ),
        FrameCommand::Unknown(raw) => {
            log::warn!("[Bridge] Unknown command {raw} on {}", session.conn_id());
            DispatchOutcome::reply(
                OpCode::Frame,
                wire::success_envelope(raw, payload.nonce.as_deref()),
            )
        }
    }
}

fn handle_set_activity(
    session: &mut Session,
    bridge: &Bridge,
    payload: &FramePayload,
    client_id: &str,
    session_id: i64,
) -> DispatchOutcome {
    let args = payload.args.clone().unwrap_or_default();
    let Some(mut activity) = args.activity else {
        log::warn!(
            "[Bridge] Invalid SET_ACTIVITY arguments on {}",
            session.conn_id()
        );
        return DispatchOutcome::reply(
            OpCode::Frame,
            wire::error_envelope("SET_ACTIVITY", "Invalid arguments", payload.nonce.as_deref()),
        );
    };
    let pid = args.pid.unwrap_or(0);

    activity.normalize(Some(client_id));

    let claim = ActivityClaim { pid, session_id };
    if let Some(previous) = session.record_activity(claim) {
        if previous != claim {
            // The surface keys by (pid, session_id); revoke the old pair
            // before it becomes unreachable.
            bridge.presence().clear(previous.pid, previous.session_id);
        }
    }
    bridge.presence().push(activity, pid, session_id);

    DispatchOutcome::reply(
        OpCode::Frame,
        wire::success_envelope("SET_ACTIVITY", payload.nonce.as_deref()),
    )
}

fn handle_invite_browser(
    session: &Session,
    cmd: &FrameCommand,
    payload: &FramePayload,
) -> DispatchOutcome {
    let code = payload.args.as_ref().and_then(|args| args.code.as_deref());
    match code {
        Some(code) => {
            log::info!(
                "[Bridge] Command {} with code {code} on {}",
                cmd.as_str(),
                session.conn_id()
            );
            DispatchOutcome::reply(
                OpCode::Frame,
                wire::success_envelope(cmd.as_str(), payload.nonce.as_deref()),
            )
        }
        None => {
            log::warn!(
                "[Bridge] Missing code for command {} on {}",
                cmd.as_str(),
                session.conn_id()
            );
            // The request nonce correlates to the operation the client asked
            // for, not to this failure; answer with a fresh one.
            DispatchOutcome::reply(
                OpCode::Frame,
                wire::error_envelope(cmd.as_str(), "MissingCode", Some(&wire::fresh_nonce())),
            )
        }
    }
}

fn handle_ping(session: &Session, payload: &PingPayload) -> DispatchOutcome {
    log::debug!("[Bridge] Handling PING on {}", session.conn_id());
    DispatchOutcome::reply(OpCode::Pong, wire::pong_payload(payload.nonce.as_deref()))
}

//! Per-connection task wiring.
//!
//! Each accepted socket gets a read task and a write task. The read task
//! owns the [`Session`] and drives the dispatcher; the write task drains an
//! unbounded channel of pre-encoded frames so a slow peer never blocks
//! dispatch. Closing is terminal and idempotent: the active activity is
//! cleared exactly once, the close frame is written best-effort, and the
//! descriptor is released when both tasks finish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::rpc::bridge::Bridge;
use crate::rpc::codec::{self, DecodeError, OpCode};
use crate::rpc::dispatch::{self, CloseReason};
use crate::rpc::session::Session;
use crate::rpc::wire::{self, ResponseCode};

/// Generate a unique connection id using a monotonic counter + random suffix.
fn generate_conn_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
    let rand: u16 = rand::random();
    format!("ipc:{seq:x}{rand:04x}")
}

/// Spawn the read/write tasks for an accepted connection.
pub(crate) fn spawn_connection(stream: UnixStream, bridge: Arc<Bridge>) {
    let conn_id = generate_conn_id();
    log::info!("[Bridge] Client connected: {conn_id}");
    bridge.register_connection(&conn_id);

    let (read_half, write_half) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let write_handle = tokio::spawn(write_loop(conn_id.clone(), write_half, outbound_rx));
    tokio::spawn(read_loop(
        conn_id,
        read_half,
        bridge,
        outbound_tx,
        write_handle,
    ));
}

/// Read loop — decodes messages, dispatches them, and performs the close.
async fn read_loop(
    conn_id: String,
    mut reader: OwnedReadHalf,
    bridge: Arc<Bridge>,
    outbound_tx: UnboundedSender<Vec<u8>>,
    write_handle: JoinHandle<()>,
) {
    let mut session = Session::new(conn_id.clone());

    let close_reason = loop {
        match codec::read_message(&mut reader).await {
            Ok(message) => {
                let outcome = dispatch::dispatch_message(&mut session, &bridge, message);

                let mut writer_gone = false;
                for (op, payload) in outcome.replies {
                    if outbound_tx
                        .send(codec::encode_message(op, &payload))
                        .is_err()
                    {
                        log::warn!("[Bridge] Write task gone for {conn_id}, closing");
                        writer_gone = true;
                        break;
                    }
                }
                if writer_gone {
                    break None;
                }
                if let Some(reason) = outcome.close {
                    break Some(reason);
                }
            }
            Err(DecodeError::UnknownOpCode(raw)) => {
                // Payload already consumed; the stream is still framed.
                log::warn!("[Bridge] Ignoring unknown opcode {raw} on {conn_id}");
            }
            Err(err) => {
                log::error!("[Bridge] Failed to read message on {conn_id}: {err}");
                break Some(close_reason_for(&err));
            }
        }
    };

    close_session(&mut session, &bridge, &outbound_tx, close_reason);

    // Let the write task drain the close frame before the socket drops.
    drop(outbound_tx);
    let _ = write_handle.await;

    bridge.unregister_connection(&conn_id);
    log::info!("[Bridge] Client disconnected: {conn_id}");
}

/// Map a decode failure to the close frame it warrants.
fn close_reason_for(err: &DecodeError) -> CloseReason {
    match err {
        DecodeError::Io(_) => {
            CloseReason::with_message(ResponseCode::RateLimited, "Failed to read message")
        }
        _ => CloseReason::from_code(err.close_code()),
    }
}

/// Tear down the session: clear the pushed activity (at most once) and send
/// the close frame when a reason calls for one.
fn close_session(
    session: &mut Session,
    bridge: &Bridge,
    outbound_tx: &UnboundedSender<Vec<u8>>,
    reason: Option<CloseReason>,
) {
    if let Some(claim) = session.take_active_activity() {
        bridge.presence().clear(claim.pid, claim.session_id);
    }

    if let Some(reason) = reason {
        log::info!(
            "[Bridge] Closing {} with code {} and message: {}",
            session.conn_id(),
            reason.code,
            reason.message
        );
        let payload = wire::close_payload(reason.code, &reason.message);
        // Best effort: the peer may already be gone.
        let _ = outbound_tx.send(codec::encode_message(OpCode::Close, &payload));
    }
}

/// Write loop — receives encoded frames and writes them to the socket.
async fn write_loop(
    conn_id: String,
    mut writer: OwnedWriteHalf,
    mut outbound_rx: UnboundedReceiver<Vec<u8>>,
) {
    while let Some(data) = outbound_rx.recv().await {
        if let Err(err) = writer.write_all(&data).await {
            log::error!("[Bridge] Write error for {conn_id}: {err}");
            break;
        }
    }
}

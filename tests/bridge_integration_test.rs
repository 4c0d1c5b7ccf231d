//! End-to-end tests driving the bridge over a real Unix socket.
//!
//! Each test starts a server in a temp directory, connects a raw client
//! stream, and speaks the wire protocol directly: 8-byte little-endian
//! header (opcode, payload length) followed by JSON.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use voxa_bridge::rpc::codec::{encode_message, OpCode};
use voxa_bridge::rpc::presence;
use voxa_bridge::{Activity, Bridge, BridgeServer, PresenceSink, PresenceUpdate};

/// Sink that records every update for assertions.
struct RecordingSink {
    updates: Arc<Mutex<Vec<PresenceUpdate>>>,
}

impl PresenceSink for RecordingSink {
    fn push_activity(&mut self, activity: &Activity, pid: i64, session_id: i64) {
        self.updates.lock().unwrap().push(PresenceUpdate::Push {
            activity: activity.clone(),
            pid,
            session_id,
        });
    }

    fn clear_activity(&mut self, pid: i64, session_id: i64) {
        self.updates
            .lock()
            .unwrap()
            .push(PresenceUpdate::Clear { pid, session_id });
    }
}

/// Start a server under `dir` with a recording sink.
fn start_bridge(dir: &Path) -> (BridgeServer, Arc<Mutex<Vec<PresenceUpdate>>>) {
    let updates = Arc::new(Mutex::new(Vec::new()));
    let handle = presence::spawn_worker(Box::new(RecordingSink {
        updates: Arc::clone(&updates),
    }));
    let bridge = Arc::new(Bridge::new(handle));
    let server = BridgeServer::start(bridge, Some(dir.to_path_buf())).unwrap();
    (server, updates)
}

/// Read one raw frame: returns (opcode, payload).
async fn read_frame(stream: &mut UnixStream) -> (i32, Value) {
    let mut header = [0u8; 8];
    tokio::time::timeout(Duration::from_secs(2), stream.read_exact(&mut header))
        .await
        .expect("Timed out waiting for frame")
        .expect("Read failed");
    let op = i32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let length = i32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    let mut payload = vec![0u8; length as usize];
    stream.read_exact(&mut payload).await.expect("Payload read failed");
    (op, serde_json::from_slice(&payload).expect("Payload not JSON"))
}

/// Wait until the sink has recorded `count` updates.
async fn wait_for_updates(updates: &Arc<Mutex<Vec<PresenceUpdate>>>, count: usize) {
    for _ in 0..200 {
        if updates.lock().unwrap().len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "Timed out waiting for {count} presence updates, have {:?}",
        updates.lock().unwrap()
    );
}

async fn connect(server: &BridgeServer) -> UnixStream {
    UnixStream::connect(server.socket_path()).await.unwrap()
}

async fn handshake(stream: &mut UnixStream, client_id: &str) {
    stream
        .write_all(&encode_message(
            OpCode::Handshake,
            &json!({"v": 1, "client_id": client_id}),
        ))
        .await
        .unwrap();

    let (op, ack) = read_frame(stream).await;
    assert_eq!(op, 0);
    assert_eq!(ack, json!({"v": 1, "client_id": client_id}));

    let (op, ready) = read_frame(stream).await;
    assert_eq!(op, 1);
    assert_eq!(ready["evt"], "READY");
    assert_eq!(ready["cmd"], "DISPATCH");
    assert_eq!(ready["data"]["config"]["cdn_host"], "cdn.discordapp.com");
    assert_eq!(ready["data"]["user"]["id"], "1045800378228281345");
}

#[tokio::test]
async fn test_end_to_end_presence_lifecycle() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (server, updates) = start_bridge(tmp.path());
    let mut stream = connect(&server).await;

    handshake(&mut stream, "123").await;

    stream
        .write_all(&encode_message(
            OpCode::Frame,
            &json!({
                "cmd": "SET_ACTIVITY",
                "nonce": "n1",
                "args": {"pid": 42, "activity": {"type": 0, "details": "Testing"}}
            }),
        ))
        .await
        .unwrap();

    let (op, envelope) = read_frame(&mut stream).await;
    assert_eq!(op, 1);
    assert_eq!(
        envelope,
        json!({"cmd": "SET_ACTIVITY", "evt": null, "data": null, "nonce": "n1"})
    );

    wait_for_updates(&updates, 1).await;
    let (pushed_pid, pushed_session) = {
        let recorded = updates.lock().unwrap();
        match &recorded[0] {
            PresenceUpdate::Push {
                activity,
                pid,
                session_id,
            } => {
                assert_eq!(activity.application_id.as_deref(), Some("123"));
                assert_eq!(activity.details.as_deref(), Some("Testing"));
                assert_eq!(activity.name.as_deref(), Some("Unknown Activity"));
                assert!(activity.created_at.is_some());
                assert_eq!(activity.flags, Some(0));
                (*pid, *session_id)
            }
            other => panic!("Expected Push, got: {other:?}"),
        }
    };
    assert_eq!(pushed_pid, 42);

    // Close and expect the matching clear for the same (pid, session_id).
    stream
        .write_all(&encode_message(OpCode::Close, &json!({})))
        .await
        .unwrap();

    let (op, close) = read_frame(&mut stream).await;
    assert_eq!(op, 2);
    assert_eq!(close["code"], 1000);
    assert_eq!(close["message"], "Normal closure");

    wait_for_updates(&updates, 2).await;
    let recorded = updates.lock().unwrap();
    assert_eq!(
        recorded[1],
        PresenceUpdate::Clear {
            pid: pushed_pid,
            session_id: pushed_session
        }
    );
    assert_eq!(recorded.len(), 2, "Clear must happen exactly once");
    drop(recorded);

    server.shutdown();
}

#[tokio::test]
async fn test_frame_before_handshake_closes_abnormally() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (server, updates) = start_bridge(tmp.path());
    let mut stream = connect(&server).await;

    stream
        .write_all(&encode_message(
            OpCode::Frame,
            &json!({"cmd": "SET_ACTIVITY", "args": {"pid": 1, "activity": {}}}),
        ))
        .await
        .unwrap();

    let (op, close) = read_frame(&mut stream).await;
    assert_eq!(op, 2);
    assert_eq!(close["code"], 1006);
    assert_eq!(close["message"], "need handshake first");

    // The handler never ran.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(updates.lock().unwrap().is_empty());

    server.shutdown();
}

#[tokio::test]
async fn test_handshake_wrong_version_rejected() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (server, _updates) = start_bridge(tmp.path());
    let mut stream = connect(&server).await;

    stream
        .write_all(&encode_message(
            OpCode::Handshake,
            &json!({"v": 2, "client_id": "123"}),
        ))
        .await
        .unwrap();

    let (op, close) = read_frame(&mut stream).await;
    assert_eq!(op, 2);
    assert_eq!(close["code"], 4004);
    assert_eq!(close["message"], "Invalid Version");

    server.shutdown();
}

#[tokio::test]
async fn test_handshake_empty_client_id_rejected() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (server, _updates) = start_bridge(tmp.path());
    let mut stream = connect(&server).await;

    stream
        .write_all(&encode_message(
            OpCode::Handshake,
            &json!({"v": 1, "client_id": ""}),
        ))
        .await
        .unwrap();

    let (op, close) = read_frame(&mut stream).await;
    assert_eq!(op, 2);
    assert_eq!(close["code"], 4000);

    server.shutdown();
}

#[tokio::test]
async fn test_malformed_json_closes_with_invalid_encoding() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (server, _updates) = start_bridge(tmp.path());
    let mut stream = connect(&server).await;

    let garbage = b"this is not json";
    let mut frame = Vec::new();
    frame.extend_from_slice(&1i32.to_le_bytes());
    frame.extend_from_slice(&(garbage.len() as i32).to_le_bytes());
    frame.extend_from_slice(garbage);
    stream.write_all(&frame).await.unwrap();

    let (op, close) = read_frame(&mut stream).await;
    assert_eq!(op, 2);
    assert_eq!(close["code"], 4005);

    server.shutdown();
}

#[tokio::test]
async fn test_ping_pongs_before_handshake() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (server, _updates) = start_bridge(tmp.path());
    let mut stream = connect(&server).await;

    stream
        .write_all(&encode_message(OpCode::Ping, &json!({"nonce": "p1"})))
        .await
        .unwrap();

    let (op, pong) = read_frame(&mut stream).await;
    assert_eq!(op, 4);
    assert_eq!(pong, json!({"nonce": "p1"}));

    server.shutdown();
}

#[tokio::test]
async fn test_unknown_command_gets_permissive_success() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (server, updates) = start_bridge(tmp.path());
    let mut stream = connect(&server).await;

    handshake(&mut stream, "123").await;

    stream
        .write_all(&encode_message(
            OpCode::Frame,
            &json!({"cmd": "NOT_A_REAL_COMMAND", "nonce": "n1"}),
        ))
        .await
        .unwrap();

    let (op, envelope) = read_frame(&mut stream).await;
    assert_eq!(op, 1);
    assert_eq!(
        envelope,
        json!({"cmd": "NOT_A_REAL_COMMAND", "evt": null, "data": null, "nonce": "n1"})
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(updates.lock().unwrap().is_empty());

    server.shutdown();
}

#[tokio::test]
async fn test_peer_disconnect_clears_pushed_activity() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (server, updates) = start_bridge(tmp.path());
    let mut stream = connect(&server).await;

    handshake(&mut stream, "123").await;
    stream
        .write_all(&encode_message(
            OpCode::Frame,
            &json!({
                "cmd": "SET_ACTIVITY",
                "nonce": "n1",
                "args": {"pid": 7, "activity": {"details": "About to vanish"}}
            }),
        ))
        .await
        .unwrap();
    let (op, _) = read_frame(&mut stream).await;
    assert_eq!(op, 1);

    // Drop without a close frame; the read loop's short read must still
    // clear the activity.
    drop(stream);

    wait_for_updates(&updates, 2).await;
    let recorded = updates.lock().unwrap();
    assert!(matches!(recorded[0], PresenceUpdate::Push { pid: 7, .. }));
    assert!(matches!(recorded[1], PresenceUpdate::Clear { pid: 7, .. }));

    server.shutdown();
}

#[tokio::test]
async fn test_two_clients_get_distinct_sessions() {
    let tmp = tempfile::TempDir::new().unwrap();
    let (server, updates) = start_bridge(tmp.path());

    let mut first = connect(&server).await;
    let mut second = connect(&server).await;
    handshake(&mut first, "111").await;
    handshake(&mut second, "222").await;

    for (stream, pid) in [(&mut first, 1i64), (&mut second, 2i64)] {
        stream
            .write_all(&encode_message(
                OpCode::Frame,
                &json!({
                    "cmd": "SET_ACTIVITY",
                    "args": {"pid": pid, "activity": {"details": "multi"}}
                }),
            ))
            .await
            .unwrap();
        let (op, _) = read_frame(stream).await;
        assert_eq!(op, 1);
    }

    wait_for_updates(&updates, 2).await;
    let recorded = updates.lock().unwrap();
    let mut session_ids = Vec::new();
    for update in recorded.iter() {
        match update {
            PresenceUpdate::Push {
                activity,
                session_id,
                ..
            } => {
                session_ids.push(*session_id);
                let id = activity.application_id.as_deref().unwrap();
                assert!(id == "111" || id == "222");
            }
            other => panic!("Expected Push, got: {other:?}"),
        }
    }
    assert_ne!(session_ids[0], session_ids[1]);
    drop(recorded);

    server.shutdown();
}

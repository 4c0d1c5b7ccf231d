//! Wire codec for the Discord IPC socket protocol.
//!
//! One frame per logical message:
//!
//! ```text
//! [i32 LE opcode] [i32 LE payload length] [payload: UTF-8 JSON]
//! ```
//!
//! Opcodes:
//! - `0`: handshake
//! - `1`: frame (command/response)
//! - `2`: close
//! - `3`: ping
//! - `4`: pong
//!
//! Reads are exact: 8 header bytes, then exactly `length` payload bytes. A
//! short read, an out-of-bounds length, or an undecodable payload is a typed
//! [`DecodeError`], never a panic, and the caller picks the close code from
//! the error class.

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::constants::MAX_MESSAGE_SIZE;
use crate::rpc::wire::{FramePayload, HandshakePayload, PingPayload, ResponseCode};

/// Size of the opcode + length header.
pub const HEADER_SIZE: usize = 8;

/// Largest payload a single message may declare.
pub const MAX_PAYLOAD_SIZE: usize = MAX_MESSAGE_SIZE - HEADER_SIZE;

/// Operation code of an IPC message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Initial handshake (op 0).
    Handshake,
    /// Post-handshake command or response (op 1).
    Frame,
    /// Connection close (op 2).
    Close,
    /// Liveness probe (op 3).
    Ping,
    /// Liveness reply (op 4).
    Pong,
}

impl OpCode {
    /// Decode a wire opcode; `None` for values outside the protocol.
    pub fn from_wire(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Handshake),
            1 => Some(Self::Frame),
            2 => Some(Self::Close),
            3 => Some(Self::Ping),
            4 => Some(Self::Pong),
            _ => None,
        }
    }

    /// Wire value of this opcode.
    pub fn as_wire(self) -> i32 {
        match self {
            Self::Handshake => 0,
            Self::Frame => 1,
            Self::Close => 2,
            Self::Ping => 3,
            Self::Pong => 4,
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Handshake => "HANDSHAKE",
            Self::Frame => "FRAME",
            Self::Close => "CLOSE",
            Self::Ping => "PING",
            Self::Pong => "PONG",
        };
        f.write_str(name)
    }
}

/// A decoded inbound message, one variant per opcode.
#[derive(Debug, Clone)]
pub enum IpcMessage {
    /// Handshake request.
    Handshake(HandshakePayload),
    /// Post-handshake command frame.
    Frame(FramePayload),
    /// Close request; the payload carries no client→server shape and is
    /// consumed without parsing.
    Close,
    /// Ping with an optional nonce.
    Ping(PingPayload),
    /// Pong; ignored by the server.
    Pong,
}

/// Failure to decode one inbound message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Peer closed mid-message or the read failed.
    #[error("socket read failed: {0}")]
    Io(#[from] std::io::Error),

    /// Opcode outside the protocol. The payload has already been consumed,
    /// so the stream stays framed and the caller may keep reading.
    #[error("unknown opcode {0}")]
    UnknownOpCode(i32),

    /// Declared payload length outside `(0, MAX_PAYLOAD_SIZE]`.
    #[error("invalid payload length {0} (max {MAX_PAYLOAD_SIZE})")]
    InvalidLength(i32),

    /// Payload bytes were not the expected JSON shape.
    #[error("invalid {op} payload: {source}")]
    InvalidJson {
        /// Opcode whose payload failed to decode.
        op: OpCode,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

impl DecodeError {
    /// Close code the session should be terminated with.
    ///
    /// Undecodable JSON gets the dedicated encoding code; everything else is
    /// the generic malformed-traffic signal.
    pub fn close_code(&self) -> ResponseCode {
        match self {
            Self::InvalidJson { .. } => ResponseCode::InvalidEncoding,
            Self::Io(_) | Self::UnknownOpCode(_) | Self::InvalidLength(_) => {
                ResponseCode::RateLimited
            }
        }
    }
}

/// Read exactly one message from the stream.
///
/// # Errors
///
/// Returns a [`DecodeError`] on short reads, bad headers, or undecodable
/// payloads. Only [`DecodeError::UnknownOpCode`] leaves the stream in a
/// recoverable state.
pub async fn read_message<R>(reader: &mut R) -> Result<IpcMessage, DecodeError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header).await?;

    let op_raw = i32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let length = i32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    log::debug!("[Bridge] Received packet - op: {op_raw}, length: {length}");

    if length <= 0 || length as usize > MAX_PAYLOAD_SIZE {
        return Err(DecodeError::InvalidLength(length));
    }

    let mut payload = vec![0u8; length as usize];
    reader.read_exact(&mut payload).await?;

    match OpCode::from_wire(op_raw) {
        Some(op) => decode_payload(op, &payload),
        None => Err(DecodeError::UnknownOpCode(op_raw)),
    }
}

/// Decode a payload for a known opcode.
pub fn decode_payload(op: OpCode, payload: &[u8]) -> Result<IpcMessage, DecodeError> {
    let json_err = |source| DecodeError::InvalidJson { op, source };
    match op {
        OpCode::Handshake => {
            let payload: HandshakePayload = serde_json::from_slice(payload).map_err(json_err)?;
            Ok(IpcMessage::Handshake(payload))
        }
        OpCode::Frame => {
            let payload: FramePayload = serde_json::from_slice(payload).map_err(json_err)?;
            Ok(IpcMessage::Frame(payload))
        }
        OpCode::Ping => {
            let payload: PingPayload = serde_json::from_slice(payload).map_err(json_err)?;
            Ok(IpcMessage::Ping(payload))
        }
        OpCode::Close => Ok(IpcMessage::Close),
        OpCode::Pong => Ok(IpcMessage::Pong),
    }
}

/// Encode one outbound message: 8-byte header followed by the JSON payload.
pub fn encode_message<T: Serialize>(op: OpCode, payload: &T) -> Vec<u8> {
    let body = serde_json::to_vec(payload).expect("JSON serialization cannot fail");
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&op.as_wire().to_le_bytes());
    buf.extend_from_slice(&(body.len() as i32).to_le_bytes());
    buf.extend_from_slice(&body);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::wire::FrameCommand;
    use serde_json::json;

    async fn read_from(bytes: &[u8]) -> Result<IpcMessage, DecodeError> {
        let mut reader = bytes;
        read_message(&mut reader).await
    }

    #[tokio::test]
    async fn test_handshake_round_trip() {
        let encoded = encode_message(OpCode::Handshake, &json!({"v": 1, "client_id": "123"}));
        match read_from(&encoded).await.unwrap() {
            IpcMessage::Handshake(payload) => {
                assert_eq!(payload.v, Some(1));
                assert_eq!(payload.client_id.as_deref(), Some("123"));
            }
            other => panic!("Expected Handshake, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_frame_round_trip() {
        let encoded = encode_message(
            OpCode::Frame,
            &json!({"cmd": "SET_ACTIVITY", "nonce": "n1", "args": {"pid": 42}}),
        );
        match read_from(&encoded).await.unwrap() {
            IpcMessage::Frame(payload) => {
                assert_eq!(payload.cmd, Some(FrameCommand::SetActivity));
                assert_eq!(payload.nonce.as_deref(), Some("n1"));
                assert_eq!(payload.args.unwrap().pid, Some(42));
            }
            other => panic!("Expected Frame, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ping_round_trip() {
        let encoded = encode_message(OpCode::Ping, &json!({"nonce": "p1"}));
        match read_from(&encoded).await.unwrap() {
            IpcMessage::Ping(payload) => assert_eq!(payload.nonce.as_deref(), Some("p1")),
            other => panic!("Expected Ping, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_payload_not_parsed() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&2i32.to_le_bytes());
        buf.extend_from_slice(&7i32.to_le_bytes());
        buf.extend_from_slice(b"goodbye"); // not JSON
        assert!(matches!(read_from(&buf).await.unwrap(), IpcMessage::Close));
    }

    #[tokio::test]
    async fn test_zero_length_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        let err = read_from(&buf).await.unwrap_err();
        assert!(matches!(err, DecodeError::InvalidLength(0)));
        assert_eq!(err.close_code(), ResponseCode::RateLimited);
    }

    #[tokio::test]
    async fn test_negative_length_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&(-5i32).to_le_bytes());
        assert!(matches!(
            read_from(&buf).await.unwrap_err(),
            DecodeError::InvalidLength(-5)
        ));
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&(MAX_PAYLOAD_SIZE as i32 + 1).to_le_bytes());
        assert!(matches!(
            read_from(&buf).await.unwrap_err(),
            DecodeError::InvalidLength(_)
        ));
    }

    #[tokio::test]
    async fn test_unknown_opcode_consumes_payload() {
        // An unknown opcode followed by a valid ping: the first read fails
        // recoverably, the second still decodes.
        let mut buf = Vec::new();
        buf.extend_from_slice(&9i32.to_le_bytes());
        buf.extend_from_slice(&2i32.to_le_bytes());
        buf.extend_from_slice(b"{}");
        buf.extend_from_slice(&encode_message(OpCode::Ping, &json!({"nonce": "p1"})));

        let mut reader = buf.as_slice();
        let err = read_message(&mut reader).await.unwrap_err();
        assert!(matches!(err, DecodeError::UnknownOpCode(9)));
        assert!(matches!(
            read_message(&mut reader).await.unwrap(),
            IpcMessage::Ping(_)
        ));
    }

    #[tokio::test]
    async fn test_truncated_payload_is_io_error() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&10i32.to_le_bytes());
        buf.extend_from_slice(b"{}"); // 2 of 10 promised bytes
        assert!(matches!(
            read_from(&buf).await.unwrap_err(),
            DecodeError::Io(_)
        ));
    }

    #[tokio::test]
    async fn test_malformed_json_maps_to_invalid_encoding() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1i32.to_le_bytes());
        buf.extend_from_slice(&9i32.to_le_bytes());
        buf.extend_from_slice(b"not json!");
        let err = read_from(&buf).await.unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson { op: OpCode::Frame, .. }));
        assert_eq!(err.close_code(), ResponseCode::InvalidEncoding);
    }

    #[test]
    fn test_opcode_wire_round_trip() {
        for op in [
            OpCode::Handshake,
            OpCode::Frame,
            OpCode::Close,
            OpCode::Ping,
            OpCode::Pong,
        ] {
            assert_eq!(OpCode::from_wire(op.as_wire()), Some(op));
        }
        assert_eq!(OpCode::from_wire(5), None);
        assert_eq!(OpCode::from_wire(-1), None);
    }

    #[test]
    fn test_header_is_little_endian() {
        let encoded = encode_message(OpCode::Frame, &json!({}));
        assert_eq!(&encoded[0..4], &[1, 0, 0, 0]);
        assert_eq!(&encoded[4..8], &[2, 0, 0, 0]);
        assert_eq!(&encoded[8..], b"{}");
    }
}

//! Local IPC bridge emulating the Discord desktop RPC socket.
//!
//! Third-party applications that speak Discord's desktop IPC protocol can
//! discover this server, handshake, and push rich presence updates; the
//! bridge validates and normalizes them, then forwards them to the host's
//! presence sink.
//!
//! # Architecture
//!
//! ```text
//! Client app (discord-rpc SDK)          voxa-bridge
//! ┌──────────────────┐                 ┌─────────────────────────────┐
//! │ connect to       │   frames over   │ BridgeServer  accept loop   │
//! │ discord-ipc-N    │◄───────────────►│  └ connection  read/write   │
//! │ handshake,       │   Unix socket   │     └ dispatch state machine│
//! │ SET_ACTIVITY, …  │                 │        └ PresenceHandle     │
//! └──────────────────┘                 └──────────────┬──────────────┘
//!                                                     │ PresenceUpdate
//!                                                     ▼
//!                                          presence worker → PresenceSink
//! ```
//!
//! # Wire protocol
//!
//! One frame per message: an 8-byte little-endian header (`i32` opcode,
//! `i32` payload length) followed by a UTF-8 JSON payload. See [`codec`]
//! for opcodes and limits, [`wire`] for payload shapes, and [`dispatch`]
//! for the session state machine.

pub mod activity;
pub mod bridge;
pub mod codec;
pub(crate) mod connection;
pub mod dispatch;
pub mod presence;
pub mod server;
pub mod session;
pub mod wire;

//! Voxa Bridge - Discord-compatible rich presence IPC bridge.
//!
//! This crate provides the local RPC server the Voxa desktop shell embeds
//! so that applications built against Discord's desktop IPC protocol can
//! report rich presence into the shell's rendering surface.
//!
//! # Architecture
//!
//! - **BridgeServer** - binds one of the ten discovery socket paths and
//!   accepts connections
//! - **Bridge** - owned coordinator: session-id allocator, connection
//!   registry, presence handle
//! - **dispatch** - per-connection protocol state machine and command
//!   handlers
//! - **PresenceSink** - host-implemented surface the bridge pushes
//!   normalized activities into
//!
//! The host creates a [`Bridge`] with a sink, starts a [`BridgeServer`],
//! and everything else happens on background tasks.
//!
//! # Modules
//!
//! - [`rpc`] - the IPC bridge (transport, codec, dispatch, presence)
//! - [`constants`] - wire and discovery constants

pub mod constants;
pub mod rpc;

// Re-export commonly used types
pub use rpc::activity::Activity;
pub use rpc::bridge::Bridge;
pub use rpc::presence::{spawn_worker, LogSink, PresenceHandle, PresenceSink, PresenceUpdate};
pub use rpc::server::BridgeServer;
pub use rpc::wire::ResponseCode;

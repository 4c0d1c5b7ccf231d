//! Application-wide constants for voxa-bridge.
//!
//! This module centralizes the wire-protocol and discovery magic numbers so
//! the codec, server, and dispatcher agree on them. Constants are grouped by
//! domain with documentation explaining their purpose.

use std::time::Duration;

// ============================================================================
// Wire protocol
// ============================================================================

/// Supported IPC protocol version.
///
/// Discord RPC clients send this in the handshake; any other value is
/// rejected with an `INVALID_VERSION` close.
pub const IPC_VERSION: i64 = 1;

/// Maximum size of one IPC message including the 8-byte header.
///
/// Matches the read buffer the reference clients assume. A declared payload
/// length that would push the message past this bound terminates the
/// connection rather than allocating unbounded memory.
pub const MAX_MESSAGE_SIZE: usize = 65536;

// ============================================================================
// Socket discovery
// ============================================================================

/// Number of candidate discovery paths probed when binding.
///
/// Clients scan `discord-ipc-0` through `discord-ipc-9` looking for a live
/// server, so the bridge attempts the same ten paths in order.
pub const DISCOVERY_ATTEMPTS: u32 = 10;

/// Filename prefix for discovery socket paths.
pub const SOCKET_PREFIX: &str = "discord-ipc-";

/// Fallback socket directory when neither `XDG_RUNTIME_DIR` nor `TMPDIR`
/// is set.
pub const FALLBACK_SOCKET_DIR: &str = "/tmp";

/// Maximum socket path length in bytes.
///
/// `sun_path` is 104 bytes on macOS and 108 on Linux; use the conservative
/// limit so the same path works on both.
pub const MAX_SOCKET_PATH: usize = 104;

// ============================================================================
// Timings
// ============================================================================

/// Delay before retrying after a failed `accept()`.
///
/// Prevents a tight error loop from pinning a core when the listener is in
/// a transient bad state.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

//! Unix domain socket server with multi-path discovery.
//!
//! RPC clients find a running server by probing `discord-ipc-0` through
//! `discord-ipc-9` under a well-known directory, so the bridge binds the
//! first of those ten paths it can claim. A path is skipped when a live
//! server answers on it; a leftover socket file nobody answers on is stale
//! and gets unlinked. Binding none of the ten is a degraded state (the
//! bridge just never receives connections) and is reported to the caller,
//! never escalated into a crash of the host.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UnixListener;
use tokio::task::JoinHandle;

use crate::constants::{
    ACCEPT_RETRY_DELAY, DISCOVERY_ATTEMPTS, FALLBACK_SOCKET_DIR, MAX_SOCKET_PATH, SOCKET_PREFIX,
};
use crate::rpc::bridge::Bridge;
use crate::rpc::connection;

/// Listening half of the IPC bridge.
///
/// Binds one discovery path and accepts connections on a background task
/// until [`BridgeServer::shutdown`] is called.
#[derive(Debug)]
pub struct BridgeServer {
    /// Path of the bound socket file (for cleanup).
    socket_path: PathBuf,
    /// Handle to the accept loop task.
    accept_handle: JoinHandle<()>,
}

impl BridgeServer {
    /// Bind the first free discovery path and start accepting connections.
    ///
    /// `base_dir` overrides the environment-resolved socket directory
    /// (first of `XDG_RUNTIME_DIR`, `TMPDIR`, else `/tmp`).
    ///
    /// # Errors
    ///
    /// Returns an error when none of the ten candidate paths can be bound.
    /// The caller should log it and carry on; a bridge without a socket is
    /// degraded, not broken.
    pub fn start(bridge: Arc<Bridge>, base_dir: Option<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.unwrap_or_else(resolve_base_dir);
        log::info!("[Bridge] Setting up IPC server under {}", base_dir.display());

        for index in 0..DISCOVERY_ATTEMPTS {
            let candidate = base_dir.join(format!("{SOCKET_PREFIX}{index}"));
            log::debug!("[Bridge] Checking socket path: {}", candidate.display());

            if candidate.as_os_str().len() >= MAX_SOCKET_PATH {
                log::warn!(
                    "[Bridge] Socket path too long ({} bytes, max {}): {}",
                    candidate.as_os_str().len(),
                    MAX_SOCKET_PATH - 1,
                    candidate.display()
                );
                continue;
            }

            if socket_in_use(&candidate) {
                log::info!("[Bridge] Socket {} is already in use", candidate.display());
                continue;
            }

            if candidate.exists() {
                if let Err(err) = std::fs::remove_file(&candidate) {
                    log::warn!(
                        "[Bridge] Failed to remove stale socket {}: {err}",
                        candidate.display()
                    );
                    continue;
                }
                log::info!("[Bridge] Removed stale socket file at {}", candidate.display());
            }

            let listener = match bind_listener(&candidate) {
                Ok(listener) => listener,
                Err(err) => {
                    log::debug!("[Bridge] Could not bind {}: {err:#}", candidate.display());
                    continue;
                }
            };

            log::info!("[Bridge] IPC server listening on {}", candidate.display());
            let accept_handle = tokio::spawn(accept_loop(listener, bridge, candidate.clone()));
            return Ok(Self {
                socket_path: candidate,
                accept_handle,
            });
        }

        anyhow::bail!(
            "Failed to bind any IPC socket from {SOCKET_PREFIX}0 to {SOCKET_PREFIX}{} under {}",
            DISCOVERY_ATTEMPTS - 1,
            base_dir.display()
        )
    }

    /// Path of the bound socket file.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Stop accepting connections and remove the socket file.
    ///
    /// Connections already accepted keep running until their peers close.
    pub fn shutdown(self) {
        self.accept_handle.abort();
        if let Err(err) = std::fs::remove_file(&self.socket_path) {
            log::debug!(
                "[Bridge] Socket file {} already gone: {err}",
                self.socket_path.display()
            );
        }
        log::info!("[Bridge] IPC server stopped on {}", self.socket_path.display());
    }
}

/// Resolve the socket directory from the environment.
fn resolve_base_dir() -> PathBuf {
    std::env::var_os("XDG_RUNTIME_DIR")
        .or_else(|| std::env::var_os("TMPDIR"))
        .map_or_else(|| PathBuf::from(FALLBACK_SOCKET_DIR), PathBuf::from)
}

/// Whether a live server answers on the socket at `path`.
///
/// The probe stream is dropped on every branch, so the descriptor is
/// released whether or not anyone answered.
fn socket_in_use(path: &Path) -> bool {
    if !path.exists() {
        return false;
    }
    match std::os::unix::net::UnixStream::connect(path) {
        Ok(_probe) => true,
        Err(err) => {
            log::debug!(
                "[Bridge] No listener on {} ({err}), treating as stale",
                path.display()
            );
            false
        }
    }
}

/// Bind `path`, restrict it to the owner, and convert to a tokio listener.
///
/// On any failure after the file was created, the file is removed so a
/// half-bound candidate does not turn into a stale node for the next run.
fn bind_listener(path: &Path) -> Result<UnixListener> {
    let listener = std::os::unix::net::UnixListener::bind(path)
        .with_context(|| format!("Failed to bind socket: {}", path.display()))?;

    let setup = || -> Result<UnixListener> {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)?;
        listener.set_nonblocking(true)?;
        Ok(UnixListener::from_std(listener)?)
    };

    setup().inspect_err(|_| {
        let _ = std::fs::remove_file(path);
    })
}

/// Accept loop — runs as a tokio task.
async fn accept_loop(listener: UnixListener, bridge: Arc<Bridge>, socket_path: PathBuf) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                connection::spawn_connection(stream, Arc::clone(&bridge));
            }
            Err(err) => {
                // The socket file disappearing means the server is shutting down.
                if !socket_path.exists() {
                    log::info!("[Bridge] Socket file removed, stopping accept loop");
                    break;
                }
                log::error!("[Bridge] Accept error: {err}");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

//! Voxa Bridge CLI - headless rich presence IPC bridge.
//!
//! This is the binary entry point. It stands in for the desktop shell:
//! it wires a logging presence sink into the bridge, binds a discovery
//! socket, and runs until interrupted. See the `voxa_bridge` library for
//! the core functionality.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;
use voxa_bridge::{spawn_worker, Bridge, BridgeServer, LogSink};

/// Global allocator configured per M-MIMALLOC-APPS guideline.
/// mimalloc provides better multi-threaded performance than the system allocator.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Discord-compatible rich presence IPC bridge.
#[derive(Debug, Parser)]
#[command(name = "voxa-bridge", version, about)]
struct Args {
    /// Directory for the discovery sockets (defaults to XDG_RUNTIME_DIR,
    /// then TMPDIR, then /tmp).
    #[arg(long)]
    socket_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let presence = spawn_worker(Box::new(LogSink));
    let bridge = Arc::new(Bridge::new(presence));

    let server = match BridgeServer::start(Arc::clone(&bridge), args.socket_dir) {
        Ok(server) => Some(server),
        Err(err) => {
            // Degraded, not fatal: the bridge just never sees clients.
            log::error!("[Bridge] {err:#}");
            None
        }
    };

    tokio::signal::ctrl_c().await?;
    log::info!("[Bridge] Interrupted, shutting down");

    if let Some(server) = server {
        server.shutdown();
    }
    Ok(())
}

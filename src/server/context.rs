// src/server/context.rs

use super::state::{ServerInit, ServerState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// Holds all the initialized state required to run the server's main loop.
pub struct ServerContext {
    pub state: Arc<ServerState>,
    /// Taken by the spawner when the dispatcher task starts.
    pub init: Option<ServerInit>,
    pub listener: UnixListener,
    pub socket_path: PathBuf,
    pub shutdown_tx: broadcast::Sender<()>,
    pub background_tasks: JoinSet<Result<(), anyhow::Error>>,
}

// src/server/mod.rs

use crate::config::Config;
use crate::core::account::AccountStore;
use crate::core::desktop::Desktop;
use crate::core::executor::HelperRunner;
use anyhow::Result;
use std::sync::Arc;

mod connection_loop;
mod context;
mod initialization;
mod spawner;
mod state;

pub use context::ServerContext;
pub use state::{ServerInit, ServerState, SessionInfo};

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config, desktop: Arc<dyn Desktop>) -> Result<()> {
    // 1. Build state over the configured account files and bind the socket.
    let mut server_context = initialization::setup(config, desktop).await?;

    // 2. Start the dispatcher before any connection is accepted.
    spawner::spawn_all(&mut server_context)?;

    // 3. Accept sessions until shutdown or until the last client leaves.
    connection_loop::run(server_context).await
}

/// Like [`run`], over a caller-supplied account store and helper runner.
pub async fn run_with(
    config: Config,
    desktop: Arc<dyn Desktop>,
    store: Arc<dyn AccountStore>,
    runner: Arc<dyn HelperRunner>,
) -> Result<()> {
    let mut server_context = initialization::setup_with(config, desktop, store, runner).await?;
    spawner::spawn_all(&mut server_context)?;
    connection_loop::run(server_context).await
}

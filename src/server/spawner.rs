// src/server/spawner.rs

//! Spawns the server's long-running background tasks.

use super::context::ServerContext;
use anyhow::{Result, anyhow};
use tracing::info;

/// Spawns the dispatcher into the context's `JoinSet`.
pub fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let init = ctx
        .init
        .take()
        .ok_or_else(|| anyhow!("Background tasks were already spawned"))?;

    let shutdown_rx = ctx.shutdown_tx.subscribe();
    ctx.background_tasks.spawn(async move {
        init.dispatcher.run(init.dispatch_rx, shutdown_rx).await;
        Ok(())
    });
    info!("Dispatcher task spawned.");
    Ok(())
}

// src/server/connection_loop.rs

//! Contains the main server loop for accepting connections and handling graceful shutdown.

use super::context::ServerContext;
use super::state::SessionInfo;
use crate::connection::ConnectionHandler;
use anyhow::{Result, anyhow};
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// The main server loop that accepts connections and handles graceful shutdown.
///
/// With `exit_on_disconnect` set, the loop ends once a client has connected
/// and every session has closed again.
pub async fn run(mut ctx: ServerContext) -> Result<()> {
    let mut session_id_counter: u64 = 0;
    let mut client_tasks = JoinSet::new();

    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to register SIGINT handler: {}", e))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to register SIGTERM handler: {}", e))?;

    loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => error!("CRITICAL: Background task failed: {}. Shutting down.", e),
                    Err(e) => error!("CRITICAL: Background task panicked: {e:?}. Shutting down."),
                }
                break;
            },

            res = ctx.listener.accept() => {
                match res {
                    Ok((socket, _addr)) => {
                        session_id_counter = session_id_counter.wrapping_add(1);
                        let session_id = session_id_counter;
                        info!("Accepted client session {}.", session_id);

                        ctx.state.sessions.insert(session_id, SessionInfo::new(session_id));
                        let handler = ConnectionHandler::new(
                            socket,
                            ctx.state.clone(),
                            session_id,
                            ctx.shutdown_tx.subscribe(),
                        );
                        client_tasks.spawn(async move {
                            if let Err(e) = handler.run().await {
                                warn!("Session {} terminated unexpectedly: {}", session_id, e);
                            }
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                }
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A client handler panicked: {e:?}");
                }
                if ctx.state.config.exit_on_disconnect && ctx.state.sessions.is_empty() {
                    info!("Last client session closed; shutting down.");
                    break;
                }
                debug!("{} session(s) still connected.", ctx.state.sessions.len());
            },
        }
    }

    info!("Shutting down. Sending signal to all tasks.");
    if ctx.shutdown_tx.send(()).is_err() {
        debug!("No task was listening for the shutdown signal.");
    }

    client_tasks.shutdown().await;
    info!("All client connections closed.");

    info!("Waiting for background tasks to finish...");
    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    }

    if let Err(e) = std::fs::remove_file(&ctx.socket_path) {
        debug!("Could not remove socket file '{}': {}", ctx.socket_path.display(), e);
    }
    info!("Account service shutdown complete.");
    Ok(())
}

// src/server/initialization.rs

//! Builds the service state and binds the listening socket.

use super::context::ServerContext;
use super::state::ServerState;
use crate::config::Config;
use crate::core::account::{AccountStore, FileStore};
use crate::core::desktop::Desktop;
use crate::core::executor::{HelperRunner, ProcessRunner};
use anyhow::{Context, Result, anyhow};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Initializes all server components before starting the main loop.
pub async fn setup(config: Config, desktop: Arc<dyn Desktop>) -> Result<ServerContext> {
    log_startup_info(&config);

    let store: Arc<dyn AccountStore> = Arc::new(FileStore::new(
        &config.store.passwd_path,
        &config.store.shadow_path,
        &config.store.group_path,
    ));
    let runner: Arc<dyn HelperRunner> = Arc::new(ProcessRunner);
    setup_with(config, desktop, store, runner).await
}

/// Like [`setup`], with the account store and helper runner supplied by the
/// caller.
pub async fn setup_with(
    config: Config,
    desktop: Arc<dyn Desktop>,
    store: Arc<dyn AccountStore>,
    runner: Arc<dyn HelperRunner>,
) -> Result<ServerContext> {
    let (shutdown_tx, _) = broadcast::channel(1);
    let socket_path = config.socket_path.clone();
    let listener = bind_socket(&socket_path).await?;
    info!("Account service listening on {}", socket_path.display());

    let init = ServerState::initialize(config, desktop, store, runner);
    Ok(ServerContext {
        state: init.state.clone(),
        init: Some(init),
        listener,
        socket_path,
        shutdown_tx,
        background_tasks: JoinSet::new(),
    })
}

/// Binds the Unix socket, creating its directory and replacing a stale socket
/// file left by a previous run. A socket that still accepts connections is
/// left alone and reported as an error.
async fn bind_socket(path: &Path) -> Result<UnixListener> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create socket directory '{}'", parent.display())
        })?;
        info!("Created socket directory: {}", parent.display());
    }

    match tokio::fs::symlink_metadata(path).await {
        Ok(_) => {
            if UnixStream::connect(path).await.is_ok() {
                return Err(anyhow!(
                    "Another account service is already listening on '{}'",
                    path.display()
                ));
            }
            warn!("Removing stale socket file '{}'.", path.display());
            tokio::fs::remove_file(path)
                .await
                .with_context(|| format!("Failed to remove stale socket '{}'", path.display()))?;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(anyhow!("Failed to inspect '{}': {}", path.display(), e));
        }
    }

    UnixListener::bind(path).with_context(|| format!("Failed to bind '{}'", path.display()))
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    info!(
        "Account database: passwd={}, shadow={}, group={}",
        config.store.passwd_path.display(),
        config.store.shadow_path.display(),
        config.store.group_path.display()
    );
    info!(
        "Helpers: useradd={}, userdel={}",
        config.helpers.useradd.display(),
        config.helpers.userdel.display()
    );
    if config.auth.root_bypass {
        info!("Requests acting as root are authorized without a prompt.");
    }
    if !config.exit_on_disconnect {
        warn!("exit_on_disconnect is off; the service keeps running after its clients leave.");
    }
}

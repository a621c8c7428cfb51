// src/core/executor/deletion.rs

use super::helper::{HelperRunner, run_helper};
use crate::core::desktop::{Desktop, MessageKind, WindowId};
use crate::core::errors::AccountError;
use std::path::Path;
use tracing::info;

/// Removes `username` by running the deletion helper. Only a zero exit status
/// counts as success, and a failed run is not retried.
pub async fn delete_account(
    runner: &dyn HelperRunner,
    userdel: &Path,
    desktop: &dyn Desktop,
    parent: Option<WindowId>,
    username: &str,
) -> Result<(), AccountError> {
    run_helper(runner, userdel, username).await?;
    info!("Deleted account '{}'.", username);
    desktop
        .show_message(parent, MessageKind::Information, "User successfully deleted.")
        .await;
    Ok(())
}

// src/core/executor/helper.rs

//! Delegation to external privileged helper programs (`useradd`, `userdel`).

use crate::core::errors::AccountError;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, warn};

/// How a helper process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelperStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl HelperStatus {
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for HelperStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit status {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => f.write_str("unknown status"),
        }
    }
}

impl From<std::process::ExitStatus> for HelperStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        Self {
            code: status.code(),
            signal: status.signal(),
        }
    }
}

/// Spawns a helper with a single argument and waits for it to exit.
#[async_trait]
pub trait HelperRunner: Send + Sync {
    async fn run(&self, program: &Path, argument: &str) -> Result<HelperStatus, AccountError>;
}

/// Runs helpers as real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl HelperRunner for ProcessRunner {
    async fn run(&self, program: &Path, argument: &str) -> Result<HelperStatus, AccountError> {
        debug!("Spawning {} {}", program.display(), argument);
        let status = Command::new(program)
            .arg(argument)
            .status()
            .await
            .map_err(|e| AccountError::HelperSpawn {
                program: program.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(status.into())
    }
}

/// Runs a helper and turns any unsuccessful exit into `HelperExit`.
pub async fn run_helper(
    runner: &dyn HelperRunner,
    program: &Path,
    argument: &str,
) -> Result<(), AccountError> {
    let status = runner.run(program, argument).await?;
    if !status.success() {
        warn!("{} {} failed with {}", program.display(), argument, status);
        return Err(AccountError::HelperExit {
            program: program.display().to_string(),
            status: status.to_string(),
        });
    }
    Ok(())
}

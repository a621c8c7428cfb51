// src/config.rs

//! Manages service configuration: loading from TOML and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Locations of the account database files.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_passwd_path")]
    pub passwd_path: PathBuf,
    #[serde(default = "default_shadow_path")]
    pub shadow_path: PathBuf,
    #[serde(default = "default_group_path")]
    pub group_path: PathBuf,
    /// The list of valid login shells.
    #[serde(default = "default_shells_path")]
    pub shells_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            passwd_path: default_passwd_path(),
            shadow_path: default_shadow_path(),
            group_path: default_group_path(),
            shells_path: default_shells_path(),
        }
    }
}

fn default_passwd_path() -> PathBuf {
    PathBuf::from("/etc/passwd")
}
fn default_shadow_path() -> PathBuf {
    PathBuf::from("/etc/shadow")
}
fn default_group_path() -> PathBuf {
    PathBuf::from("/etc/group")
}
fn default_shells_path() -> PathBuf {
    PathBuf::from("/etc/shells")
}

/// External programs that perform OS-level account creation and deletion.
/// Each is invoked with the username as its only argument.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HelperConfig {
    #[serde(default = "default_useradd")]
    pub useradd: PathBuf,
    #[serde(default = "default_userdel")]
    pub userdel: PathBuf,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            useradd: default_useradd(),
            userdel: default_userdel(),
        }
    }
}

fn default_useradd() -> PathBuf {
    PathBuf::from("/bin/useradd")
}
fn default_userdel() -> PathBuf {
    PathBuf::from("/bin/userdel")
}

/// Defaults applied to newly created accounts.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccountsConfig {
    #[serde(default = "default_shell")]
    pub default_shell: String,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            default_shell: default_shell(),
        }
    }
}

fn default_shell() -> String {
    "/bin/Shell".to_string()
}

/// Escalation prompt behavior.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthConfig {
    /// If true, requests acting as root are authorized without a prompt.
    #[serde(default = "default_root_bypass")]
    pub root_bypass: bool,
    /// Delay after each rejected secret, in milliseconds.
    #[serde(default = "default_failure_delay_ms")]
    pub failure_delay_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            root_bypass: default_root_bypass(),
            failure_delay_ms: default_failure_delay_ms(),
        }
    }
}

impl AuthConfig {
    pub fn failure_delay(&self) -> Duration {
        Duration::from_millis(self.failure_delay_ms)
    }
}

fn default_root_bypass() -> bool {
    true
}
fn default_failure_delay_ms() -> u64 {
    100
}

/// The top-level configuration of the account service.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Shut the service down once its last client session has closed.
    #[serde(default = "default_exit_on_disconnect")]
    pub exit_on_disconnect: bool,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub helpers: HelperConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/portal/accounts")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_exit_on_disconnect() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            log_level: default_log_level(),
            exit_on_disconnect: default_exit_on_disconnect(),
            store: StoreConfig::default(),
            helpers: HelperConfig::default(),
            accounts: AccountsConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config in '{path}'"))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(anyhow!("socket_path cannot be empty"));
        }
        if self.accounts.default_shell.trim().is_empty() {
            return Err(anyhow!("accounts.default_shell cannot be empty"));
        }
        if self.accounts.default_shell.contains(':') {
            return Err(anyhow!("accounts.default_shell cannot contain ':'"));
        }
        for (name, path) in [
            ("helpers.useradd", &self.helpers.useradd),
            ("helpers.userdel", &self.helpers.userdel),
        ] {
            if path.as_os_str().is_empty() {
                return Err(anyhow!("{name} cannot be empty"));
            }
            if !path.is_absolute() {
                warn!(
                    "{} is not an absolute path ({}); it will be resolved through PATH.",
                    name,
                    path.display()
                );
            }
        }
        if self.auth.failure_delay_ms > 10_000 {
            warn!(
                "auth.failure_delay_ms is {} ms; every wrong password will stall the prompt that long.",
                self.auth.failure_delay_ms
            );
        }
        Ok(())
    }
}

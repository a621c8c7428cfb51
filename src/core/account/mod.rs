// src/core/account/mod.rs

//! Account and group records, and the store they are synchronized through.
//!
//! Records are plain values: setters only change the in-memory copy, and the
//! change becomes durable when the record is passed to
//! [`AccountStore::sync_account`] or [`AccountStore::sync_group`]. Until then
//! the in-memory copy may disagree with the store.

pub mod shells;
pub mod store;

pub use shells::available_shells;
pub use store::{AccountStore, FileStore};

use crate::core::auth::SecretString;
use crate::core::errors::AccountError;
use argon2::password_hash::{PasswordHasher, SaltString};
use argon2::Argon2;
use rand::RngCore;

/// The uid of the superuser.
pub const ROOT_UID: u32 = 0;

/// How an account authenticates.
///
/// The on-disk form encodes this in the shape of the hash field; the store
/// translates between the two so nothing else has to look at hash prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordState {
    /// Login needs no password at all. Any candidate secret is accepted.
    NoPassword,
    /// Login is disabled. `stashed_hash` keeps the previous hash so the
    /// account can be re-enabled without choosing a new password.
    Disabled { stashed_hash: Option<String> },
    /// A PHC-format password hash.
    Hashed(String),
}

impl PasswordState {
    pub fn is_disabled(&self) -> bool {
        matches!(self, PasswordState::Disabled { .. })
    }
}

/// The five comma-separated subfields of the gecos field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Gecos {
    pub full_name: String,
    pub room: String,
    pub office_tel: String,
    pub home_tel: String,
    pub other_info: String,
}

impl Gecos {
    /// Splits a stored gecos string. Missing trailing subfields are left empty
    /// and anything past the fifth comma is ignored.
    pub fn parse(raw: &str) -> Self {
        let mut fields = raw.split(',').map(str::to_string);
        Self {
            full_name: fields.next().unwrap_or_default(),
            room: fields.next().unwrap_or_default(),
            office_tel: fields.next().unwrap_or_default(),
            home_tel: fields.next().unwrap_or_default(),
            other_info: fields.next().unwrap_or_default(),
        }
    }

    pub fn compose(&self) -> String {
        format!(
            "{},{},{},{},{}",
            self.full_name, self.room, self.office_tel, self.home_tel, self.other_info
        )
    }
}

/// A user account record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    uid: u32,
    gid: u32,
    username: String,
    extra_gids: Vec<u32>,
    gecos: String,
    home_directory: String,
    shell: String,
    password: PasswordState,
}

impl Account {
    pub fn new(uid: u32, gid: u32, username: impl Into<String>) -> Self {
        let username = username.into();
        Self {
            uid,
            gid,
            home_directory: format!("/home/{username}"),
            username,
            extra_gids: Vec::new(),
            gecos: String::new(),
            shell: String::new(),
            password: PasswordState::Disabled { stashed_hash: None },
        }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn gid(&self) -> u32 {
        self.gid
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Secondary group ids, as found in the group database at load time.
    pub fn extra_gids(&self) -> &[u32] {
        &self.extra_gids
    }

    pub fn gecos(&self) -> &str {
        &self.gecos
    }

    pub fn home_directory(&self) -> &str {
        &self.home_directory
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    pub fn password_state(&self) -> &PasswordState {
        &self.password
    }

    pub fn is_root(&self) -> bool {
        self.uid == ROOT_UID
    }

    pub fn set_gid(&mut self, gid: u32) {
        self.gid = gid;
    }

    pub fn set_extra_gids(&mut self, gids: Vec<u32>) {
        self.extra_gids = gids;
    }

    pub fn set_gecos(&mut self, gecos: impl Into<String>) {
        self.gecos = gecos.into();
    }

    pub fn set_home_directory(&mut self, home: impl Into<String>) {
        self.home_directory = home.into();
    }

    pub fn set_shell(&mut self, shell: impl Into<String>) {
        self.shell = shell.into();
    }

    pub fn set_password_state(&mut self, state: PasswordState) {
        self.password = state;
    }

    /// Hashes `secret` with Argon2 and stores the result.
    pub fn set_password(&mut self, secret: &SecretString) -> Result<(), AccountError> {
        let mut salt_bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| AccountError::PasswordHash(e.to_string()))?;
        let hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| AccountError::PasswordHash(e.to_string()))?;
        self.password = PasswordState::Hashed(hash.to_string());
        Ok(())
    }

    /// Enables or disables login, keeping any existing hash recoverable.
    pub fn set_password_enabled(&mut self, enabled: bool) {
        let current = std::mem::replace(&mut self.password, PasswordState::NoPassword);
        self.password = match (enabled, current) {
            (false, PasswordState::Hashed(hash)) => PasswordState::Disabled {
                stashed_hash: Some(hash),
            },
            (false, PasswordState::NoPassword) => PasswordState::Disabled { stashed_hash: None },
            (
                true,
                PasswordState::Disabled {
                    stashed_hash: Some(hash),
                },
            ) if !hash.is_empty() => PasswordState::Hashed(hash),
            (_, state) => state,
        };
    }

    /// Marks the account as not requiring a password.
    pub fn delete_password(&mut self) {
        self.password = PasswordState::NoPassword;
    }
}

/// A group record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    gid: u32,
    name: String,
    members: Vec<String>,
}

impl Group {
    pub fn new(gid: u32, name: impl Into<String>, members: Vec<String>) -> Self {
        Self {
            gid,
            name: name.into(),
            members,
        }
    }

    pub fn id(&self) -> u32 {
        self.gid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut Vec<String> {
        &mut self.members
    }

    pub fn has_member(&self, username: &str) -> bool {
        self.members.iter().any(|m| m == username)
    }
}


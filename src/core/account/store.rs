// src/core/account/store.rs

//! The account/group database and its text-file implementation.
//!
//! `FileStore` reads and writes three colon-separated files:
//!
//! - passwd: `name:x:uid:gid:gecos:home:shell`
//! - shadow: `name:hash[:...]`
//! - group:  `name:x:gid:member,member,...`
//!
//! The shadow hash field uses the legacy three-shape encoding: an empty field
//! means no password is required, a leading `!` (or no shadow entry at all)
//! means login is disabled, anything else is a password hash. This module is the
//! only place that encoding is read or produced.

use super::{Account, Group, PasswordState};
use crate::core::errors::AccountError;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DISABLED_SENTINEL: char = '!';

/// Synchronous access to the system account/group database.
pub trait AccountStore: Send + Sync {
    fn all_accounts(&self) -> Result<Vec<Account>, AccountError>;

    fn account_by_id(&self, uid: u32) -> Result<Account, AccountError> {
        self.all_accounts()?
            .into_iter()
            .find(|a| a.uid() == uid)
            .ok_or(AccountError::AccountNotFound(uid))
    }

    fn account_by_name(&self, name: &str) -> Result<Account, AccountError> {
        self.all_accounts()?
            .into_iter()
            .find(|a| a.username() == name)
            .ok_or_else(|| AccountError::AccountNameNotFound(name.to_string()))
    }

    /// Writes the account's passwd and shadow entries.
    fn sync_account(&self, account: &Account) -> Result<(), AccountError>;

    fn all_groups(&self) -> Result<Vec<Group>, AccountError>;

    /// Writes the group's entry, including its member list.
    fn sync_group(&self, group: &Group) -> Result<(), AccountError>;
}

/// Decodes a shadow hash field. `None` means the account has no shadow entry.
pub fn decode_password_field(field: Option<&str>) -> PasswordState {
    match field {
        None => PasswordState::Disabled { stashed_hash: None },
        Some("") => PasswordState::NoPassword,
        Some(hash) => match hash.strip_prefix(DISABLED_SENTINEL) {
            Some("") => PasswordState::Disabled { stashed_hash: None },
            Some(stashed) => PasswordState::Disabled {
                stashed_hash: Some(stashed.to_string()),
            },
            None => PasswordState::Hashed(hash.to_string()),
        },
    }
}

/// Encodes a password state into a shadow hash field.
pub fn encode_password_field(state: &PasswordState) -> String {
    match state {
        PasswordState::NoPassword => String::new(),
        PasswordState::Disabled { stashed_hash } => {
            format!("{DISABLED_SENTINEL}{}", stashed_hash.as_deref().unwrap_or(""))
        }
        PasswordState::Hashed(hash) => hash.clone(),
    }
}

/// A text-file backed account store.
#[derive(Debug, Clone)]
pub struct FileStore {
    passwd_path: PathBuf,
    shadow_path: PathBuf,
    group_path: PathBuf,
}

struct PasswdEntry {
    username: String,
    uid: u32,
    gid: u32,
    gecos: String,
    home: String,
    shell: String,
}

impl FileStore {
    pub fn new(
        passwd_path: impl Into<PathBuf>,
        shadow_path: impl Into<PathBuf>,
        group_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            passwd_path: passwd_path.into(),
            shadow_path: shadow_path.into(),
            group_path: group_path.into(),
        }
    }

    fn read_passwd(&self) -> Result<Vec<PasswdEntry>, AccountError> {
        let contents = read_file(&self.passwd_path)?;
        let mut entries = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() != 7 {
                return Err(parse_error(&self.passwd_path, index, "expected 7 fields"));
            }
            entries.push(PasswdEntry {
                username: fields[0].to_string(),
                uid: parse_id(&self.passwd_path, index, fields[2])?,
                gid: parse_id(&self.passwd_path, index, fields[3])?,
                gecos: fields[4].to_string(),
                home: fields[5].to_string(),
                shell: fields[6].to_string(),
            });
        }
        Ok(entries)
    }

    /// Maps usernames to raw shadow hash fields. A missing shadow file is an
    /// empty map; any other read failure is an error.
    fn read_shadow(&self) -> Result<HashMap<String, String>, AccountError> {
        let contents = match fs::read_to_string(&self.shadow_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(AccountError::StoreRead(format!(
                    "{}: {e}",
                    self.shadow_path.display()
                )));
            }
        };
        let mut map = HashMap::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let mut fields = line.splitn(3, ':');
            let name = fields.next().unwrap_or_default();
            let hash = fields.next().unwrap_or_default();
            map.insert(name.to_string(), hash.to_string());
        }
        Ok(map)
    }

    fn rewrite_shadow(&self, account: &Account) -> Result<(), AccountError> {
        let contents = match fs::read_to_string(&self.shadow_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(AccountError::StoreRead(format!(
                    "{}: {e}",
                    self.shadow_path.display()
                )));
            }
        };
        let hash_field = encode_password_field(account.password_state());
        let mut replaced = false;
        let mut lines = Vec::new();
        for line in contents.lines() {
            let mut fields = line.splitn(3, ':');
            let name = fields.next().unwrap_or_default();
            if name == account.username() {
                let _old_hash = fields.next();
                lines.push(match fields.next() {
                    Some(rest) => format!("{name}:{hash_field}:{rest}"),
                    None => format!("{name}:{hash_field}"),
                });
                replaced = true;
            } else {
                lines.push(line.to_string());
            }
        }
        if !replaced {
            lines.push(format!("{}:{hash_field}", account.username()));
        }
        write_atomically(&self.shadow_path, &join_lines(&lines))
    }
}

impl AccountStore for FileStore {
    fn all_accounts(&self) -> Result<Vec<Account>, AccountError> {
        let passwd = self.read_passwd()?;
        let shadow = self.read_shadow()?;
        let groups = self.all_groups()?;

        Ok(passwd
            .into_iter()
            .map(|entry| {
                let mut account = Account::new(entry.uid, entry.gid, entry.username);
                account.set_gecos(entry.gecos);
                account.set_home_directory(entry.home);
                account.set_shell(entry.shell);
                account.set_password_state(decode_password_field(
                    shadow.get(account.username()).map(String::as_str),
                ));
                let extra_gids = groups
                    .iter()
                    .filter(|g| g.has_member(account.username()))
                    .map(Group::id)
                    .collect();
                account.set_extra_gids(extra_gids);
                account
            })
            .collect())
    }

    fn sync_account(&self, account: &Account) -> Result<(), AccountError> {
        for field in [account.gecos(), account.home_directory(), account.shell()] {
            check_field(field)?;
        }

        let contents = read_file(&self.passwd_path)?;
        let new_line = format!(
            "{}:x:{}:{}:{}:{}:{}",
            account.username(),
            account.uid(),
            account.gid(),
            account.gecos(),
            account.home_directory(),
            account.shell()
        );
        let mut replaced = false;
        let lines: Vec<String> = contents
            .lines()
            .map(|line| {
                if line.split(':').next() == Some(account.username()) {
                    replaced = true;
                    new_line.clone()
                } else {
                    line.to_string()
                }
            })
            .collect();
        if !replaced {
            return Err(AccountError::AccountNameNotFound(
                account.username().to_string(),
            ));
        }

        write_atomically(&self.passwd_path, &join_lines(&lines))?;
        self.rewrite_shadow(account)?;
        info!("Synchronized account '{}'.", account.username());
        Ok(())
    }

    fn all_groups(&self) -> Result<Vec<Group>, AccountError> {
        let contents = read_file(&self.group_path)?;
        let mut groups = Vec::new();
        for (index, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() != 4 {
                return Err(parse_error(&self.group_path, index, "expected 4 fields"));
            }
            let members = fields[3]
                .split(',')
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
            groups.push(Group::new(
                parse_id(&self.group_path, index, fields[2])?,
                fields[0],
                members,
            ));
        }
        Ok(groups)
    }

    fn sync_group(&self, group: &Group) -> Result<(), AccountError> {
        for member in group.members() {
            check_field(member)?;
            if member.contains(',') {
                return Err(AccountError::StoreWrite(format!(
                    "group member '{member}' contains ','"
                )));
            }
        }

        let contents = read_file(&self.group_path)?;
        let mut replaced = false;
        let lines: Vec<String> = contents
            .lines()
            .map(|line| {
                let fields: Vec<&str> = line.split(':').collect();
                if fields.len() == 4 && fields[2].parse::<u32>().ok() == Some(group.id()) {
                    replaced = true;
                    format!(
                        "{}:{}:{}:{}",
                        group.name(),
                        fields[1],
                        group.id(),
                        group.members().join(",")
                    )
                } else {
                    line.to_string()
                }
            })
            .collect();
        if !replaced {
            return Err(AccountError::StoreWrite(format!(
                "group {} is not in {}",
                group.id(),
                self.group_path.display()
            )));
        }

        write_atomically(&self.group_path, &join_lines(&lines))?;
        debug!("Synchronized group '{}'.", group.name());
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<String, AccountError> {
    fs::read_to_string(path)
        .map_err(|e| AccountError::StoreRead(format!("{}: {e}", path.display())))
}

fn parse_id(path: &Path, index: usize, raw: &str) -> Result<u32, AccountError> {
    raw.parse::<u32>()
        .map_err(|_| parse_error(path, index, &format!("invalid id '{raw}'")))
}

fn parse_error(path: &Path, index: usize, reason: &str) -> AccountError {
    AccountError::StoreParse {
        file: path.display().to_string(),
        line: index + 1,
        reason: reason.to_string(),
    }
}

/// Rejects values that would corrupt the colon-separated line format.
fn check_field(value: &str) -> Result<(), AccountError> {
    if value.contains(':') || value.contains('\n') {
        return Err(AccountError::StoreWrite(format!(
            "field '{}' contains ':' or a newline",
            value.escape_default()
        )));
    }
    Ok(())
}

fn join_lines(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Writes to a temporary sibling and renames it over `path`, carrying over the
/// original file's permissions.
fn write_atomically(path: &Path, contents: &str) -> Result<(), AccountError> {
    let temp_path = PathBuf::from(format!(
        "{}.tmp-accountd-{}",
        path.display(),
        rand::random::<u32>()
    ));

    fs::write(&temp_path, contents)
        .map_err(|e| AccountError::StoreWrite(format!("failed to write temp file: {e}")))?;

    if let Ok(metadata) = fs::metadata(path) {
        if let Err(e) = fs::set_permissions(&temp_path, metadata.permissions()) {
            let _ = fs::remove_file(&temp_path);
            return Err(AccountError::StoreWrite(format!(
                "failed to copy permissions: {e}"
            )));
        }
    }

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        AccountError::StoreWrite(format!(
            "failed to atomically rename {}: {e}",
            path.display()
        ))
    })
}

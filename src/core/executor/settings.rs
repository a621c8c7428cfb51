// src/core/executor/settings.rs

//! Applies shell, gecos, and group changes to an account.

use super::validation::validate_shell;
use crate::core::account::{Account, AccountStore, available_shells};
use crate::core::errors::AccountError;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// The settings submitted for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub shell: String,
    pub gecos: String,
    pub primary_gid: u32,
    pub secondary_gids: Vec<u32>,
}

/// Writes the account record, then rewrites group memberships so the user is
/// listed in exactly the submitted secondary groups.
///
/// The shell must be listed in `shells_path` or be the account's current
/// shell; nothing is written otherwise. The primary group is implied by the
/// account record and is never added to a member list. The first failing
/// group write aborts the rest; groups already written are left as they are.
pub fn apply_settings(
    store: &dyn AccountStore,
    shells_path: &Path,
    mut target: Account,
    update: &SettingsUpdate,
) -> Result<(), AccountError> {
    let shells = available_shells(shells_path, target.shell())?;
    validate_shell(&update.shell, &shells)?;

    target.set_shell(update.shell.clone());
    target.set_gecos(update.gecos.clone());
    target.set_gid(update.primary_gid);
    store.sync_account(&target)?;

    let wanted: HashSet<u32> = update
        .secondary_gids
        .iter()
        .copied()
        .filter(|gid| *gid != update.primary_gid)
        .collect();

    let username = target.username().to_string();
    let mut changed = 0usize;
    for mut group in store.all_groups()? {
        let was_member = group.has_member(&username);
        let should_be_member = wanted.contains(&group.id());
        if was_member == should_be_member {
            continue;
        }

        group.members_mut().retain(|member| *member != username);
        if should_be_member {
            group.members_mut().push(username.clone());
        }
        debug!(
            "{} '{}' {} group '{}'.",
            if should_be_member { "Adding" } else { "Removing" },
            username,
            if should_be_member { "to" } else { "from" },
            group.name()
        );
        store.sync_group(&group)?;
        changed += 1;
    }

    info!(
        "Updated settings for '{}' ({} group membership change(s)).",
        username, changed
    );
    Ok(())
}

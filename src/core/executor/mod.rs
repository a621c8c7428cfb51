// src/core/executor/mod.rs

//! The privileged operations. Each one assumes the acting account has already
//! been authorized; the dispatcher is responsible for that.
//!
//! None of the multi-step operations are transactional. A failure part way
//! through leaves the steps already synchronized in place.

pub mod addition;
pub mod deletion;
pub mod helper;
pub mod password;
pub mod settings;
pub mod validation;

pub use addition::{AddUserWizard, NewUserSettings, run_wizard};
pub use helper::{HelperRunner, HelperStatus, ProcessRunner};
pub use password::PasswordChangeDialog;
pub use settings::{SettingsUpdate, apply_settings};

use crate::config::{AccountsConfig, HelperConfig};
use crate::core::account::{Account, AccountStore};
use crate::core::desktop::{Desktop, PasswordChoice, WindowId};
use crate::core::errors::AccountError;
use helper::run_helper;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Runs privileged operations against one store with one set of helpers.
pub struct Executor {
    store: Arc<dyn AccountStore>,
    desktop: Arc<dyn Desktop>,
    runner: Arc<dyn HelperRunner>,
    helpers: HelperConfig,
    accounts: AccountsConfig,
    shells_path: PathBuf,
}

impl Executor {
    pub fn new(
        store: Arc<dyn AccountStore>,
        desktop: Arc<dyn Desktop>,
        runner: Arc<dyn HelperRunner>,
        helpers: HelperConfig,
        accounts: AccountsConfig,
        shells_path: PathBuf,
    ) -> Self {
        Self {
            store,
            desktop,
            runner,
            helpers,
            accounts,
            shells_path,
        }
    }

    pub fn store(&self) -> &Arc<dyn AccountStore> {
        &self.store
    }

    pub async fn change_password(
        &self,
        target: Account,
        parent: Option<WindowId>,
    ) -> Result<(), AccountError> {
        PasswordChangeDialog::new(target, parent)
            .run(self.desktop.as_ref(), self.store.as_ref())
            .await
    }

    pub fn update_settings(
        &self,
        target: Account,
        update: &SettingsUpdate,
    ) -> Result<(), AccountError> {
        apply_settings(self.store.as_ref(), &self.shells_path, target, update)
    }

    pub async fn delete_account(
        &self,
        target: &Account,
        parent: Option<WindowId>,
    ) -> Result<(), AccountError> {
        deletion::delete_account(
            self.runner.as_ref(),
            &self.helpers.userdel,
            self.desktop.as_ref(),
            parent,
            target.username(),
        )
        .await
    }

    /// Runs the add-user wizard and creates the account it describes.
    /// Returns the uid the helper assigned.
    pub async fn create_account(&self, parent: Option<WindowId>) -> Result<u32, AccountError> {
        let settings = run_wizard(self.desktop.as_ref(), parent).await?;
        self.create_from_settings(settings).await
    }

    /// Creates an account from already collected settings.
    ///
    /// If anything after the helper fails, the account is left exactly as the
    /// helper created it.
    pub async fn create_from_settings(
        &self,
        settings: NewUserSettings,
    ) -> Result<u32, AccountError> {
        run_helper(
            self.runner.as_ref(),
            &self.helpers.useradd,
            &settings.username,
        )
        .await?;

        let mut account = match self.store.account_by_name(&settings.username) {
            Ok(account) => account,
            Err(AccountError::AccountNameNotFound(name)) => {
                return Err(AccountError::CreatedAccountMissing(name));
            }
            Err(e) => return Err(e),
        };

        match settings.choice {
            PasswordChoice::SetPassword => account.set_password(&settings.password)?,
            PasswordChoice::NoPasswordRequired => account.delete_password(),
            PasswordChoice::LoginDisabled => account.set_password_enabled(false),
        }
        account.set_gecos(settings.gecos.compose());
        account.set_shell(self.accounts.default_shell.clone());
        self.store.sync_account(&account)?;

        info!(
            "Created account '{}' with uid {}.",
            account.username(),
            account.uid()
        );
        Ok(account.uid())
    }
}

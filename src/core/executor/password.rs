// src/core/executor/password.rs

//! The password change dialog: set a new password, require no password, or
//! disable login for the target account.

use super::validation::validate_password;
use crate::core::account::{Account, AccountStore, PasswordState};
use crate::core::auth::SecretString;
use crate::core::desktop::{
    Desktop, MessageKind, PasswordChoice, PasswordDialogEvent, PasswordDialogSurface, WindowId,
};
use crate::core::errors::AccountError;
use tracing::{debug, info};

/// Drives one password dialog for `target`.
pub struct PasswordChangeDialog {
    target: Account,
    choice: PasswordChoice,
    parent: Option<WindowId>,
}

impl PasswordChangeDialog {
    /// The dialog starts with the choice matching the target's current state.
    pub fn new(target: Account, parent: Option<WindowId>) -> Self {
        let choice = match target.password_state() {
            PasswordState::NoPassword => PasswordChoice::NoPasswordRequired,
            PasswordState::Disabled { .. } => PasswordChoice::LoginDisabled,
            PasswordState::Hashed(_) => PasswordChoice::SetPassword,
        };
        Self {
            target,
            choice,
            parent,
        }
    }

    pub fn choice(&self) -> PasswordChoice {
        self.choice
    }

    /// Shows the dialog and applies the confirmed choice.
    ///
    /// Returns `Cancelled` if the dialog is dismissed, or the store error if
    /// the account could not be synchronized.
    pub async fn run(
        mut self,
        desktop: &dyn Desktop,
        store: &dyn AccountStore,
    ) -> Result<(), AccountError> {
        let mut surface = desktop.open_password_dialog(self.parent, &self.target)?;
        surface.set_choice(self.choice, self.choice.enabled_inputs());

        let result = self.event_loop(surface.as_mut(), desktop, store).await;
        surface.close();
        result
    }

    async fn event_loop(
        &mut self,
        surface: &mut dyn PasswordDialogSurface,
        desktop: &dyn Desktop,
        store: &dyn AccountStore,
    ) -> Result<(), AccountError> {
        loop {
            match surface.next_event().await {
                PasswordDialogEvent::Select(choice) => {
                    self.choice = choice;
                    surface.set_choice(choice, choice.enabled_inputs());
                }
                PasswordDialogEvent::Submit { password, confirm } => {
                    if let Err(e) = validate_password(self.choice, &password, &confirm) {
                        desktop
                            .show_message(self.parent, MessageKind::Error, &e.to_string())
                            .await;
                        if let Some(field) = e.focus_field() {
                            surface.focus(field);
                        }
                        continue;
                    }
                    if !self.apply_choice(desktop, &password).await? {
                        continue;
                    }
                    store.sync_account(&self.target)?;
                    info!(
                        "Password state for '{}' updated ({:?}).",
                        self.target.username(),
                        self.choice
                    );
                    desktop
                        .show_message(
                            self.parent,
                            MessageKind::Information,
                            "User password updated successfully.",
                        )
                        .await;
                    return Ok(());
                }
                PasswordDialogEvent::Cancel | PasswordDialogEvent::Closed => {
                    debug!("Password dialog dismissed.");
                    return Err(AccountError::Cancelled);
                }
            }
        }
    }

    /// Mutates the in-memory target. Returns false if the user backed out of
    /// a confirmation and the dialog should stay open.
    async fn apply_choice(
        &mut self,
        desktop: &dyn Desktop,
        password: &SecretString,
    ) -> Result<bool, AccountError> {
        match self.choice {
            PasswordChoice::LoginDisabled => {
                desktop
                    .show_message(
                        self.parent,
                        MessageKind::Information,
                        "User account lock will take effect upon next login attempt.",
                    )
                    .await;
                self.target.set_password_enabled(false);
            }
            PasswordChoice::NoPasswordRequired => {
                let confirmed = desktop
                    .confirm(
                        self.parent,
                        "This account will be accessible to all users on and off this computer. Are you sure you want to continue?",
                    )
                    .await;
                if !confirmed {
                    return Ok(false);
                }
                self.target.delete_password();
            }
            PasswordChoice::SetPassword => {
                self.target.set_password(password)?;
            }
        }
        Ok(true)
    }
}

// src/core/executor/addition.rs

//! The add-user wizard: username, then authorization method, then profile.
//! Each "Next" validates the page being left.

use super::validation::{validate_password, validate_username};
use crate::core::account::Gecos;
use crate::core::auth::SecretString;
use crate::core::desktop::{
    Desktop, FormField, MessageKind, PageInput, PasswordChoice, WindowId, WizardEvent, WizardPage,
    WizardSurface,
};
use crate::core::errors::AccountError;
use tracing::debug;

/// Everything collected by a completed wizard.
#[derive(Debug, Clone)]
pub struct NewUserSettings {
    pub username: String,
    pub choice: PasswordChoice,
    pub password: SecretString,
    pub gecos: Gecos,
}

/// Page flow and collected values of the add-user wizard.
#[derive(Debug)]
pub struct AddUserWizard {
    page: WizardPage,
    username: String,
    choice: PasswordChoice,
    password: SecretString,
    gecos: Gecos,
}

impl Default for AddUserWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl AddUserWizard {
    pub fn new() -> Self {
        Self {
            page: WizardPage::Welcome,
            username: String::new(),
            choice: PasswordChoice::SetPassword,
            password: SecretString::default(),
            gecos: Gecos::default(),
        }
    }

    pub fn page(&self) -> WizardPage {
        self.page
    }

    pub fn choice(&self) -> PasswordChoice {
        self.choice
    }

    /// Toggles the authorization method. Ignored away from the
    /// authorization page.
    pub fn select_choice(&mut self, choice: PasswordChoice) -> bool {
        if self.page != WizardPage::Authorization {
            return false;
        }
        self.choice = choice;
        true
    }

    /// Validates `input` for the current page and advances on success.
    pub fn handle_next(&mut self, input: PageInput) -> Result<WizardPage, AccountError> {
        self.page = match (self.page, input) {
            (WizardPage::Welcome, _) => WizardPage::Username,
            (WizardPage::Username, PageInput::Username(username)) => {
                validate_username(&username)?;
                self.username = username;
                WizardPage::Authorization
            }
            (WizardPage::Username, _) => {
                return Err(AccountError::validation(
                    FormField::Username,
                    "Please enter a username.",
                ));
            }
            (
                WizardPage::Authorization,
                PageInput::Authorization {
                    choice,
                    password,
                    confirm,
                },
            ) => {
                validate_password(choice, &password, &confirm)?;
                self.choice = choice;
                self.password = password;
                WizardPage::Profile
            }
            (WizardPage::Authorization, _) => {
                return Err(AccountError::validation(
                    FormField::Password,
                    "Please enter a password.",
                ));
            }
            (WizardPage::Profile, PageInput::Profile(gecos)) => {
                self.gecos = gecos;
                WizardPage::Finish
            }
            (WizardPage::Profile, _) => WizardPage::Finish,
            (WizardPage::Finish, _) => WizardPage::Finish,
        };
        Ok(self.page)
    }

    pub fn handle_back(&mut self) -> WizardPage {
        self.page = match self.page {
            WizardPage::Welcome | WizardPage::Username => WizardPage::Welcome,
            WizardPage::Authorization => WizardPage::Username,
            WizardPage::Profile => WizardPage::Authorization,
            WizardPage::Finish => WizardPage::Profile,
        };
        self.page
    }

    /// The collected settings, once the final page has been reached.
    pub fn into_settings(self) -> Option<NewUserSettings> {
        if self.page != WizardPage::Finish {
            return None;
        }
        Some(NewUserSettings {
            username: self.username,
            choice: self.choice,
            password: self.password,
            gecos: self.gecos,
        })
    }
}

/// Shows the wizard until it is finished or dismissed.
pub async fn run_wizard(
    desktop: &dyn Desktop,
    parent: Option<WindowId>,
) -> Result<NewUserSettings, AccountError> {
    let mut surface = desktop.open_add_user_wizard(parent)?;
    let result = wizard_loop(surface.as_mut(), desktop, parent).await;
    surface.close();
    result
}

async fn wizard_loop(
    surface: &mut dyn WizardSurface,
    desktop: &dyn Desktop,
    parent: Option<WindowId>,
) -> Result<NewUserSettings, AccountError> {
    let mut wizard = AddUserWizard::new();
    show_page(surface, &wizard);

    loop {
        match surface.next_event().await {
            WizardEvent::Select(choice) => {
                if wizard.select_choice(choice) {
                    surface.set_choice(choice, choice.enabled_inputs());
                } else {
                    debug!("Ignoring choice on wizard page {:?}.", wizard.page());
                }
            }
            WizardEvent::Next(input) => match wizard.handle_next(input) {
                Ok(_) => show_page(surface, &wizard),
                Err(e) => {
                    desktop
                        .show_message(parent, MessageKind::Error, &e.to_string())
                        .await;
                    if let Some(field) = e.focus_field() {
                        surface.focus(field);
                    }
                }
            },
            WizardEvent::Back => {
                wizard.handle_back();
                show_page(surface, &wizard);
            }
            WizardEvent::Finish => {
                if wizard.page() == WizardPage::Finish {
                    return wizard.into_settings().ok_or(AccountError::Cancelled);
                }
                debug!("Ignoring Finish on wizard page {:?}.", wizard.page());
            }
            WizardEvent::Cancel | WizardEvent::Closed => return Err(AccountError::Cancelled),
        }
    }
}

/// The authorization page always opens with its inputs matching the current
/// choice.
fn show_page(surface: &mut dyn WizardSurface, wizard: &AddUserWizard) {
    surface.show_page(wizard.page());
    if wizard.page() == WizardPage::Authorization {
        let choice = wizard.choice();
        surface.set_choice(choice, choice.enabled_inputs());
    }
}

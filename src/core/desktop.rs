// src/core/desktop.rs

//! The windowing collaborator consumed by the privileged service.
//!
//! Drawing, layout, and window management live in the desktop environment. The
//! service only needs to anchor dialogs next to the requester's window, show
//! message boxes, and read user input from three kinds of dialog. Every dialog
//! is exposed as a surface that yields events; the state machines in
//! `core::auth` and `core::executor` consume those events.

use crate::core::account::{Account, Gecos};
use crate::core::auth::SecretString;
use crate::core::errors::AccountError;
use async_trait::async_trait;

/// Identifier of a window-server client connection (a "surface owner").
pub type SurfaceId = i32;
/// Identifier of a window within one window-server client.
pub type WindowId = i32;

/// Screen rectangle, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Severity of a message box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Information,
    Warning,
    Error,
}

/// Input fields the state machines may ask a surface to focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Secret,
    Username,
    Password,
    ConfirmPassword,
    Shell,
}

/// Mutually exclusive authorization methods offered by the password dialog
/// and the authorization page of the add-user wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PasswordChoice {
    #[default]
    SetPassword,
    NoPasswordRequired,
    LoginDisabled,
}

/// Which inputs of a password form are enabled for the current choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnabledInputs {
    pub password_fields: bool,
    pub no_password_toggle: bool,
    pub login_disabled_toggle: bool,
}

impl PasswordChoice {
    /// Selecting one option disables the inputs that belong to the others.
    pub fn enabled_inputs(self) -> EnabledInputs {
        match self {
            PasswordChoice::SetPassword => EnabledInputs {
                password_fields: true,
                no_password_toggle: true,
                login_disabled_toggle: true,
            },
            PasswordChoice::NoPasswordRequired => EnabledInputs {
                password_fields: false,
                no_password_toggle: true,
                login_disabled_toggle: false,
            },
            PasswordChoice::LoginDisabled => EnabledInputs {
                password_fields: false,
                no_password_toggle: false,
                login_disabled_toggle: true,
            },
        }
    }
}

/// Options for one escalation prompt window.
#[derive(Debug, Clone)]
pub struct PromptOptions {
    pub icon: Option<String>,
    pub description: String,
    pub acting_username: String,
    pub parent: Option<WindowId>,
}

/// Events produced by the escalation prompt window.
#[derive(Debug)]
pub enum PromptEvent {
    Submit(SecretString),
    Cancel,
    Closed,
}

/// Events produced by the password change dialog.
#[derive(Debug)]
pub enum PasswordDialogEvent {
    Select(PasswordChoice),
    Submit {
        password: SecretString,
        confirm: SecretString,
    },
    Cancel,
    Closed,
}

/// Pages of the add-user wizard, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardPage {
    Welcome,
    Username,
    Authorization,
    Profile,
    Finish,
}

/// Field values submitted with a "Next" press, one variant per input page.
#[derive(Debug)]
pub enum PageInput {
    None,
    Username(String),
    Authorization {
        choice: PasswordChoice,
        password: SecretString,
        confirm: SecretString,
    },
    Profile(Gecos),
}

/// Events produced by the add-user wizard.
#[derive(Debug)]
pub enum WizardEvent {
    /// An authorization method was toggled on the authorization page.
    Select(PasswordChoice),
    Next(PageInput),
    Back,
    Finish,
    Cancel,
    Closed,
}

#[async_trait]
pub trait PromptSurface: Send {
    /// Waits for the next user action. A destroyed window yields `Closed`.
    async fn next_event(&mut self) -> PromptEvent;
    /// Selects the secret field's contents so a retry overwrites them.
    fn select_secret(&mut self);
    fn close(&mut self);
}

#[async_trait]
pub trait PasswordDialogSurface: Send {
    async fn next_event(&mut self) -> PasswordDialogEvent;
    /// Reflects the current choice in the checkboxes and input enablement.
    fn set_choice(&mut self, choice: PasswordChoice, inputs: EnabledInputs);
    fn focus(&mut self, field: FormField);
    fn close(&mut self);
}

#[async_trait]
pub trait WizardSurface: Send {
    async fn next_event(&mut self) -> WizardEvent;
    fn show_page(&mut self, page: WizardPage);
    /// Updates the authorization page's selection and which of its inputs
    /// accept input.
    fn set_choice(&mut self, choice: PasswordChoice, inputs: EnabledInputs);
    fn focus(&mut self, field: FormField);
    fn close(&mut self);
}

/// The desktop environment as seen from the privileged service process.
#[async_trait]
pub trait Desktop: Send + Sync {
    /// This process's own window-server client id.
    fn surface_id(&self) -> SurfaceId;

    /// Looks up the rectangle of a window owned by another client.
    fn window_rect(&self, surface: SurfaceId, window: WindowId) -> Result<Rect, AccountError>;

    /// Creates a frameless, fully transparent, passive window covering `rect`.
    fn create_placeholder_window(&self, rect: Rect) -> Result<WindowId, AccountError>;

    /// Makes `child` (ours) a child of `parent` (owned by `surface`).
    fn set_window_parent(
        &self,
        surface: SurfaceId,
        parent: WindowId,
        child: WindowId,
    ) -> Result<(), AccountError>;

    fn destroy_window(&self, window: WindowId);

    /// Shows a modal message box and returns once it is dismissed.
    async fn show_message(&self, parent: Option<WindowId>, kind: MessageKind, text: &str);

    /// Shows a modal yes/no question. Returns true for "Yes".
    async fn confirm(&self, parent: Option<WindowId>, text: &str) -> bool;

    fn open_escalation_prompt(
        &self,
        options: &PromptOptions,
    ) -> Result<Box<dyn PromptSurface>, AccountError>;

    fn open_password_dialog(
        &self,
        parent: Option<WindowId>,
        target: &Account,
    ) -> Result<Box<dyn PasswordDialogSurface>, AccountError>;

    fn open_add_user_wizard(
        &self,
        parent: Option<WindowId>,
    ) -> Result<Box<dyn WizardSurface>, AccountError>;
}

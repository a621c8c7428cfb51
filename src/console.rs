// src/console.rs

//! A terminal stand-in for the graphical desktop.
//!
//! Used when the service runs without a window server: every dialog becomes a
//! sequence of line prompts on the controlling terminal, message boxes are
//! printed, and placeholder windows are only numbered. Input is echoed; this
//! desktop is meant for headless administration and testing, not for typing
//! secrets where others can read the screen.

use crate::core::account::{Account, Gecos};
use crate::core::auth::SecretString;
use crate::core::desktop::{
    Desktop, EnabledInputs, FormField, MessageKind, PageInput, PasswordChoice,
    PasswordDialogEvent, PasswordDialogSurface, PromptEvent, PromptOptions, PromptSurface, Rect,
    SurfaceId, WindowId, WizardEvent, WizardPage, WizardSurface,
};
use crate::core::errors::AccountError;
use async_trait::async_trait;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Surface id reported when the process id does not fit the protocol.
const FALLBACK_SURFACE_ID: SurfaceId = 0;

pub type LineSource = Box<dyn AsyncBufRead + Send + Unpin>;

struct Terminal {
    lines: Mutex<Lines<LineSource>>,
    /// Set once the input has reached end of file or failed.
    closed: AtomicBool,
}

type Input = Arc<Terminal>;

pub struct ConsoleDesktop {
    input: Input,
    surface_id: SurfaceId,
    next_window_id: AtomicI32,
}

impl Default for ConsoleDesktop {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleDesktop {
    pub fn new() -> Self {
        Self::with_input(Box::new(BufReader::new(tokio::io::stdin())))
    }

    /// Reads answers from `source` instead of standard input.
    pub fn with_input(source: LineSource) -> Self {
        let pid = std::process::id();
        let surface_id = SurfaceId::try_from(pid).unwrap_or_else(|_| {
            warn!(
                "Process id {} does not fit a surface id; using {}.",
                pid, FALLBACK_SURFACE_ID
            );
            FALLBACK_SURFACE_ID
        });
        Self {
            input: Arc::new(Terminal {
                lines: Mutex::new(source.lines()),
                closed: AtomicBool::new(false),
            }),
            surface_id,
            next_window_id: AtomicI32::new(1),
        }
    }

    /// Dialogs cannot be shown once the terminal is gone.
    fn ensure_open(&self) -> Result<(), AccountError> {
        if self.input.closed.load(Ordering::Acquire) {
            return Err(AccountError::Desktop("terminal input is closed".to_string()));
        }
        Ok(())
    }
}

fn print_prompt(text: &str) {
    let mut out = std::io::stdout().lock();
    let _ = write!(out, "{text}");
    let _ = out.flush();
}

/// Reads one line. `None` means the terminal was closed.
async fn read_line(input: &Input, prompt: &str) -> Option<String> {
    print_prompt(prompt);
    let line = match input.lines.lock().await.next_line().await {
        Ok(line) => line,
        Err(e) => {
            debug!("Reading from the terminal failed: {}", e);
            None
        }
    };
    if line.is_none() {
        input.closed.store(true, Ordering::Release);
    }
    line.map(|line| line.trim_end_matches('\r').to_string())
}

#[async_trait]
impl Desktop for ConsoleDesktop {
    fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    fn window_rect(&self, _surface: SurfaceId, _window: WindowId) -> Result<Rect, AccountError> {
        Ok(Rect::default())
    }

    fn create_placeholder_window(&self, _rect: Rect) -> Result<WindowId, AccountError> {
        Ok(self.next_window_id.fetch_add(1, Ordering::Relaxed))
    }

    fn set_window_parent(
        &self,
        _surface: SurfaceId,
        _parent: WindowId,
        _child: WindowId,
    ) -> Result<(), AccountError> {
        Ok(())
    }

    fn destroy_window(&self, window: WindowId) {
        debug!("Console placeholder window {} destroyed.", window);
    }

    async fn show_message(&self, _parent: Option<WindowId>, kind: MessageKind, text: &str) {
        let label = match kind {
            MessageKind::Information => "info",
            MessageKind::Warning => "warning",
            MessageKind::Error => "error",
        };
        println!("[{label}] {text}");
    }

    async fn confirm(&self, _parent: Option<WindowId>, text: &str) -> bool {
        let answer = read_line(&self.input, &format!("{text} [y/N] ")).await;
        matches!(answer.as_deref().map(str::trim), Some("y" | "Y" | "yes"))
    }

    fn open_escalation_prompt(
        &self,
        options: &PromptOptions,
    ) -> Result<Box<dyn PromptSurface>, AccountError> {
        self.ensure_open()?;
        println!("{}", options.description);
        Ok(Box::new(ConsolePrompt {
            input: self.input.clone(),
            label: format!("Password for {} (empty line to cancel): ", options.acting_username),
        }))
    }

    fn open_password_dialog(
        &self,
        _parent: Option<WindowId>,
        target: &Account,
    ) -> Result<Box<dyn PasswordDialogSurface>, AccountError> {
        self.ensure_open()?;
        println!("Change password for {}", target.username());
        Ok(Box::new(ConsolePasswordDialog {
            input: self.input.clone(),
            choice: PasswordChoice::default(),
            asked_choice: false,
        }))
    }

    fn open_add_user_wizard(
        &self,
        _parent: Option<WindowId>,
    ) -> Result<Box<dyn WizardSurface>, AccountError> {
        self.ensure_open()?;
        Ok(Box::new(ConsoleWizard {
            input: self.input.clone(),
            page: WizardPage::Welcome,
            choice: PasswordChoice::default(),
        }))
    }
}

struct ConsolePrompt {
    input: Input,
    label: String,
}

#[async_trait]
impl PromptSurface for ConsolePrompt {
    async fn next_event(&mut self) -> PromptEvent {
        match read_line(&self.input, &self.label).await {
            None => PromptEvent::Closed,
            Some(line) if line.is_empty() => PromptEvent::Cancel,
            Some(line) => PromptEvent::Submit(SecretString::from(line)),
        }
    }

    fn select_secret(&mut self) {}

    fn close(&mut self) {}
}

struct ConsolePasswordDialog {
    input: Input,
    choice: PasswordChoice,
    /// The choice menu is shown before the first submission.
    asked_choice: bool,
}

#[async_trait]
impl PasswordDialogSurface for ConsolePasswordDialog {
    async fn next_event(&mut self) -> PasswordDialogEvent {
        if !self.asked_choice {
            self.asked_choice = true;
            let menu = "1) Set password  2) No password required  3) Disable login  [c]ancel\nChoice: ";
            let choice = match read_line(&self.input, menu).await {
                None => return PasswordDialogEvent::Closed,
                Some(line) => match line.trim() {
                    "" => self.choice,
                    "1" => PasswordChoice::SetPassword,
                    "2" => PasswordChoice::NoPasswordRequired,
                    "3" => PasswordChoice::LoginDisabled,
                    _ => return PasswordDialogEvent::Cancel,
                },
            };
            if choice != self.choice {
                return PasswordDialogEvent::Select(choice);
            }
        }

        if self.choice != PasswordChoice::SetPassword {
            // Show the menu again if the dialog stays open, e.g. after a
            // declined confirmation.
            self.asked_choice = false;
            return PasswordDialogEvent::Submit {
                password: SecretString::default(),
                confirm: SecretString::default(),
            };
        }
        let Some(password) = read_line(&self.input, "New password: ").await else {
            return PasswordDialogEvent::Closed;
        };
        let Some(confirm) = read_line(&self.input, "Confirm password: ").await else {
            return PasswordDialogEvent::Closed;
        };
        PasswordDialogEvent::Submit {
            password: password.into(),
            confirm: confirm.into(),
        }
    }

    fn set_choice(&mut self, choice: PasswordChoice, _inputs: EnabledInputs) {
        self.choice = choice;
    }

    fn focus(&mut self, _field: FormField) {}

    fn close(&mut self) {}
}

struct ConsoleWizard {
    input: Input,
    page: WizardPage,
    choice: PasswordChoice,
}

impl ConsoleWizard {
    async fn read_authorization(&self) -> Option<PageInput> {
        let menu = "1) Set password  2) No password required  3) Disable login\nChoice: ";
        let choice = match read_line(&self.input, menu).await?.trim() {
            "1" => PasswordChoice::SetPassword,
            "2" => PasswordChoice::NoPasswordRequired,
            "3" => PasswordChoice::LoginDisabled,
            _ => self.choice,
        };
        let (password, confirm) = if choice == PasswordChoice::SetPassword {
            (
                read_line(&self.input, "Password: ").await?,
                read_line(&self.input, "Confirm password: ").await?,
            )
        } else {
            (String::new(), String::new())
        };
        Some(PageInput::Authorization {
            choice,
            password: password.into(),
            confirm: confirm.into(),
        })
    }

    async fn read_profile(&self) -> Option<PageInput> {
        Some(PageInput::Profile(Gecos {
            full_name: read_line(&self.input, "Full name: ").await?,
            room: read_line(&self.input, "Room: ").await?,
            office_tel: read_line(&self.input, "Office phone: ").await?,
            home_tel: read_line(&self.input, "Home phone: ").await?,
            other_info: read_line(&self.input, "Other: ").await?,
        }))
    }
}

#[async_trait]
impl WizardSurface for ConsoleWizard {
    async fn next_event(&mut self) -> WizardEvent {
        let input = match self.page {
            WizardPage::Welcome => {
                println!("Add a new user.");
                Some(PageInput::None)
            }
            WizardPage::Username => read_line(&self.input, "Username: ")
                .await
                .map(PageInput::Username),
            WizardPage::Authorization => self.read_authorization().await,
            WizardPage::Profile => self.read_profile().await,
            WizardPage::Finish => {
                return match read_line(&self.input, "Create this user? [Y/n] ").await {
                    None => WizardEvent::Closed,
                    Some(line) if matches!(line.trim(), "n" | "N" | "no") => WizardEvent::Cancel,
                    Some(_) => WizardEvent::Finish,
                };
            }
        };
        match input {
            Some(input) => WizardEvent::Next(input),
            None => WizardEvent::Closed,
        }
    }

    fn show_page(&mut self, page: WizardPage) {
        self.page = page;
    }

    fn set_choice(&mut self, choice: PasswordChoice, _inputs: EnabledInputs) {
        self.choice = choice;
    }

    fn focus(&mut self, _field: FormField) {}

    fn close(&mut self) {}
}

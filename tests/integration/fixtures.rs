// tests/integration/fixtures.rs

//! Common test fixtures: scripted user input for the dialogs.

use accountd::core::account::Gecos;
use accountd::core::desktop::{PageInput, PasswordChoice, PasswordDialogEvent, WizardEvent};

pub const NEW_PASSWORD: &str = "looking-glass";

/// A password dialog in which the user types `password` twice and submits.
pub fn set_password_dialog(password: &str) -> Vec<PasswordDialogEvent> {
    vec![
        PasswordDialogEvent::Select(PasswordChoice::SetPassword),
        PasswordDialogEvent::Submit {
            password: password.into(),
            confirm: password.into(),
        },
    ]
}

/// A password dialog in which the user picks `choice` and submits.
pub fn choice_dialog(choice: PasswordChoice) -> Vec<PasswordDialogEvent> {
    vec![
        PasswordDialogEvent::Select(choice),
        PasswordDialogEvent::Submit {
            password: "".into(),
            confirm: "".into(),
        },
    ]
}

pub fn profile(full_name: &str) -> Gecos {
    Gecos {
        full_name: full_name.to_string(),
        room: "Room 4".to_string(),
        ..Gecos::default()
    }
}

/// A wizard filled in page by page and finished.
pub fn add_user_wizard(username: &str, choice: PasswordChoice, password: &str) -> Vec<WizardEvent> {
    vec![
        WizardEvent::Next(PageInput::None),
        WizardEvent::Next(PageInput::Username(username.to_string())),
        WizardEvent::Next(PageInput::Authorization {
            choice,
            password: password.into(),
            confirm: password.into(),
        }),
        WizardEvent::Next(PageInput::Profile(profile("Erin Example"))),
        WizardEvent::Finish,
    ]
}

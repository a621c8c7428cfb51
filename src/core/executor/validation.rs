// src/core/executor/validation.rs

//! Form validation shared by the password dialog, the add-user wizard and
//! the settings update.

use crate::core::auth::SecretString;
use crate::core::desktop::{FormField, PasswordChoice};
use crate::core::errors::AccountError;

/// Characters a new username may not contain.
pub const FORBIDDEN_USERNAME_CHARS: &str = "\\/!@#$%^&*()~+=`:\n ";

pub fn validate_username(username: &str) -> Result<(), AccountError> {
    let Some(first) = username.chars().next() else {
        return Err(AccountError::validation(
            FormField::Username,
            "Please enter a username.",
        ));
    };

    if username.chars().any(|c| FORBIDDEN_USERNAME_CHARS.contains(c)) {
        return Err(AccountError::validation(
            FormField::Username,
            "Username must not contain a space or any of the following characters:\n\\, /, !, @, #, $, %, ^, &, *, (, ), ~, +, =, `, :",
        ));
    }

    if first == '_' || first == '-' || !first.is_ascii_alphabetic() {
        return Err(AccountError::validation(
            FormField::Username,
            "Username must not start with _, -, or a non-alphabetical character.",
        ));
    }

    Ok(())
}

/// Only the `SetPassword` choice looks at the password fields.
pub fn validate_password(
    choice: PasswordChoice,
    password: &SecretString,
    confirm: &SecretString,
) -> Result<(), AccountError> {
    if choice != PasswordChoice::SetPassword {
        return Ok(());
    }

    if password.is_empty() {
        return Err(AccountError::validation(
            FormField::Password,
            "Please enter a password.",
        ));
    }

    if !password.matches(confirm) {
        return Err(AccountError::validation(
            FormField::Password,
            "Password and Confirm Password must match.",
        ));
    }

    Ok(())
}

/// `available` is the valid-shells list, which includes the current shell.
pub fn validate_shell(shell: &str, available: &[String]) -> Result<(), AccountError> {
    if available.iter().any(|candidate| candidate == shell) {
        return Ok(());
    }
    Err(AccountError::validation(
        FormField::Shell,
        format!("\"{shell}\" is not a valid login shell."),
    ))
}

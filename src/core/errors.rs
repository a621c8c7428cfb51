// src/core/errors.rs

//! Defines the primary error type for the account service and its client.

use crate::core::desktop::FormField;
use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures of a privileged
/// account operation, on either side of the connection.
///
/// The `Display` text doubles as the message shown to the operator of the
/// privileged service, so variants read as full sentences.
#[derive(Error, Debug, Clone)]
pub enum AccountError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("No account with user id {0}")]
    AccountNotFound(u32),

    #[error("No account named \"{0}\"")]
    AccountNameNotFound(String),

    #[error("Failed to read account database: {0}")]
    StoreRead(String),

    #[error("Malformed account database entry in {file} at line {line}: {reason}")]
    StoreParse {
        file: String,
        line: usize,
        reason: String,
    },

    #[error("Failed to write account database: {0}")]
    StoreWrite(String),

    #[error("Failed to hash password: {0}")]
    PasswordHash(String),

    #[error("Failed to start {program}: {reason}")]
    HelperSpawn { program: String, reason: String },

    #[error("{program} exited with {status}")]
    HelperExit { program: String, status: String },

    #[error("Account \"{0}\" was not found after creation")]
    CreatedAccountMissing(String),

    #[error("{message}")]
    Validation { field: FormField, message: String },

    #[error("Authorization was not granted")]
    AuthorizationDenied,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Prompt is already waiting for a result")]
    PromptReentered,

    #[error("Desktop error: {0}")]
    Desktop(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Protocol desync: {0}")]
    ProtocolDesync(String),

    #[error("AccountServer operation failed")]
    OperationFailed,

    #[error("Connection to the account service was closed")]
    ConnectionClosed,
}

impl AccountError {
    /// Builds a validation error that asks the UI to refocus `field`.
    pub fn validation(field: FormField, message: impl Into<String>) -> Self {
        AccountError::Validation {
            field,
            message: message.into(),
        }
    }

    /// The form field that should regain focus, for validation failures.
    pub fn focus_field(&self) -> Option<FormField> {
        match self {
            AccountError::Validation { field, .. } => Some(*field),
            _ => None,
        }
    }
}

impl PartialEq for AccountError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AccountError::Io(e1), AccountError::Io(e2)) => e1.to_string() == e2.to_string(),
            (AccountError::AccountNotFound(a), AccountError::AccountNotFound(b)) => a == b,
            (AccountError::AccountNameNotFound(a), AccountError::AccountNameNotFound(b)) => a == b,
            (
                AccountError::Validation { field: f1, .. },
                AccountError::Validation { field: f2, .. },
            ) => f1 == f2,
            (
                AccountError::HelperExit { program: p1, status: s1 },
                AccountError::HelperExit { program: p2, status: s2 },
            ) => p1 == p2 && s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for AccountError {
    fn from(e: std::io::Error) -> Self {
        AccountError::Io(Arc::new(e))
    }
}

impl From<bincode::error::EncodeError> for AccountError {
    fn from(e: bincode::error::EncodeError) -> Self {
        AccountError::Protocol(format!("failed to encode frame: {e}"))
    }
}

impl From<bincode::error::DecodeError> for AccountError {
    fn from(e: bincode::error::DecodeError) -> Self {
        AccountError::Protocol(format!("failed to decode frame: {e}"))
    }
}

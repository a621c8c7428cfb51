// src/core/auth/mod.rs

//! Credential verification and the interactive escalation prompt that gates
//! every privileged operation.

pub mod prompt;
pub mod secret;
pub mod verifier;

pub use prompt::{AuthorizationResult, EscalationPrompt, PromptState, authorize_escalation};
pub use secret::SecretString;
pub use verifier::{CredentialVerifier, verify_password_state};

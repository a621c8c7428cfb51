// src/core/auth/verifier.rs

use super::SecretString;
use crate::core::account::{AccountStore, PasswordState};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use std::sync::Arc;
use tracing::warn;

/// Checks a candidate secret against a password state.
///
/// `NoPassword` accepts every candidate, including an empty one. `Disabled`
/// rejects every candidate. A hash that is not a valid PHC string rejects.
pub fn verify_password_state(state: &PasswordState, candidate: &SecretString) -> bool {
    match state {
        PasswordState::NoPassword => true,
        PasswordState::Disabled { .. } => false,
        PasswordState::Hashed(hash) => match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(candidate.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                warn!("Stored password hash could not be parsed: {}", e);
                false
            }
        },
    }
}

/// Verifies secrets for one user identity.
///
/// The account is re-read from the store on every call so a verification
/// always sees the current credential. Nothing about the candidate is kept.
pub struct CredentialVerifier {
    store: Arc<dyn AccountStore>,
    uid: u32,
}

impl CredentialVerifier {
    pub fn new(store: Arc<dyn AccountStore>, uid: u32) -> Self {
        Self { store, uid }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Returns true iff `candidate` authenticates the account. Any failure to
    /// read the account's stored state counts as a mismatch.
    pub fn verify(&self, candidate: &SecretString) -> bool {
        match self.store.account_by_id(self.uid) {
            Ok(account) => verify_password_state(account.password_state(), candidate),
            Err(e) => {
                warn!(
                    "Could not read credentials for uid {}; denying: {}",
                    self.uid, e
                );
                false
            }
        }
    }
}

// src/core/auth/secret.rs

use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A password or other secret typed by a user.
///
/// The buffer is zeroed when the value is dropped and `Debug` never prints the
/// contents.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(Vec<u8>);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().into_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compares two secrets in constant time for equal lengths.
    pub fn matches(&self, other: &SecretString) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString(***)")
    }
}


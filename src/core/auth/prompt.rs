// src/core/auth/prompt.rs

//! The escalation prompt: a modal secret-entry flow with the states
//! `Idle -> Showing -> {Success, Fail}`.
//!
//! `request_authorization` is the suspend point. The calling request waits on
//! the prompt surface's event stream; the rest of the process (other sessions'
//! readers in particular) keeps running. A prompt instance can be shown once.

use super::{CredentialVerifier, SecretString};
use crate::config::AuthConfig;
use crate::core::account::{Account, AccountStore};
use crate::core::desktop::{Desktop, MessageKind, PromptEvent, PromptOptions, WindowId};
use crate::core::errors::AccountError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// The binary outcome of one prompt. `Fail` covers a wrong or disabled
/// secret as well as cancellation; callers cannot tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationResult {
    Success,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    Idle,
    Showing,
    Success,
    Fail,
}

pub struct EscalationPrompt {
    state: PromptState,
    options: PromptOptions,
    verifier: CredentialVerifier,
    failure_delay: Duration,
}

impl EscalationPrompt {
    pub fn new(
        options: PromptOptions,
        verifier: CredentialVerifier,
        failure_delay: Duration,
    ) -> Self {
        Self {
            state: PromptState::Idle,
            options,
            verifier,
            failure_delay,
        }
    }

    pub fn state(&self) -> PromptState {
        self.state
    }

    /// Shows the prompt and waits until it reaches a terminal state.
    ///
    /// A wrong secret keeps the prompt open for another attempt. Failing to
    /// open the prompt is returned as an error rather than as `Fail`.
    pub async fn request_authorization(
        &mut self,
        desktop: &dyn Desktop,
    ) -> Result<AuthorizationResult, AccountError> {
        if self.state != PromptState::Idle {
            return Err(AccountError::PromptReentered);
        }

        let mut surface = desktop.open_escalation_prompt(&self.options)?;
        self.state = PromptState::Showing;
        debug!(
            "Escalation prompt shown for '{}'.",
            self.options.acting_username
        );

        let result = loop {
            match surface.next_event().await {
                PromptEvent::Submit(secret) => {
                    if self.check_secret(desktop, secret).await {
                        break AuthorizationResult::Success;
                    }
                    surface.select_secret();
                }
                PromptEvent::Cancel => {
                    debug!("Escalation prompt cancelled.");
                    break AuthorizationResult::Fail;
                }
                PromptEvent::Closed => {
                    debug!("Escalation prompt closed without an answer.");
                    break AuthorizationResult::Fail;
                }
            }
        };

        surface.close();
        self.state = match result {
            AuthorizationResult::Success => PromptState::Success,
            AuthorizationResult::Fail => PromptState::Fail,
        };
        Ok(result)
    }

    /// Returns true if the prompt may finish with `Success`.
    async fn check_secret(&self, desktop: &dyn Desktop, secret: SecretString) -> bool {
        let parent = self.options.parent;
        if secret.is_empty() {
            desktop
                .show_message(parent, MessageKind::Error, "Please enter a password.")
                .await;
            return false;
        }

        if self.verifier.verify(&secret) {
            return true;
        }

        warn!(
            "Rejected secret for '{}' (uid {}).",
            self.options.acting_username,
            self.verifier.uid()
        );
        if !self.failure_delay.is_zero() {
            tokio::time::sleep(self.failure_delay).await;
        }
        desktop
            .show_message(parent, MessageKind::Error, "Incorrect or disabled password.")
            .await;
        false
    }
}

/// Asks the human at the desktop to authorize an operation as `acting`.
///
/// If `acting` is root and the configuration allows it, no prompt is shown.
pub async fn authorize_escalation(
    desktop: &dyn Desktop,
    store: Arc<dyn AccountStore>,
    config: &AuthConfig,
    acting: &Account,
    icon: Option<String>,
    description: String,
    parent: Option<WindowId>,
) -> Result<AuthorizationResult, AccountError> {
    if acting.is_root() && config.root_bypass {
        info!("Acting user is root; authorization granted without prompt.");
        return Ok(AuthorizationResult::Success);
    }

    let options = PromptOptions {
        icon,
        description,
        acting_username: acting.username().to_string(),
        parent,
    };
    let verifier = CredentialVerifier::new(store, acting.uid());
    let mut prompt = EscalationPrompt::new(options, verifier, config.failure_delay());
    prompt.request_authorization(desktop).await
}

// src/core/dispatcher.rs

//! The privileged service dispatcher.
//!
//! Requests from every session are queued to a single `Dispatcher` task, which
//! handles them one at a time: anchor a placeholder window next to the
//! requester's window, authorize the acting account, run the operation, reply.
//! Every request that reaches the dispatcher gets exactly one reply, and every
//! failure shows exactly one message box before that reply is sent.

use crate::config::AuthConfig;
use crate::core::account::{Account, AccountStore};
use crate::core::auth::{AuthorizationResult, authorize_escalation};
use crate::core::desktop::{Desktop, MessageKind, SurfaceId, WindowId};
use crate::core::errors::AccountError;
use crate::core::executor::{Executor, SettingsUpdate};
use crate::core::protocol::{ClientRequest, ServerResponse};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// One queued privileged request and the session it must be answered on.
#[derive(Debug)]
pub struct DispatchJob {
    pub session_id: u64,
    pub request: ClientRequest,
    pub reply_tx: mpsc::UnboundedSender<ServerResponse>,
}

/// The target and acting accounts of one request, resolved once.
#[derive(Debug, Clone)]
pub struct ExpandedUserPair {
    pub target: Account,
    pub acting: Account,
}

impl ExpandedUserPair {
    pub fn resolve(
        store: &dyn AccountStore,
        target_user_id: i32,
        acting_user_id: i32,
    ) -> Result<Self, AccountError> {
        Ok(Self {
            target: store.account_by_id(to_id("target_user_id", target_user_id)?)?,
            acting: store.account_by_id(to_id("acting_user_id", acting_user_id)?)?,
        })
    }
}

/// An invisible window covering the requester's window and parented to it, so
/// our dialogs are positioned and stacked as if the requester owned them.
/// Destroyed when dropped.
pub struct PlaceholderWindow {
    desktop: Arc<dyn Desktop>,
    window_id: WindowId,
}

impl PlaceholderWindow {
    pub fn anchor(
        desktop: Arc<dyn Desktop>,
        surface: SurfaceId,
        parent: WindowId,
    ) -> Result<Self, AccountError> {
        let rect = desktop.window_rect(surface, parent)?;
        let window_id = desktop.create_placeholder_window(rect)?;
        let placeholder = Self { desktop, window_id };
        placeholder
            .desktop
            .set_window_parent(surface, parent, window_id)?;
        debug!(
            "Anchored placeholder window {} to window {} of surface {}.",
            window_id, parent, surface
        );
        Ok(placeholder)
    }

    pub fn id(&self) -> WindowId {
        self.window_id
    }
}

impl Drop for PlaceholderWindow {
    fn drop(&mut self) {
        self.desktop.destroy_window(self.window_id);
    }
}

pub struct Dispatcher {
    desktop: Arc<dyn Desktop>,
    executor: Executor,
    auth: AuthConfig,
}

impl Dispatcher {
    pub fn new(desktop: Arc<dyn Desktop>, executor: Executor, auth: AuthConfig) -> Self {
        Self {
            desktop,
            executor,
            auth,
        }
    }

    /// Handles queued jobs until the queue closes or shutdown is signalled.
    /// A job being handled when shutdown arrives is finished first.
    pub async fn run(
        self,
        mut jobs: mpsc::Receiver<DispatchJob>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        info!("Dispatcher started.");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Dispatcher received shutdown signal.");
                    break;
                }
                job = jobs.recv() => {
                    let Some(job) = job else { break };
                    let response = self.handle(job.request).await;
                    if job.reply_tx.send(response).is_err() {
                        warn!(
                            "Session {} closed before its reply ({:?}) could be sent.",
                            job.session_id, response
                        );
                    }
                }
            }
        }
        info!("Dispatcher stopped.");
    }

    /// Produces the single response for `request`. Never fails: errors are
    /// shown to the operator and turned into a failure response.
    pub async fn handle(&self, request: ClientRequest) -> ServerResponse {
        let Some(failure) = request.failure_response() else {
            return ServerResponse::WindowSurfaceId {
                window_surface_id: self.desktop.surface_id(),
            };
        };

        let placeholder = match request.requester_window() {
            Some((surface, window)) => {
                match PlaceholderWindow::anchor(self.desktop.clone(), surface, window) {
                    Ok(placeholder) => Some(placeholder),
                    Err(e) => {
                        self.report(None, &e).await;
                        return failure;
                    }
                }
            }
            None => None,
        };
        let parent = placeholder.as_ref().map(PlaceholderWindow::id);

        match self.process(request, parent).await {
            Ok(response) => response,
            Err(e) => {
                self.report(parent, &e).await;
                failure
            }
        }
    }

    async fn report(&self, parent: Option<WindowId>, e: &AccountError) {
        match e {
            AccountError::Cancelled | AccountError::AuthorizationDenied => {
                info!("Privileged request not completed: {}", e)
            }
            _ => error!("Privileged request failed: {}", e),
        }
        self.desktop
            .show_message(parent, MessageKind::Error, &e.to_string())
            .await;
    }

    async fn process(
        &self,
        request: ClientRequest,
        parent: Option<WindowId>,
    ) -> Result<ServerResponse, AccountError> {
        let store = self.executor.store().clone();
        match request {
            ClientRequest::RequestUserPasswordUpdate {
                promise_id,
                target_user_id,
                acting_user_id,
                ..
            } => {
                let users = ExpandedUserPair::resolve(store.as_ref(), target_user_id, acting_user_id)?;
                let prompt = format!(
                    "To update password for user \"{}\", please authenticate by entering password for user \"{}\".",
                    users.target.username(),
                    users.acting.username()
                );
                self.authorize(&users.acting, prompt, parent).await?;
                self.executor.change_password(users.target, parent).await?;
                Ok(ServerResponse::UserPasswordUpdated {
                    promise_id,
                    success: true,
                })
            }
            ClientRequest::RequestUserSettingsUpdate {
                promise_id,
                target_user_id,
                acting_user_id,
                shell,
                display_name,
                primary_group_id,
                secondary_group_ids,
                ..
            } => {
                let update = SettingsUpdate {
                    shell,
                    gecos: display_name,
                    primary_gid: to_id("primary_group_id", primary_group_id)?,
                    secondary_gids: secondary_group_ids
                        .into_iter()
                        .map(|gid| to_id("secondary_group_ids", gid))
                        .collect::<Result<_, _>>()?,
                };
                let users = ExpandedUserPair::resolve(store.as_ref(), target_user_id, acting_user_id)?;
                let prompt = format!(
                    "To update user \"{}\", please authenticate by entering password for user \"{}\".",
                    users.target.username(),
                    users.acting.username()
                );
                self.authorize(&users.acting, prompt, parent).await?;
                self.executor.update_settings(users.target, &update)?;
                Ok(ServerResponse::UserSettingsUpdated {
                    promise_id,
                    success: true,
                })
            }
            ClientRequest::RequestUserDeletion {
                promise_id,
                target_user_id,
                acting_user_id,
                ..
            } => {
                let users = ExpandedUserPair::resolve(store.as_ref(), target_user_id, acting_user_id)?;
                let prompt = format!(
                    "To delete user \"{}\", please authenticate by entering password for user \"{}\".",
                    users.target.username(),
                    users.acting.username()
                );
                self.authorize(&users.acting, prompt, parent).await?;
                self.executor.delete_account(&users.target, parent).await?;
                Ok(ServerResponse::UserDeleted {
                    promise_id,
                    success: true,
                })
            }
            ClientRequest::RequestUserAddition {
                promise_id,
                acting_user_id,
                ..
            } => {
                let acting = store.account_by_id(to_id("acting_user_id", acting_user_id)?)?;
                let prompt = format!(
                    "To add a new user, please authenticate by entering password for user \"{}\".",
                    acting.username()
                );
                self.authorize(&acting, prompt, parent).await?;
                let uid = self.executor.create_account(parent).await?;
                let new_user_id = i32::try_from(uid).map_err(|_| {
                    AccountError::InvalidRequest(format!("new uid {uid} does not fit the protocol"))
                })?;
                Ok(ServerResponse::UserAdded {
                    promise_id,
                    new_user_id,
                })
            }
            ClientRequest::ExposeWindowSurfaceId => Ok(ServerResponse::WindowSurfaceId {
                window_surface_id: self.desktop.surface_id(),
            }),
        }
    }

    async fn authorize(
        &self,
        acting: &Account,
        description: String,
        parent: Option<WindowId>,
    ) -> Result<(), AccountError> {
        let result = authorize_escalation(
            self.desktop.as_ref(),
            self.executor.store().clone(),
            &self.auth,
            acting,
            None,
            description,
            parent,
        )
        .await?;
        match result {
            AuthorizationResult::Success => Ok(()),
            AuthorizationResult::Fail => Err(AccountError::AuthorizationDenied),
        }
    }
}

fn to_id(name: &str, raw: i32) -> Result<u32, AccountError> {
    u32::try_from(raw).map_err(|_| AccountError::InvalidRequest(format!("{name} is negative ({raw})")))
}

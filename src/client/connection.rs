// src/client/connection.rs

//! `AccountClient`: the requesting application's connection to the account
//! service.
//!
//! A reader task and a writer task own the two halves of the socket. Request
//! methods register a promise with the correlator, queue the request for the
//! writer, and await the promise; the reader resolves promises as responses
//! arrive, in whatever order the service sends them.

use super::correlator::{Correlator, ResponseResult};
use super::desktop::{ClientDesktop, WindowStealingGuard};
use super::settings::Settings;
use crate::core::desktop::{SurfaceId, WindowId};
use crate::core::errors::AccountError;
use crate::core::protocol::{ClientCodec, ClientRequest, ServerResponse};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

/// The default socket path of the account service.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/portal/accounts";

/// Notifications published to every subscriber of an `AccountClient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountEvent {
    /// Any correlated response arrived, successful or not.
    Response,
    PasswordUpdated,
    SettingsUpdated,
    UserDeleted,
    UserAdded(i32),
}

struct Shared {
    correlator: Correlator,
    /// Callers waiting for `WindowSurfaceId`, answered in request order.
    /// `None` once the connection is gone.
    surface_waiters: Mutex<Option<VecDeque<oneshot::Sender<SurfaceId>>>>,
    desktop: Arc<dyn ClientDesktop>,
    events: broadcast::Sender<AccountEvent>,
}

impl Shared {
    /// Fails every waiter. Runs when the reader task ends, including by panic.
    /// After a desync, pending requests have already failed with
    /// `ProtocolDesync` and keep that error.
    fn close(&self) {
        self.correlator.fail_all();
        self.surface_waiters.lock().take();
    }
}

struct ReaderGuard(Arc<Shared>);

impl Drop for ReaderGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[derive(Clone)]
pub struct AccountClient {
    shared: Arc<Shared>,
    request_tx: mpsc::UnboundedSender<ClientRequest>,
}

impl AccountClient {
    pub async fn connect(
        path: impl AsRef<Path>,
        desktop: Arc<dyn ClientDesktop>,
    ) -> Result<Self, AccountError> {
        let stream = UnixStream::connect(path.as_ref()).await?;
        info!("Connected to account service at {}", path.as_ref().display());
        Ok(Self::from_stream(stream, desktop))
    }

    /// Wraps an already connected stream. Must be called within a tokio
    /// runtime; the reader and writer tasks are spawned here.
    pub fn from_stream(stream: UnixStream, desktop: Arc<dyn ClientDesktop>) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(32);
        let shared = Arc::new(Shared {
            correlator: Correlator::new(),
            surface_waiters: Mutex::new(Some(VecDeque::new())),
            desktop,
            events,
        });

        tokio::spawn(write_requests(write_half, request_rx));
        tokio::spawn(read_responses(read_half, shared.clone()));

        Self { shared, request_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AccountEvent> {
        self.shared.events.subscribe()
    }

    pub fn pending_requests(&self) -> usize {
        self.shared.correlator.pending_count()
    }

    /// Asks the service for its window-server client id.
    pub async fn expose_window_surface_id(&self) -> Result<SurfaceId, AccountError> {
        let (tx, rx) = oneshot::channel();
        {
            let mut guard = self.shared.surface_waiters.lock();
            let waiters = guard.as_mut().ok_or_else(|| self.connection_error())?;
            self.request_tx
                .send(ClientRequest::ExposeWindowSurfaceId)
                .map_err(|_| self.connection_error())?;
            waiters.push_back(tx);
        }
        rx.await.map_err(|_| self.connection_error())
    }

    /// Why requests on this client can no longer complete: `ProtocolDesync`
    /// after a desync, `ConnectionClosed` otherwise.
    fn connection_error(&self) -> AccountError {
        self.shared
            .correlator
            .closed_reason()
            .unwrap_or(AccountError::ConnectionClosed)
    }

    pub async fn request_password_change(
        &self,
        target_uid: u32,
        acting_uid: u32,
        window: WindowId,
    ) -> Result<(), AccountError> {
        let target_user_id = wire_id(target_uid)?;
        let acting_user_id = wire_id(acting_uid)?;
        let response = self
            .call(window, |promise_id, window_surface_id| {
                ClientRequest::RequestUserPasswordUpdate {
                    promise_id,
                    target_user_id,
                    acting_user_id,
                    window_surface_id,
                    window_id: window,
                }
            })
            .await?;
        match response {
            ServerResponse::UserPasswordUpdated { success: true, .. } => Ok(()),
            ServerResponse::UserPasswordUpdated { .. } => Err(AccountError::OperationFailed),
            other => Err(unexpected(other)),
        }
    }

    pub async fn request_settings_change(
        &self,
        target_uid: u32,
        acting_uid: u32,
        settings: &Settings,
        window: WindowId,
    ) -> Result<(), AccountError> {
        let target_user_id = wire_id(target_uid)?;
        let acting_user_id = wire_id(acting_uid)?;
        let (primary_group_id, secondary_group_ids) = settings.wire_groups().ok_or_else(|| {
            AccountError::InvalidRequest("group id does not fit the protocol".to_string())
        })?;
        let shell = settings.shell.clone();
        let display_name = settings.gecos.compose();
        let response = self
            .call(window, |promise_id, window_surface_id| {
                ClientRequest::RequestUserSettingsUpdate {
                    promise_id,
                    target_user_id,
                    acting_user_id,
                    window_surface_id,
                    window_id: window,
                    shell,
                    display_name,
                    primary_group_id,
                    secondary_group_ids,
                }
            })
            .await?;
        match response {
            ServerResponse::UserSettingsUpdated { success: true, .. } => Ok(()),
            ServerResponse::UserSettingsUpdated { .. } => Err(AccountError::OperationFailed),
            other => Err(unexpected(other)),
        }
    }

    pub async fn request_user_deletion(
        &self,
        target_uid: u32,
        acting_uid: u32,
        window: WindowId,
    ) -> Result<(), AccountError> {
        let target_user_id = wire_id(target_uid)?;
        let acting_user_id = wire_id(acting_uid)?;
        let response = self
            .call(window, |promise_id, window_surface_id| {
                ClientRequest::RequestUserDeletion {
                    promise_id,
                    target_user_id,
                    acting_user_id,
                    window_surface_id,
                    window_id: window,
                }
            })
            .await?;
        match response {
            ServerResponse::UserDeleted { success: true, .. } => Ok(()),
            ServerResponse::UserDeleted { .. } => Err(AccountError::OperationFailed),
            other => Err(unexpected(other)),
        }
    }

    /// Returns the uid of the new account.
    pub async fn request_user_addition(
        &self,
        acting_uid: u32,
        window: WindowId,
    ) -> Result<u32, AccountError> {
        let acting_user_id = wire_id(acting_uid)?;
        let response = self
            .call(window, |promise_id, window_surface_id| {
                ClientRequest::RequestUserAddition {
                    promise_id,
                    acting_user_id,
                    window_surface_id,
                    window_id: window,
                }
            })
            .await?;
        match response {
            ServerResponse::UserAdded { new_user_id, .. } => {
                u32::try_from(new_user_id).map_err(|_| AccountError::OperationFailed)
            }
            other => Err(unexpected(other)),
        }
    }

    /// Sends one correlated request and waits for its response. Window
    /// stealing for `window` is granted to the service for the duration of
    /// the call.
    async fn call(
        &self,
        window: WindowId,
        build: impl FnOnce(i32, SurfaceId) -> ClientRequest,
    ) -> ResponseResult {
        let service_surface = self.expose_window_surface_id().await?;
        let _stealing =
            WindowStealingGuard::new(self.shared.desktop.clone(), service_surface, window);

        let (promise_id, receiver) = self.shared.correlator.register(Some(window))?;
        let request = build(promise_id, self.shared.desktop.surface_id());
        debug!("Sending request with promise {}.", promise_id);
        if self.request_tx.send(request).is_err() {
            self.shared.correlator.abandon(promise_id);
            return Err(self.connection_error());
        }

        receiver.await.map_err(|_| self.connection_error())?
    }
}

fn wire_id(uid: u32) -> Result<i32, AccountError> {
    i32::try_from(uid)
        .map_err(|_| AccountError::InvalidRequest(format!("user id {uid} does not fit the protocol")))
}

fn unexpected(response: ServerResponse) -> AccountError {
    AccountError::Protocol(format!("unexpected response {response:?}"))
}

async fn write_requests(
    write_half: OwnedWriteHalf,
    mut request_rx: mpsc::UnboundedReceiver<ClientRequest>,
) {
    let mut framed = FramedWrite::new(write_half, ClientCodec::new());
    while let Some(request) = request_rx.recv().await {
        if let Err(e) = framed.send(request).await {
            warn!("Failed to send request to the account service: {}", e);
            break;
        }
    }
    debug!("Account client writer stopped.");
}

async fn read_responses(read_half: OwnedReadHalf, shared: Arc<Shared>) {
    let _guard = ReaderGuard(shared.clone());
    let mut framed = FramedRead::new(read_half, ClientCodec::new());

    while let Some(result) = framed.next().await {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!("Connection to the account service failed: {}", e);
                break;
            }
        };

        if let ServerResponse::WindowSurfaceId { window_surface_id } = response {
            let waiter = shared
                .surface_waiters
                .lock()
                .as_mut()
                .and_then(VecDeque::pop_front);
            match waiter {
                Some(waiter) => {
                    let _ = waiter.send(window_surface_id);
                }
                None => {
                    shared.correlator.poison("unsolicited window surface id");
                    break;
                }
            }
            continue;
        }

        let window = match shared.correlator.resolve(response) {
            Ok(window) => window,
            // Both ends disagree about what is outstanding; nothing after
            // this point on the stream can be trusted.
            Err(_) => break,
        };
        let _ = shared.events.send(AccountEvent::Response);
        if let Some(event) = success_event(&response) {
            let _ = shared.events.send(event);
        }
        if let Some(window) = window {
            shared.desktop.focus_window(window);
        }
    }
    debug!("Account client reader stopped.");
}

fn success_event(response: &ServerResponse) -> Option<AccountEvent> {
    match *response {
        ServerResponse::UserPasswordUpdated { success: true, .. } => {
            Some(AccountEvent::PasswordUpdated)
        }
        ServerResponse::UserSettingsUpdated { success: true, .. } => {
            Some(AccountEvent::SettingsUpdated)
        }
        ServerResponse::UserDeleted { success: true, .. } => Some(AccountEvent::UserDeleted),
        ServerResponse::UserAdded { new_user_id, .. } if new_user_id >= 0 => {
            Some(AccountEvent::UserAdded(new_user_id))
        }
        _ => None,
    }
}

// src/connection/handler.rs

//! Defines the `ConnectionHandler` which manages the full lifecycle of a client connection.

use super::guard::ConnectionGuard;
use super::session::SessionState;
use crate::core::AccountError;
use crate::core::dispatcher::DispatchJob;
use crate::core::protocol::{ClientRequest, ServerCodec, ServerResponse};
use crate::server::ServerState;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UnixStream;
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

/// Manages the full lifecycle of a client connection.
pub struct ConnectionHandler {
    framed: Framed<UnixStream, ServerCodec>,
    state: Arc<ServerState>,
    session_id: u64,
    shutdown_rx: broadcast::Receiver<()>,
    session: SessionState,
}

impl ConnectionHandler {
    pub fn new(
        socket: UnixStream,
        state: Arc<ServerState>,
        session_id: u64,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            framed: Framed::new(socket, ServerCodec::new()),
            state,
            session_id,
            shutdown_rx,
            session: SessionState::new(),
        }
    }

    /// The main event loop for the connection.
    ///
    /// Replies from the dispatcher arrive on a per-session channel and are
    /// written as they come, so they may interleave with requests still being
    /// read. `ExposeWindowSurfaceId` is answered here without going through
    /// the dispatcher, which keeps it responsive while a prompt is open.
    pub async fn run(mut self) -> Result<(), AccountError> {
        let _guard = ConnectionGuard::new(self.state.clone(), self.session_id);
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerResponse>();

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    info!("Session {} received shutdown signal.", self.session_id);
                    break;
                }
                Some(response) = reply_rx.recv() => {
                    if let Some(promise_id) = response.promise_id() {
                        self.session.finish(promise_id);
                    }
                    debug!("Session {}: Sending reply {:?}", self.session_id, response);
                    self.framed.send(response).await?;
                }
                result = self.framed.next() => {
                    match result {
                        Some(Ok(request)) => self.process_request(request, &reply_tx).await?,
                        Some(Err(e)) => {
                            if is_normal_disconnect(&e) {
                                debug!("Session {} closed by peer: {}", self.session_id, e);
                            } else {
                                warn!("Connection error for session {}: {}", self.session_id, e);
                            }
                            break;
                        }
                        None => {
                            debug!("Session {} closed by peer.", self.session_id);
                            break;
                        }
                    }
                }
            }
        }

        if !self.session.in_flight.is_empty() {
            info!(
                "Session {} closed with {} request(s) still being handled; their replies will be dropped.",
                self.session_id,
                self.session.in_flight.len()
            );
        }
        Ok(())
    }

    async fn process_request(
        &mut self,
        request: ClientRequest,
        reply_tx: &mpsc::UnboundedSender<ServerResponse>,
    ) -> Result<(), AccountError> {
        let Some(promise_id) = request.promise_id() else {
            let response = ServerResponse::WindowSurfaceId {
                window_surface_id: self.state.surface_id,
            };
            debug!("Session {}: Exposing surface id.", self.session_id);
            self.framed.send(response).await?;
            return Ok(());
        };

        if !self.session.begin(promise_id) {
            warn!(
                "Session {} reused promise id {} while it is still pending.",
                self.session_id, promise_id
            );
        }
        if let Some(mut info) = self.state.sessions.get_mut(&self.session_id) {
            info.last_request_time = Instant::now();
            info.requests_received += 1;
        }
        debug!(
            "Session {}: Queueing request {} for the dispatcher.",
            self.session_id, promise_id
        );

        let failure = request.failure_response();
        let job = DispatchJob {
            session_id: self.session_id,
            request,
            reply_tx: reply_tx.clone(),
        };
        if self.state.dispatch_tx.send(job).await.is_err() {
            warn!(
                "Dispatcher is gone; failing request {} of session {}.",
                promise_id, self.session_id
            );
            if let Some(response) = failure {
                self.session.finish(promise_id);
                self.framed.send(response).await?;
            }
        }
        Ok(())
    }
}

/// Helper function to check for non-critical disconnection errors.
fn is_normal_disconnect(e: &AccountError) -> bool {
    matches!(e, AccountError::Io(arc_err) if matches!(
        arc_err.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionAborted
    ))
}

// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for session cleanup.

use crate::server::ServerState;
use std::sync::Arc;
use tracing::{debug, info};

/// Removes the session from the registry when the connection handler's scope
/// is exited, however it exits.
pub struct ConnectionGuard {
    pub(crate) state: Arc<ServerState>,
    pub(crate) session_id: u64,
}

impl ConnectionGuard {
    pub(crate) fn new(state: Arc<ServerState>, session_id: u64) -> Self {
        Self { state, session_id }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!(
            "ConnectionGuard dropping, cleaning up session {}",
            self.session_id
        );
        match self.state.sessions.remove(&self.session_id) {
            Some((_, session)) => info!(
                "Session {} closed after {} request(s); connected {:?}, last request {:?} ago.",
                session.session_id,
                session.requests_received,
                session.created.elapsed(),
                session.last_request_time.elapsed()
            ),
            None => debug!(
                "Session {} was not in the session registry upon cleanup.",
                self.session_id
            ),
        }
    }
}

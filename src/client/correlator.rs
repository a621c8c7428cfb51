// src/client/correlator.rs

//! Matches responses from the account service to the requests waiting on them.
//!
//! Every request is registered under a fresh promise id before it is sent.
//! Ids only grow over the lifetime of a correlator, so an id is never reused.
//! A response carrying an id that is not pending means the two ends disagree
//! about what is outstanding. That breach is fatal for the connection: every
//! pending request and every later registration fails with `ProtocolDesync`.

use crate::core::desktop::WindowId;
use crate::core::errors::AccountError;
use crate::core::protocol::ServerResponse;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::{debug, error};

pub type ResponseResult = Result<ServerResponse, AccountError>;

/// One outstanding request.
#[derive(Debug)]
pub struct PendingRequest {
    sender: oneshot::Sender<ResponseResult>,
    /// The requester's window, re-focused once the request completes.
    window_id: Option<WindowId>,
}

#[derive(Debug)]
struct Inner {
    next_id: i32,
    pending: HashMap<i32, PendingRequest>,
    /// Set once the connection is gone; later registrations fail with it.
    closed: Option<AccountError>,
}

#[derive(Debug)]
pub struct Correlator {
    inner: Mutex<Inner>,
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 0,
                pending: HashMap::new(),
                closed: None,
            }),
        }
    }

    /// Allocates a promise id and registers a pending request under it.
    ///
    /// # Panics
    ///
    /// Panics if the id space is exhausted or the new id is already pending.
    pub fn register(
        &self,
        window_id: Option<WindowId>,
    ) -> Result<(i32, oneshot::Receiver<ResponseResult>), AccountError> {
        let mut inner = self.inner.lock();
        if let Some(reason) = &inner.closed {
            return Err(reason.clone());
        }

        let id = inner.next_id;
        inner.next_id = id
            .checked_add(1)
            .unwrap_or_else(|| panic!("promise id space exhausted after {id}"));
        assert!(
            !inner.pending.contains_key(&id),
            "promise id {id} allocated while still pending"
        );

        let (sender, receiver) = oneshot::channel();
        inner.pending.insert(id, PendingRequest { sender, window_id });
        debug!("Registered promise {} ({} pending).", id, inner.pending.len());
        Ok((id, receiver))
    }

    /// Delivers `response` to the request waiting on its promise id and
    /// removes that request. Returns the window to re-focus, if any.
    ///
    /// A response without a promise id, or for an id that is not pending, is
    /// a desync: the correlator is poisoned and `ProtocolDesync` is returned.
    pub fn resolve(&self, response: ServerResponse) -> Result<Option<WindowId>, AccountError> {
        let Some(id) = response.promise_id() else {
            return Err(self.poison(format!("{response:?} is not a correlated response")));
        };
        let entry = self.inner.lock().pending.remove(&id);
        let Some(pending) = entry else {
            return Err(self.poison(format!("response for unknown promise id {id}")));
        };

        if pending.sender.send(Ok(response)).is_err() {
            debug!("Promise {} resolved after its caller went away.", id);
        }
        Ok(pending.window_id)
    }

    /// Fails every pending request with `ProtocolDesync` and refuses new ones.
    pub fn poison(&self, reason: impl Into<String>) -> AccountError {
        let reason = reason.into();
        error!("Protocol desync with the account service: {}", reason);
        let err = AccountError::ProtocolDesync(reason);
        self.close_with(err.clone());
        err
    }

    /// Withdraws a request that could not be sent. The caller still holding
    /// the receiver sees it closed.
    pub fn abandon(&self, id: i32) {
        self.inner.lock().pending.remove(&id);
    }

    /// Fails every pending request with `ConnectionClosed` and refuses new
    /// ones. A correlator already poisoned keeps its desync error.
    pub fn fail_all(&self) {
        self.close_with(AccountError::ConnectionClosed);
    }

    fn close_with(&self, reason: AccountError) {
        let (reason, drained) = {
            let mut inner = self.inner.lock();
            let reason = inner.closed.get_or_insert(reason).clone();
            let drained: Vec<(i32, PendingRequest)> = inner.pending.drain().collect();
            (reason, drained)
        };
        for (id, pending) in drained {
            debug!("Failing promise {}: {}", id, reason);
            let _ = pending.sender.send(Err(reason.clone()));
        }
    }

    /// The error requests fail with once the correlator is closed.
    pub fn closed_reason(&self) -> Option<AccountError> {
        self.inner.lock().closed.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_pending(&self, id: i32) -> bool {
        self.inner.lock().pending.contains_key(&id)
    }
}

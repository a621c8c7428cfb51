// src/connection/session.rs

//! Defines the state associated with a single client session.

use std::collections::HashSet;

/// Per-connection bookkeeping of privileged requests.
#[derive(Debug, Default)]
pub struct SessionState {
    /// Promise ids forwarded to the dispatcher and not yet answered.
    pub in_flight: HashSet<i32>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records a forwarded request. Returns false if the client reused a
    /// promise id that is still waiting for its reply.
    pub(crate) fn begin(&mut self, promise_id: i32) -> bool {
        self.in_flight.insert(promise_id)
    }

    pub(crate) fn finish(&mut self, promise_id: i32) {
        self.in_flight.remove(&promise_id);
    }
}

// src/server/state.rs

//! Shared state of a running account service.

use crate::config::Config;
use crate::core::account::AccountStore;
use crate::core::desktop::{Desktop, SurfaceId};
use crate::core::dispatcher::{DispatchJob, Dispatcher};
use crate::core::executor::{Executor, HelperRunner};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Capacity of the queue of privileged requests waiting for the dispatcher.
const DISPATCH_QUEUE_CAPACITY: usize = 64;

/// What the service knows about one connected client.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: u64,
    pub created: Instant,
    pub last_request_time: Instant,
    pub requests_received: u64,
}

impl SessionInfo {
    pub fn new(session_id: u64) -> Self {
        let now = Instant::now();
        Self {
            session_id,
            created: now,
            last_request_time: now,
            requests_received: 0,
        }
    }
}

/// State shared by every connection handler.
pub struct ServerState {
    pub config: Config,
    /// Live sessions, keyed by session id. Owned by the listening endpoint.
    pub sessions: DashMap<u64, SessionInfo>,
    /// Queue feeding the single dispatcher task.
    pub dispatch_tx: mpsc::Sender<DispatchJob>,
    /// The service's own window-server client id, for `ExposeWindowSurfaceId`.
    pub surface_id: SurfaceId,
}

/// The pieces produced by `ServerState::initialize` that are consumed once.
pub struct ServerInit {
    pub state: Arc<ServerState>,
    pub dispatcher: Dispatcher,
    pub dispatch_rx: mpsc::Receiver<DispatchJob>,
}

impl ServerState {
    pub fn initialize(
        config: Config,
        desktop: Arc<dyn Desktop>,
        store: Arc<dyn AccountStore>,
        runner: Arc<dyn HelperRunner>,
    ) -> ServerInit {
        let (dispatch_tx, dispatch_rx) = mpsc::channel(DISPATCH_QUEUE_CAPACITY);
        let executor = Executor::new(
            store,
            desktop.clone(),
            runner,
            config.helpers.clone(),
            config.accounts.clone(),
            config.store.shells_path.clone(),
        );
        let dispatcher = Dispatcher::new(desktop.clone(), executor, config.auth.clone());

        let state = Arc::new(ServerState {
            surface_id: desktop.surface_id(),
            config,
            sessions: DashMap::new(),
            dispatch_tx,
        });

        ServerInit {
            state,
            dispatcher,
            dispatch_rx,
        }
    }
}

// src/client/desktop.rs

//! The requester's side of the windowing collaborator.

use crate::core::desktop::{SurfaceId, WindowId};
use std::sync::Arc;
use tracing::debug;

/// What the requesting application must provide so the service's dialogs can
/// behave as children of its window.
pub trait ClientDesktop: Send + Sync {
    /// This process's own window-server client id.
    fn surface_id(&self) -> SurfaceId;

    /// Lets `service_surface` parent its windows under `window`.
    fn add_window_stealing(&self, service_surface: SurfaceId, window: WindowId);

    fn remove_window_stealing(&self, service_surface: SurfaceId, window: WindowId);

    /// Brings `window` back to the front after a request completes.
    fn focus_window(&self, window: WindowId);
}

/// Grants window stealing for the lifetime of one request and revokes it on
/// every exit path.
pub struct WindowStealingGuard {
    desktop: Arc<dyn ClientDesktop>,
    service_surface: SurfaceId,
    window: WindowId,
}

impl WindowStealingGuard {
    pub fn new(desktop: Arc<dyn ClientDesktop>, service_surface: SurfaceId, window: WindowId) -> Self {
        desktop.add_window_stealing(service_surface, window);
        Self {
            desktop,
            service_surface,
            window,
        }
    }
}

impl Drop for WindowStealingGuard {
    fn drop(&mut self) {
        debug!(
            "Revoking window stealing of window {} for surface {}.",
            self.window, self.service_surface
        );
        self.desktop
            .remove_window_stealing(self.service_surface, self.window);
    }
}

// src/core/protocol/message.rs

//! Messages exchanged between an account client and the account service.
//!
//! Every privileged request carries a promise id chosen by the client. The
//! service answers each one exactly once, echoing that id in the response.

use bincode::{Decode, Encode};

/// Messages sent by a client.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum ClientRequest {
    RequestUserPasswordUpdate {
        promise_id: i32,
        target_user_id: i32,
        acting_user_id: i32,
        window_surface_id: i32,
        window_id: i32,
    },
    RequestUserSettingsUpdate {
        promise_id: i32,
        target_user_id: i32,
        acting_user_id: i32,
        window_surface_id: i32,
        window_id: i32,
        shell: String,
        display_name: String,
        primary_group_id: i32,
        secondary_group_ids: Vec<i32>,
    },
    RequestUserDeletion {
        promise_id: i32,
        target_user_id: i32,
        acting_user_id: i32,
        window_surface_id: i32,
        window_id: i32,
    },
    RequestUserAddition {
        promise_id: i32,
        acting_user_id: i32,
        window_surface_id: i32,
        window_id: i32,
    },
    /// Asks for the service's own window-server client id.
    ExposeWindowSurfaceId,
}

impl ClientRequest {
    /// The promise id of a privileged request. `ExposeWindowSurfaceId` is
    /// answered in order and carries none.
    pub fn promise_id(&self) -> Option<i32> {
        match self {
            ClientRequest::RequestUserPasswordUpdate { promise_id, .. }
            | ClientRequest::RequestUserSettingsUpdate { promise_id, .. }
            | ClientRequest::RequestUserDeletion { promise_id, .. }
            | ClientRequest::RequestUserAddition { promise_id, .. } => Some(*promise_id),
            ClientRequest::ExposeWindowSurfaceId => None,
        }
    }

    /// The requester's window, as `(surface, window)`.
    pub fn requester_window(&self) -> Option<(i32, i32)> {
        match self {
            ClientRequest::RequestUserPasswordUpdate {
                window_surface_id,
                window_id,
                ..
            }
            | ClientRequest::RequestUserSettingsUpdate {
                window_surface_id,
                window_id,
                ..
            }
            | ClientRequest::RequestUserDeletion {
                window_surface_id,
                window_id,
                ..
            }
            | ClientRequest::RequestUserAddition {
                window_surface_id,
                window_id,
                ..
            } => Some((*window_surface_id, *window_id)),
            ClientRequest::ExposeWindowSurfaceId => None,
        }
    }

    /// The response sent when the request fails at any stage.
    pub fn failure_response(&self) -> Option<ServerResponse> {
        let response = match self {
            ClientRequest::RequestUserPasswordUpdate { promise_id, .. } => {
                ServerResponse::UserPasswordUpdated {
                    promise_id: *promise_id,
                    success: false,
                }
            }
            ClientRequest::RequestUserSettingsUpdate { promise_id, .. } => {
                ServerResponse::UserSettingsUpdated {
                    promise_id: *promise_id,
                    success: false,
                }
            }
            ClientRequest::RequestUserDeletion { promise_id, .. } => ServerResponse::UserDeleted {
                promise_id: *promise_id,
                success: false,
            },
            ClientRequest::RequestUserAddition { promise_id, .. } => ServerResponse::UserAdded {
                promise_id: *promise_id,
                new_user_id: -1,
            },
            ClientRequest::ExposeWindowSurfaceId => return None,
        };
        Some(response)
    }
}

/// Messages sent by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum ServerResponse {
    UserPasswordUpdated { promise_id: i32, success: bool },
    UserSettingsUpdated { promise_id: i32, success: bool },
    UserDeleted { promise_id: i32, success: bool },
    /// `new_user_id` is -1 on failure.
    UserAdded { promise_id: i32, new_user_id: i32 },
    WindowSurfaceId { window_surface_id: i32 },
}

impl ServerResponse {
    pub fn promise_id(&self) -> Option<i32> {
        match self {
            ServerResponse::UserPasswordUpdated { promise_id, .. }
            | ServerResponse::UserSettingsUpdated { promise_id, .. }
            | ServerResponse::UserDeleted { promise_id, .. }
            | ServerResponse::UserAdded { promise_id, .. } => Some(*promise_id),
            ServerResponse::WindowSurfaceId { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            ServerResponse::UserPasswordUpdated { success, .. }
            | ServerResponse::UserSettingsUpdated { success, .. }
            | ServerResponse::UserDeleted { success, .. } => *success,
            ServerResponse::UserAdded { new_user_id, .. } => *new_user_id >= 0,
            ServerResponse::WindowSurfaceId { .. } => true,
        }
    }
}

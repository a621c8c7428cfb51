// src/core/protocol/mod.rs

pub mod frame;
pub mod message;

pub use frame::{AccountFrameCodec, MAX_FRAME_LEN};
pub use message::{ClientRequest, ServerResponse};

/// Codec used by the service side of a connection.
pub type ServerCodec = AccountFrameCodec<ClientRequest, ServerResponse>;
/// Codec used by the client side of a connection.
pub type ClientCodec = AccountFrameCodec<ServerResponse, ClientRequest>;

// src/connection/mod.rs

//! Manages the lifecycle of a single client connection: frame decoding,
//! forwarding privileged requests to the dispatcher, and writing replies.

mod guard;
mod handler;
mod session;

pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
pub use session::SessionState;

// src/core/mod.rs

//! The central module containing the account model, the authorization flow,
//! the privileged operations, and the wire protocol shared with clients.

pub mod account;
pub mod auth;
pub mod desktop;
pub mod dispatcher;
pub mod errors;
pub mod executor;
pub mod protocol;

pub use dispatcher::{DispatchJob, Dispatcher};
pub use errors::AccountError;
pub use protocol::{ClientRequest, ServerResponse};

// src/client/mod.rs

//! The client side of the account service protocol.

mod connection;
mod correlator;
mod desktop;
mod settings;

pub use connection::{AccountClient, AccountEvent, DEFAULT_SOCKET_PATH};
pub use correlator::{Correlator, PendingRequest, ResponseResult};
pub use desktop::{ClientDesktop, WindowStealingGuard};
pub use settings::Settings;

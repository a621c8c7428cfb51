// src/lib.rs

pub mod client;
pub mod config;
pub mod connection;
pub mod console;
pub mod core;
pub mod server;

// Re-export
pub use crate::core::AccountError;

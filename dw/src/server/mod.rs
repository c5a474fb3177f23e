//! Command server
//!
//! Unix Domain Socket server speaking newline-delimited JSON envelopes,
//! plus the client `dw send` uses.

use std::path::PathBuf;

pub mod client;
mod handler;
pub mod listener;
pub mod messages;

pub use client::CommandClient;
pub use handler::Dispatcher;
pub use messages::{COMMAND_TYPES, Command, Request, Response, SessionParams};

/// Default socket path under the runtime directory
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("draftwise")
        .join("draftwise.sock")
}
